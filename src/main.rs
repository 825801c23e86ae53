//! The `ripr` binary: attaches the router to the host's network interfaces
//! through `pnet` datalink channels, applies the configuration given on the
//! command line and runs the poll loop until `q` is read on stdin.
//!
//! Configuration arguments:
//!
//! ```text
//! ripr eth0=192.168.1.1/24 eth1=203.0.113.1/24 \
//!      route=10.0.0.0/8,192.168.1.254 nat=eth0,eth1
//! ```
//!
//! `NAME=CIDR` assigns an address, `route=CIDR,GATEWAY` installs a gateway
//! route and `nat=INSIDE,OUTSIDE` enables NAPT between two interfaces.

use std::env;
use std::io::{self, Read};
use std::net::Ipv4Addr;
use std::process;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender};

#[macro_use]
extern crate log;

use ripr::router::Router;
use ripr::{is_ignored_interface, EthernetChannel};

/// How long one receive poll may wait for the OS. Short enough that a pass
/// over all interfaces stays responsive.
const READ_TIMEOUT: Duration = Duration::from_millis(1);

struct DatalinkChannel {
    tx: Box<dyn DataLinkSender>,
    rx: Box<dyn DataLinkReceiver>,
}

impl EthernetChannel for DatalinkChannel {
    fn transmit(&mut self, frame: &[u8]) -> io::Result<()> {
        match self.tx.send_to(frame, None) {
            Some(result) => result,
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "insufficient buffer space",
            )),
        }
    }

    fn poll(&mut self) -> Option<Vec<u8>> {
        self.rx.next().ok().map(|frame| frame.to_vec())
    }
}

enum Directive {
    SetIp { interface: String, net: Ipv4Network },
    AddRoute { net: Ipv4Network, next_hop: Ipv4Addr },
    EnableNat { inside: String, outside: String },
}

fn parse_directive(arg: &str) -> Result<Directive, String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("malformed argument {:?}, expected KEY=VALUE", arg))?;
    match key {
        "route" => {
            let (net, gateway) = value
                .split_once(',')
                .ok_or_else(|| format!("route needs CIDR,GATEWAY, got {:?}", value))?;
            Ok(Directive::AddRoute {
                net: Ipv4Network::from_str(net).map_err(|e| e.to_string())?,
                next_hop: Ipv4Addr::from_str(gateway).map_err(|e| e.to_string())?,
            })
        }
        "nat" => {
            let (inside, outside) = value
                .split_once(',')
                .ok_or_else(|| format!("nat needs INSIDE,OUTSIDE, got {:?}", value))?;
            Ok(Directive::EnableNat {
                inside: inside.to_owned(),
                outside: outside.to_owned(),
            })
        }
        name => Ok(Directive::SetIp {
            interface: name.to_owned(),
            net: Ipv4Network::from_str(value).map_err(|e| e.to_string())?,
        }),
    }
}

fn apply(router: &mut Router, directive: Directive) {
    let result = match directive {
        Directive::SetIp { interface, net } => router.set_ip(&interface, net.ip(), net.mask()),
        Directive::AddRoute { net, next_hop } => {
            router.add_route(net, next_hop);
            Ok(())
        }
        Directive::EnableNat { inside, outside } => router.enable_nat(&inside, &outside),
    };
    if let Err(e) = result {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }
}

/// Keystrokes arrive on a channel so the main loop never blocks on stdin.
fn spawn_stdin_reader() -> Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for byte in io::stdin().bytes().flatten() {
            if tx.send(byte).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() {
    env_logger::init();

    let directives = match env::args().skip(1).map(|a| parse_directive(&a)).collect::<Result<Vec<_>, _>>() {
        Ok(directives) => directives,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("usage: ripr [NAME=CIDR] [route=CIDR,GATEWAY] [nat=INSIDE,OUTSIDE]...");
            process::exit(2);
        }
    };

    let mut router = Router::new();
    for interface in datalink::interfaces() {
        let mac = match interface.mac {
            Some(mac) => mac,
            None => continue,
        };
        if is_ignored_interface(&interface.name) {
            info!("Skipped to enable interface {}", interface.name);
            continue;
        }
        let mut config = datalink::Config::default();
        config.read_timeout = Some(READ_TIMEOUT);
        let channel = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => DatalinkChannel { tx, rx },
            Ok(_) => {
                warn!("Unhandled channel type on {}", interface.name);
                continue;
            }
            Err(e) => {
                error!("Unable to open {}: {}", interface.name, e);
                continue;
            }
        };
        if let Err(e) = router.add_interface(&interface.name, mac, Box::new(channel)) {
            warn!("Skipping {}: {}", interface.name, e);
        }
    }

    if router.interface_count() == 0 {
        error!("No interface is enabled!");
        process::exit(1);
    }

    for directive in directives {
        apply(&mut router, directive);
    }

    println!("Router is up. 'a' dumps the arp table, 'n' the NAPT table, 'q' quits.");
    let keys = spawn_stdin_reader();
    loop {
        match keys.try_recv() {
            Ok(b'a') => print!("{}", router.format_arp_table()),
            Ok(b'n') => print!("{}", router.format_nat_table()),
            Ok(b'q') => break,
            _ => {}
        }
        if router.poll_all() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    println!("Goodbye!");
}
