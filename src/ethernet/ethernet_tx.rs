use pnet::packet::ethernet::{EtherType, MutableEthernetPacket};
use pnet::util::MacAddr;

use crate::router::Router;
use crate::util::BufferChain;
use crate::{InterfaceId, TxError, TxResult};

use super::{ETHERNET_HEADER_SIZE, MAX_FRAME_SIZE};

/// Prepends an Ethernet II header to `payload`, flattens the chain and
/// puts the frame on the wire of `interface`.
pub fn send(
    router: &mut Router,
    interface: InterfaceId,
    destination: MacAddr,
    mut payload: BufferChain,
    ethertype: EtherType,
) -> TxResult {
    let source = router.interface(interface).mac();
    debug!(
        "Sending ethernet frame type {} from {} to {}",
        ethertype, source, destination
    );

    let mut header = vec![0; ETHERNET_HEADER_SIZE];
    {
        let mut pkg = MutableEthernetPacket::new(&mut header[..]).unwrap();
        pkg.set_destination(destination);
        pkg.set_source(source);
        pkg.set_ethertype(ethertype);
    }
    payload.prepend(header);

    if payload.len() > MAX_FRAME_SIZE {
        warn!("Dropping frame of {} bytes, too long to send", payload.len());
        return Err(TxError::TooLargePayload);
    }
    router.transmit(interface, &payload.flatten())
}
