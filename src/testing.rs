//! In-memory channels for driving a router in tests without touching any
//! real network. Frames pushed through the inject handle come out of the
//! channel's `poll`, frames the router transmits come out of the read
//! handle.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::EthernetChannel;

pub struct MockChannel {
    inject: Receiver<Vec<u8>>,
    read: Sender<Vec<u8>>,
}

impl EthernetChannel for MockChannel {
    fn transmit(&mut self, frame: &[u8]) -> io::Result<()> {
        self.read
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "read handle closed"))
    }

    fn poll(&mut self) -> Option<Vec<u8>> {
        self.inject.try_recv().ok()
    }
}

/// Creates a mock channel together with its two test handles: the sender
/// injects frames for the router to poll, the receiver observes what the
/// router transmitted.
pub fn channel() -> (MockChannel, Sender<Vec<u8>>, Receiver<Vec<u8>>) {
    let (inject_handle, inject) = mpsc::channel();
    let (read, read_handle) = mpsc::channel();
    let channel = MockChannel { inject, read };
    (channel, inject_handle, read_handle)
}
