mod buffer;

pub use crate::util::buffer::BufferChain;
