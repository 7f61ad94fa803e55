/// A captured frame, borrowed from the capture buffer for one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Captured bytes; at most `snaplen` of them.
    pub data: &'a [u8],
    /// Length of the frame on the wire, which can exceed `data.len()`.
    pub wire_len: u32,
}

impl<'a> Frame<'a> {
    pub fn new(data: &'a [u8], wire_len: u32) -> Self {
        Frame { data, wire_len }
    }

    /// A frame captured in full.
    pub fn whole(data: &'a [u8]) -> Self {
        Frame {
            data,
            wire_len: u32::try_from(data.len()).unwrap_or(u32::MAX),
        }
    }
}
