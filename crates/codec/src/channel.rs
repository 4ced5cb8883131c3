//! Per-transport message size limits.

/// Maximum framed message length on the reliable (TCP) channel.
pub const NORMAL_MAX_LEN: usize = 262_144;

/// Maximum framed message length on the unreliable (UDP) channel — a single
/// datagram, bounded by the common safe UDP payload size.
pub const QUICK_MAX_LEN: usize = 65_507;

/// Which transport a message is being framed for; governs the size limit
/// applied by [`crate::Header::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Normal,
    Quick,
}

impl Channel {
    pub const fn max_len(self) -> usize {
        match self {
            Channel::Normal => NORMAL_MAX_LEN,
            Channel::Quick => QUICK_MAX_LEN,
        }
    }
}
