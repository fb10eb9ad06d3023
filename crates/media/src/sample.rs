//! Compressed samples and decoded-output descriptors.

use std::fmt;
use std::ops::BitOr;

/// One compressed sample read from the demuxer, queued ahead of the decoder.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Compressed payload bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
}

/// Flags attached to decoder input and output buffers.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags(0);
    /// Marks the final buffer of a stream.
    pub const END_OF_STREAM: BufferFlags = BufferFlags(1 << 0);
    /// Marks codec-specific configuration data rather than a real sample.
    pub const CODEC_CONFIG: BufferFlags = BufferFlags(1 << 1);

    /// Whether all flags in `other` are set in `self`.
    pub fn contains(self, other: BufferFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for BufferFlags {
    type Output = BufferFlags;

    fn bitor(self, rhs: BufferFlags) -> BufferFlags {
        BufferFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for BufferFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::END_OF_STREAM) {
            parts.push("END_OF_STREAM");
        }
        if self.contains(Self::CODEC_CONFIG) {
            parts.push("CODEC_CONFIG");
        }
        if parts.is_empty() {
            parts.push("NONE");
        }
        write!(f, "BufferFlags({})", parts.join("|"))
    }
}

/// Descriptor of one completed decoder output slot.
///
/// `offset`/`size` delimit the valid bytes within the slot; partial audio
/// consumption advances `offset` and shrinks `size` in place, so the
/// descriptor at the head of a pending-output queue always points at the
/// bytes still owed to the sink.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutputBufferInfo {
    /// Index of the decoder output slot holding the data.
    pub index: usize,
    /// Byte offset of the first valid byte within the slot.
    pub offset: usize,
    /// Number of valid bytes remaining.
    pub size: usize,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    /// Buffer flags (end-of-stream at minimum).
    pub flags: BufferFlags,
}
