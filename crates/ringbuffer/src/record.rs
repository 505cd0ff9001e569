//! Record header codec.
//!
//! Every record starts with an 8-byte little-endian header. Writing the header
//! word is the last step of producing a record, so a peer that scans by header
//! length never sees a half-written record.
//!
//! ```text
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |R|                       Record Length                         |
//!  +-+-------------------------------------------------------------+
//!  |                              Type                             |
//!  +---------------------------------------------------------------+
//!  |                       Encoded Message                        ...
//! ...                                                              |
//!  +---------------------------------------------------------------+
//! ```
//!
//! Record length covers header plus payload, without alignment.

use crate::layout::align;

pub const HEADER_LENGTH: usize = 8;
pub const ALIGNMENT: usize = HEADER_LENGTH;

/// Type id of filler records written when a record would straddle the end.
pub const PADDING_MSG_TYPE_ID: i32 = -1;

/// Type id announcing the producer is done. The payload carries a final value.
pub const POISON_MSG_TYPE_ID: i32 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_length: i32,
    pub type_id: i32,
}

impl RecordHeader {
    /// Header for a message carrying `payload_length` bytes.
    #[inline]
    pub fn message(type_id: i32, payload_length: usize) -> Self {
        Self {
            record_length: (HEADER_LENGTH + payload_length) as i32,
            type_id,
        }
    }

    /// Header for a padding record consuming `length` bytes.
    #[inline]
    pub fn padding(length: usize) -> Self {
        Self {
            record_length: length as i32,
            type_id: PADDING_MSG_TYPE_ID,
        }
    }

    #[inline]
    pub fn encode(self) -> i64 {
        ((self.type_id as i64 & 0xFFFF_FFFF) << 32) | (self.record_length as i64 & 0xFFFF_FFFF)
    }

    #[inline]
    pub fn decode(word: i64) -> Self {
        Self {
            record_length: word as i32,
            type_id: (word >> 32) as i32,
        }
    }

    #[inline]
    pub fn is_padding(&self) -> bool {
        self.type_id == PADDING_MSG_TYPE_ID
    }

    #[inline]
    pub fn is_poison(&self) -> bool {
        self.type_id == POISON_MSG_TYPE_ID
    }

    /// Payload bytes following the header. Zero for padding.
    #[inline]
    pub fn payload_length(&self) -> usize {
        if self.is_padding() {
            0
        } else {
            (self.record_length as usize).saturating_sub(HEADER_LENGTH)
        }
    }

    /// Bytes the record occupies in the data section.
    #[inline]
    pub fn aligned_length(&self) -> usize {
        align(self.record_length.max(0) as usize, ALIGNMENT)
    }
}

/// Offset of the payload for a record starting at `record_index`.
#[inline]
pub fn encoded_msg_offset(record_index: usize) -> usize {
    record_index + HEADER_LENGTH
}
