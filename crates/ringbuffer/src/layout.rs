//! Memory layout of a ring buffer region.
//!
//! ```text
//! +------------------------------------+-----------------------------------+
//! | data section (capacity bytes)      | trailer (TRAILER_LENGTH bytes)    |
//! +------------------------------------+-----------------------------------+
//!                                        +128  tail position       (writer)
//!                                        +256  head cache position (writer)
//!                                        +384  head position       (reader)
//!                                        +512  correlation counter (shared)
//!                                        +640  consumer heartbeat  (reader)
//! ```
//!
//! SAFETY & MEMORY ORDERING:
//!
//! Writer protocol:
//! 1. Write record bytes into the data section
//! 2. Publish the tail position with `Ordering::Release`
//!
//! Reader protocol:
//! 1. Load the tail position with `Ordering::Acquire`
//! 2. Every record below that tail is guaranteed visible
//! 3. Publish the head position with `Ordering::Release` once consumed
//!
//! Each trailer slot sits two cache lines away from its neighbours so the
//! writer-owned and reader-owned counters never share a line, even with
//! adjacent-line prefetching. The offsets match the one-to-one ring buffer
//! layout used by JVM peers, so either side of the region can live in another
//! runtime.

use crate::errors::RingBufferError;

pub const CACHE_LINE_LENGTH: usize = 64;

pub const TAIL_POSITION_OFFSET: usize = CACHE_LINE_LENGTH * 2;
pub const HEAD_CACHE_POSITION_OFFSET: usize = CACHE_LINE_LENGTH * 4;
pub const HEAD_POSITION_OFFSET: usize = CACHE_LINE_LENGTH * 6;
pub const CORRELATION_COUNTER_OFFSET: usize = CACHE_LINE_LENGTH * 8;
pub const CONSUMER_HEARTBEAT_OFFSET: usize = CACHE_LINE_LENGTH * 10;

/// Total length of the trailer in bytes.
pub const TRAILER_LENGTH: usize = CACHE_LINE_LENGTH * 12;

/// Smallest data section accepted.
pub const MIN_CAPACITY: usize = 64;

/// Largest data section accepted; record lengths are stored as `i32`.
pub const MAX_CAPACITY: usize = 1 << 30;

#[inline]
pub fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Round `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align(value: usize, alignment: usize) -> usize {
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Byte offsets of everything inside a region, derived from its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    capacity: usize,
    max_msg_length: usize,
    tail_position_index: usize,
    head_cache_position_index: usize,
    head_position_index: usize,
    correlation_counter_index: usize,
    consumer_heartbeat_index: usize,
}

impl Layout {
    /// Layout for a data section of `capacity` bytes.
    pub fn for_capacity(capacity: usize) -> Result<Self, RingBufferError> {
        if !is_power_of_two(capacity) || !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(RingBufferError::InvalidCapacity { capacity });
        }

        Ok(Self {
            capacity,
            max_msg_length: capacity / 8,
            tail_position_index: capacity + TAIL_POSITION_OFFSET,
            head_cache_position_index: capacity + HEAD_CACHE_POSITION_OFFSET,
            head_position_index: capacity + HEAD_POSITION_OFFSET,
            correlation_counter_index: capacity + CORRELATION_COUNTER_OFFSET,
            consumer_heartbeat_index: capacity + CONSUMER_HEARTBEAT_OFFSET,
        })
    }

    /// Layout for a region of `region_len` bytes, trailer included.
    pub fn from_region_len(region_len: usize) -> Result<Self, RingBufferError> {
        let capacity = region_len
            .checked_sub(TRAILER_LENGTH)
            .ok_or(RingBufferError::InvalidCapacity {
                capacity: region_len,
            })?;
        Self::for_capacity(capacity)
    }

    /// Bytes needed for the data section plus trailer.
    pub fn region_len(&self) -> usize {
        self.capacity + TRAILER_LENGTH
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest payload a single record may carry.
    pub fn max_msg_length(&self) -> usize {
        self.max_msg_length
    }

    #[inline]
    pub fn mask(&self) -> i64 {
        self.capacity as i64 - 1
    }

    pub fn tail_position_index(&self) -> usize {
        self.tail_position_index
    }

    pub fn head_cache_position_index(&self) -> usize {
        self.head_cache_position_index
    }

    pub fn head_position_index(&self) -> usize {
        self.head_position_index
    }

    pub fn correlation_counter_index(&self) -> usize {
        self.correlation_counter_index
    }

    pub fn consumer_heartbeat_index(&self) -> usize {
        self.consumer_heartbeat_index
    }
}
