//! Wait-free single-producer/single-consumer message ring over a fixed region
//! of (possibly shared) memory.
//!
//! ```
//! use ringbuffer::{Region, POISON_MSG_TYPE_ID};
//!
//! let (mut writer, mut reader) = ringbuffer::channel(Region::allocate(1024)?);
//!
//! assert!(writer.try_write(1, &7i64.to_le_bytes())?);
//! assert!(writer.send_poison(42)?);
//!
//! let mut values = Vec::new();
//! reader.read(|message| values.push((message.type_id, message.read_i64())));
//! assert_eq!(values, vec![(1, Some(7)), (POISON_MSG_TYPE_ID, Some(42))]);
//! # Ok::<(), ringbuffer::RingBufferError>(())
//! ```

pub mod errors;
pub mod idle;
pub mod layout;
pub mod paths;
pub mod reader;
pub mod record;
pub mod region;
pub mod writer;

use std::sync::Arc;

pub use errors::RingBufferError;
pub use idle::{
    BackoffConfig, BackoffIdleStrategy, BusySpinIdleStrategy, IdleStrategy, NoOpIdleStrategy,
    YieldingIdleStrategy,
};
pub use layout::{Layout, TRAILER_LENGTH};
pub use reader::{Message, MessageHandler, Reader};
pub use record::{POISON_MSG_TYPE_ID, RecordHeader};
pub use region::Region;
pub use writer::{Claim, Writer};

/// Split a region into its one writer and one reader.
///
/// This is the only safe way to get both sides in one process. Writers and
/// readers can't be built from a shared region directly:
///
/// ```compile_fail
/// use ringbuffer::{Region, Writer};
/// use std::sync::Arc;
///
/// let region = Arc::new(Region::allocate(1024).unwrap());
/// let first = Writer::new(Arc::clone(&region));
/// let second = Writer::new(region);
/// ```
pub fn channel(region: Region) -> (Writer, Reader) {
    let region = Arc::new(region);
    (Writer::new(Arc::clone(&region)), Reader::new(region))
}
