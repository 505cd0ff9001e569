use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RingBufferError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Capacity must be a positive power of 2 + TRAILER_LENGTH: capacity={capacity}")]
    InvalidCapacity { capacity: usize },

    #[error("Region base address must be 8-byte aligned")]
    Misaligned,

    #[error("encoded message exceeds maxMsgLength of {max} length={length}")]
    MessageTooLarge { length: usize, max: usize },

    #[error("Message type id must be greater than zero, msgTypeId={0}")]
    InvalidMessageType(i32),

    #[error("Writer is closed: poison message already published")]
    WriterClosed,
}
