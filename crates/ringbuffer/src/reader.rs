use crate::layout::Layout;
use crate::record::{POISON_MSG_TYPE_ID, RecordHeader, encoded_msg_offset};
use crate::region::Region;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// One published record, borrowed from the ring for the duration of a handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub type_id: i32,
    /// Offset of the payload inside the data section.
    pub index: usize,
    pub payload: &'a [u8],
}

impl Message<'_> {
    pub fn length(&self) -> usize {
        self.payload.len()
    }

    pub fn is_poison(&self) -> bool {
        self.type_id == POISON_MSG_TYPE_ID
    }

    /// First 8 payload bytes as a little-endian `i64`.
    pub fn read_i64(&self) -> Option<i64> {
        let bytes = self.payload.get(..8)?;
        Some(i64::from_le_bytes(bytes.try_into().ok()?))
    }
}

pub trait MessageHandler {
    fn on_message(&mut self, message: Message<'_>);
}

/// Consumer side of the ring. Exactly one may exist per region.
pub struct Reader {
    region: Arc<Region>,
    layout: Layout,
    poisoned: bool,
}

impl Reader {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        let layout = *region.layout();
        Self {
            region,
            layout,
            poisoned: false,
        }
    }

    /// Consumer side over a region this process mapped on its own, e.g. with
    /// [`Region::open`] while the producer lives in another process.
    ///
    /// Use [`crate::channel`] when both sides share one process.
    ///
    /// # Safety
    ///
    /// No other reader may exist over the same memory, in this process or any
    /// other, for as long as this one is alive. Two readers race on the head
    /// position and zero records under each other.
    pub unsafe fn from_region(region: Region) -> Self {
        Self::new(Arc::new(region))
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// Dispatch every record published since the last read, in publication order.
    ///
    /// Returns the number of messages handed to `handler`; padding records
    /// are skipped silently. Zero means the ring was empty.
    pub fn read<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(Message<'_>),
    {
        self.read_limited(&mut handler, usize::MAX)
    }

    /// Like [`Reader::read`], stopping after `message_count_limit` messages.
    pub fn read_limited<F>(&mut self, mut handler: F, message_count_limit: usize) -> usize
    where
        F: FnMut(Message<'_>),
    {
        let result: Result<usize, Infallible> = self.drain(message_count_limit, |message| {
            handler(message);
            Ok(())
        });
        match result {
            Ok(count) => count,
        }
    }

    /// Drive a [`MessageHandler`] implementation instead of a closure.
    pub fn read_with<H: MessageHandler + ?Sized>(&mut self, handler: &mut H) -> usize {
        self.read(|message| handler.on_message(message))
    }

    /// Fallible variant of [`Reader::read`].
    ///
    /// The first handler error aborts the call. The record that failed counts
    /// as consumed, as do all records before it.
    pub fn try_read<F, E>(&mut self, handler: F) -> Result<usize, E>
    where
        F: FnMut(Message<'_>) -> Result<(), E>,
    {
        self.drain(usize::MAX, handler)
    }

    fn drain<F, E>(&mut self, message_count_limit: usize, mut handler: F) -> Result<usize, E>
    where
        F: FnMut(Message<'_>) -> Result<(), E>,
    {
        let region = &*self.region;
        let capacity = self.layout.capacity();
        let mask = self.layout.mask();

        let head = region.head_position().load(Ordering::Relaxed);
        let tail = region.tail_position().load(Ordering::Acquire);
        let available = (tail - head).clamp(0, capacity as i64) as usize;

        // Commits head on every exit path, unwinding included.
        let mut progress = ReadProgress {
            region,
            capacity,
            head,
            bytes_read: 0,
        };
        let mut messages_read = 0;

        while progress.bytes_read < available && messages_read < message_count_limit {
            let record_index = ((head + progress.bytes_read as i64) & mask) as usize;
            let header =
                RecordHeader::decode(region.atomic_i64(record_index).load(Ordering::Acquire));
            let aligned_record_length = header.aligned_length();

            // Torn or foreign-written header: stop rather than read out of bounds.
            if header.record_length <= 0
                || aligned_record_length > available - progress.bytes_read
                || record_index + aligned_record_length > capacity
            {
                tracing::warn!(
                    position = head + progress.bytes_read as i64,
                    record_length = header.record_length,
                    "Invalid record header, stopping read"
                );
                break;
            }

            progress.bytes_read += aligned_record_length;

            if header.is_padding() {
                continue;
            }

            messages_read += 1;
            if header.is_poison() && !self.poisoned {
                tracing::debug!(
                    position = head + progress.bytes_read as i64,
                    "Poison message received"
                );
                self.poisoned = true;
            }

            let index = encoded_msg_offset(record_index);
            let payload = unsafe { region.bytes(index, header.payload_length()) };
            handler(Message {
                type_id: header.type_id,
                index,
                payload,
            })?;
        }

        Ok(messages_read)
    }

    /// True once a poison message has been dispatched by this reader.
    pub fn has_received_poison(&self) -> bool {
        self.poisoned
    }

    /// Total bytes the writer has published.
    pub fn producer_position(&self) -> i64 {
        self.region.tail_position().load(Ordering::Acquire)
    }

    /// Total bytes this reader has consumed.
    pub fn consumer_position(&self) -> i64 {
        self.region.head_position().load(Ordering::Relaxed)
    }

    /// Bytes published but not yet consumed.
    pub fn size(&self) -> usize {
        self.region.size()
    }

    pub fn next_correlation_id(&self) -> i64 {
        self.region.correlation_counter().fetch_add(1, Ordering::SeqCst)
    }

    /// Record a liveness timestamp the writer can observe.
    pub fn set_consumer_heartbeat_time(&self, time: i64) {
        self.region
            .consumer_heartbeat()
            .store(time, Ordering::Release);
    }
}

struct ReadProgress<'a> {
    region: &'a Region,
    capacity: usize,
    head: i64,
    bytes_read: usize,
}

impl Drop for ReadProgress<'_> {
    fn drop(&mut self) {
        if self.bytes_read == 0 {
            return;
        }

        // Zero what was consumed so a peer scanning by header length stops at
        // the first unpublished record. Consumed bytes may wrap past the end.
        let head_index = (self.head & (self.capacity as i64 - 1)) as usize;
        let first = self.bytes_read.min(self.capacity - head_index);
        unsafe {
            self.region.set_memory(head_index, first, 0);
            if self.bytes_read > first {
                self.region.set_memory(0, self.bytes_read - first, 0);
            }
        }

        self.region
            .head_position()
            .store(self.head + self.bytes_read as i64, Ordering::Release);
    }
}
