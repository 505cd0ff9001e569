use crate::errors::RingBufferError;
use crate::idle::IdleStrategy;
use crate::layout::Layout;
use crate::record::{POISON_MSG_TYPE_ID, RecordHeader, encoded_msg_offset};
use crate::region::Region;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Producer side of the ring. Exactly one may exist per region.
pub struct Writer {
    region: Arc<Region>,
    layout: Layout,
    closed: bool,
}

impl Writer {
    pub(crate) fn new(region: Arc<Region>) -> Self {
        let layout = *region.layout();
        Self {
            region,
            layout,
            closed: false,
        }
    }

    /// Producer side over a region this process mapped on its own, e.g. with
    /// [`Region::create`] while the consumer lives in another process.
    ///
    /// Use [`crate::channel`] when both sides share one process.
    ///
    /// # Safety
    ///
    /// No other writer may exist over the same memory, in this process or any
    /// other, for as long as this one is alive. Two writers race on the tail
    /// position and on the payload bytes.
    pub unsafe fn from_region(region: Region) -> Self {
        Self::new(Arc::new(region))
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    pub fn max_msg_length(&self) -> usize {
        self.layout.max_msg_length()
    }

    /// True once a poison record has been published.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Copy `payload` into the ring as one record and publish it.
    ///
    /// Returns `Ok(false)` when the ring has no room right now; nothing is
    /// written in that case and the caller decides how to retry.
    pub fn try_write(&mut self, type_id: i32, payload: &[u8]) -> Result<bool, RingBufferError> {
        let Some(mut claim) = self.try_claim(type_id, payload.len())? else {
            return Ok(false);
        };

        claim.buffer().copy_from_slice(payload);
        claim.commit();

        Ok(true)
    }

    /// Reserve space for a record of `length` payload bytes.
    ///
    /// Nothing becomes visible to the reader until [`Claim::commit`].
    /// Dropping the claim abandons it.
    pub fn try_claim(
        &mut self,
        type_id: i32,
        length: usize,
    ) -> Result<Option<Claim<'_>>, RingBufferError> {
        if self.closed {
            tracing::warn!(type_id, "Write attempted after poison message");
            return Err(RingBufferError::WriterClosed);
        }
        check_msg_type_id(type_id)?;
        if length > self.layout.max_msg_length() {
            return Err(RingBufferError::MessageTooLarge {
                length,
                max: self.layout.max_msg_length(),
            });
        }

        let header = RecordHeader::message(type_id, length);
        let aligned_record_length = header.aligned_length();
        let capacity = self.layout.capacity();

        let tail = self.region.tail_position().load(Ordering::Relaxed);
        let record_index = (tail & self.layout.mask()) as usize;
        let to_buffer_end_length = capacity - record_index;

        // A record never straddles the end: pad out the remainder and restart at 0.
        let padding = if aligned_record_length > to_buffer_end_length {
            to_buffer_end_length
        } else {
            0
        };
        let required_capacity = (aligned_record_length + padding) as i64;

        let head_cache = self.region.head_cache_position();
        let mut head = head_cache.load(Ordering::Relaxed);
        if required_capacity > capacity as i64 - (tail - head) {
            head = self.region.head_position().load(Ordering::Acquire);
            if required_capacity > capacity as i64 - (tail - head) {
                return Ok(None);
            }
            head_cache.store(head, Ordering::Relaxed);
        }

        let (padding_index, record_index) = if padding != 0 {
            (Some(record_index), 0)
        } else {
            (None, record_index)
        };

        Ok(Some(Claim {
            writer: self,
            header,
            record_index,
            padding_index,
            padding,
            new_tail: tail + required_capacity,
            committed: false,
        }))
    }

    /// Publish the poison record carrying `value`. The writer is closed once
    /// this returns `Ok(true)`.
    pub fn send_poison(&mut self, value: i64) -> Result<bool, RingBufferError> {
        self.try_write(POISON_MSG_TYPE_ID, &value.to_le_bytes())
    }

    /// Retry `try_write` until it succeeds, idling between attempts.
    ///
    /// Rejections (oversize, bad type id, closed writer) return immediately.
    pub fn write_with_idle<I: IdleStrategy>(
        &mut self,
        type_id: i32,
        payload: &[u8],
        idle: &mut I,
    ) -> Result<(), RingBufferError> {
        while !self.try_write(type_id, payload)? {
            idle.idle();
        }
        idle.reset();
        Ok(())
    }

    /// Total bytes published by this writer (and its predecessors on the region).
    pub fn producer_position(&self) -> i64 {
        self.region.tail_position().load(Ordering::Relaxed)
    }

    /// Total bytes the reader has consumed.
    pub fn consumer_position(&self) -> i64 {
        self.region.head_position().load(Ordering::Acquire)
    }

    /// Bytes published but not yet consumed.
    pub fn size(&self) -> usize {
        self.region.size()
    }

    pub fn next_correlation_id(&self) -> i64 {
        self.region.correlation_counter().fetch_add(1, Ordering::SeqCst)
    }

    /// Last heartbeat the reader stored; 0 if it never did.
    pub fn consumer_heartbeat_time(&self) -> i64 {
        self.region.consumer_heartbeat().load(Ordering::Acquire)
    }
}

fn check_msg_type_id(type_id: i32) -> Result<(), RingBufferError> {
    if type_id < 1 {
        return Err(RingBufferError::InvalidMessageType(type_id));
    }
    Ok(())
}

/// Space reserved in the ring for one record.
///
/// Dropping a claim without committing zeroes whatever was written into its
/// payload, so the bytes past the tail stay clean.
pub struct Claim<'a> {
    writer: &'a mut Writer,
    header: RecordHeader,
    record_index: usize,
    padding_index: Option<usize>,
    padding: usize,
    new_tail: i64,
    committed: bool,
}

impl Claim<'_> {
    /// Offset of the payload inside the data section.
    pub fn index(&self) -> usize {
        encoded_msg_offset(self.record_index)
    }

    pub fn length(&self) -> usize {
        self.header.payload_length()
    }

    pub fn type_id(&self) -> i32 {
        self.header.type_id
    }

    /// Payload bytes to fill before committing.
    pub fn buffer(&mut self) -> &mut [u8] {
        let (index, length) = (self.index(), self.length());
        unsafe { self.writer.region.bytes_mut(index, length) }
    }

    /// Write the headers and publish the record to the reader.
    pub fn commit(mut self) {
        self.committed = true;
        let region = &self.writer.region;

        if let Some(padding_index) = self.padding_index {
            region
                .atomic_i64(padding_index)
                .store(RecordHeader::padding(self.padding).encode(), Ordering::Release);
        }

        region
            .atomic_i64(self.record_index)
            .store(self.header.encode(), Ordering::Release);

        // Publishing the tail makes everything above visible to an acquiring reader.
        region.tail_position().store(self.new_tail, Ordering::Release);

        if self.header.is_poison() {
            tracing::debug!(
                position = self.new_tail,
                "Poison message published, writer closed"
            );
            self.writer.closed = true;
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.buffer().fill(0);
        }
    }
}
