use crate::errors::RingBufferError;
use crate::layout::{CACHE_LINE_LENGTH, Layout};
use memmap2::{MmapMut, MmapOptions};
use std::alloc;
use std::fs::OpenOptions;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

enum Backing {
    Heap(alloc::Layout),
    Mmap(MmapMut),
    Raw,
}

/// A fixed-size byte span holding one ring buffer: data section plus trailer.
///
/// The region never moves once built. Writer and reader hold it behind an
/// `Arc` when they live in the same process; across processes each side maps
/// the same file on its own.
pub struct Region {
    ptr: NonNull<u8>,
    layout: Layout,
    backing: Backing,
}

// The region is plain shared memory. All cross-thread coordination goes
// through the atomic trailer slots.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Allocate a zeroed, cache-line aligned region on the heap.
    pub fn allocate(capacity: usize) -> Result<Self, RingBufferError> {
        let layout = Layout::for_capacity(capacity)?;
        let alloc_layout = alloc::Layout::from_size_align(layout.region_len(), CACHE_LINE_LENGTH)
            .map_err(|_| RingBufferError::InvalidCapacity { capacity })?;

        let raw = unsafe { alloc::alloc_zeroed(alloc_layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(alloc_layout);
        };

        tracing::debug!(capacity, "Allocated heap ring buffer region");

        Ok(Self {
            ptr,
            layout,
            backing: Backing::Heap(alloc_layout),
        })
    }

    /// Create or resize a region file and reset it to the empty state.
    ///
    /// The file is sized to exactly `capacity + TRAILER_LENGTH` and every byte,
    /// counters included, is zeroed. Readers attached to a previous incarnation
    /// of the file must reopen it.
    ///
    /// Use `open()` instead to keep the counters of an existing ring.
    pub fn create(path: impl AsRef<Path>, capacity: usize) -> Result<Self, RingBufferError> {
        let layout = Layout::for_capacity(capacity)?;
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() != layout.region_len() as u64 {
            file.set_len(layout.region_len() as u64)?;
        }

        let mut mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        mmap.fill(0);

        tracing::info!(path = %path.display(), capacity, "Created ring buffer region");

        Self::from_mmap(mmap, layout)
    }

    /// Map an existing region file, preserving its counters.
    ///
    /// Use this when a writer or reader restarts and should continue from the
    /// positions the previous process left behind.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RingBufferError> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let layout = Layout::from_region_len(mmap.len())?;

        tracing::debug!(
            path = %path.display(),
            capacity = layout.capacity(),
            "Opened ring buffer region"
        );

        Self::from_mmap(mmap, layout)
    }

    /// Wrap memory owned by someone else, e.g. a buffer handed over from
    /// another runtime.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the returned region (and every writer/reader built on it) is alive, and
    /// only ring buffer peers may touch that memory meanwhile.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Result<Self, RingBufferError> {
        let layout = Layout::from_region_len(len)?;
        let ptr = NonNull::new(ptr).ok_or(RingBufferError::Misaligned)?;
        if ptr.as_ptr() as usize % std::mem::align_of::<AtomicI64>() != 0 {
            return Err(RingBufferError::Misaligned);
        }

        Ok(Self {
            ptr,
            layout,
            backing: Backing::Raw,
        })
    }

    fn from_mmap(mut mmap: MmapMut, layout: Layout) -> Result<Self, RingBufferError> {
        let ptr = NonNull::new(mmap.as_mut_ptr()).ok_or(RingBufferError::Misaligned)?;
        Ok(Self {
            ptr,
            layout,
            backing: Backing::Mmap(mmap),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// Total length in bytes, trailer included.
    pub fn region_len(&self) -> usize {
        self.layout.region_len()
    }

    /// Flush a file-backed region to disk. No-op for other backings.
    pub fn flush(&self) -> Result<(), RingBufferError> {
        if let Backing::Mmap(mmap) = &self.backing {
            mmap.flush()?;
        }
        Ok(())
    }

    /// Producer position: total bytes ever claimed and published.
    #[inline]
    pub(crate) fn tail_position(&self) -> &AtomicI64 {
        self.atomic_i64(self.layout.tail_position_index())
    }

    /// Writer-private copy of the last head position it observed.
    #[inline]
    pub(crate) fn head_cache_position(&self) -> &AtomicI64 {
        self.atomic_i64(self.layout.head_cache_position_index())
    }

    /// Consumer position: total bytes ever consumed.
    #[inline]
    pub(crate) fn head_position(&self) -> &AtomicI64 {
        self.atomic_i64(self.layout.head_position_index())
    }

    #[inline]
    pub(crate) fn correlation_counter(&self) -> &AtomicI64 {
        self.atomic_i64(self.layout.correlation_counter_index())
    }

    #[inline]
    pub(crate) fn consumer_heartbeat(&self) -> &AtomicI64 {
        self.atomic_i64(self.layout.consumer_heartbeat_index())
    }

    /// Bytes published but not yet consumed.
    ///
    /// Head is sampled on both sides of the tail load so a consumer moving
    /// concurrently can't produce a size larger than the capacity.
    pub(crate) fn size(&self) -> usize {
        let mut head_after = self.head_position().load(Ordering::Acquire);
        loop {
            let head_before = head_after;
            let tail = self.tail_position().load(Ordering::Acquire);
            head_after = self.head_position().load(Ordering::Acquire);

            if head_before == head_after {
                return (tail - head_after).clamp(0, self.capacity() as i64) as usize;
            }
        }
    }

    /// Atomic view of the 8-byte slot at `index`.
    #[inline]
    pub(crate) fn atomic_i64(&self, index: usize) -> &AtomicI64 {
        debug_assert!(index + 8 <= self.region_len());
        debug_assert_eq!(index % 8, 0);
        unsafe { &*(self.ptr.as_ptr().add(index) as *const AtomicI64) }
    }

    /// # Safety
    ///
    /// The range must lie in the data section and must not be written while
    /// the returned slice is alive.
    #[inline]
    pub(crate) unsafe fn bytes(&self, index: usize, len: usize) -> &[u8] {
        debug_assert!(index + len <= self.capacity());
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(index), len) }
    }

    /// # Safety
    ///
    /// The range must lie in the data section and be exclusively owned by the
    /// caller while the returned slice is alive.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn bytes_mut(&self, index: usize, len: usize) -> &mut [u8] {
        debug_assert!(index + len <= self.capacity());
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(index), len) }
    }

    /// # Safety
    ///
    /// Same ownership rule as [`Region::bytes_mut`].
    #[inline]
    pub(crate) unsafe fn set_memory(&self, index: usize, len: usize, value: u8) {
        debug_assert!(index + len <= self.capacity());
        unsafe { std::ptr::write_bytes(self.ptr.as_ptr().add(index), value, len) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Backing::Heap(alloc_layout) = &self.backing {
            unsafe { alloc::dealloc(self.ptr.as_ptr(), *alloc_layout) }
        }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match self.backing {
            Backing::Heap(_) => "heap",
            Backing::Mmap(_) => "mmap",
            Backing::Raw => "raw",
        };
        f.debug_struct("Region")
            .field("capacity", &self.capacity())
            .field("backing", &backing)
            .finish()
    }
}
