//! Centralized IPC path configuration
//!
//! Both ends of a cross-process ring must agree on the region file and its
//! capacity out of band. Defaults live here so producers and consumers built
//! from this workspace can't drift apart.

/// Default ring region path, on tmpfs so the mapping never hits a disk
pub const DEFAULT_RING_PATH: &str = "/dev/shm/spsc_ring";

/// Default data section capacity (64KB)
pub const DEFAULT_RING_CAPACITY: usize = 64 * 1024;
