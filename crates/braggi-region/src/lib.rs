//! Regime-tagged bump-allocated memory regions.
//!
//! A [`Region`] owns one contiguous buffer whose capacity is fixed at
//! creation. Allocation moves a watermark forward and hands back a
//! [`RegionSlice`] handle; there is no per-allocation free. `reset` rewinds
//! the watermark in O(1), invalidating every handle taken before it, and
//! teardown releases the whole buffer at once. Because the buffer never
//! reallocates, handles taken since the last reset stay valid and no data
//! ever moves.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use braggi_error::{BraggiError, Result};
use braggi_types::{Regime, RegionId};

/// Every allocation offset is rounded up to this boundary.
pub const REGION_ALIGN: usize = 8;

/// A handle to one allocation inside a [`Region`].
///
/// Handles are plain offset/length pairs; they are invalidated (but not
/// tracked) by `reset`. Reading through a stale handle yields whatever
/// bytes a later allocation wrote, never undefined behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionSlice {
    offset: usize,
    len: usize,
}

impl RegionSlice {
    pub fn offset(self) -> usize {
        self.offset
    }

    pub fn len(self) -> usize {
        self.len
    }

    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Allocation statistics for one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    /// Bytes reserved from the host allocator (the buffer capacity).
    pub total_allocated: usize,
    /// Current watermark.
    pub current_usage: usize,
    /// Alignment padding accumulated since the last reset.
    pub wasted_memory: usize,
    /// Allocations served since the last reset.
    pub allocation_count: u64,
}

/// A bump-allocated arena with a regime tag.
#[derive(Debug)]
pub struct Region {
    id: RegionId,
    regime: Regime,
    buf: Box<[u8]>,
    used: usize,
    padding: usize,
    allocation_count: u64,
    last_alloc: Option<RegionSlice>,
}

impl Region {
    /// Reserve a fresh zeroed buffer of `capacity` bytes.
    pub fn new(id: RegionId, capacity: usize, regime: Regime) -> Self {
        debug!(region = %id, capacity, %regime, "region created");
        Self {
            id,
            regime,
            buf: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
            padding: 0,
            allocation_count: 0,
            last_alloc: None,
        }
    }

    /// Wrap an existing buffer. Ownership of the buffer always transfers to
    /// the region; it is released on drop like any other.
    pub fn from_buffer(id: RegionId, buf: Vec<u8>, regime: Regime) -> Self {
        debug!(region = %id, capacity = buf.len(), %regime, "region adopted buffer");
        Self {
            id,
            regime,
            buf: buf.into_boxed_slice(),
            used: 0,
            padding: 0,
            allocation_count: 0,
            last_alloc: None,
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Bump-allocate `n` bytes, aligned to [`REGION_ALIGN`].
    pub fn alloc(&mut self, n: usize) -> Result<RegionSlice> {
        let aligned = self.used.div_ceil(REGION_ALIGN) * REGION_ALIGN;
        let pad = aligned - self.used;
        let end = aligned.checked_add(n).ok_or_else(|| {
            BraggiError::OutOfRange {
                what: "allocation size".to_owned(),
                value: n.to_string(),
            }
        })?;
        if end > self.buf.len() {
            return Err(BraggiError::AllocationFailure {
                requested: n,
                available: self.buf.len().saturating_sub(aligned),
            });
        }
        self.padding += pad;
        self.used = end;
        self.allocation_count += 1;
        let slice = RegionSlice {
            offset: aligned,
            len: n,
        };
        self.last_alloc = Some(slice);
        trace!(region = %self.id, offset = aligned, len = n, "alloc");
        Ok(slice)
    }

    /// Allocate `n` zeroed bytes. The buffer may hold stale data from
    /// before a reset, so the slice is cleared explicitly.
    pub fn calloc(&mut self, n: usize) -> Result<RegionSlice> {
        let slice = self.alloc(n)?;
        self.bytes_mut(slice).fill(0);
        Ok(slice)
    }

    /// Copy `bytes` into the region.
    pub fn memdup(&mut self, bytes: &[u8]) -> Result<RegionSlice> {
        let slice = self.alloc(bytes.len())?;
        self.bytes_mut(slice).copy_from_slice(bytes);
        Ok(slice)
    }

    /// Copy a string into the region. Read it back with [`Region::str_at`].
    pub fn strdup(&mut self, s: &str) -> Result<RegionSlice> {
        self.memdup(s.as_bytes())
    }

    /// Grow or shrink the most recent allocation in place.
    ///
    /// Any other handle is rejected with [`BraggiError::ReallocNotLast`];
    /// a region never relocates data.
    pub fn realloc(&mut self, slice: RegionSlice, new_len: usize) -> Result<RegionSlice> {
        if self.last_alloc != Some(slice) {
            return Err(BraggiError::ReallocNotLast);
        }
        let end = slice.offset.checked_add(new_len).ok_or_else(|| {
            BraggiError::OutOfRange {
                what: "allocation size".to_owned(),
                value: new_len.to_string(),
            }
        })?;
        if end > self.buf.len() {
            return Err(BraggiError::AllocationFailure {
                requested: new_len,
                available: self.buf.len() - slice.offset,
            });
        }
        self.used = end;
        let resized = RegionSlice {
            offset: slice.offset,
            len: new_len,
        };
        self.last_alloc = Some(resized);
        trace!(region = %self.id, offset = slice.offset, old = slice.len, new = new_len, "realloc");
        Ok(resized)
    }

    /// Borrow the bytes behind a handle.
    pub fn bytes(&self, slice: RegionSlice) -> &[u8] {
        &self.buf[slice.offset..slice.offset + slice.len]
    }

    /// Mutably borrow the bytes behind a handle.
    pub fn bytes_mut(&mut self, slice: RegionSlice) -> &mut [u8] {
        &mut self.buf[slice.offset..slice.offset + slice.len]
    }

    /// Read a string written by [`Region::strdup`].
    pub fn str_at(&self, slice: RegionSlice) -> Result<&str> {
        std::str::from_utf8(self.bytes(slice))
            .map_err(|_| BraggiError::internal("region slice does not hold valid utf-8"))
    }

    /// Rewind the watermark to zero without releasing the buffer. All
    /// handles taken before the reset are invalidated.
    pub fn reset(&mut self) {
        debug!(region = %self.id, used = self.used, "region reset");
        self.used = 0;
        self.padding = 0;
        self.allocation_count = 0;
        self.last_alloc = None;
    }

    pub fn stats(&self) -> RegionStats {
        RegionStats {
            total_allocated: self.buf.len(),
            current_usage: self.used,
            wasted_memory: self.padding,
            allocation_count: self.allocation_count,
        }
    }
}
