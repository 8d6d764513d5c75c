//! The shared output region.
//!
//! [`SharedRegion`] is a raw view over a byte buffer that both units write
//! through at the same time. Nothing arbitrates access: write ownership is
//! fixed by byte class (the driver owns non-digit spans, the expander owns
//! digit spans) and the spans of different input bytes never overlap.
//!
//! [`MappedOutput`] is the file-backed buffer: the output file sized to the
//! layout and mapped `MAP_SHARED`, so writes from a forked expander land in
//! the same pages the driver sees.

use core::marker::PhantomData;
use core::ops::Range;
use core::ptr;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use crate::errors::{Result, TransformError};

/// Unsynchronized writable view shared by both units.
///
/// Copies of the view alias the same bytes. Writes are `unsafe`: the caller
/// guarantees that no other unit touches the same offsets concurrently.
#[derive(Clone, Copy)]
pub struct SharedRegion<'a> {
    ptr: *mut u8,
    len: usize,
    _buf: PhantomData<&'a mut [u8]>,
}

// Concurrent writes go to disjoint spans only; see the write methods.
unsafe impl Send for SharedRegion<'_> {}
unsafe impl Sync for SharedRegion<'_> {}

impl<'a> SharedRegion<'a> {
    /// View over `buf` for the lifetime of the borrow.
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        SharedRegion {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            _buf: PhantomData,
        }
    }

    /// Region length in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write one byte at `offset`.
    ///
    /// # Safety
    /// `offset < self.len()`, and no other unit reads or writes `offset`
    /// while this call runs.
    #[inline(always)]
    pub unsafe fn put(&self, offset: usize, byte: u8) {
        debug_assert!(offset < self.len);
        unsafe { ptr::write(self.ptr.add(offset), byte) }
    }

    /// Fill `span` with `byte`. An empty span writes nothing.
    ///
    /// # Safety
    /// `span.end <= self.len()`, and no other unit reads or writes any offset
    /// in `span` while this call runs.
    #[inline(always)]
    pub unsafe fn fill(&self, span: Range<usize>, byte: u8) {
        debug_assert!(span.start <= span.end && span.end <= self.len);
        unsafe { ptr::write_bytes(self.ptr.add(span.start), byte, span.end - span.start) }
    }
}

/// Output file mapped read-write and shared.
///
/// A zero-length output is never mapped (`mmap(2)` rejects empty mappings);
/// it behaves as an empty slice.
#[derive(Debug)]
pub struct MappedOutput {
    file: File,
    path: PathBuf,
    map: Option<MmapMut>,
    len: usize,
}

impl MappedOutput {
    /// Create or truncate `path`, size it to `len` bytes and map it.
    pub fn create(path: impl AsRef<Path>, len: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| TransformError::io("cannot create output", &path, e))?;

        file.set_len(len as u64)
            .map_err(|e| TransformError::io("cannot size output", &path, e))?;

        let map = map_file(&file, len).map_err(|e| TransformError::io("cannot map output", &path, e))?;
        debug!(path = %path.display(), len, "output mapped");

        Ok(MappedOutput {
            file,
            path,
            map,
            len,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mapped length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        match &self.map {
            Some(map) => &map[..],
            None => &[],
        }
    }

    /// Mapped bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(map) => &mut map[..],
            None => &mut [],
        }
    }

    /// Grow the file by `record.len()` bytes and write `record` right after
    /// the previous end.
    ///
    /// The old mapping is released first, then the file is extended and
    /// mapped again at the new length. With `sync` the new bytes are flushed
    /// with `msync(MS_SYNC)` before returning. A failure leaves everything
    /// written so far in place.
    pub fn append(&mut self, record: &[u8], sync: bool) -> Result<()> {
        let old_len = self.len;
        let new_len = old_len
            .checked_add(record.len())
            .ok_or_else(|| TransformError::Finalize {
                stage: "grow the output file",
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "output length overflows usize",
                ),
            })?;

        self.map = None;
        self.file
            .set_len(new_len as u64)
            .map_err(|source| TransformError::Finalize {
                stage: "grow the output file",
                source,
            })?;
        self.len = new_len;

        let map = map_file(&self.file, new_len).map_err(|source| TransformError::Finalize {
            stage: "remap the output file",
            source,
        })?;
        self.map = map;

        if let Some(map) = self.map.as_mut() {
            map[old_len..new_len].copy_from_slice(record);
            if sync && !record.is_empty() {
                map.flush_range(old_len, record.len())
                    .map_err(|source| TransformError::Finalize {
                        stage: "flush the summary record",
                        source,
                    })?;
            }
        }
        Ok(())
    }
}

fn map_file(file: &File, len: usize) -> std::io::Result<Option<MmapMut>> {
    if len == 0 {
        return Ok(None);
    }
    // The file is owned by this process for the whole run and is not
    // truncated while mapped.
    let map = unsafe { MmapOptions::new().len(len).map_mut(file)? };
    Ok(Some(map))
}
