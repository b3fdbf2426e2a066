//! Cool Dataset: a handle to a single chunked 1-D HDF5 dataset plus a
//! locally-owned, budgeted read cache, and a random-access iterator with
//! copy-on-write chunk sharing (spec §4.5).
//!
//! Grounded on the teacher's `bed.rs` streaming-reader shape (a cursor plus
//! a reusable buffer) generalized to HDF5-backed random access, and on
//! spec §9's "copy-on-write chunk buffers" design note: the iterator shares
//! its chunk via `Arc` until traversal moves outside it, at which point a
//! fresh buffer is loaded without disturbing any clone still reading the
//! old one.

use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::{Error, Result};

/// Element types a Cool dataset column may hold. Only the numeric ones
/// that appear in `pixels/`, `bins/`, and `indexes/` are modeled; string
/// columns (`chroms/name`) are handled separately in [`CoolFile`](super::file::CoolFile).
pub trait DatasetElement: Copy + Send + Sync + 'static {}

impl DatasetElement for i32 {}
impl DatasetElement for i64 {}
impl DatasetElement for f32 {}
impl DatasetElement for f64 {}

/// Buffer size, in elements, for `append`'s internal staging buffer before
/// a flush (spec §4.5: "1 MiB / element-size").
const APPEND_BUFFER_BYTES: usize = 1024 * 1024;

/// A single contiguous, cached chunk of a dataset's values, shared by
/// refcount among iterators and cache entries until one of them needs to
/// load a different range.
#[derive(Clone)]
struct Chunk<T> {
    start: u64,
    values: Arc<Vec<T>>,
}

impl<T> Chunk<T> {
    fn end(&self) -> u64 {
        self.start + self.values.len() as u64
    }

    fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }

    fn byte_size(&self) -> usize {
        self.values.len() * std::mem::size_of::<T>()
    }
}

/// One entry in a [`ReadCache`]: a chunk plus the bookkeeping its eviction
/// policy needs.
struct CacheEntry<T> {
    chunk: Chunk<T>,
    last_used: u64,
    hits: u64,
}

/// A byte-budgeted cache of dataset chunks, blending recency and frequency
/// for eviction (spec §4.5, §6 "w0"). `w0 = 1.0` is pure LRU (only recency
/// matters), `w0 = 0.0` is pure LFU (only hit count matters).
struct ReadCache<T> {
    entries: Vec<CacheEntry<T>>,
    budget_bytes: usize,
    w0: f64,
    tick: u64,
}

impl<T> ReadCache<T> {
    fn new(config: CacheConfig) -> Self {
        Self { entries: Vec::new(), budget_bytes: config.cache_size_bytes, w0: config.w0, tick: 0 }
    }

    fn find(&mut self, offset: u64) -> Option<Chunk<T>> {
        self.tick += 1;
        let tick = self.tick;
        for entry in self.entries.iter_mut() {
            if entry.chunk.contains(offset) {
                entry.last_used = tick;
                entry.hits += 1;
                return Some(entry.chunk.clone());
            }
        }
        None
    }

    fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.chunk.byte_size()).sum()
    }

    fn insert(&mut self, chunk: Chunk<T>) {
        self.tick += 1;
        self.entries.push(CacheEntry { chunk, last_used: self.tick, hits: 1 });
        self.evict_to_budget();
    }

    /// Evict the entry with the highest blended (stale, rarely-used) score
    /// until the cache fits its byte budget or only one entry is left — a
    /// single chunk is never evicted out from under its own insert.
    fn evict_to_budget(&mut self) {
        while self.total_bytes() > self.budget_bytes && self.entries.len() > 1 {
            let max_age = self.entries.iter().map(|e| self.tick.saturating_sub(e.last_used)).max().unwrap_or(0).max(1) as f64;
            let max_hits = self.entries.iter().map(|e| e.hits).max().unwrap_or(1).max(1) as f64;
            let worst = self
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let age_score = self.tick.saturating_sub(e.last_used) as f64 / max_age;
                    let freq_score = 1.0 - (e.hits as f64 / max_hits);
                    (i, self.w0 * age_score + (1.0 - self.w0) * freq_score)
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .map(|(i, _)| i);
            match worst {
                Some(i) => {
                    self.entries.remove(i);
                }
                None => break,
            }
        }
    }

    fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}

/// Handle to a single chunked HDF5 dataset, with a small LRU/LFU-blended
/// read cache owned exclusively by this instance (spec §5: "Cool datasets
/// do not share their read caches between threads").
pub struct Dataset<T> {
    uri: String,
    handle: hdf5::Dataset,
    len: u64,
    chunk_size: u64,
    cache: ReadCache<T>,
}

impl<T: DatasetElement + hdf5::H5Type> Dataset<T> {
    pub(crate) fn open(uri: String, handle: hdf5::Dataset, config: CacheConfig) -> Result<Self> {
        let len = handle.shape().first().copied().unwrap_or(0) as u64;
        let chunk_size = handle
            .chunk()
            .and_then(|c| c.first().copied())
            .unwrap_or(len.max(1) as usize) as u64;
        Ok(Self { uri, handle, len, chunk_size, cache: ReadCache::new(config) })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// An independent random-access iterator positioned at `0`, sharing no
    /// state with this `Dataset`'s own budgeted cache (spec §4.5).
    pub fn iter(&self) -> DatasetIterator<T> {
        DatasetIterator::new(self.handle.clone(), self.uri.clone(), self.len, self.chunk_size)
    }

    /// Read a single element at `offset`.
    pub fn read(&mut self, offset: u64) -> Result<T> {
        let chunk = self.ensure_cached(offset)?;
        Ok(chunk.values[(offset - chunk.start) as usize])
    }

    /// Read `n` contiguous elements starting at `offset`.
    pub fn read_vec(&mut self, offset: u64, n: u64) -> Result<Vec<T>> {
        if offset + n > self.len {
            return Err(Error::out_of_range(
                &self.uri,
                format!("read of {n} elements at offset {offset} exceeds dataset length {}", self.len),
            ));
        }
        let slice = self
            .handle
            .read_slice_1d::<T, _>(offset as usize..(offset + n) as usize)
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        Ok(slice.to_vec())
    }

    fn ensure_cached(&mut self, offset: u64) -> Result<Chunk<T>> {
        if offset >= self.len {
            return Err(Error::out_of_range(&self.uri, format!("offset {offset} out of range")));
        }
        if let Some(chunk) = self.cache.find(offset) {
            return Ok(chunk);
        }
        let chunk_start = (offset / self.chunk_size) * self.chunk_size;
        let chunk_len = self.chunk_size.min(self.len - chunk_start);
        let values = self.read_vec(chunk_start, chunk_len)?;
        let chunk = Chunk { start: chunk_start, values: Arc::new(values) };
        self.cache.insert(chunk.clone());
        Ok(chunk)
    }

    /// Resize the dataset so it can hold at least `new_len` elements,
    /// failing with `OutOfRange` unless `allow_resize`.
    pub fn resize(&mut self, new_len: u64, allow_resize: bool) -> Result<()> {
        if new_len <= self.len {
            return Ok(());
        }
        if !allow_resize {
            return Err(Error::out_of_range(&self.uri, "write would extend a fixed-size dataset"));
        }
        self.handle
            .resize([new_len as usize])
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        self.len = new_len;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Write `values` at `offset`, growing the dataset first if needed.
    pub fn write_vec(&mut self, offset: u64, values: &[T], allow_resize: bool) -> Result<()> {
        self.resize(offset + values.len() as u64, allow_resize)?;
        self.handle
            .write_slice(values, offset as usize..offset as usize + values.len())
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Append values produced by `op` over `items`, buffering internally
    /// and flushing in `APPEND_BUFFER_BYTES`-sized chunks. Returns the new
    /// dataset length.
    pub fn append<I, F>(&mut self, items: I, op: F) -> Result<u64>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> T,
    {
        let elem_size = std::mem::size_of::<T>().max(1);
        let buffer_cap = (APPEND_BUFFER_BYTES / elem_size).max(1);
        let mut buffer = Vec::with_capacity(buffer_cap);
        let mut end = self.len;

        for item in items {
            buffer.push(op(item));
            if buffer.len() >= buffer_cap {
                self.write_vec(end, &buffer, true)?;
                end += buffer.len() as u64;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            self.write_vec(end, &buffer, true)?;
            end += buffer.len() as u64;
        }
        Ok(end)
    }

    /// Binary search for the first element `>= value` within
    /// `[lo, hi)`, used by the pixel selector to jump within a row's bin2
    /// column (spec §4.5).
    pub fn lower_bound(&mut self, lo: u64, hi: u64, value: T) -> Result<u64>
    where
        T: Ord,
    {
        let (mut left, mut right) = (lo, hi);
        while left < right {
            let mid = left + (right - left) / 2;
            if self.read(mid)? < value {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        Ok(left)
    }
}

/// A random-access, copy-on-write iterator over a [`Dataset`]'s values
/// (spec §4.5). Cloning an iterator shares its current chunk buffer by
/// refcount; once either clone's cursor moves outside that chunk, only
/// that clone loads a fresh buffer, leaving the other's untouched.
#[derive(Clone)]
pub struct DatasetIterator<T> {
    handle: hdf5::Dataset,
    uri: String,
    len: u64,
    chunk_size: u64,
    offset: u64,
    chunk: Option<Chunk<T>>,
}

impl<T: DatasetElement + hdf5::H5Type> DatasetIterator<T> {
    fn new(handle: hdf5::Dataset, uri: String, len: u64, chunk_size: u64) -> Self {
        Self { handle, uri, len, chunk_size, offset: 0, chunk: None }
    }

    /// The dataset length this iterator was created from; an offset equal
    /// to this is the end position.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_end(&self) -> bool {
        self.offset >= self.len
    }

    /// Move the cursor to `offset`, keeping the current chunk buffer if
    /// `offset` still falls inside it.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(Error::out_of_range(&self.uri, format!("seek to {offset} exceeds dataset length {}", self.len)));
        }
        self.offset = offset;
        Ok(())
    }

    /// Dereference the current position without advancing the cursor.
    pub fn get(&mut self) -> Result<T> {
        if self.offset >= self.len {
            return Err(Error::out_of_range(&self.uri, format!("offset {} out of range", self.offset)));
        }
        if let Some(chunk) = &self.chunk {
            if chunk.contains(self.offset) {
                return Ok(chunk.values[(self.offset - chunk.start) as usize]);
            }
        }
        let chunk_start = (self.offset / self.chunk_size) * self.chunk_size;
        let chunk_len = self.chunk_size.min(self.len - chunk_start);
        let slice = self
            .handle
            .read_slice_1d::<T, _>(chunk_start as usize..(chunk_start + chunk_len) as usize)
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        let chunk = Chunk { start: chunk_start, values: Arc::new(slice.to_vec()) };
        let value = chunk.values[(self.offset - chunk.start) as usize];
        self.chunk = Some(chunk);
        Ok(value)
    }

    /// Read the element at `offset`, the random-access counterpart of
    /// `*(it + k)` without disturbing the cursor.
    pub fn at(&mut self, offset: u64) -> Result<T> {
        let saved = self.offset;
        self.seek(offset)?;
        let value = self.get();
        self.offset = saved;
        value
    }
}

impl<T: DatasetElement + hdf5::H5Type> Iterator for DatasetIterator<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let value = self.get();
        self.offset += 1;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_dataset(values: &[i64], chunk: usize) -> (tempfile::NamedTempFile, hdf5::File) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let h5 = hdf5::File::create(tmp.path()).unwrap();
        h5.new_dataset::<i64>()
            .shape(values.len())
            .chunk(chunk)
            .create("col")
            .and_then(|d| d.write(values))
            .unwrap();
        (tmp, h5)
    }

    #[test]
    fn read_and_cache_hit_agree() {
        let values: Vec<i64> = (0..40).collect();
        let (_tmp, h5) = fixed_dataset(&values, 8);
        let handle = h5.dataset("col").unwrap();
        let mut ds = Dataset::open("t.cool".into(), handle, CacheConfig::default()).unwrap();
        for (i, &expected) in values.iter().enumerate() {
            assert_eq!(ds.read(i as u64).unwrap(), expected);
        }
    }

    #[test]
    fn cache_respects_byte_budget() {
        let values: Vec<i64> = (0..64).collect();
        let (_tmp, h5) = fixed_dataset(&values, 8);
        let handle = h5.dataset("col").unwrap();
        // Each chunk of 8 i64s is 64 bytes; a 100-byte budget holds at most one.
        let mut ds = Dataset::open("t.cool".into(), handle, CacheConfig::new(100, 0.75)).unwrap();
        ds.read(0).unwrap();
        ds.read(40).unwrap();
        ds.read(8).unwrap();
        assert!(ds.cache.total_bytes() <= 100 || ds.cache.entries.len() <= 1);
    }

    #[test]
    fn write_invalidates_cached_chunks() {
        let values: Vec<i64> = (0..16).collect();
        let (_tmp, h5) = fixed_dataset(&values, 8);
        let handle = h5.dataset("col").unwrap();
        let mut ds = Dataset::open("t.cool".into(), handle, CacheConfig::default()).unwrap();
        assert_eq!(ds.read(2).unwrap(), 2);
        ds.write_vec(2, &[99], false).unwrap();
        assert_eq!(ds.read(2).unwrap(), 99);
    }

    #[test]
    fn iterator_yields_every_value_in_order() {
        let values: Vec<i64> = (0..20).collect();
        let (_tmp, h5) = fixed_dataset(&values, 4);
        let handle = h5.dataset("col").unwrap();
        let ds = Dataset::open("t.cool".into(), handle, CacheConfig::default()).unwrap();
        let collected: Vec<i64> = ds.iter().map(|v| v.unwrap()).collect();
        assert_eq!(collected, values);
    }

    #[test]
    fn cloned_iterators_share_a_chunk_until_one_moves_away() {
        let values: Vec<i64> = (0..20).collect();
        let (_tmp, h5) = fixed_dataset(&values, 4);
        let handle = h5.dataset("col").unwrap();
        let ds = Dataset::open("t.cool".into(), handle, CacheConfig::default()).unwrap();

        let mut a = ds.iter();
        a.get().unwrap(); // loads chunk [0, 4)
        let mut b = a.clone();
        assert_eq!(
            Arc::strong_count(&a.chunk.as_ref().unwrap().values),
            Arc::strong_count(&b.chunk.as_ref().unwrap().values)
        );
        assert!(Arc::strong_count(&a.chunk.as_ref().unwrap().values) >= 2);

        b.seek(10).unwrap();
        b.get().unwrap(); // forces b onto a fresh chunk [8, 12)
        assert_ne!(b.chunk.as_ref().unwrap().start, a.chunk.as_ref().unwrap().start);
        assert_eq!(a.get().unwrap(), values[0]);
    }

    #[test]
    fn at_reads_without_disturbing_the_cursor() {
        let values: Vec<i64> = (0..20).collect();
        let (_tmp, h5) = fixed_dataset(&values, 4);
        let handle = h5.dataset("col").unwrap();
        let ds = Dataset::open("t.cool".into(), handle, CacheConfig::default()).unwrap();
        let mut it = ds.iter();
        it.seek(5).unwrap();
        assert_eq!(it.at(17).unwrap(), 17);
        assert_eq!(it.offset(), 5);
        assert_eq!(it.get().unwrap(), 5);
    }
}
