//! HIC file writer/reader: header, per-chromosome-pair matrix body,
//! footer (master index, expected-value and normalization-vector shells)
//! (spec §4.13, §6).
//!
//! Grounded on `examples/original_source/src/libhictk/hic/include/hictk/hic/`
//! (`file_writer.hpp`, `file_reader.hpp`, `file_writer_data_structures.hpp`):
//! the header reserves space for a master-index offset that gets patched
//! once the footer is known; the matrix body for a chromosome pair holds
//! every requested resolution's block metadata and block-offset table
//! inline; the master index then maps each `"chr1Idx_chr2Idx"` key to that
//! body's `(position, size)`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error};

use crate::chromosome::Reference;
use crate::error::{Error, Result};
use crate::filestream::{ByteOrder, FileStream};
use crate::hic::block::MatrixInteractionBlock;
use crate::hic::block_index::{BlockDescriptor, BlockIndex};
use crate::hic::block_mapper::{compute_block_column_count, compute_num_bins, BlockMapperInter, BlockMapperIntra, DEFAULT_INTER_CUTOFF, DEFAULT_INTRA_CUTOFF};
use crate::hic::spill::{BlockId, InteractionSpillStore};

pub const MAGIC: &[u8; 4] = b"HIC\0";
/// Minimum HIC version this crate can read or write (spec §4.10's v9+
/// diagonal-rotated intra block scheme is mandatory, not optional).
pub const MIN_SUPPORTED_VERSION: i32 = 9;
const CURRENT_WRITER_VERSION: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Writable,
    Finalized,
    ReadOnly,
    Closed,
}

/// One chromosome pair's on-disk matrix body location, as recorded in the
/// master index.
#[derive(Debug, Clone, Copy)]
struct MasterIndexEntry {
    position: u64,
    size: u32,
}

/// One resolution's worth of block descriptors for one chromosome pair,
/// read back lazily on first query (spec §4.13 reader operations).
struct ResolutionIndex {
    bin_size: u32,
    block_bin_count: u64,
    block_column_count: u64,
    blocks: BlockIndex,
}

pub struct HicFile {
    uri: String,
    stream: FileStream,
    version: i32,
    reference: Arc<Reference>,
    resolutions: Vec<u32>,
    genome_id: String,
    attributes: BTreeMap<String, String>,
    state: FileState,

    master_index_offset_field: u64,
    master_index: BTreeMap<(u32, u32), MasterIndexEntry>,
    resolution_indexes: BTreeMap<(u32, u32, u32), ResolutionIndex>,

    spill: BTreeMap<u32, InteractionSpillStore>,
    pair_sums: BTreeMap<(u32, u32), f64>,
}

impl HicFile {
    pub fn create_new(
        path: impl AsRef<Path>,
        reference: Arc<Reference>,
        resolutions: Vec<u32>,
        genome_id: impl Into<String>,
        attributes: BTreeMap<String, String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let uri = path.display().to_string();
        if resolutions.is_empty() {
            return Err(Error::InvalidInput("at least one resolution is required".into()));
        }

        let stream = FileStream::create(path)?;
        let mut offset = 0u64;
        offset = stream.seek_and_write(offset, MAGIC)?.1;
        offset = write_i32(&stream, offset, CURRENT_WRITER_VERSION)?;
        let master_index_offset_field = offset;
        offset = write_i64(&stream, offset, -1)?; // patched at finalize

        offset = stream.write_cstr(offset, genome_id.as_ref())?;

        offset = write_i32(&stream, offset, attributes.len() as i32)?;
        for (k, v) in &attributes {
            offset = stream.write_cstr(offset, k)?;
            offset = stream.write_cstr(offset, v)?;
        }

        offset = write_i32(&stream, offset, reference.len() as i32)?;
        for chrom in reference.iter() {
            offset = stream.write_cstr(offset, chrom.name())?;
            offset = write_i64(&stream, offset, chrom.size() as i64)?;
        }

        let mut sorted_res = resolutions.clone();
        sorted_res.sort_unstable();
        offset = write_i32(&stream, offset, sorted_res.len() as i32)?;
        for r in &sorted_res {
            offset = write_i32(&stream, offset, *r as i32)?;
        }
        write_i32(&stream, offset, 0)?; // fragment-resolution count: unsupported

        let mut spill = BTreeMap::new();
        for &r in &sorted_res {
            let spill_path = tempfile::Builder::new()
                .prefix("hicmat-spill-")
                .suffix(&format!(".{r}.bin"))
                .tempfile()
                .map_err(|e| Error::io(uri.clone(), e))?
                .into_temp_path();
            let store = InteractionSpillStore::create(&spill_path, 1_000_000)?;
            spill_path.keep().map_err(|e| Error::io(uri.clone(), e.error))?;
            spill.insert(r, store);
        }

        Ok(Self {
            uri,
            stream,
            version: CURRENT_WRITER_VERSION,
            reference,
            resolutions: sorted_res,
            genome_id: genome_id.into(),
            attributes,
            state: FileState::Writable,
            master_index_offset_field,
            master_index: BTreeMap::new(),
            resolution_indexes: BTreeMap::new(),
            spill,
            pair_sums: BTreeMap::new(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    fn block_geometry(&self, resolution: u32, chrom1_id: u32, chrom2_id: u32) -> Result<(u64, u64)> {
        let chrom1 = self.reference.at(chrom1_id)?;
        let chrom2 = self.reference.at(chrom2_id)?;
        let cutoff = if chrom1_id == chrom2_id { DEFAULT_INTRA_CUTOFF } else { DEFAULT_INTER_CUTOFF };
        let num_columns = compute_block_column_count(chrom1, chrom2, resolution, cutoff, crate::hic::block_mapper::DEFAULT_BLOCK_CAPACITY);
        let num_bins = compute_num_bins(chrom1, chrom2, resolution);
        let block_bin_count = num_bins / num_columns + 1;
        Ok((block_bin_count, num_columns))
    }

    /// Append one pixel at the given resolution. `bin1_id`/`bin2_id` are
    /// bin ids relative to the start of their own chromosome at that
    /// resolution (mirrors the original's `Bin::rel_id()`).
    pub fn append_pixel(&mut self, resolution: u32, chrom1_id: u32, chrom2_id: u32, bin1_id: u64, bin2_id: u64, count: f32) -> Result<()> {
        if self.state != FileState::Writable {
            return Err(Error::InvalidInput("file is not open for writing".into()));
        }
        let (block_bin_count, block_column_count) = self.block_geometry(resolution, chrom1_id, chrom2_id)?;
        let store = self
            .spill
            .get_mut(&resolution)
            .ok_or_else(|| Error::InvalidInput(format!("resolution {resolution} was not registered at file creation")))?;

        let key = (chrom1_id.min(chrom2_id), chrom1_id.max(chrom2_id));
        if !store.has_mapper(key.0, key.1) {
            if chrom1_id == chrom2_id {
                store.register_intra_mapper(chrom1_id, BlockMapperIntra::with_default_base_depth(block_bin_count, block_column_count));
            } else {
                store.register_inter_mapper(key.0, key.1, BlockMapperInter::new(block_bin_count, block_column_count));
            }
        }
        store.push_pixel(key.0, key.1, bin1_id, bin2_id, count)?;
        *self.pair_sums.entry(key).or_insert(0.0) += count as f64;
        Ok(())
    }

    /// Materialize every buffered pixel into blocks, write the matrix
    /// body for each chromosome pair, then the footer, then patch the
    /// header's master-index offset (spec §4.13 writer operations 3-5).
    pub fn finalize(&mut self) -> Result<()> {
        if self.state != FileState::Writable {
            return Ok(());
        }

        for store in self.spill.values_mut() {
            store.finalize()?;
        }

        let pairs: Vec<(u32, u32)> = {
            let mut set = std::collections::BTreeSet::new();
            for store in self.spill.values() {
                for chrom1 in self.reference.iter() {
                    for chrom2 in self.reference.iter() {
                        if chrom1.id() > chrom2.id() {
                            continue;
                        }
                        if !store.block_ids_for_pair(chrom1.id(), chrom2.id()).is_empty() {
                            set.insert((chrom1.id(), chrom2.id()));
                        }
                    }
                }
            }
            set.into_iter().collect()
        };

        for (chrom1_id, chrom2_id) in pairs {
            let body_start = self.stream.size();
            let mut offset = body_start;
            offset = write_i32(&self.stream, offset, chrom1_id as i32)?;
            offset = write_i32(&self.stream, offset, chrom2_id as i32)?;
            offset = write_i32(&self.stream, offset, self.resolutions.len() as i32)?;

            for res_idx in 0..self.resolutions.len() {
                let resolution = self.resolutions[res_idx];
                let (block_bin_count, block_column_count) = self.block_geometry(resolution, chrom1_id, chrom2_id)?;
                let block_ids: Vec<BlockId> = self.spill.get(&resolution).unwrap().block_ids_for_pair(chrom1_id, chrom2_id).to_vec();

                let mut descriptors = Vec::with_capacity(block_ids.len());
                for bid in &block_ids {
                    let block = self.spill.get_mut(&resolution).unwrap().merge_blocks(*bid, |b| b as i32, |b| b as i32)?;
                    if block.is_empty() {
                        continue;
                    }
                    let encoded = block.encode(&self.uri)?;
                    let pos = self.stream.append(&encoded)?;
                    descriptors.push(BlockDescriptor { id: bid.block_id, file_offset: pos, compressed_size: encoded.len() as u32 });
                }

                let sum_counts = *self.pair_sums.get(&(chrom1_id, chrom2_id)).unwrap_or(&0.0) as f32;

                offset = stream_cstr(&self.stream, offset, "BP")?;
                offset = write_i32(&self.stream, offset, res_idx as i32)?;
                offset = write_f32(&self.stream, offset, sum_counts)?;
                offset = write_i32(&self.stream, offset, 0)?; // occupiedCellCount (reserved)
                offset = write_f32(&self.stream, offset, 0.0)?; // percent5 (reserved)
                offset = write_f32(&self.stream, offset, 0.0)?; // percent95 (reserved)
                offset = write_i32(&self.stream, offset, resolution as i32)?;
                offset = write_i32(&self.stream, offset, block_bin_count as i32)?;
                offset = write_i32(&self.stream, offset, block_column_count as i32)?;
                offset = write_i32(&self.stream, offset, descriptors.len() as i32)?;
                for d in &descriptors {
                    offset = write_i32(&self.stream, offset, d.id as i32)?;
                    offset = write_i64(&self.stream, offset, d.file_offset as i64)?;
                    offset = write_i32(&self.stream, offset, d.compressed_size as i32)?;
                }
            }

            let body_size = (offset - body_start) as u32;
            self.master_index.insert((chrom1_id, chrom2_id), MasterIndexEntry { position: body_start, size: body_size });
        }

        let footer_offset = self.stream.size();
        let mut offset = footer_offset;
        offset = write_i32(&self.stream, offset, self.master_index.len() as i32)?;
        for (&(c1, c2), entry) in &self.master_index {
            offset = stream_cstr(&self.stream, offset, &format!("{c1}_{c2}"))?;
            offset = write_i64(&self.stream, offset, entry.position as i64)?;
            offset = write_i32(&self.stream, offset, entry.size as i32)?;
        }
        write_i32(&self.stream, offset, 0)?; // expected-value vector count: none provided
        write_i32(&self.stream, offset + 4, 0)?; // normalization-vector count: none provided

        write_i64(&self.stream, self.master_index_offset_field, footer_offset as i64)?;

        self.state = FileState::Finalized;
        debug!(uri = %self.uri, pairs = self.master_index.len(), "finalized HIC file");
        Ok(())
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let uri = path.display().to_string();
        let stream = FileStream::open(path)?;

        let (magic, _, mut offset) = stream.seek_and_read(0, 4)?;
        if magic.as_slice() != MAGIC {
            return Err(Error::format(&uri, "missing HIC magic bytes"));
        }
        let version = stream.read_as_signed(offset, 4, ByteOrder::Big)? as i32;
        offset += 4;
        if version < MIN_SUPPORTED_VERSION {
            return Err(Error::Unsupported(format!("HIC version {version} is below the supported minimum {MIN_SUPPORTED_VERSION}")));
        }
        let master_index_offset = stream.read_as_signed(offset, 8, ByteOrder::Big)?;
        offset += 8;

        let (genome_id, next) = stream.read_cstr(offset)?;
        offset = next;

        let attr_count = stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;
        let mut attributes = BTreeMap::new();
        for _ in 0..attr_count {
            let (k, n1) = stream.read_cstr(offset)?;
            let (v, n2) = stream.read_cstr(n1)?;
            attributes.insert(k, v);
            offset = n2;
        }

        let n_chroms = stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;
        let mut names = Vec::with_capacity(n_chroms as usize);
        let mut sizes = Vec::with_capacity(n_chroms as usize);
        for _ in 0..n_chroms {
            let (name, next) = stream.read_cstr(offset)?;
            offset = next;
            let size = stream.read_as_signed(offset, 8, ByteOrder::Big)?;
            offset += 8;
            names.push(name);
            sizes.push(size as u32);
        }
        let reference = Arc::new(Reference::new(&names, &sizes)?);

        let n_bp_res = stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;
        let mut resolutions = Vec::with_capacity(n_bp_res as usize);
        for _ in 0..n_bp_res {
            resolutions.push(stream.read_as_signed(offset, 4, ByteOrder::Big)? as u32);
            offset += 4;
        }

        if master_index_offset < 0 {
            return Err(Error::corruption(&uri, "file was never finalized (master index offset is the write-time sentinel)"));
        }

        let master_index = read_master_index(&stream, master_index_offset as u64, &uri)?;

        Ok(Self {
            uri,
            stream,
            version,
            reference,
            resolutions,
            genome_id,
            attributes,
            state: FileState::ReadOnly,
            master_index_offset_field: 0,
            master_index,
            resolution_indexes: BTreeMap::new(),
            spill: BTreeMap::new(),
            pair_sums: BTreeMap::new(),
        })
    }

    pub fn genome_id(&self) -> &str {
        &self.genome_id
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Lazily read and cache one chromosome pair's block index at one
    /// resolution (spec §4.13 "lazily read each chromosome pair's block
    /// index on first access").
    pub fn block_index(&mut self, resolution: u32, chrom1_id: u32, chrom2_id: u32) -> Result<&BlockIndex> {
        let key = (chrom1_id.min(chrom2_id), chrom1_id.max(chrom2_id), resolution);
        if !self.resolution_indexes.contains_key(&key) {
            let entry = self
                .master_index
                .get(&(key.0, key.1))
                .ok_or_else(|| Error::out_of_range(&self.uri, format!("no matrix body for chromosome pair ({}, {})", key.0, key.1)))?;
            let idx = self.read_resolution_index(*entry, resolution, key.0, key.1)?;
            self.resolution_indexes.insert(key, idx);
        }
        Ok(&self.resolution_indexes[&key].blocks)
    }

    fn read_resolution_index(&self, entry: MasterIndexEntry, resolution: u32, chrom1_id: u32, chrom2_id: u32) -> Result<ResolutionIndex> {
        let mut offset = entry.position;
        let _chr1 = self.stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;
        let _chr2 = self.stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;
        let n_resolutions = self.stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;

        for _ in 0..n_resolutions {
            let (_unit, next) = self.stream.read_cstr(offset)?;
            offset = next;
            let _res_idx = self.stream.read_as_signed(offset, 4, ByteOrder::Big)?;
            offset += 4;
            let _sum_counts = self.stream.read_as_double(offset, 4, ByteOrder::Big)?;
            offset += 4;
            offset += 4; // occupiedCellCount
            offset += 4; // percent5
            offset += 4; // percent95
            let bin_size = self.stream.read_as_signed(offset, 4, ByteOrder::Big)? as u32;
            offset += 4;
            let block_bin_count = self.stream.read_as_signed(offset, 4, ByteOrder::Big)? as u64;
            offset += 4;
            let block_column_count = self.stream.read_as_signed(offset, 4, ByteOrder::Big)? as u64;
            offset += 4;
            let block_count = self.stream.read_as_signed(offset, 4, ByteOrder::Big)?;
            offset += 4;

            let mut descriptors = Vec::with_capacity(block_count as usize);
            for _ in 0..block_count {
                let id = self.stream.read_as_signed(offset, 4, ByteOrder::Big)? as u64;
                offset += 4;
                let file_offset = self.stream.read_as_signed(offset, 8, ByteOrder::Big)? as u64;
                offset += 8;
                let compressed_size = self.stream.read_as_signed(offset, 4, ByteOrder::Big)? as u32;
                offset += 4;
                descriptors.push(BlockDescriptor { id, file_offset, compressed_size });
            }

            if bin_size == resolution {
                let is_intra = chrom1_id == chrom2_id;
                return Ok(ResolutionIndex {
                    bin_size,
                    block_bin_count,
                    block_column_count,
                    blocks: BlockIndex::new(descriptors, block_bin_count, block_column_count, is_intra, self.version as u32),
                });
            }
        }

        Err(Error::out_of_range(&self.uri, format!("resolution {resolution} not present for this chromosome pair")))
    }

    pub fn read_block(&self, uri: &str, descriptor: &BlockDescriptor, bin_offset1: u64, bin_offset2: u64) -> Result<Vec<crate::pixel::ThinPixel<f32>>> {
        let (bytes, _, _) = self.stream.seek_and_read(descriptor.file_offset, descriptor.compressed_size as usize)?;
        MatrixInteractionBlock::decode(&bytes, uri, |rel| rel as u64 + bin_offset1, |rel| rel as u64 + bin_offset2)
    }
}

impl Drop for HicFile {
    fn drop(&mut self) {
        if self.state == FileState::Writable {
            if let Err(e) = self.finalize() {
                error!(uri = %self.uri, error = %e, "failed to finalize HIC file on drop");
            }
        }
        self.state = FileState::Closed;
    }
}

fn write_i32(stream: &FileStream, offset: u64, v: i32) -> Result<u64> {
    Ok(stream.seek_and_write(offset, &v.to_be_bytes())?.1)
}

fn write_i64(stream: &FileStream, offset: u64, v: i64) -> Result<u64> {
    Ok(stream.seek_and_write(offset, &v.to_be_bytes())?.1)
}

fn write_f32(stream: &FileStream, offset: u64, v: f32) -> Result<u64> {
    Ok(stream.seek_and_write(offset, &v.to_be_bytes())?.1)
}

fn stream_cstr(stream: &FileStream, offset: u64, s: &str) -> Result<u64> {
    stream.write_cstr(offset, s)
}

fn read_master_index(stream: &FileStream, offset: u64, uri: &str) -> Result<BTreeMap<(u32, u32), MasterIndexEntry>> {
    let mut offset = offset;
    let count = stream.read_as_signed(offset, 4, ByteOrder::Big)?;
    offset += 4;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let (key, next) = stream.read_cstr(offset)?;
        offset = next;
        let position = stream.read_as_signed(offset, 8, ByteOrder::Big)?;
        offset += 8;
        let size = stream.read_as_signed(offset, 4, ByteOrder::Big)?;
        offset += 4;

        let mut parts = key.split('_');
        let c1: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::corruption(uri, format!("malformed master index key {key}")))?;
        let c2: u32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::corruption(uri, format!("malformed master index key {key}")))?;
        map.insert((c1, c2), MasterIndexEntry { position: position as u64, size: size as u32 });
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::Reference;

    fn tiny_reference() -> Arc<Reference> {
        Arc::new(Reference::new(&["chr1", "chr2"], &[10_000, 5_000]).unwrap())
    }

    #[test]
    fn create_finalize_open_round_trips_header_fields() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let reference = tiny_reference();
        {
            let mut writer = HicFile::create_new(tmp.path(), Arc::clone(&reference), vec![1000], "hg00", BTreeMap::new()).unwrap();
            writer.append_pixel(1000, 0, 0, 0, 0, 3.0).unwrap();
            writer.append_pixel(1000, 0, 0, 1, 2, 1.5).unwrap();
            writer.finalize().unwrap();
        }

        let mut reader = HicFile::open_read_only(tmp.path()).unwrap();
        assert_eq!(reader.genome_id(), "hg00");
        assert_eq!(reader.reference().len(), 2);
        assert_eq!(reader.resolutions(), &[1000]);

        let index = reader.block_index(1000, 0, 0).unwrap();
        assert!(!index.is_empty());
    }

    #[test]
    fn append_to_unregistered_resolution_fails() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = HicFile::create_new(tmp.path(), tiny_reference(), vec![1000], "hg00", BTreeMap::new()).unwrap();
        assert!(writer.append_pixel(500, 0, 0, 0, 0, 1.0).is_err());
    }

    #[test]
    fn open_read_only_rejects_bad_magic() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"NOT-A-HIC-FILE-AT-ALL").unwrap();
        assert!(HicFile::open_read_only(tmp.path()).is_err());
    }
}
