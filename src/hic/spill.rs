//! Append-only spill store accumulating pixels into HIC blocks before the
//! final file is written (spec §4.12).
//!
//! Grounded on
//! `examples/original_source/src/libhictk/hic/include/hictk/hic/interaction_to_block_mapper.hpp`
//! and its impl: pixels are routed to a `BlockId` via the chromosome pair's
//! [`BlockMapperInter`]/[`BlockMapperIntra`], buffered in memory, and
//! periodically flushed to a scratch file as Zstd-compressed flat triples
//! (`bin1_ids`, `bin2_ids`, `counts`, columnar). [`merge_blocks`] reads every
//! flushed chunk for one `BlockId` back and hands the teacher's
//! [`MatrixInteractionBlock`](crate::hic::block::MatrixInteractionBlock) the
//! row-grouped form the final encoder expects.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, WithUri};
use crate::filestream::FileStream;
use crate::hic::block::MatrixInteractionBlock;
use crate::hic::block_mapper::{BlockMapperInter, BlockMapperIntra};
use crate::pixel::ThinPixel;

/// Identifies a block: which chromosome pair it belongs to, and its id
/// within that pair's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    pub chrom1_id: u32,
    pub chrom2_id: u32,
    pub block_id: u64,
}

/// One flushed chunk's location: byte offset and compressed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillLocation {
    pub offset: u64,
    pub compressed_len: u32,
}

#[derive(Default)]
struct FlatBlock {
    bin1_ids: Vec<u64>,
    bin2_ids: Vec<u64>,
    counts: Vec<f32>,
}

impl FlatBlock {
    fn push(&mut self, bin1_id: u64, bin2_id: u64, count: f32) {
        self.bin1_ids.push(bin1_id);
        self.bin2_ids.push(bin2_id);
        self.counts.push(count);
    }

    fn len(&self) -> usize {
        self.bin1_ids.len()
    }

    fn encode(&self, uri: &str) -> Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(self.len() * 20);
        for &b in &self.bin1_ids {
            raw.write_u64::<BigEndian>(b).with_uri(uri)?;
        }
        for &b in &self.bin2_ids {
            raw.write_u64::<BigEndian>(b).with_uri(uri)?;
        }
        for &c in &self.counts {
            raw.write_f32::<BigEndian>(c).with_uri(uri)?;
        }
        let compressed = zstd::encode_all(&raw[..], 0).with_uri(uri)?;

        let mut out = Vec::with_capacity(compressed.len() + 8);
        out.write_u64::<BigEndian>(self.len() as u64).with_uri(uri)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(bytes: &[u8], uri: &str) -> Result<Vec<(u64, u64, f32)>> {
        let mut cursor = std::io::Cursor::new(bytes);
        let n = cursor.read_u64::<BigEndian>().with_uri(uri)? as usize;
        let compressed = &bytes[8..];
        let raw = zstd::decode_all(compressed).with_uri(uri)?;
        let mut raw_cursor = std::io::Cursor::new(raw);

        let mut bin1_ids = Vec::with_capacity(n);
        for _ in 0..n {
            bin1_ids.push(raw_cursor.read_u64::<BigEndian>().with_uri(uri)?);
        }
        let mut bin2_ids = Vec::with_capacity(n);
        for _ in 0..n {
            bin2_ids.push(raw_cursor.read_u64::<BigEndian>().with_uri(uri)?);
        }
        let mut counts = Vec::with_capacity(n);
        for _ in 0..n {
            counts.push(raw_cursor.read_f32::<BigEndian>().with_uri(uri)?);
        }
        Ok(bin1_ids.into_iter().zip(bin2_ids).zip(counts).map(|((b1, b2), c)| (b1, b2, c)).collect())
    }
}

/// Per-chromosome-pair block mapper, chosen once the pair's geometry is
/// known (spec §4.10).
enum PairMapper {
    Intra(BlockMapperIntra),
    Inter(BlockMapperInter),
}

impl PairMapper {
    fn map(&self, bin1_id: u64, bin2_id: u64) -> u64 {
        match self {
            PairMapper::Intra(m) => m.map(bin1_id, bin2_id),
            PairMapper::Inter(m) => m.map(bin1_id, bin2_id),
        }
    }
}

/// Accumulates pixels across a whole matrix write, flushing to disk in
/// Zstd-compressed chunks and exposing per-block merge on demand.
pub struct InteractionSpillStore {
    stream: FileStream,
    mappers: BTreeMap<(u32, u32), PairMapper>,
    pending: BTreeMap<BlockId, FlatBlock>,
    block_index: BTreeMap<BlockId, Vec<SpillLocation>>,
    chrom_index: BTreeMap<(u32, u32), Vec<BlockId>>,
    pixels_since_flush: usize,
    flush_chunk_size: usize,
}

impl InteractionSpillStore {
    pub fn create(path: impl AsRef<std::path::Path>, flush_chunk_size: usize) -> Result<Self> {
        Ok(Self {
            stream: FileStream::create(path)?,
            mappers: BTreeMap::new(),
            pending: BTreeMap::new(),
            block_index: BTreeMap::new(),
            chrom_index: BTreeMap::new(),
            pixels_since_flush: 0,
            flush_chunk_size,
        })
    }

    pub fn register_intra_mapper(&mut self, chrom_id: u32, mapper: BlockMapperIntra) {
        self.mappers.insert((chrom_id, chrom_id), PairMapper::Intra(mapper));
    }

    pub fn register_inter_mapper(&mut self, chrom1_id: u32, chrom2_id: u32, mapper: BlockMapperInter) {
        self.mappers.insert((chrom1_id, chrom2_id), PairMapper::Inter(mapper));
    }

    pub fn has_mapper(&self, chrom1_id: u32, chrom2_id: u32) -> bool {
        self.mappers.contains_key(&(chrom1_id, chrom2_id))
    }

    pub fn push_pixel(&mut self, chrom1_id: u32, chrom2_id: u32, bin1_id: u64, bin2_id: u64, count: f32) -> Result<()> {
        let block_id = {
            let mapper = self
                .mappers
                .get(&(chrom1_id, chrom2_id))
                .ok_or_else(|| crate::error::Error::InvalidInput(format!("no block mapper registered for chromosome pair ({chrom1_id}, {chrom2_id})")))?;
            mapper.map(bin1_id, bin2_id)
        };
        let bid = BlockId { chrom1_id, chrom2_id, block_id };
        self.pending.entry(bid).or_default().push(bin1_id, bin2_id, count);
        self.pixels_since_flush += 1;
        if self.pixels_since_flush >= self.flush_chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        let uri = self.stream.uri().to_string();
        for (bid, flat) in self.pending.iter() {
            if flat.len() == 0 {
                continue;
            }
            let bytes = flat.encode(&uri)?;
            let offset = self.stream.append(&bytes)?;
            self.block_index.entry(*bid).or_default().push(SpillLocation { offset, compressed_len: bytes.len() as u32 });
        }
        self.pending.clear();
        self.pixels_since_flush = 0;
        Ok(())
    }

    /// Finalize indexes (sorted block ids per chromosome pair) after all
    /// pixels have been pushed.
    pub fn finalize(&mut self) -> Result<()> {
        self.flush()?;
        self.chrom_index.clear();
        for bid in self.block_index.keys() {
            self.chrom_index.entry((bid.chrom1_id, bid.chrom2_id)).or_default().push(*bid);
        }
        for ids in self.chrom_index.values_mut() {
            ids.sort();
        }
        Ok(())
    }

    pub fn block_ids_for_pair(&self, chrom1_id: u32, chrom2_id: u32) -> &[BlockId] {
        self.chrom_index.get(&(chrom1_id, chrom2_id)).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Read every spilled chunk for `bid` and merge them into a single
    /// row-grouped, bin1-sorted block ready for final zlib encoding.
    pub fn merge_blocks(&mut self, bid: BlockId, rel_bin1: impl Fn(u64) -> i32, rel_bin2: impl Fn(u64) -> i32) -> Result<MatrixInteractionBlock> {
        let uri = self.stream.uri().to_string();
        let mut block = MatrixInteractionBlock::new();
        let Some(locations) = self.block_index.get(&bid).cloned() else {
            return Ok(block);
        };
        for loc in locations {
            let (bytes, _, _) = self.stream.seek_and_read(loc.offset, loc.compressed_len as usize)?;
            for (bin1_id, bin2_id, count) in FlatBlock::decode(&bytes, &uri)? {
                block.push(rel_bin1(bin1_id), rel_bin2(bin2_id), count);
            }
        }
        block.finalize();
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_block_round_trips_through_encode_decode() {
        let mut flat = FlatBlock::default();
        flat.push(0, 1, 1.5);
        flat.push(2, 3, 2.5);
        let encoded = flat.encode("test").unwrap();
        let decoded = FlatBlock::decode(&encoded, "test").unwrap();
        assert_eq!(decoded, vec![(0, 1, 1.5), (2, 3, 2.5)]);
    }

    #[test]
    fn push_pixel_without_registered_mapper_fails() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut store = InteractionSpillStore::create(tmp.path(), 1000).unwrap();
        let err = store.push_pixel(0, 0, 0, 0, 1.0);
        assert!(err.is_err());
    }

    #[test]
    fn pushed_pixels_are_retrievable_after_finalize() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut store = InteractionSpillStore::create(tmp.path(), 1000).unwrap();
        store.register_intra_mapper(0, BlockMapperIntra::with_default_base_depth(1024, 4));
        store.push_pixel(0, 0, 10, 20, 1.0).unwrap();
        store.finalize().unwrap();

        let ids = store.block_ids_for_pair(0, 0).to_vec();
        assert_eq!(ids.len(), 1);
        let block = store.merge_blocks(ids[0], |b| b as i32, |b| b as i32).unwrap();
        assert_eq!(block.n_records(), 1);
    }
}
