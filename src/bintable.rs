//! BinTable: mapping between genomic intervals and bin ids, fixed- or
//! variable-width (spec §4.2).
//!
//! Fixed tables derive every operation in O(1) from the `Reference`'s
//! cumulative bin-offset prefix sum, the same shape as
//! `Reference::chrom_size_prefix_sum` in `chromosome.rs`, just over bin
//! counts instead of base-pair counts.

use std::sync::Arc;

use crate::chromosome::{Chromosome, Reference};
use crate::error::{Error, Result};
use crate::interval::GenomicInterval;

/// A single row of a [`BinTable`]: a half-open interval on one chromosome,
/// plus its global and within-chromosome ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    id: u64,
    rel_id: u32,
    chrom: Chromosome,
    start: u32,
    end: u32,
}

impl Bin {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn rel_id(&self) -> u32 {
        self.rel_id
    }
    pub fn chrom(&self) -> &Chromosome {
        &self.chrom
    }
    pub fn start(&self) -> u32 {
        self.start
    }
    pub fn end(&self) -> u32 {
        self.end
    }
}

#[derive(Debug, Clone)]
enum Layout {
    /// Fixed-resolution bins of width `resolution`, derived on demand.
    Fixed { resolution: u32, bin_offsets: Arc<Vec<u64>> },
    /// Explicit per-bin (chrom_id, start, end) triples, e.g. for
    /// restriction-fragment bin tables.
    Variable { starts: Arc<Vec<u32>>, ends: Arc<Vec<u32>>, chrom_ids: Arc<Vec<u32>>, bin_offsets: Arc<Vec<u64>> },
}

/// A bin table: either fixed-resolution or variable-width, immutable and
/// shared by reference count once constructed (spec §3).
#[derive(Debug, Clone)]
pub struct BinTable {
    reference: Reference,
    layout: Layout,
}

impl BinTable {
    /// Build a fixed-resolution table tiling every chromosome in `reference`
    /// with bins of width `resolution`.
    pub fn fixed(reference: Reference, resolution: u32) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidInput("resolution must be > 0".into()));
        }
        let mut bin_offsets = Vec::with_capacity(reference.len() + 1);
        let mut acc = 0u64;
        bin_offsets.push(0);
        for c in reference.iter() {
            let n_bins = (c.size() as u64 + resolution as u64 - 1) / resolution as u64;
            acc += n_bins;
            bin_offsets.push(acc);
        }
        Ok(Self {
            reference,
            layout: Layout::Fixed { resolution, bin_offsets: Arc::new(bin_offsets) },
        })
    }

    /// Build a variable-width table from explicit per-bin start/end arrays,
    /// sorted by chromosome id then by start (spec §3, "Bin: ... ordered
    /// first by chromosome id, then by start").
    pub fn variable(reference: Reference, chrom_ids: Vec<u32>, starts: Vec<u32>, ends: Vec<u32>) -> Result<Self> {
        if chrom_ids.len() != starts.len() || starts.len() != ends.len() {
            return Err(Error::InvalidInput("variable bin arrays must have equal length".into()));
        }
        let mut bin_offsets = vec![0u64; reference.len() + 1];
        for &cid in &chrom_ids {
            bin_offsets[cid as usize + 1] += 1;
        }
        for i in 1..bin_offsets.len() {
            bin_offsets[i] += bin_offsets[i - 1];
        }
        Ok(Self {
            reference,
            layout: Layout::Variable {
                starts: Arc::new(starts),
                ends: Arc::new(ends),
                chrom_ids: Arc::new(chrom_ids),
                bin_offsets: Arc::new(bin_offsets),
            },
        })
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn resolution(&self) -> Option<u32> {
        match &self.layout {
            Layout::Fixed { resolution, .. } => Some(*resolution),
            Layout::Variable { .. } => None,
        }
    }

    fn bin_offsets(&self) -> &[u64] {
        match &self.layout {
            Layout::Fixed { bin_offsets, .. } => bin_offsets,
            Layout::Variable { bin_offsets, .. } => bin_offsets,
        }
    }

    /// Per-chromosome bin-offset prefix sum, length `reference().len() + 1`.
    /// Exposed so the Cool index can derive `indexes/chrom_offset` without
    /// depending on whether the table is fixed- or variable-width.
    pub fn chrom_bin_offsets(&self) -> &[u64] {
        self.bin_offsets()
    }

    /// Total number of bins across all chromosomes.
    pub fn size(&self) -> u64 {
        *self.bin_offsets().last().unwrap_or(&0)
    }

    /// Find the chromosome id owning `bin_id` via binary search over the
    /// bin-offset prefix sum.
    fn chrom_id_for_bin(&self, bin_id: u64) -> Result<u32> {
        let offsets = self.bin_offsets();
        if bin_id >= self.size() {
            return Err(Error::out_of_range("bintable", format!("bin id {bin_id} out of range")));
        }
        // offsets[i] is the first bin id of chromosome i; find the largest i
        // with offsets[i] <= bin_id.
        match offsets.binary_search(&bin_id) {
            Ok(idx) => Ok(idx as u32),
            Err(idx) => Ok((idx - 1) as u32),
        }
    }

    /// O(1) (fixed) lookup of the [`Bin`] for a global bin id.
    pub fn at(&self, bin_id: u64) -> Result<Bin> {
        let chrom_id = self.chrom_id_for_bin(bin_id)?;
        let chrom = self.reference.at(chrom_id)?.clone();
        match &self.layout {
            Layout::Fixed { resolution, bin_offsets } => {
                let rel_id = (bin_id - bin_offsets[chrom_id as usize]) as u32;
                let start = rel_id * resolution;
                let end = ((start as u64) + *resolution as u64).min(chrom.size() as u64) as u32;
                Ok(Bin { id: bin_id, rel_id, chrom, start, end })
            }
            Layout::Variable { starts, ends, .. } => {
                let rel_id = (bin_id - self.bin_offsets()[chrom_id as usize]) as u32;
                Ok(Bin {
                    id: bin_id,
                    rel_id,
                    chrom,
                    start: starts[bin_id as usize],
                    end: ends[bin_id as usize],
                })
            }
        }
    }

    /// O(1) (fixed) lookup of the bin containing `pos` on `chrom_name`.
    pub fn at_pos(&self, chrom_name: &str, pos: u32) -> Result<Bin> {
        let chrom = self.reference.at_name(chrom_name)?;
        if pos >= chrom.size() {
            return Err(Error::out_of_range("bintable", format!("position {pos} exceeds chromosome size")));
        }
        let chrom_id = chrom.id();
        match &self.layout {
            Layout::Fixed { resolution, bin_offsets } => {
                let rel_id = pos / resolution;
                let bin_id = bin_offsets[chrom_id as usize] + rel_id as u64;
                self.at(bin_id)
            }
            Layout::Variable { starts, ends, chrom_ids, bin_offsets } => {
                let lo = bin_offsets[chrom_id as usize] as usize;
                let hi = bin_offsets[chrom_id as usize + 1] as usize;
                for i in lo..hi {
                    debug_assert_eq!(chrom_ids[i], chrom_id);
                    if starts[i] <= pos && pos < ends[i] {
                        return self.at(i as u64);
                    }
                }
                Err(Error::out_of_range("bintable", format!("no bin covers position {pos}")))
            }
        }
    }

    /// Half-open `[begin, end)` range of bin ids overlapping `interval`.
    pub fn find_overlap(&self, interval: &GenomicInterval) -> Result<(u64, u64)> {
        let begin = self.at_pos(interval.chrom().name(), interval.start())?.id();
        // end is exclusive; the last covered position is end()-1.
        let end = self.at_pos(interval.chrom().name(), interval.end() - 1)?.id() + 1;
        Ok((begin, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Reference {
        Reference::new(&["chr1", "chr2"], &[1000, 500]).unwrap()
    }

    #[test]
    fn fixed_table_size_is_sum_of_per_chrom_bin_counts() {
        let t = BinTable::fixed(reference(), 100).unwrap();
        // chr1: 10 bins, chr2: 5 bins
        assert_eq!(t.size(), 15);
    }

    #[test]
    fn at_and_at_pos_agree() {
        let t = BinTable::fixed(reference(), 100).unwrap();
        for bin_id in 0..t.size() {
            let bin = t.at(bin_id).unwrap();
            let roundtrip = t.at_pos(bin.chrom().name(), bin.start()).unwrap();
            assert_eq!(roundtrip, bin);
        }
    }

    #[test]
    fn find_overlap_covers_whole_chromosome() {
        let t = BinTable::fixed(reference(), 100).unwrap();
        let chr1 = reference().at(0).unwrap().clone();
        let iv = GenomicInterval::new(chr1, 0, 1000).unwrap();
        let (begin, end) = t.find_overlap(&iv).unwrap();
        assert_eq!((begin, end), (0, 10));
    }

    #[test]
    fn zero_resolution_is_rejected() {
        assert!(BinTable::fixed(reference(), 0).is_err());
    }

    #[test]
    fn last_bin_is_clipped_to_chrom_size() {
        let t = BinTable::fixed(reference(), 300).unwrap();
        // chr1 size 1000, R=300 -> 4 bins, last bin [900,1000)
        let last = t.at(3).unwrap();
        assert_eq!((last.start(), last.end()), (900, 1000));
    }
}
