//! Cool Index: the `indexes/bin1_offset` row-offset array (spec §4.6).
//!
//! `offset_by_bin_id(b)` is the smallest pixel index `i` with
//! `bin1_id[i] >= b`; the array has length `N_bins + 1` with a terminal
//! sentinel equal to NNZ. Chromosome offsets (`indexes/chrom_offset`) are a
//! lazily-derived O(N_chroms) subset of the same array, read once per
//! chromosome boundary rather than recomputed on every query (spec §4.6).

use crate::bintable::BinTable;
use crate::error::{Error, Result};

/// Row-offset index over a Cool dataset's `pixels/` arrays.
#[derive(Debug, Clone)]
pub struct Index {
    /// `bin1_offset[b]` is the first pixel row whose `bin1_id == b`;
    /// length is `n_bins + 1`, with `bin1_offset[n_bins] == nnz`.
    bin1_offset: Vec<u64>,
    chrom_offset: Option<Vec<u64>>,
}

impl Index {
    /// An empty index sized for `n_bins` bins, all offsets at zero, ready
    /// for incremental writer-side updates.
    pub fn new_writer(n_bins: u64) -> Self {
        Self { bin1_offset: vec![0u64; n_bins as usize + 1], chrom_offset: None }
    }

    /// Load an already-materialized offset array, e.g. read back from
    /// `indexes/bin1_offset`.
    pub fn from_offsets(bin1_offset: Vec<u64>) -> Self {
        Self { bin1_offset, chrom_offset: None }
    }

    pub fn n_bins(&self) -> u64 {
        self.bin1_offset.len() as u64 - 1
    }

    pub fn nnz(&self) -> u64 {
        *self.bin1_offset.last().unwrap_or(&0)
    }

    pub fn size(&self) -> usize {
        self.bin1_offset.len()
    }

    /// The starting pixel-array offset for `bin_id`, or `nnz()` for
    /// `bin_id == n_bins`.
    pub fn get_offset_by_bin_id(&self, bin_id: u64) -> Result<u64> {
        self.bin1_offset
            .get(bin_id as usize)
            .copied()
            .ok_or_else(|| Error::out_of_range("cool index", format!("bin id {bin_id} out of range")))
    }

    /// Writer-side: set the running end offset for `bin_id` as pixels are
    /// appended in order. Mirrors `append_pixels`'s incremental index
    /// maintenance (spec §4.8).
    pub fn set_offset_by_bin_id(&mut self, bin_id: u64, offset: u64) -> Result<()> {
        let slot = self
            .bin1_offset
            .get_mut(bin_id as usize)
            .ok_or_else(|| Error::out_of_range("cool index", format!("bin id {bin_id} out of range")))?;
        *slot = offset;
        Ok(())
    }

    /// Fill the terminal sentinel `bin1_offset[n_bins] = nnz`, and
    /// back-fill any bin ids never observed as a row start with the
    /// preceding filled offset so the array stays monotone.
    pub fn finalize(&mut self, nnz: u64) {
        let n = self.bin1_offset.len();
        self.bin1_offset[n - 1] = nnz;
        // Bins with no pixels of their own inherit the next row's start
        // offset, keeping the array non-decreasing (bin 0 stays 0).
        for i in (1..n - 1).rev() {
            if self.bin1_offset[i] == 0 {
                self.bin1_offset[i] = self.bin1_offset[i + 1];
            }
        }
    }

    /// Checks monotonicity and the terminal bounds (spec §8, "Cool Index").
    pub fn validate(&self, uri: &str) -> Result<()> {
        if self.bin1_offset.first() != Some(&0) {
            return Err(Error::corruption(uri, "bin1_offset[0] must be 0"));
        }
        for w in self.bin1_offset.windows(2) {
            if w[0] > w[1] {
                return Err(Error::corruption(
                    uri,
                    format!("bin1_offset is not monotone: {} > {}", w[0], w[1]),
                ));
            }
        }
        Ok(())
    }

    /// Derive `indexes/chrom_offset` by reading one `bin1_offset` entry per
    /// chromosome boundary from `bin_table`. O(N_chroms).
    pub fn compute_chrom_offsets(&mut self, bin_table: &BinTable) -> Result<&[u64]> {
        if self.chrom_offset.is_none() {
            let chrom_bin_offsets = bin_table.chrom_bin_offsets();
            let mut offsets = Vec::with_capacity(chrom_bin_offsets.len());
            for &bin_id in chrom_bin_offsets {
                offsets.push(self.get_offset_by_bin_id(bin_id)?);
            }
            self.chrom_offset = Some(offsets);
        }
        Ok(self.chrom_offset.as_deref().unwrap())
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.bin1_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_fills_terminal_sentinel() {
        let mut idx = Index::new_writer(3);
        idx.set_offset_by_bin_id(1, 2).unwrap();
        idx.set_offset_by_bin_id(2, 5).unwrap();
        idx.finalize(5);
        assert_eq!(idx.get_offset_by_bin_id(0).unwrap(), 0);
        assert_eq!(idx.get_offset_by_bin_id(3).unwrap(), 5);
    }

    #[test]
    fn validate_rejects_non_monotone_offsets() {
        let idx = Index::from_offsets(vec![0, 5, 2, 10]);
        assert!(idx.validate("test.cool").is_err());
    }

    #[test]
    fn validate_accepts_monotone_offsets() {
        let idx = Index::from_offsets(vec![0, 2, 2, 10]);
        assert!(idx.validate("test.cool").is_ok());
    }

    #[test]
    fn offset_lookup_out_of_range_bin_fails() {
        let idx = Index::from_offsets(vec![0, 2, 5]);
        assert!(idx.get_offset_by_bin_id(99).is_err());
    }
}
