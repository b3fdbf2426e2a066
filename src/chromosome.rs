//! Chromosome and Reference: an ordered, named, sized set of chromosomes
//! with O(1) lookup by id or name.
//!
//! Grounded on the teacher's `genome.rs` (tab-delimited chromosome-size
//! parsing, order-preserving storage) generalized to the dense-id model of
//! `examples/original_source/src/libhictk/reference/include/hictk/reference.hpp`
//! and its `impl/reference_impl.hpp` (cached longest-chromosome lookups,
//! `add_ALL`/`remove_ALL`, size prefix sum).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Name and size of the synthetic chromosome `add_ALL` prepends.
const ALL_CHROM_ID: u32 = 0;
const ALL_CHROM_NAME: &str = "All";

/// A single named, sized chromosome. Equality is by id and name; ordering
/// is by id (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chromosome {
    id: u32,
    name: String,
    size: u32,
}

impl Chromosome {
    pub fn new(id: u32, name: impl Into<String>, size: u32) -> Self {
        Self { id, name: name.into(), size }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// True for the synthetic "ALL" chromosome that [`Reference::add_ALL`]
    /// prepends. Supplemented from `hictk`'s `chromosome.hpp`; used to
    /// filter the ALL chromosome out of default iteration and longest-
    /// chromosome bookkeeping.
    pub fn is_all(&self) -> bool {
        self.id == ALL_CHROM_ID && self.name == ALL_CHROM_NAME
    }
}

/// An ordered, immutable-after-construction collection of [`Chromosome`]s
/// shared by reference count among a file and the selectors/bin tables
/// derived from it (spec §3, "Lifecycle... shared by reference-counted
/// pointer").
#[derive(Debug, Clone)]
pub struct Reference {
    chroms: Arc<Vec<Chromosome>>,
    by_name: Arc<HashMap<String, usize>>,
    size_prefix_sum: Arc<Vec<u64>>,
    longest_chrom_idx: Option<usize>,
    chrom_with_longest_name_idx: Option<usize>,
}

impl Reference {
    /// Build from parallel name/size slices, preserving input order and
    /// assigning dense ids 0..N in that order.
    pub fn new<S: Into<String> + Clone>(names: &[S], sizes: &[u32]) -> Result<Self> {
        if names.len() != sizes.len() {
            return Err(Error::InvalidInput(format!(
                "names and sizes must have equal length (got {} and {})",
                names.len(),
                sizes.len()
            )));
        }
        let chroms: Vec<Chromosome> = names
            .iter()
            .cloned()
            .zip(sizes.iter().copied())
            .enumerate()
            .map(|(id, (name, size))| Chromosome::new(id as u32, name.into(), size))
            .collect();
        Self::from_chromosomes(chroms)
    }

    /// Build from an explicit, already-ordered sequence of chromosomes.
    /// Ids are reassigned densely in iteration order (mirrors the C++
    /// constructor's note: "chromosome IDs are not preserved").
    pub fn from_chromosomes(chroms: impl IntoIterator<Item = Chromosome>) -> Result<Self> {
        let chroms: Vec<Chromosome> = chroms
            .into_iter()
            .enumerate()
            .map(|(id, c)| Chromosome::new(id as u32, c.name, c.size))
            .collect();

        for c in &chroms {
            if c.name.is_empty() {
                return Err(Error::InvalidInput("chromosome name must not be empty".into()));
            }
            if c.size == 0 {
                return Err(Error::InvalidInput(format!(
                    "chromosome {} has size 0",
                    c.name
                )));
            }
        }

        let mut by_name = HashMap::with_capacity(chroms.len());
        for c in &chroms {
            if by_name.insert(c.name.clone(), c.id as usize).is_some() {
                return Err(Error::InvalidInput(format!(
                    "duplicate chromosome name: {}",
                    c.name
                )));
            }
        }

        let size_prefix_sum = compute_size_prefix_sum(&chroms);
        let longest_chrom_idx = find_extremal(&chroms, |c| c.size as u64);
        let chrom_with_longest_name_idx = find_extremal(&chroms, |c| c.name.len() as u64);

        Ok(Self {
            chroms: Arc::new(chroms),
            by_name: Arc::new(by_name),
            size_prefix_sum: Arc::new(size_prefix_sum),
            longest_chrom_idx,
            chrom_with_longest_name_idx,
        })
    }

    /// Parse a two-column (name, size) tab-delimited file, teacher-style
    /// (comments and blank lines skipped, order preserved).
    pub fn from_chrom_sizes<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        let reader = BufReader::new(file);

        let mut names = Vec::new();
        let mut sizes = Vec::new();
        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(|e| Error::io(path.display().to_string(), e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let name = fields.next().ok_or_else(|| {
                Error::format(path.display().to_string(), format!("line {line_num}: missing chromosome name"))
            })?;
            let size: u32 = fields
                .next()
                .ok_or_else(|| {
                    Error::format(path.display().to_string(), format!("line {line_num}: missing chromosome size"))
                })?
                .parse()
                .map_err(|_| {
                    Error::format(path.display().to_string(), format!("line {line_num}: invalid chromosome size"))
                })?;
            names.push(name.to_string());
            sizes.push(size);
        }

        Self::new(&names, &sizes)
    }

    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chromosome> {
        self.chroms.iter()
    }

    pub fn find_by_id(&self, id: u32) -> Option<&Chromosome> {
        self.chroms.get(id as usize)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Chromosome> {
        self.by_name.get(name).map(|&idx| &self.chroms[idx])
    }

    pub fn at(&self, id: u32) -> Result<&Chromosome> {
        self.find_by_id(id)
            .ok_or_else(|| Error::out_of_range("reference", format!("no chromosome with id {id}")))
    }

    pub fn at_name(&self, name: &str) -> Result<&Chromosome> {
        self.find_by_name(name)
            .ok_or_else(|| Error::out_of_range("reference", format!("no chromosome named {name}")))
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get_id(&self, name: &str) -> Result<u32> {
        self.at_name(name).map(Chromosome::id)
    }

    /// Cumulative size prefix sum, length N+2 with `buff[N+1] == buff[N]+1`
    /// (mirrors `reference_impl.hpp`'s `compute_size_prefix_sum`, used so a
    /// caller can binary-search a genome-wide offset into a chromosome id).
    pub fn chrom_size_prefix_sum(&self) -> &[u64] {
        &self.size_prefix_sum
    }

    /// Longest chromosome, ties broken by lowest id; the synthetic ALL
    /// chromosome is excluded from consideration.
    pub fn longest_chromosome(&self) -> Result<&Chromosome> {
        self.longest_chrom_idx
            .map(|idx| &self.chroms[idx])
            .ok_or_else(|| Error::InvalidInput("reference has no chromosomes".into()))
    }

    /// Chromosome with the longest name, ties broken by lowest id.
    pub fn chromosome_with_longest_name(&self) -> Result<&Chromosome> {
        self.chrom_with_longest_name_idx
            .map(|idx| &self.chroms[idx])
            .ok_or_else(|| Error::InvalidInput("reference has no chromosomes".into()))
    }

    /// Returns a copy with a synthetic "All" chromosome of size
    /// `floor(sum(sizes) / scaling_factor)` prepended at id 0, shifting all
    /// other ids up by one. Any existing ALL chromosome is dropped first.
    pub fn add_all(&self, scaling_factor: u32) -> Result<Self> {
        if scaling_factor == 0 {
            return Err(Error::InvalidInput("scaling_factor must be nonzero".into()));
        }
        let without_all: Vec<Chromosome> = self
            .chroms
            .iter()
            .filter(|c| !c.is_all())
            .cloned()
            .collect();
        let total: u64 = without_all.iter().map(|c| c.size() as u64 / scaling_factor as u64).sum();
        let all = Chromosome::new(ALL_CHROM_ID, ALL_CHROM_NAME, total as u32);
        let mut chroms = vec![all];
        chroms.extend(without_all);
        Self::from_chromosomes(chroms)
    }

    /// Returns a copy without the synthetic ALL chromosome, if present.
    pub fn remove_all(&self) -> Result<Self> {
        let chroms: Vec<Chromosome> = self.chroms.iter().filter(|c| !c.is_all()).cloned().collect();
        Self::from_chromosomes(chroms)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.chroms == other.chroms
    }
}
impl Eq for Reference {}

fn compute_size_prefix_sum(chroms: &[Chromosome]) -> Vec<u64> {
    let mut buff = Vec::with_capacity(chroms.len() + 2);
    buff.push(0u64);
    let mut acc = 0u64;
    for c in chroms {
        acc += c.size() as u64;
        buff.push(acc);
    }
    buff.push(acc + 1);
    buff
}

fn find_extremal<F: Fn(&Chromosome) -> u64>(chroms: &[Chromosome], key: F) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (idx, c) in chroms.iter().enumerate() {
        if c.is_all() {
            continue;
        }
        let k = key(c);
        match best {
            Some((_, best_k)) if best_k >= k => {}
            _ => best = Some((idx, k)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reference {
        Reference::new(&["chr1", "chr2", "chr10"], &[1000, 500, 2000]).unwrap()
    }

    #[test]
    fn preserves_input_order_and_dense_ids() {
        let r = sample();
        assert_eq!(r.at(0).unwrap().name(), "chr1");
        assert_eq!(r.at(1).unwrap().name(), "chr2");
        assert_eq!(r.at(2).unwrap().name(), "chr10");
    }

    #[test]
    fn find_by_name_and_id_agree() {
        let r = sample();
        let by_name = r.at_name("chr2").unwrap();
        let by_id = r.at(1).unwrap();
        assert_eq!(by_name, by_id);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Reference::new(&["chr1", "chr1"], &[10, 20]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_zero_sized_chromosome() {
        let err = Reference::new(&["chr1"], &[0]);
        assert!(err.is_err());
    }

    #[test]
    fn longest_chromosome_ties_broken_by_lowest_id() {
        let r = Reference::new(&["chrA", "chrB"], &[100, 100]).unwrap();
        assert_eq!(r.longest_chromosome().unwrap().id(), 0);
    }

    #[test]
    fn add_all_then_remove_all_is_identity() {
        let r = sample();
        let round_tripped = r.add_all(1).unwrap().remove_all().unwrap();
        assert_eq!(round_tripped, r);
    }

    #[test]
    fn add_all_size_is_scaled_sum() {
        let r = sample();
        let with_all = r.add_all(1).unwrap();
        let all = with_all.at(0).unwrap();
        assert!(all.is_all());
        assert_eq!(all.size() as u64, 1000 + 500 + 2000);
    }
}
