//! GenomicInterval: a half-open range anchored to a [`Chromosome`], parsed
//! from UCSC (`chr:start-end`) or BED (tab-separated) range strings.
//!
//! Grounded on the teacher's `interval.rs` `Interval`/`Ord` shape, adapted
//! to carry a `Chromosome` (with its size bound) rather than a bare string,
//! per spec §3.

use std::cmp::Ordering;
use std::fmt;

use crate::chromosome::Chromosome;
use crate::error::{Error, Result};

/// (chrom, start, end) with `start < end <= chrom.size()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicInterval {
    chrom: Chromosome,
    start: u32,
    end: u32,
}

impl GenomicInterval {
    pub fn new(chrom: Chromosome, start: u32, end: u32) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidInput(format!(
                "interval start ({start}) must be < end ({end})"
            )));
        }
        if end > chrom.size() {
            return Err(Error::InvalidInput(format!(
                "interval end ({end}) exceeds chromosome {} size ({})",
                chrom.name(),
                chrom.size()
            )));
        }
        Ok(Self { chrom, start, end })
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

    /// Parse a UCSC-style range string: `chr:start-end`, with optional comma
    /// thousands separators (`chr1:1,000-2,000`), or a bare chromosome name
    /// meaning the whole chromosome.
    pub fn parse_ucsc(s: &str, chrom: Chromosome) -> Result<Self> {
        let (name_part, range_part) = match s.split_once(':') {
            Some((name, range)) => (name, Some(range)),
            None => (s, None),
        };
        if name_part != chrom.name() {
            return Err(Error::InvalidInput(format!(
                "query chromosome '{name_part}' does not match '{}'",
                chrom.name()
            )));
        }

        match range_part {
            None => Self::new(chrom.clone(), 0, chrom.size()),
            Some(range) => {
                let (start_s, end_s) = range.split_once('-').ok_or_else(|| {
                    Error::InvalidInput(format!("malformed UCSC range: '{s}'"))
                })?;
                let start = parse_ucsc_number(start_s)?;
                let end = parse_ucsc_number(end_s)?;
                Self::new(chrom, start, end)
            }
        }
    }

    /// Parse a BED-style triplet: three tab-separated fields
    /// `chrom\tstart\tend`.
    pub fn parse_bed(s: &str, chrom: Chromosome) -> Result<Self> {
        let mut fields = s.split('\t');
        let name = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("malformed BED interval: '{s}'")))?;
        if name != chrom.name() {
            return Err(Error::InvalidInput(format!(
                "query chromosome '{name}' does not match '{}'",
                chrom.name()
            )));
        }
        let start: u32 = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("malformed BED interval: '{s}'")))?
            .parse()
            .map_err(|_| Error::InvalidInput(format!("malformed BED start in '{s}'")))?;
        let end: u32 = fields
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("malformed BED interval: '{s}'")))?
            .parse()
            .map_err(|_| Error::InvalidInput(format!("malformed BED end in '{s}'")))?;
        Self::new(chrom, start, end)
    }
}

fn parse_ucsc_number(s: &str) -> Result<u32> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse()
        .map_err(|_| Error::InvalidInput(format!("malformed UCSC coordinate: '{s}'")))
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom.name(), self.start, self.end)
    }
}

impl PartialOrd for GenomicInterval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GenomicInterval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .id()
            .cmp(&other.chrom.id())
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chr1() -> Chromosome {
        Chromosome::new(0, "chr1", 248_956_422)
    }

    #[test]
    fn parses_ucsc_with_commas() {
        let iv = GenomicInterval::parse_ucsc("chr1:1,000-2,000", chr1()).unwrap();
        assert_eq!(iv.start(), 1000);
        assert_eq!(iv.end(), 2000);
    }

    #[test]
    fn parses_bare_chromosome_as_whole_range() {
        let iv = GenomicInterval::parse_ucsc("chr1", chr1()).unwrap();
        assert_eq!(iv.start(), 0);
        assert_eq!(iv.end(), chr1().size());
    }

    #[test]
    fn parses_bed_triplet() {
        let iv = GenomicInterval::parse_bed("chr1\t100\t200", chr1()).unwrap();
        assert_eq!((iv.start(), iv.end()), (100, 200));
    }

    #[test]
    fn rejects_end_past_chromosome_size() {
        assert!(GenomicInterval::new(chr1(), 0, chr1().size() + 1).is_err());
    }

    #[test]
    fn ordering_is_chrom_then_start_then_end() {
        let a = GenomicInterval::new(chr1(), 0, 100).unwrap();
        let b = GenomicInterval::new(chr1(), 50, 150).unwrap();
        assert!(a < b);
    }
}
