//! HIC validator: magic, version, and block locatability/decompressibility
//! (spec §4.14 part 2).

use crate::hic::file::{HicFile, MIN_SUPPORTED_VERSION};
use crate::pixel::ThinPixel;

/// Structured result of validating a HIC file, mirroring the Cool
/// validator's report shape (spec §7: validators record rather than
/// throw for structural defects).
#[derive(Debug, Clone, Default)]
pub struct HicValidationReport {
    pub is_valid: bool,
    pub messages: Vec<String>,
}

impl HicValidationReport {
    fn fail(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.messages.push(message.into());
    }
}

/// Open the file, check its version, and attempt to locate and
/// decompress every block for every chromosome pair at every resolution.
pub fn validate(path: impl AsRef<std::path::Path>) -> HicValidationReport {
    let mut report = HicValidationReport { is_valid: true, messages: Vec::new() };

    let mut file = match HicFile::open_read_only(&path) {
        Ok(f) => f,
        Err(e) => {
            report.fail(format!("failed to open: {e}"));
            return report;
        }
    };

    if file.version() < MIN_SUPPORTED_VERSION {
        report.fail(format!("version {} is below the supported minimum {MIN_SUPPORTED_VERSION}", file.version()));
    }

    let chrom_ids: Vec<u32> = file.reference().iter().map(|c| c.id()).collect();
    let resolutions = file.resolutions().to_vec();

    for &resolution in &resolutions {
        for &c1 in &chrom_ids {
            for &c2 in &chrom_ids {
                if c1 > c2 {
                    continue;
                }
                let descriptors: Vec<_> = match file.block_index(resolution, c1, c2) {
                    Ok(idx) => idx.iter().copied().collect(),
                    Err(_) => continue, // no matrix body for this pair: nothing to validate
                };
                for descriptor in &descriptors {
                    let decoded: Result<Vec<ThinPixel<f32>>, _> = file.read_block(path.as_ref().to_str().unwrap_or(""), descriptor, 0, 0);
                    if let Err(e) = decoded {
                        report.fail(format!("block {} for pair ({c1}, {c2}) @ {resolution}bp failed to decompress: {e}", descriptor.id));
                    }
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::Reference;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn rejects_file_missing_magic() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a hic file").unwrap();
        let report = validate(tmp.path());
        assert!(!report.is_valid);
    }

    #[test]
    fn accepts_well_formed_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let reference = Arc::new(Reference::new(&["chr1"], &[10_000]).unwrap());
        {
            let mut writer = super::super::file::HicFile::create_new(tmp.path(), reference, vec![1000], "hg00", BTreeMap::new()).unwrap();
            writer.append_pixel(1000, 0, 0, 0, 0, 1.0).unwrap();
            writer.finalize().unwrap();
        }
        let report = validate(tmp.path());
        assert!(report.is_valid, "{:?}", report.messages);
    }
}
