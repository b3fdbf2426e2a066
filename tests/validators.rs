//! Validators record structural defects instead of panicking, for both
//! storage engines.

use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use hicmat::chromosome::Reference;
use hicmat::config::CacheConfig;
use hicmat::cool::{validate::validate_structure, CoolFile};
use hicmat::hic::{validate, HicFile};

#[test]
fn cool_validator_accepts_a_freshly_finalized_file() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    let reference = Reference::new(&["chr1"], &[10_000]).unwrap();
    {
        let mut writer = CoolFile::create_new(path, reference, 1000, true).unwrap();
        writer.finalize().unwrap();
    }
    let reader = CoolFile::open_read_only(path, CacheConfig::default(), false).unwrap();
    assert!(validate_structure(&reader).is_ok());
}

#[test]
fn hic_validator_rejects_a_file_truncated_mid_block() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let reference = Arc::new(Reference::new(&["chr1"], &[10_000]).unwrap());
    {
        let mut writer = HicFile::create_new(tmp.path(), reference, vec![1000], "hg00", BTreeMap::new()).unwrap();
        writer.append_pixel(1000, 0, 0, 0, 1, 2.0).unwrap();
        writer.append_pixel(1000, 0, 0, 2, 5, 3.0).unwrap();
        writer.finalize().unwrap();
    }

    // Corrupt the file by truncating it to half its length, guaranteed to
    // land inside the matrix body or footer.
    let len = std::fs::metadata(tmp.path()).unwrap().len();
    {
        let mut f = std::fs::OpenOptions::new().write(true).open(tmp.path()).unwrap();
        f.seek(SeekFrom::Start(len / 2)).unwrap();
        f.set_len(len / 2).unwrap();
        f.flush().unwrap();
    }

    let report = validate(tmp.path());
    assert!(!report.is_valid, "truncated file should fail validation");
    assert!(!report.messages.is_empty());
}
