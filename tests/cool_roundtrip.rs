//! End-to-end Cool writer/reader scenarios: empty matrix, diagonal-only
//! matrix, and a trans (inter-chromosomal) query.

use hicmat::chromosome::Reference;
use hicmat::config::CacheConfig;
use hicmat::cool::{CoolFile, Query};
use hicmat::pixel::ThinPixel;

fn two_chrom_reference() -> Reference {
    Reference::new(&["chr1", "chr2"], &[1_000, 800]).unwrap()
}

#[test]
fn empty_cool_file_round_trips_with_zero_pixels() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    {
        let mut writer = CoolFile::create_new(path, two_chrom_reference(), 100, true).unwrap();
        writer.finalize().unwrap();
    }

    let reader = CoolFile::open_read_only(path, CacheConfig::default(), true).unwrap();
    assert_eq!(reader.nnz(), 0);
    assert_eq!(reader.sum(), 0.0);
    let pixels = reader.fetch(None, None).unwrap();
    assert!(pixels.is_empty());
}

#[test]
fn diagonal_only_matrix_round_trips_every_pixel() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    let pixels: Vec<ThinPixel<f64>> = (0..10).map(|i| ThinPixel::new(i, i, (i + 1) as f64)).collect();

    {
        let mut writer = CoolFile::create_new(path, two_chrom_reference(), 100, true).unwrap();
        writer.append_pixels(&pixels).unwrap();
        writer.finalize().unwrap();
    }

    let reader = CoolFile::open_read_only(path, CacheConfig::default(), true).unwrap();
    assert_eq!(reader.nnz(), 10);
    let fetched = reader.fetch(None, None).unwrap();
    assert_eq!(fetched.len(), 10);
    for (expected, actual) in pixels.iter().zip(fetched.iter()) {
        assert_eq!(expected.bin1_id, actual.bin1_id);
        assert_eq!(expected.bin2_id, actual.bin2_id);
        assert_eq!(expected.count, actual.count);
    }
}

#[test]
fn multi_pixel_first_row_keeps_its_leading_pixel() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    // Row 0 holds more than one pixel; bin1_offset[0] must stay 0 rather
    // than drift to the offset of (0, 10).
    let pixels = vec![
        ThinPixel::new(0, 0, 1.0),
        ThinPixel::new(0, 5, 2.0),
        ThinPixel::new(0, 10, 3.0),
        ThinPixel::new(1, 1, 4.0),
    ];

    {
        let mut writer = CoolFile::create_new(path, two_chrom_reference(), 100, true).unwrap();
        writer.append_pixels(&pixels).unwrap();
        writer.finalize().unwrap();
    }

    let reader = CoolFile::open_read_only(path, CacheConfig::default(), true).unwrap();
    let fetched = reader.fetch(None, None).unwrap();
    let fetched: Vec<(u64, u64, f64)> = fetched.iter().map(|p| (p.bin1_id, p.bin2_id, p.count)).collect();
    assert_eq!(fetched, vec![(0, 0, 1.0), (0, 5, 2.0), (0, 10, 3.0), (1, 1, 4.0)]);
}

#[test]
fn fetch_applies_multiplicative_and_divisive_balancing() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    let pixels = vec![ThinPixel::new(0, 0, 10.0), ThinPixel::new(0, 1, 10.0)];
    let weights = vec![2.0, 0.5];

    {
        let mut writer = CoolFile::create_new(path, two_chrom_reference(), 100, true).unwrap();
        writer.append_pixels(&pixels).unwrap();
        writer.write_weights("weight", &weights, false, false).unwrap();
        writer.write_weights("vc", &weights, false, true).unwrap();
        writer.finalize().unwrap();
    }

    let reader = CoolFile::open_read_only(path, CacheConfig::default(), true).unwrap();

    let raw = reader.fetch(None, None).unwrap();
    assert_eq!(raw[0].count, 10.0);
    assert_eq!(raw[1].count, 10.0);

    let balanced = reader.fetch(None, Some("weight")).unwrap();
    assert_eq!(balanced[0].count, 2.0 * 2.0 * 10.0);
    assert_eq!(balanced[1].count, 2.0 * 0.5 * 10.0);

    let divided = reader.fetch(None, Some("vc")).unwrap();
    assert_eq!(divided[0].count, 10.0 / (2.0 * 2.0));
    assert_eq!(divided[1].count, 10.0 / (2.0 * 0.5));
}

#[test]
fn group_path_uri_reads_and_writes_the_named_subgroup_not_the_root() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();
    let uri = format!("{path}::/resolutions/1000");

    let pixels: Vec<ThinPixel<f64>> = vec![ThinPixel::new(0, 0, 1.0), ThinPixel::new(0, 1, 2.0)];
    {
        let mut writer = CoolFile::create_new(&uri, two_chrom_reference(), 1000, true).unwrap();
        writer.append_pixels(&pixels).unwrap();
        writer.finalize().unwrap();
    }

    // The root of the HDF5 file carries none of the Cooler groups or
    // attributes; only the resolutions/1000 subgroup does.
    assert!(CoolFile::open_read_only(path, CacheConfig::default(), false).is_err());

    let reader = CoolFile::open_read_only(&uri, CacheConfig::default(), true).unwrap();
    assert_eq!(reader.nnz(), 2);
    let fetched = reader.fetch(None, None).unwrap();
    assert_eq!(fetched.len(), 2);
}

#[test]
fn trans_query_returns_only_the_requested_rectangle() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_str().unwrap();

    // chr1 has 10 bins at resolution 100, chr2 starts at bin 10.
    let pixels = vec![
        ThinPixel::new(0, 0, 1.0),
        ThinPixel::new(0, 10, 2.0), // chr1 x chr2, a trans pixel
        ThinPixel::new(5, 11, 3.0),
        ThinPixel::new(10, 10, 4.0), // chr2 x chr2, should be excluded
    ];

    {
        let mut writer = CoolFile::create_new(path, two_chrom_reference(), 100, true).unwrap();
        writer.append_pixels(&pixels).unwrap();
        writer.finalize().unwrap();
    }

    let reader = CoolFile::open_read_only(path, CacheConfig::default(), true).unwrap();
    let trans_query = Query { bin1_lo: 0, bin1_hi: 10, bin2_lo: 10, bin2_hi: reader.bin_table().size() };
    let fetched = reader.fetch(Some(trans_query), None).unwrap();
    assert_eq!(fetched.len(), 2);
    assert!(fetched.iter().all(|p| p.bin1_id < 10 && p.bin2_id >= 10));
}
