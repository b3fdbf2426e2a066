//! In-memory representation of a single HIC block and its on-disk encoding
//! (spec §4.11).
//!
//! Grounded on
//! `examples/original_source/src/libhictk/hic/include/hictk/hic/file_writer_data_structures.hpp`
//! and its `impl/file_writer_data_structures_impl.hpp`: pixels are grouped
//! by `bin2` (the on-disk "row"), sorted by `bin1` (the on-disk "column")
//! within each group, and the whole record is zlib-compressed. `bin1`/`bin2`
//! here are relative ids within the chromosome pair, matching the
//! original's `rel_id()`.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result, WithUri};
use crate::pixel::ThinPixel;

/// One decoded interaction block: relative-bin1/bin2 pixels grouped by
/// bin2 then sorted by bin1, matching how they are serialized.
#[derive(Debug, Clone, Default)]
pub struct MatrixInteractionBlock {
    rows: BTreeMap<i32, Vec<(i32, f32)>>,
    bin_row_offset: i32,
    bin_column_offset: i32,
    n_records: i32,
}

impl MatrixInteractionBlock {
    pub fn new() -> Self {
        Self { rows: BTreeMap::new(), bin_row_offset: i32::MAX, bin_column_offset: i32::MAX, n_records: 0 }
    }

    pub fn from_pixels(pixels: impl IntoIterator<Item = ThinPixel<f32>>, rel_bin1: impl Fn(u64) -> i32, rel_bin2: impl Fn(u64) -> i32) -> Self {
        let mut block = Self::new();
        for p in pixels {
            block.push(rel_bin1(p.bin1_id), rel_bin2(p.bin2_id), p.count);
        }
        block.finalize();
        block
    }

    pub fn push(&mut self, rel_bin1: i32, rel_bin2: i32, count: f32) {
        self.n_records += 1;
        self.bin_row_offset = self.bin_row_offset.min(rel_bin2);
        self.bin_column_offset = self.bin_column_offset.min(rel_bin1);
        self.rows.entry(rel_bin2).or_default().push((rel_bin1, count));
    }

    /// Sort each row by relative bin1. Call once after all pixels are pushed.
    pub fn finalize(&mut self) {
        for row in self.rows.values_mut() {
            row.sort_by_key(|(bin1, _)| *bin1);
        }
    }

    pub fn n_records(&self) -> i32 {
        self.n_records
    }

    pub fn is_empty(&self) -> bool {
        self.n_records == 0
    }

    /// Serialize the uncompressed record, then zlib-compress it, returning
    /// the compressed bytes ready to be written at a block's file offset.
    pub fn encode(&self, uri: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_i32::<BigEndian>(self.n_records).with_uri(uri)?;
        buf.write_i32::<BigEndian>(self.bin_column_offset).with_uri(uri)?;
        buf.write_i32::<BigEndian>(self.bin_row_offset).with_uri(uri)?;
        buf.write_u8(1).with_uri(uri)?; // useFloatContact
        buf.write_u8(0).with_uri(uri)?; // useIntXPos (bins, not positions)
        buf.write_u8(0).with_uri(uri)?; // useIntYPos
        buf.write_u8(1).with_uri(uri)?; // matrixRepresentation: list-of-rows

        buf.write_i32::<BigEndian>(self.rows.len() as i32).with_uri(uri)?;
        for (&rel_bin2, pixels) in &self.rows {
            let row_number = rel_bin2 - self.bin_row_offset;
            buf.write_i32::<BigEndian>(row_number).with_uri(uri)?;
            buf.write_i32::<BigEndian>(pixels.len() as i32).with_uri(uri)?;
            for &(rel_bin1, count) in pixels {
                let column = rel_bin1 - self.bin_column_offset;
                buf.write_i32::<BigEndian>(column).with_uri(uri)?;
                buf.write_f32::<BigEndian>(count).with_uri(uri)?;
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&buf).with_uri(uri)?;
        encoder.finish().with_uri(uri)
    }

    /// Inverse of [`encode`](Self::encode): zlib-decompress then parse the
    /// row-grouped layout back into absolute-bin pixels via the supplied
    /// relative-to-absolute id mappers.
    pub fn decode(
        compressed: &[u8],
        uri: &str,
        abs_bin1: impl Fn(i32) -> u64,
        abs_bin2: impl Fn(i32) -> u64,
    ) -> Result<Vec<ThinPixel<f32>>> {
        let mut decoder = ZlibDecoder::new(compressed);
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf).with_uri(uri)?;
        let mut cursor = std::io::Cursor::new(buf);

        let n_records = cursor.read_i32::<BigEndian>().with_uri(uri)?;
        let bin_column_offset = cursor.read_i32::<BigEndian>().with_uri(uri)?;
        let bin_row_offset = cursor.read_i32::<BigEndian>().with_uri(uri)?;
        let _use_float_contact = cursor.read_u8().with_uri(uri)?;
        let _use_int_x_pos = cursor.read_u8().with_uri(uri)?;
        let _use_int_y_pos = cursor.read_u8().with_uri(uri)?;
        let representation = cursor.read_u8().with_uri(uri)?;
        if representation != 1 {
            return Err(Error::Unsupported(format!("block matrix representation {representation} is not supported")));
        }

        let row_count = cursor.read_i32::<BigEndian>().with_uri(uri)?;
        let mut pixels = Vec::with_capacity(n_records.max(0) as usize);
        for _ in 0..row_count {
            let row_number = cursor.read_i32::<BigEndian>().with_uri(uri)?;
            let record_count = cursor.read_i32::<BigEndian>().with_uri(uri)?;
            let rel_bin2 = row_number + bin_row_offset;
            for _ in 0..record_count {
                let column = cursor.read_i32::<BigEndian>().with_uri(uri)?;
                let count = cursor.read_f32::<BigEndian>().with_uri(uri)?;
                let rel_bin1 = column + bin_column_offset;
                pixels.push(ThinPixel { bin1_id: abs_bin1(rel_bin1), bin2_id: abs_bin2(rel_bin2), count });
            }
        }
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips_pixels() {
        let mut block = MatrixInteractionBlock::new();
        block.push(0, 0, 1.0);
        block.push(2, 0, 2.0);
        block.push(1, 3, 3.0);
        block.finalize();

        let encoded = block.encode("test").unwrap();
        let decoded = MatrixInteractionBlock::decode(&encoded, "test", |x| x as u64, |y| y as u64).unwrap();

        let mut pairs: Vec<(u64, u64, f32)> = decoded.iter().map(|p| (p.bin1_id, p.bin2_id, p.count)).collect();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 0, 1.0), (1, 3, 3.0), (2, 0, 2.0)]);
    }

    #[test]
    fn rows_are_sorted_by_relative_bin1_after_finalize() {
        let mut block = MatrixInteractionBlock::new();
        block.push(5, 0, 1.0);
        block.push(1, 0, 2.0);
        block.finalize();
        let row = &block.rows[&0];
        assert_eq!(row.iter().map(|(b, _)| *b).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn empty_block_has_zero_records() {
        let block = MatrixInteractionBlock::new();
        assert!(block.is_empty());
    }
}
