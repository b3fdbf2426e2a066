//! Cool File: assembles/validates a Cool HDF5 group, exposing `fetch()`
//! and `append_pixels()` over the mandatory groups and datasets of spec §3
//! (spec §4.8).
//!
//! Grounded on `examples/original_source/src/cooler/file_write_impl.hpp`'s
//! `append_pixels` (validate, update index, accumulate sum/cis_sum while
//! writing) and on the teacher's `BedError`/`Result` idiom in `bed.rs` for
//! the public surface shape.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bintable::BinTable;
use crate::chromosome::Reference;
use crate::config::CacheConfig;
use crate::cool::dataset::Dataset;
use crate::cool::index::Index;
use crate::cool::pixel_selector::{Balancing, PixelSelector, Query};
use crate::error::{Error, Result};
use crate::pixel::ThinPixel;

/// Sentinel `format-version` value written while the file is being created
/// (spec §3, "Sentinel-during-write protocol").
const FORMAT_VERSION_SENTINEL: i64 = -1;
const LIBRARY_TAG: &str = "hicmat";

/// Lifecycle state of a [`CoolFile`] handle (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    ReadOnly,
    Writable,
    Finalized,
    Closed,
}

/// A single-resolution Cool file handle.
pub struct CoolFile {
    uri: String,
    h5: hdf5::File,
    /// The HDF5 group this handle's `chroms`/`bins`/`pixels`/`indexes` live
    /// under: the file root for a plain `.cool` file, or the
    /// `resolutions/<R>` / `cells/<name>` subgroup named by the URI's
    /// `::/group-path` suffix (spec §4.8, "URI grammar").
    root: hdf5::Group,
    reference: Arc<Reference>,
    bin_table: Arc<BinTable>,
    index: Index,
    cache: CacheConfig,
    state: FileState,
    nnz: u64,
    sum: f64,
    cis_sum: f64,
    last_bin1: Option<u64>,
}

impl CoolFile {
    /// Parse `"<path>::/<group-path>"`, returning the filesystem path and
    /// the (possibly empty) group path (spec §4.8, "URI grammar").
    pub fn parse_uri(uri: &str) -> (&str, &str) {
        match uri.split_once("::") {
            Some((path, group)) => (path, group.trim_start_matches('/')),
            None => (uri, ""),
        }
    }

    /// Open an existing Cool group read-only.
    pub fn open_read_only(uri: &str, cache: CacheConfig, validate: bool) -> Result<Self> {
        let (path, group) = Self::parse_uri(uri);
        let h5 = hdf5::File::open(path).map_err(|e| Error::io(uri, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let root = open_group(&h5, group, uri)?;

        let format_version = read_i64_attr(&root, "format-version", uri)?;
        if format_version == FORMAT_VERSION_SENTINEL {
            let generated_by = read_str_attr(&root, "generated-by", uri).unwrap_or_default();
            if generated_by.contains(LIBRARY_TAG) {
                return Err(Error::corruption(uri, "file was not properly closed by a previous writer"));
            }
        }

        let reference = read_reference(&root, uri)?;
        let bin_table = read_bin_table(&root, reference.clone(), uri)?;
        let index = read_index(&root, uri)?;

        let nnz = index.nnz();
        let mut file = Self {
            uri: uri.to_string(),
            h5,
            root,
            reference: Arc::new(reference),
            bin_table: Arc::new(bin_table),
            index,
            cache,
            state: FileState::ReadOnly,
            nnz,
            sum: 0.0,
            cis_sum: 0.0,
            last_bin1: None,
        };

        if validate {
            crate::cool::validate::validate_structure(&file)?;
        }
        file.state = FileState::ReadOnly;
        Ok(file)
    }

    /// Create a new, empty single-resolution Cool file (or Cool group, if
    /// `uri` carries a `::/group-path` suffix).
    pub fn create_new(uri: &str, reference: Reference, resolution: u32, overwrite: bool) -> Result<Self> {
        let (path, group) = Self::parse_uri(uri);
        let fs_path: &Path = Path::new(path);
        if group.is_empty() && fs_path.exists() && !overwrite {
            return Err(Error::InvalidInput(format!("{} already exists", fs_path.display())));
        }
        let h5 = if fs_path.exists() {
            hdf5::File::append(fs_path)
        } else {
            hdf5::File::create(fs_path)
        }
        .map_err(|e| Error::io(uri, std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let root = create_group(&h5, group, uri)?;

        write_str_attr(&root, "format", "HDF5::Cooler")?;
        write_i64_attr(&root, "format-version", FORMAT_VERSION_SENTINEL)?;
        write_i64_attr(&root, "bin-size", resolution as i64)?;
        write_str_attr(&root, "bin-type", "fixed")?;
        write_str_attr(&root, "generated-by", LIBRARY_TAG)?;

        let bin_table = BinTable::fixed(reference.clone(), resolution)?;
        create_groups_and_datasets(&root, &reference, &bin_table, uri)?;

        let index = Index::new_writer(bin_table.size());

        Ok(Self {
            uri: uri.to_string(),
            h5,
            root,
            reference: Arc::new(reference),
            bin_table: Arc::new(bin_table),
            index,
            cache: CacheConfig::default(),
            state: FileState::Writable,
            nnz: 0,
            sum: 0.0,
            cis_sum: 0.0,
            last_bin1: None,
        })
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn bin_table(&self) -> &BinTable {
        &self.bin_table
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn cis_sum(&self) -> f64 {
        self.cis_sum
    }

    fn open_column_datasets(&self) -> Result<(Dataset<i64>, Dataset<i64>, Dataset<f64>)> {
        let bin1 = self
            .root
            .dataset("pixels/bin1_id")
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        let bin2 = self
            .root
            .dataset("pixels/bin2_id")
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        let count = self
            .root
            .dataset("pixels/count")
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        Ok((
            Dataset::open(self.uri.clone(), bin1, self.cache)?,
            Dataset::open(self.uri.clone(), bin2, self.cache)?,
            Dataset::open(self.uri.clone(), count, self.cache)?,
        ))
    }

    /// Read a named `bins/<name>` weight vector, for use with [`Self::fetch`].
    fn read_weights(&self, name: &str) -> Result<(Vec<f64>, bool)> {
        let ds = self
            .root
            .dataset(&format!("bins/{name}"))
            .map_err(|e| Error::format(&self.uri, format!("missing weight dataset 'bins/{name}': {e}")))?;
        let values = ds
            .read_1d::<f64>()
            .map_err(|e| Error::format(&self.uri, e.to_string()))?
            .iter()
            .copied()
            .collect();
        let divisive = ds
            .attr("divisive_weights")
            .and_then(|a| a.read_scalar::<bool>())
            .unwrap_or(false);
        Ok((values, divisive))
    }

    /// Stream every pixel of the whole matrix, or of a rectangular query
    /// if `query` is given, optionally applying a named `bins/<name>`
    /// balancing weight vector (spec §4.7, §4.8).
    pub fn fetch(&self, query: Option<Query>, weight_name: Option<&str>) -> Result<Vec<ThinPixel<f64>>> {
        if self.state != FileState::ReadOnly && self.state != FileState::Finalized {
            return Err(Error::InvalidInput("fetch requires a read-only or finalized file".into()));
        }
        let (mut bin1_ds, mut bin2_ds, mut count_ds) = self.open_column_datasets()?;
        let query = query.unwrap_or_else(|| Query::whole_matrix(&self.bin_table));
        let weights = weight_name.map(|name| self.read_weights(name)).transpose()?;
        let balancing = match &weights {
            None => Balancing::None,
            Some((values, false)) => Balancing::Multiplicative(values.as_slice()),
            Some((values, true)) => Balancing::Divisive(values.as_slice()),
        };
        let selector = PixelSelector::new(&self.index, &mut bin1_ds, &mut bin2_ds, &mut count_ds, query, balancing)?;
        selector.collect()
    }

    /// Append pixels, which must arrive in strictly increasing lexicographic
    /// `(bin1_id, bin2_id)` order with no zero counts (spec §4.8).
    pub fn append_pixels(&mut self, pixels: &[ThinPixel<f64>]) -> Result<()> {
        if self.state != FileState::Writable {
            return Err(Error::InvalidInput("append_pixels requires a writable file".into()));
        }
        let mut prev: Option<(u64, u64)> = None;
        for p in pixels {
            if p.bin1_id > p.bin2_id {
                return Err(Error::Corruption { uri: self.uri.clone(), message: format!("bin1_id ({}) > bin2_id ({})", p.bin1_id, p.bin2_id) });
            }
            if p.count == 0.0 {
                return Err(Error::Corruption { uri: self.uri.clone(), message: "zero-count pixel".into() });
            }
            if let Some(prev) = prev {
                if (prev.0, prev.1) >= (p.bin1_id, p.bin2_id) {
                    return Err(Error::InvalidInput("pixels must be in strictly increasing lexicographic order".into()));
                }
            }
            prev = Some((p.bin1_id, p.bin2_id));
        }

        let (mut bin1_ds, mut bin2_ds, mut count_ds) = self.open_column_datasets()?;
        let start = self.nnz;
        bin1_ds.append(pixels.iter(), |p| p.bin1_id as i64)?;
        bin2_ds.append(pixels.iter(), |p| p.bin2_id as i64)?;
        count_ds.append(pixels.iter(), |p| p.count)?;

        for (i, p) in pixels.iter().enumerate() {
            let row = p.bin1_id;
            if self.last_bin1 != Some(row) {
                self.index.set_offset_by_bin_id(row, start + i as u64)?;
                self.last_bin1 = Some(row);
            }
            self.sum += p.count;
            let bin1 = self.bin_table.at(p.bin1_id)?;
            let bin2 = self.bin_table.at(p.bin2_id)?;
            if bin1.chrom().id() == bin2.chrom().id() {
                self.cis_sum += p.count;
            }
        }
        self.nnz = start + pixels.len() as u64;
        Ok(())
    }

    /// Store a balancing weight vector under `bins/<name>`.
    pub fn write_weights(&mut self, name: &str, values: &[f64], overwrite: bool, divisive: bool) -> Result<()> {
        if self.state != FileState::Writable {
            return Err(Error::InvalidInput("write_weights requires a writable file".into()));
        }
        let path = format!("bins/{name}");
        if self.root.dataset(&path).is_ok() && !overwrite {
            return Err(Error::InvalidInput(format!("dataset {path} already exists")));
        }
        let ds = self
            .root
            .group("bins")
            .map_err(|e| Error::format(&self.uri, e.to_string()))?
            .new_dataset::<f64>()
            .shape(values.len())
            .create(name.as_ref() as &str)
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        ds.write(values).map_err(|e| Error::format(&self.uri, e.to_string()))?;
        ds.new_attr::<bool>()
            .create("divisive_weights")
            .and_then(|a| a.write_scalar(&divisive))
            .map_err(|e| Error::format(&self.uri, e.to_string()))?;
        Ok(())
    }

    /// Flush chromosomes, bin table, index, and attributes, clearing the
    /// sentinel `format-version`. Must be called on every writer path
    /// before drop; the destructor calls this and only logs failures.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state != FileState::Writable {
            return Ok(());
        }
        self.index.finalize(self.nnz);
        write_offsets(&self.root, "indexes/bin1_offset", self.index.as_slice(), &self.uri)?;

        let mut index_copy = self.index.clone();
        let chrom_offsets = index_copy.compute_chrom_offsets(&self.bin_table)?.to_vec();
        write_offsets(&self.root, "indexes/chrom_offset", &chrom_offsets, &self.uri)?;

        write_i64_attr(&self.root, "nnz", self.nnz as i64)?;
        write_f64_attr(&self.root, "sum", self.sum)?;
        write_f64_attr(&self.root, "cis", self.cis_sum)?;
        write_i64_attr(&self.root, "format-version", 3)?;

        self.state = FileState::Finalized;
        Ok(())
    }
}

impl Drop for CoolFile {
    fn drop(&mut self) {
        if self.state == FileState::Writable {
            if let Err(e) = self.finalize() {
                tracing::error!(uri = %self.uri, error = %e, "failed to finalize Cool file on drop");
            }
        }
        self.state = FileState::Closed;
    }
}

/// Resolve the group an already-parsed `::/group-path` URI suffix names,
/// or the file root when the URI has none (spec §4.8, "URI grammar").
fn open_group(h5: &hdf5::File, group_path: &str, uri: &str) -> Result<hdf5::Group> {
    let path = if group_path.is_empty() { "/" } else { group_path };
    h5.group(path).map_err(|e| Error::format(uri, format!("missing group '{path}': {e}")))
}

/// Like [`open_group`], but creates the group (and any missing
/// intermediate groups) if it does not already exist.
fn create_group(h5: &hdf5::File, group_path: &str, uri: &str) -> Result<hdf5::Group> {
    if group_path.is_empty() {
        h5.group("/").map_err(|e| Error::format(uri, e.to_string()))
    } else {
        h5.create_group(group_path).map_err(|e| Error::format(uri, e.to_string()))
    }
}

fn read_i64_attr(group: &hdf5::Group, name: &str, uri: &str) -> Result<i64> {
    group
        .attr(name)
        .and_then(|a| a.read_scalar::<i64>())
        .map_err(|e| Error::format(uri, format!("missing or invalid attribute '{name}': {e}")))
}

fn read_str_attr(group: &hdf5::Group, name: &str, uri: &str) -> Result<String> {
    group
        .attr(name)
        .and_then(|a| a.read_scalar::<hdf5::types::VarLenUnicode>())
        .map(|s| s.to_string())
        .map_err(|e| Error::format(uri, format!("missing or invalid attribute '{name}': {e}")))
}

fn write_str_attr(group: &hdf5::Group, name: &str, value: &str) -> Result<()> {
    let v: hdf5::types::VarLenUnicode = value.parse().unwrap();
    group
        .new_attr::<hdf5::types::VarLenUnicode>()
        .create(name)
        .and_then(|a| a.write_scalar(&v))
        .map_err(|e| Error::format("cool file", e.to_string()))
}

fn write_i64_attr(group: &hdf5::Group, name: &str, value: i64) -> Result<()> {
    group
        .new_attr::<i64>()
        .create(name)
        .and_then(|a| a.write_scalar(&value))
        .map_err(|e| Error::format("cool file", e.to_string()))
}

fn write_f64_attr(group: &hdf5::Group, name: &str, value: f64) -> Result<()> {
    group
        .new_attr::<f64>()
        .create(name)
        .and_then(|a| a.write_scalar(&value))
        .map_err(|e| Error::format("cool file", e.to_string()))
}

fn write_offsets(group: &hdf5::Group, path: &str, offsets: &[u64], uri: &str) -> Result<()> {
    let as_i64: Vec<i64> = offsets.iter().map(|&v| v as i64).collect();
    if let Ok(ds) = group.dataset(path) {
        ds.resize([as_i64.len()]).map_err(|e| Error::format(uri, e.to_string()))?;
        ds.write(&as_i64).map_err(|e| Error::format(uri, e.to_string()))?;
    } else {
        let (subgroup_path, name) = path.rsplit_once('/').unwrap_or(("", path));
        let subgroup = if subgroup_path.is_empty() {
            group.clone()
        } else {
            group.group(subgroup_path).map_err(|e| Error::format(uri, e.to_string()))?
        };
        let ds = subgroup
            .new_dataset::<i64>()
            .shape(as_i64.len())
            .create(name)
            .map_err(|e| Error::format(uri, e.to_string()))?;
        ds.write(&as_i64).map_err(|e| Error::format(uri, e.to_string()))?;
    }
    Ok(())
}

fn create_groups_and_datasets(h5: &hdf5::Group, reference: &Reference, bin_table: &BinTable, uri: &str) -> Result<()> {
    let chroms = h5.create_group("chroms").map_err(|e| Error::format(uri, e.to_string()))?;
    let names: Vec<hdf5::types::VarLenUnicode> = reference.iter().map(|c| c.name().parse().unwrap()).collect();
    let sizes: Vec<i32> = reference.iter().map(|c| c.size() as i32).collect();
    chroms
        .new_dataset::<hdf5::types::VarLenUnicode>()
        .shape(names.len())
        .create("name")
        .and_then(|d| d.write(&names))
        .map_err(|e| Error::format(uri, e.to_string()))?;
    chroms
        .new_dataset::<i32>()
        .shape(sizes.len())
        .create("length")
        .and_then(|d| d.write(&sizes))
        .map_err(|e| Error::format(uri, e.to_string()))?;

    let bins = h5.create_group("bins").map_err(|e| Error::format(uri, e.to_string()))?;
    let n_bins = bin_table.size() as usize;
    let mut chrom_col = Vec::with_capacity(n_bins);
    let mut start_col = Vec::with_capacity(n_bins);
    let mut end_col = Vec::with_capacity(n_bins);
    for bin_id in 0..bin_table.size() {
        let bin = bin_table.at(bin_id)?;
        chrom_col.push(bin.chrom().id() as i32);
        start_col.push(bin.start() as i32);
        end_col.push(bin.end() as i32);
    }
    bins.new_dataset::<i32>().shape(n_bins).create("chrom").and_then(|d| d.write(&chrom_col)).map_err(|e| Error::format(uri, e.to_string()))?;
    bins.new_dataset::<i32>().shape(n_bins).create("start").and_then(|d| d.write(&start_col)).map_err(|e| Error::format(uri, e.to_string()))?;
    bins.new_dataset::<i32>().shape(n_bins).create("end").and_then(|d| d.write(&end_col)).map_err(|e| Error::format(uri, e.to_string()))?;

    let pixels = h5.create_group("pixels").map_err(|e| Error::format(uri, e.to_string()))?;
    pixels.new_dataset::<i64>().shape(0).resizable(true).create("bin1_id").map_err(|e| Error::format(uri, e.to_string()))?;
    pixels.new_dataset::<i64>().shape(0).resizable(true).create("bin2_id").map_err(|e| Error::format(uri, e.to_string()))?;
    pixels.new_dataset::<f64>().shape(0).resizable(true).create("count").map_err(|e| Error::format(uri, e.to_string()))?;

    let indexes = h5.create_group("indexes").map_err(|e| Error::format(uri, e.to_string()))?;
    indexes.new_dataset::<i64>().shape(n_bins + 1).create("bin1_offset").map_err(|e| Error::format(uri, e.to_string()))?;
    indexes.new_dataset::<i64>().shape(reference.len() + 1).create("chrom_offset").map_err(|e| Error::format(uri, e.to_string()))?;

    Ok(())
}

fn read_reference(h5: &hdf5::Group, uri: &str) -> Result<Reference> {
    let chroms = h5.group("chroms").map_err(|e| Error::format(uri, format!("missing group 'chroms': {e}")))?;
    let names = chroms
        .dataset("name")
        .and_then(|d| d.read_1d::<hdf5::types::VarLenUnicode>())
        .map_err(|e| Error::format(uri, e.to_string()))?;
    let sizes = chroms
        .dataset("length")
        .and_then(|d| d.read_1d::<i32>())
        .map_err(|e| Error::format(uri, e.to_string()))?;
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let sizes: Vec<u32> = sizes.iter().map(|&v| v as u32).collect();
    Reference::new(&names, &sizes)
}

fn read_bin_table(h5: &hdf5::Group, reference: Reference, uri: &str) -> Result<BinTable> {
    let bin_size = read_i64_attr(h5, "bin-size", uri)?;
    BinTable::fixed(reference, bin_size as u32)
}

fn read_index(h5: &hdf5::Group, uri: &str) -> Result<Index> {
    let ds = h5
        .dataset("indexes/bin1_offset")
        .map_err(|e| Error::format(uri, format!("missing dataset 'indexes/bin1_offset': {e}")))?;
    let offsets = ds.read_1d::<i64>().map_err(|e| Error::format(uri, e.to_string()))?;
    Ok(Index::from_offsets(offsets.iter().map(|&v| v as u64).collect()))
}

/// A handle to an `.mcool` file: a root Cool-like container whose
/// `/resolutions/<R>` groups are each themselves a Cool group (spec §6).
pub struct McoolFile {
    path: PathBuf,
    resolutions: Vec<u32>,
}

impl McoolFile {
    /// Open an `.mcool` container and enumerate its `/resolutions/<R>` groups.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let h5 = hdf5::File::open(&path)
            .map_err(|e| Error::io(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let format = read_str_attr(&h5, "format", &path.display().to_string())?;
        if format != "HDF5::MCOOL" {
            return Err(Error::format(path.display().to_string(), format!("unexpected format attribute '{format}'")));
        }
        let resolutions_group = h5
            .group("resolutions")
            .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?;
        let mut resolutions: Vec<u32> = resolutions_group
            .member_names()
            .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?
            .into_iter()
            .filter_map(|n| n.parse().ok())
            .collect();
        resolutions.sort_unstable();
        Ok(Self { path, resolutions })
    }

    pub fn open_resolution(&self, resolution: u32, cache: CacheConfig) -> Result<CoolFile> {
        if !self.resolutions.contains(&resolution) {
            return Err(Error::InvalidInput(format!("resolution {resolution} not present in {}", self.path.display())));
        }
        let uri = format!("{}::/resolutions/{resolution}", self.path.display());
        CoolFile::open_read_only(&uri, cache, false)
    }

    pub fn resolutions(&self) -> &[u32] {
        &self.resolutions
    }
}

/// A handle to an `.scool` file: a shared root `chroms`/`bins` pair plus
/// one Cool group per cell under `cells/<name>`, hard-linked to the root
/// (spec §6). Supplemented from `original_source`'s single-cell cooler
/// layout (see `SPEC_FULL.md` §4).
pub struct ScoolFile {
    path: PathBuf,
    cell_names: Vec<String>,
}

impl ScoolFile {
    /// Open an `.scool` container and enumerate its `/cells/<name>` groups.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let h5 = hdf5::File::open(&path)
            .map_err(|e| Error::io(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let format = read_str_attr(&h5, "format", &path.display().to_string())?;
        if format != "HDF5::SCOOL" {
            return Err(Error::format(path.display().to_string(), format!("unexpected format attribute '{format}'")));
        }
        let cells_group = h5
            .group("cells")
            .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?;
        let cell_names = cells_group
            .member_names()
            .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?;
        Ok(Self { path, cell_names })
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cell_names.iter().map(String::as_str)
    }

    pub fn n_cells(&self) -> usize {
        self.cell_names.len()
    }

    pub fn open_cell(&self, name: &str, cache: CacheConfig) -> Result<CoolFile> {
        if !self.cell_names.iter().any(|c| c == name) {
            return Err(Error::InvalidInput(format!("cell '{name}' not present in {}", self.path.display())));
        }
        let uri = format!("{}::/cells/{name}", self.path.display());
        CoolFile::open_read_only(&uri, cache, false)
    }
}
