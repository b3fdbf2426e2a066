//! The HDF5-based Cool/MCool/SCool storage engine (spec §4.5-§4.9, §4.14
//! part 1).

pub mod dataset;
pub mod file;
pub mod index;
pub mod pixel_selector;
pub mod validate;

pub use dataset::{Dataset, DatasetIterator};
pub use file::{CoolFile, FileState, McoolFile, ScoolFile};
pub use pixel_selector::{Balancing, PixelSelector, Query};
