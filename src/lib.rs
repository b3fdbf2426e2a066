//! A Hi-C contact matrix engine: read and write the HDF5-based
//! Cool/MCool/SCool family and the proprietary block-compressed HIC
//! format behind a single pixel-oriented API.
//!
//! # Example
//!
//! ```rust,no_run
//! use hicmat::config::CacheConfig;
//! use hicmat::cool::CoolFile;
//!
//! let file = CoolFile::open_read_only("contacts.cool", CacheConfig::default(), true).unwrap();
//! let pixels = file.fetch(None, None).unwrap();
//! for pixel in pixels {
//!     println!("{} {} {}", pixel.bin1_id, pixel.bin2_id, pixel.count);
//! }
//! ```

pub mod bintable;
pub mod chromosome;
pub mod config;
pub mod cool;
pub mod error;
pub mod filestream;
pub mod hic;
pub mod interval;
pub mod pixel;
pub mod variant;

pub use chromosome::{Chromosome, Reference};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use interval::GenomicInterval;
pub use pixel::{Pixel, PixelCoordinates, ThinPixel};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for downstream crates.
pub mod prelude {
    pub use crate::chromosome::{Chromosome, Reference};
    pub use crate::config::CacheConfig;
    pub use crate::cool::{Balancing, CoolFile, McoolFile, PixelSelector, Query, ScoolFile};
    pub use crate::error::{Error, Result};
    pub use crate::hic::{HicFile, InteractionSpillStore};
    pub use crate::interval::GenomicInterval;
    pub use crate::pixel::{Pixel, PixelCoordinates, ThinPixel};
}
