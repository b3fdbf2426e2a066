//! The proprietary block-compressed HIC storage engine (spec §4.10-§4.14
//! part 2).

pub mod block;
pub mod block_index;
pub mod block_mapper;
pub mod file;
pub mod spill;
pub mod validate;

pub use block::MatrixInteractionBlock;
pub use block_index::{BlockDescriptor, BlockIndex, GridCoordinates};
pub use block_mapper::{BlockMapperInter, BlockMapperIntra};
pub use file::{FileState, HicFile};
pub use spill::{BlockId, InteractionSpillStore};
pub use validate::{validate, HicValidationReport};
