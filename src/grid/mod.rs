//! Sparse cell grid: coordinates, storage, octant batching and bounds

pub mod coord;
pub mod orientation;
pub mod cell;
pub mod octant;
pub mod catalog;
pub mod bounds;
pub mod batch_builder;
pub mod map;

pub use coord::{IndexKey, OctantKey, COORD_LIMIT};
pub use orientation::Orientation;
pub use cell::{Cell, CellStore, ItemId, ERASE_ITEM};
pub use octant::{Octant, OctantIndex};
pub use catalog::{ItemCatalog, ItemMesh, MeshLibrary};
pub use bounds::{BoundsCache, BoundsUpdate};
pub use batch_builder::{BatchBuilder, BatchFailure, RebuildReport};
pub use map::CellMap;
