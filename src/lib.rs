//! Trixel map - sparse 3D cell placement with octant-batched instanced rendering

pub mod core;
pub mod math;
pub mod grid;
pub mod render;
pub mod storage;

pub use crate::core::{Error, MapConfig, Result};
pub use grid::{CellMap, Cell, ItemCatalog, ItemId, ItemMesh, MeshLibrary, Orientation, RebuildReport};
pub use render::{HeadlessAttachment, RenderAttachment, RenderBatch};
