//! Map configuration (grid geometry and octant partitioning)

use std::path::Path;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Default edge length of an octant, in cells.
pub const DEFAULT_OCTANT_SIZE: u32 = 8;

/// Largest octant edge; one octant of this size spans the whole coordinate range.
pub const MAX_OCTANT_SIZE: u32 = 1 << 21;

/// Grid geometry shared by batching and bounds computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Edge length of an octant in cells (must be > 0)
    pub octant_size: u32,
    /// World-space size of one cell
    pub cell_size: Vec3,
    /// Per-axis: offset the cell origin by half a cell
    pub cell_center: [bool; 3],
    /// Uniform scale applied to every placed mesh
    pub cell_scale: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            octant_size: DEFAULT_OCTANT_SIZE,
            cell_size: Vec3::ONE,
            cell_center: [true; 3],
            cell_scale: 1.0,
        }
    }
}

impl MapConfig {
    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        if self.octant_size == 0 {
            return Err(Error::Config("octant_size must be positive".into()));
        }
        if self.octant_size > MAX_OCTANT_SIZE {
            return Err(Error::Config(format!(
                "octant_size must be at most {}, got {}",
                MAX_OCTANT_SIZE, self.octant_size
            )));
        }
        if !(self.cell_size.cmpgt(Vec3::ZERO).all() && self.cell_size.is_finite()) {
            return Err(Error::Config(format!(
                "cell_size must be positive and finite, got {}",
                self.cell_size
            )));
        }
        if !(self.cell_scale > 0.0 && self.cell_scale.is_finite()) {
            return Err(Error::Config(format!(
                "cell_scale must be positive and finite, got {}",
                self.cell_scale
            )));
        }
        Ok(())
    }

    /// Offset from a cell's minimum corner to its origin.
    pub fn centering_offset(&self) -> Vec3 {
        let half = self.cell_size * 0.5;
        Vec3::new(
            if self.cell_center[0] { half.x } else { 0.0 },
            if self.cell_center[1] { half.y } else { 0.0 },
            if self.cell_center[2] { half.z } else { 0.0 },
        )
    }

    /// Grid coordinate to the local-space origin of that cell.
    pub fn map_to_local(&self, coord: IVec3) -> Vec3 {
        coord.as_vec3() * self.cell_size + self.centering_offset()
    }

    /// Local-space position to the grid coordinate containing it.
    pub fn local_to_map(&self, position: Vec3) -> IVec3 {
        (position / self.cell_size).floor().as_ivec3()
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: MapConfig = serde_json::from_str(&data)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
