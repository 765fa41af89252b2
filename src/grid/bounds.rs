//! Cached world-space bounds over all placed cells.

use glam::IVec3;

use crate::core::config::MapConfig;
use crate::grid::catalog::ItemCatalog;
use crate::grid::cell::{Cell, CellStore};
use crate::math::Aabb;

/// Outcome of an incremental update attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsUpdate {
    /// Cache was already invalid; nothing to do
    Skipped,
    /// Cache is still exact
    Merged,
    /// Cache could not be kept exact and will be rescanned
    Invalidated,
}

/// World-space bounds of one cell's mesh, or `None` if the catalog lacks the item.
pub fn cell_bounds(coord: IVec3, cell: &Cell, catalog: &(impl ItemCatalog + ?Sized), config: &MapConfig) -> Option<Aabb> {
    let mesh_bounds = catalog.mesh_bounds(cell.item)?;
    let mesh_transform = catalog.mesh_transform(cell.item)?;
    Some(mesh_bounds.transformed(&(cell.placement(coord, config) * mesh_transform)))
}

/// Bounding box cache with a cheap incremental path.
///
/// Removal of a cell whose box touches a face of the cached box forces a
/// full rescan; growth is merged directly. The cached box is never tighter
/// than the exact union.
#[derive(Debug, Default)]
pub struct BoundsCache {
    aabb: Aabb,
    valid: bool,
}

impl BoundsCache {
    /// Starts invalid so the first query rescans.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Cached box, rescanning first if invalid.
    pub fn query(&mut self, store: &CellStore, catalog: &(impl ItemCatalog + ?Sized), config: &MapConfig) -> Aabb {
        if !self.valid {
            self.rescan(store, catalog, config);
        }
        self.aabb
    }

    /// Recompute the exact union from every stored cell.
    ///
    /// With no recognized cells the result is a zero-size box at the origin.
    pub fn rescan(&mut self, store: &CellStore, catalog: &(impl ItemCatalog + ?Sized), config: &MapConfig) -> Aabb {
        let mut union: Option<Aabb> = None;
        for (key, cell) in store.iter() {
            let Some(bounds) = cell_bounds(key.coord(), cell, catalog, config) else {
                log::trace!("Bounds rescan: item {:?} not in catalog", cell.item);
                continue;
            };
            union = Some(match union {
                Some(acc) => acc.merged(&bounds),
                None => bounds,
            });
        }

        self.aabb = union.unwrap_or_default();
        self.valid = true;
        log::trace!("Bounds rescanned over {} cells: {:?}", store.len(), self.aabb);
        self.aabb
    }

    /// Adjust the cache for a single-cell change without rescanning when provably safe.
    pub fn try_incremental_update(
        &mut self,
        coord: IVec3,
        old_cell: Option<&Cell>,
        new_cell: Option<&Cell>,
        catalog: &(impl ItemCatalog + ?Sized),
        config: &MapConfig,
    ) -> BoundsUpdate {
        if !self.valid {
            return BoundsUpdate::Skipped;
        }
        // The empty-map box is a placeholder at the origin, not real content
        if self.aabb.is_degenerate() {
            self.invalidate();
            return BoundsUpdate::Invalidated;
        }

        if let Some(old_bounds) = old_cell.and_then(|c| cell_bounds(coord, c, catalog, config)) {
            if self.aabb.touches_boundary(&old_bounds) {
                self.invalidate();
                return BoundsUpdate::Invalidated;
            }
        }

        if let Some(new_bounds) = new_cell.and_then(|c| cell_bounds(coord, c, catalog, config)) {
            self.aabb = self.aabb.merged(&new_bounds);
        }
        BoundsUpdate::Merged
    }
}
