//! CellMap - the public placement API.
//!
//! Edits update the cell store and octant index immediately and mark the
//! owning octant dirty. Batch rebuilds are deferred to [`CellMap::update`],
//! which the host calls once per frame; any number of edits between two
//! updates cost a single rebuild pass.

use glam::{IVec3, Mat4, Vec3};

use crate::core::config::MapConfig;
use crate::core::types::Result;
use crate::grid::batch_builder::{BatchBuilder, RebuildReport};
use crate::grid::bounds::BoundsCache;
use crate::grid::catalog::ItemCatalog;
use crate::grid::cell::{Cell, CellStore, ItemId, ERASE_ITEM};
use crate::grid::coord::{IndexKey, OctantKey};
use crate::grid::octant::{Octant, OctantIndex};
use crate::grid::orientation::Orientation;
use crate::math::Aabb;
use crate::render::attachment::RenderAttachment;
use crate::storage::records::CellRecord;

/// Sparse cell map rendering through `R` with meshes from `C`.
pub struct CellMap<C: ItemCatalog, R: RenderAttachment> {
    config: MapConfig,
    store: CellStore,
    index: OctantIndex,
    bounds: BoundsCache,
    catalog: C,
    attachment: R,
    visible: bool,
    rebuild_passes: u64,
}

impl<C: ItemCatalog, R: RenderAttachment> CellMap<C, R> {
    pub fn new(config: MapConfig, catalog: C, attachment: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index: OctantIndex::new(config.octant_size),
            config,
            store: CellStore::new(),
            bounds: BoundsCache::new(),
            catalog,
            attachment,
            visible: true,
            rebuild_passes: 0,
        })
    }

    /// Place `item` at `coord`, or erase the cell when `item` is negative.
    ///
    /// Fails with `OutOfRange` before any mutation when an axis has
    /// `|v| >= 2^20`. Returns the cell previously at `coord`.
    pub fn set_cell(
        &mut self,
        coord: IVec3,
        item: i32,
        orientation: Orientation,
        offset: Vec3,
    ) -> Result<Option<Cell>> {
        let key = IndexKey::new(coord)?;
        let previous = self.store.set(coord, item, orientation, offset)?;
        let current = self.store.get_key(key);

        if previous.is_none() && current.is_none() {
            return Ok(None);
        }

        match current {
            Some(_) => self.index.note_insert(key),
            None => self.index.note_remove(key),
        }
        self.bounds.try_incremental_update(
            coord,
            previous.as_ref(),
            current.as_ref(),
            &self.catalog,
            &self.config,
        );
        Ok(previous)
    }

    /// Place a typed cell.
    pub fn place(&mut self, coord: IVec3, cell: Cell) -> Result<Option<Cell>> {
        self.set_cell(coord, cell.item.0 as i32, cell.orientation, cell.offset)
    }

    pub fn get_cell(&self, coord: IVec3) -> Option<Cell> {
        self.store.get(coord)
    }

    /// Erase the cell at `coord`, returning it.
    pub fn remove_cell(&mut self, coord: IVec3) -> Result<Option<Cell>> {
        self.set_cell(coord, ERASE_ITEM, Orientation::IDENTITY, Vec3::ZERO)
    }

    /// Remove every cell and release every batch.
    pub fn clear(&mut self) {
        let released = self.release_all_batches();
        self.store.clear();
        self.index = OctantIndex::new(self.config.octant_size);
        self.bounds.invalidate();
        log::debug!("Cleared map, released {} batches", released);
    }

    /// World-space bounds of all placed cells.
    pub fn get_bounds(&mut self) -> Aabb {
        self.bounds.query(&self.store, &self.catalog, &self.config)
    }

    /// Discard the cached bounds and rescan every cell.
    pub fn force_full_bounds_recalculation(&mut self) -> Aabb {
        self.bounds.rescan(&self.store, &self.catalog, &self.config)
    }

    /// Per-frame tick: rebuild dirty octants if there are any.
    pub fn update(&mut self) -> Option<RebuildReport> {
        if !self.index.has_dirty() {
            return None;
        }
        let report = BatchBuilder::new(&self.config)
            .with_visibility(self.visible)
            .rebuild(&self.store, &mut self.index, &self.catalog, &mut self.attachment);
        self.rebuild_passes += 1;
        Some(report)
    }

    pub fn needs_update(&self) -> bool {
        self.index.has_dirty()
    }

    /// Number of rebuild passes run so far
    pub fn rebuild_pass_count(&self) -> u64 {
        self.rebuild_passes
    }

    /// Coordinates of every placed cell
    pub fn used_cells(&self) -> Vec<IVec3> {
        self.store.iter().map(|(key, _)| key.coord()).collect()
    }

    /// Coordinates of every cell holding `item`
    pub fn used_cells_by_item(&self, item: ItemId) -> Vec<IVec3> {
        self.store
            .iter()
            .filter(|(_, cell)| cell.item == item)
            .map(|(key, _)| key.coord())
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.store.len()
    }

    pub fn octant_count(&self) -> usize {
        self.index.len()
    }

    pub fn batch_count(&self) -> usize {
        self.index.batch_count()
    }

    pub fn octant(&self, key: OctantKey) -> Option<&Octant> {
        self.index.get(key)
    }

    pub fn octants(&self) -> impl Iterator<Item = (OctantKey, &Octant)> {
        self.index.iter()
    }

    /// Octant containing `coord` under the current octant size
    pub fn octant_key(&self, coord: IVec3) -> OctantKey {
        OctantKey::containing(coord, self.config.octant_size)
    }

    pub fn map_to_local(&self, coord: IVec3) -> Vec3 {
        self.config.map_to_local(coord)
    }

    pub fn local_to_map(&self, position: Vec3) -> IVec3 {
        self.config.local_to_map(position)
    }

    /// Instance transform used for the cell at `coord`, if placed and known to the catalog
    pub fn cell_transform(&self, coord: IVec3) -> Option<Mat4> {
        let cell = self.store.get(coord)?;
        let mesh_transform = self.catalog.mesh_transform(cell.item)?;
        Some(cell.placement(coord, &self.config) * mesh_transform)
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Apply new grid geometry.
    ///
    /// A new octant size re-partitions every cell; any other change marks
    /// every octant dirty. Bounds are always invalidated.
    pub fn set_config(&mut self, config: MapConfig) -> Result<()> {
        config.validate()?;
        if config == self.config {
            return Ok(());
        }

        if config.octant_size != self.config.octant_size {
            self.release_all_batches();
            self.index = OctantIndex::new(config.octant_size);
            for (key, _) in self.store.iter() {
                self.index.note_insert(key);
            }
            log::debug!(
                "Re-partitioned {} cells into {} octants of size {}",
                self.store.len(),
                self.index.len(),
                config.octant_size
            );
        } else {
            self.index.mark_all_dirty();
        }

        self.config = config;
        self.bounds.invalidate();
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide every batch.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        for (_, octant) in self.index.iter() {
            for batch in octant.batches() {
                self.attachment.set_batch_visible(batch, visible);
            }
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Mutable catalog access; every octant is rebuilt and bounds rescanned afterwards.
    pub fn catalog_mut(&mut self) -> &mut C {
        self.index.mark_all_dirty();
        self.bounds.invalidate();
        &mut self.catalog
    }

    pub fn attachment(&self) -> &R {
        &self.attachment
    }

    pub fn attachment_mut(&mut self) -> &mut R {
        &mut self.attachment
    }

    /// Dump every cell as a flat record list (unordered).
    pub fn records(&self) -> Vec<CellRecord> {
        self.store
            .iter()
            .map(|(key, cell)| CellRecord::new(key.coord(), *cell))
            .collect()
    }

    /// Replace the map contents with `records`.
    ///
    /// Every record is validated first; on error the map is left untouched.
    pub fn load_records(&mut self, records: &[CellRecord]) -> Result<()> {
        let keys = records
            .iter()
            .map(|r| IndexKey::new(r.coord))
            .collect::<Result<Vec<_>>>()?;

        self.clear();
        for (key, record) in keys.into_iter().zip(records) {
            self.store.insert(key, record.cell());
            self.index.note_insert(key);
        }
        log::info!("Loaded {} cells into {} octants", self.store.len(), self.index.len());
        Ok(())
    }

    fn release_all_batches(&mut self) -> usize {
        let batches = self.index.drain_batches();
        let count = batches.len();
        for batch in batches {
            self.attachment.release_batch(batch);
        }
        count
    }
}

impl<C: ItemCatalog, R: RenderAttachment> Drop for CellMap<C, R> {
    fn drop(&mut self) {
        self.release_all_batches();
    }
}
