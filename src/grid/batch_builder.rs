//! Per-octant instanced batch rebuild.

use std::collections::BTreeMap;

use glam::Mat4;

use crate::core::config::MapConfig;
use crate::grid::catalog::ItemCatalog;
use crate::grid::cell::{CellStore, ItemId};
use crate::grid::coord::{IndexKey, OctantKey};
use crate::grid::octant::OctantIndex;
use crate::render::attachment::{BatchError, PendingBatches, RenderAttachment};

/// A batch that could not be allocated during a rebuild pass.
///
/// The cells stay stored and are retried the next time the octant is dirtied.
#[derive(Debug)]
pub struct BatchFailure {
    pub octant: OctantKey,
    pub item: ItemId,
    pub cell_count: usize,
    pub error: BatchError,
}

/// Summary of one rebuild pass
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub octants_rebuilt: usize,
    pub batches_released: usize,
    pub batches_created: usize,
    pub instances: usize,
    pub octants_swept: usize,
    /// Item groups skipped because the catalog does not know the item
    pub catalog_misses: usize,
    pub failures: Vec<BatchFailure>,
}

impl RebuildReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Rebuilds the batches of dirty octants.
pub struct BatchBuilder<'a> {
    config: &'a MapConfig,
    visible: bool,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(config: &'a MapConfig) -> Self {
        Self { config, visible: true }
    }

    /// Create new batches hidden when `visible` is false
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Rebuild every dirty octant, then sweep empty ones.
    pub fn rebuild<C, R>(
        &self,
        store: &CellStore,
        index: &mut OctantIndex,
        catalog: &C,
        attachment: &mut R,
    ) -> RebuildReport
    where
        C: ItemCatalog + ?Sized,
        R: RenderAttachment + ?Sized,
    {
        let mut report = RebuildReport::default();

        for octant_key in index.dirty_octants() {
            self.rebuild_octant(octant_key, store, index, catalog, attachment, &mut report);
            index.clear_dirty(octant_key);
            report.octants_rebuilt += 1;
        }

        report.octants_swept = index.sweep_empty();

        log::debug!(
            "Rebuild pass: {} octants, {} batches created, {} released, {} swept, {} failures",
            report.octants_rebuilt,
            report.batches_created,
            report.batches_released,
            report.octants_swept,
            report.failures.len()
        );
        report
    }

    fn rebuild_octant<C, R>(
        &self,
        octant_key: OctantKey,
        store: &CellStore,
        index: &mut OctantIndex,
        catalog: &C,
        attachment: &mut R,
        report: &mut RebuildReport,
    ) where
        C: ItemCatalog + ?Sized,
        R: RenderAttachment + ?Sized,
    {
        let Some(octant) = index.get_mut(octant_key) else {
            return;
        };

        // Tear down before building so stale and new batches never coexist
        for batch in octant.take_batches() {
            attachment.release_batch(batch);
            report.batches_released += 1;
        }

        if octant.member_count() == 0 {
            return;
        }

        let mut groups: BTreeMap<ItemId, Vec<IndexKey>> = BTreeMap::new();
        for key in octant.members() {
            match store.get_key(key) {
                Some(cell) => groups.entry(cell.item).or_default().push(key),
                None => log::warn!("Octant {:?} lists empty cell {:?}", octant_key, key.coord()),
            }
        }

        let mut pending = PendingBatches::new(attachment);
        for (item, keys) in groups {
            let (Some(geometry), Some(mesh_transform)) = (catalog.mesh_geometry(item), catalog.mesh_transform(item)) else {
                log::trace!("Octant {:?}: item {:?} not in catalog, skipping {} cells", octant_key, item, keys.len());
                report.catalog_misses += 1;
                continue;
            };

            let transforms: Vec<Mat4> = keys
                .iter()
                .filter_map(|&key| store.get_key(key).map(|cell| (key, cell)))
                .map(|(key, cell)| cell.placement(key.coord(), self.config) * mesh_transform)
                .collect();

            match pending.create(geometry, item, &transforms, self.visible) {
                Ok(()) => {
                    report.batches_created += 1;
                    report.instances += transforms.len();
                }
                Err(error) => {
                    log::warn!(
                        "Octant {:?}: failed to allocate batch for item {:?} ({} cells): {}",
                        octant_key, item, keys.len(), error
                    );
                    report.failures.push(BatchFailure {
                        octant: octant_key,
                        item,
                        cell_count: keys.len(),
                        error,
                    });
                }
            }
        }

        octant.set_batches(pending.commit());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec3, Vec3};
    use crate::grid::catalog::{ItemMesh, MeshLibrary};
    use crate::grid::orientation::Orientation;
    use crate::render::attachment::GeometryHandle;
    use crate::render::headless::HeadlessAttachment;

    struct Fixture {
        config: MapConfig,
        store: CellStore,
        index: OctantIndex,
        library: MeshLibrary,
        attachment: HeadlessAttachment,
    }

    impl Fixture {
        fn new() -> Self {
            let mut library = MeshLibrary::new();
            library.add_item(ItemId(7), ItemMesh::unit_cube("seven", GeometryHandle(7)));
            library.add_item(ItemId(8), ItemMesh::unit_cube("eight", GeometryHandle(8)));
            Self {
                config: MapConfig::default(),
                store: CellStore::new(),
                index: OctantIndex::new(8),
                library,
                attachment: HeadlessAttachment::new(),
            }
        }

        fn place(&mut self, x: i32, y: i32, z: i32, item: i32) {
            let coord = IVec3::new(x, y, z);
            let key = IndexKey::new(coord).unwrap();
            self.store.set(coord, item, Orientation::IDENTITY, Vec3::ZERO).unwrap();
            if item >= 0 {
                self.index.note_insert(key);
            } else {
                self.index.note_remove(key);
            }
        }

        fn rebuild(&mut self) -> RebuildReport {
            BatchBuilder::new(&self.config).rebuild(&self.store, &mut self.index, &self.library, &mut self.attachment)
        }
    }

    #[test]
    fn test_two_cells_one_batch() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        f.place(1, 0, 0, 7);

        let report = f.rebuild();
        assert_eq!(report.octants_rebuilt, 1);
        assert_eq!(report.batches_created, 1);
        assert_eq!(report.instances, 2);

        let octant = f.index.get(OctantKey::new(0, 0, 0)).unwrap();
        assert_eq!(octant.batches().len(), 1);
        assert_eq!(octant.batches()[0].instance_count(), 2);
        assert!(!octant.is_dirty());
    }

    #[test]
    fn test_groups_by_item() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        f.place(1, 0, 0, 8);
        f.place(2, 0, 0, 8);
        f.rebuild();

        let octant = f.index.get(OctantKey::new(0, 0, 0)).unwrap();
        let mut items: Vec<(ItemId, u32)> = octant.batches().iter().map(|b| (b.item(), b.instance_count())).collect();
        items.sort();
        assert_eq!(items, vec![(ItemId(7), 1), (ItemId(8), 2)]);
    }

    #[test]
    fn test_rebuild_releases_previous() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        f.place(1, 0, 0, 7);
        f.rebuild();

        f.place(1, 0, 0, -1);
        let report = f.rebuild();
        assert_eq!(report.batches_released, 1);
        assert_eq!(report.batches_created, 1);
        assert_eq!(f.attachment.live_count(), 1);
        assert_eq!(f.attachment.live_instance_count(), 1);

        f.place(0, 0, 0, -1);
        let report = f.rebuild();
        assert_eq!(report.octants_swept, 1);
        assert!(f.index.is_empty());
        assert_eq!(f.attachment.live_count(), 0);
    }

    #[test]
    fn test_instance_transform() {
        let mut f = Fixture::new();
        f.library.add_item(
            ItemId(9),
            ItemMesh::unit_cube("lifted", GeometryHandle(9)).with_transform(Mat4::from_translation(Vec3::Y)),
        );
        f.config.cell_scale = 2.0;
        f.place(3, 0, 0, 9);
        f.rebuild();

        let (_, live) = f.attachment.live_batches().next().unwrap();
        let origin = live.instances[0].transform_point3(Vec3::ZERO);
        // translate(3.5, 0.5, 0.5) * scale(2) * translate(0, 1, 0)
        assert_eq!(origin, Vec3::new(3.5, 2.5, 0.5));
    }

    #[test]
    fn test_rotated_instance_pivots_on_cell_origin() {
        let mut f = Fixture::new();
        f.library.add_item(
            ItemId(9),
            ItemMesh::unit_cube("arm", GeometryHandle(9)).with_transform(Mat4::from_translation(Vec3::X)),
        );
        f.config.cell_scale = 2.0;

        // Quarter turn about +Y: X -> -Z, Z -> X
        let turn = Orientation::from_basis(glam::Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2)).unwrap();
        let coord = IVec3::new(3, -2, 5);
        let offset = Vec3::new(0.25, 0.0, -0.5);
        f.store.set(coord, 9, turn, offset).unwrap();
        f.index.note_insert(IndexKey::new(coord).unwrap());
        f.rebuild();

        let (_, live) = f.attachment.live_batches().next().unwrap();
        let m = live.instances[0];
        let cell_origin = f.config.map_to_local(coord) + offset;
        assert_eq!(cell_origin, Vec3::new(3.75, -1.5, 5.0));

        // Mesh origin sits one unit along local X, rotated and scaled about the cell origin
        assert_eq!(m.transform_point3(Vec3::ZERO), cell_origin + Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(m.transform_point3(-Vec3::X), cell_origin);
        assert_eq!(m.transform_vector3(Vec3::X), Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(m.transform_vector3(Vec3::Z), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(m.transform_vector3(Vec3::Y), Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_unknown_items_skipped() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        f.place(1, 0, 0, 500);

        let report = f.rebuild();
        assert_eq!(report.catalog_misses, 1);
        assert!(!report.has_failures());
        let octant = f.index.get(OctantKey::new(0, 0, 0)).unwrap();
        assert_eq!(octant.batches().len(), 1);
        assert_eq!(octant.member_count(), 2);
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let mut f = Fixture::new();
        f.attachment.set_capacity(1);
        f.place(0, 0, 0, 7);
        f.place(1, 0, 0, 8);

        let report = f.rebuild();
        assert_eq!(report.batches_created, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cell_count, 1);
        assert!(matches!(report.failures[0].error, BatchError::Exhausted { .. }));

        // Cells are kept; a later pass for the octant retries
        assert_eq!(f.store.len(), 2);
        f.attachment.set_capacity(16);
        f.index.mark_dirty(OctantKey::new(0, 0, 0));
        let report = f.rebuild();
        assert_eq!(report.batches_created, 2);
        assert!(!report.has_failures());
        assert_eq!(f.attachment.live_count(), 2);
    }

    #[test]
    fn test_hidden_rebuild() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        BatchBuilder::new(&f.config)
            .with_visibility(false)
            .rebuild(&f.store, &mut f.index, &f.library, &mut f.attachment);

        let (_, live) = f.attachment.live_batches().next().unwrap();
        assert!(!live.visible);
    }

    #[test]
    fn test_only_dirty_octants_rebuilt() {
        let mut f = Fixture::new();
        f.place(0, 0, 0, 7);
        f.place(100, 0, 0, 7);
        f.rebuild();

        f.place(101, 0, 0, 7);
        let report = f.rebuild();
        assert_eq!(report.octants_rebuilt, 1);
        assert_eq!(report.batches_released, 1);
        assert_eq!(f.attachment.live_count(), 2);
    }
}
