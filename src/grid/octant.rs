//! Octant partitioning and dirty tracking.

use std::collections::{HashMap, HashSet};

use crate::grid::coord::{IndexKey, OctantKey};
use crate::render::attachment::RenderBatch;

/// A cubic bucket of cells that is batched together.
#[derive(Debug, Default)]
pub struct Octant {
    members: HashSet<IndexKey>,
    dirty: bool,
    batches: Vec<RenderBatch>,
}

impl Octant {
    pub fn members(&self) -> impl Iterator<Item = IndexKey> + '_ {
        self.members.iter().copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, key: IndexKey) -> bool {
        self.members.contains(&key)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn batches(&self) -> &[RenderBatch] {
        &self.batches
    }

    /// Removable: no members and no batches awaiting teardown.
    pub fn is_sweepable(&self) -> bool {
        self.members.is_empty() && self.batches.is_empty()
    }

    /// Move the batches out for teardown.
    pub(crate) fn take_batches(&mut self) -> Vec<RenderBatch> {
        std::mem::take(&mut self.batches)
    }

    pub(crate) fn set_batches(&mut self, batches: Vec<RenderBatch>) {
        debug_assert!(self.batches.is_empty(), "previous batches must be released first");
        self.batches = batches;
    }
}

/// Sparse index of octants keyed by octant coordinate.
///
/// Dirty octants are queued in the order they first became dirty, which
/// is the processing order of a rebuild pass.
#[derive(Debug)]
pub struct OctantIndex {
    octant_size: u32,
    octants: HashMap<OctantKey, Octant>,
    dirty_queue: Vec<OctantKey>,
}

impl OctantIndex {
    /// `octant_size` must be non-zero.
    pub fn new(octant_size: u32) -> Self {
        debug_assert!(octant_size > 0);
        Self {
            octant_size,
            octants: HashMap::new(),
            dirty_queue: Vec::new(),
        }
    }

    pub fn octant_size(&self) -> u32 {
        self.octant_size
    }

    /// Add a cell to its octant, creating the octant if needed.
    pub fn note_insert(&mut self, key: IndexKey) {
        let octant_key = key.octant(self.octant_size);
        let octant = self.octants.entry(octant_key).or_default();
        octant.members.insert(key);
        Self::mark(octant, octant_key, &mut self.dirty_queue);
    }

    /// Remove a cell from its octant. No-op if the octant does not exist.
    pub fn note_remove(&mut self, key: IndexKey) {
        let octant_key = key.octant(self.octant_size);
        if let Some(octant) = self.octants.get_mut(&octant_key) {
            octant.members.remove(&key);
            Self::mark(octant, octant_key, &mut self.dirty_queue);
        }
    }

    fn mark(octant: &mut Octant, key: OctantKey, queue: &mut Vec<OctantKey>) {
        if !octant.dirty {
            octant.dirty = true;
            queue.push(key);
        }
    }

    /// Flag an existing octant for rebuild.
    pub fn mark_dirty(&mut self, key: OctantKey) {
        if let Some(octant) = self.octants.get_mut(&key) {
            Self::mark(octant, key, &mut self.dirty_queue);
        }
    }

    /// Flag every octant for rebuild.
    pub fn mark_all_dirty(&mut self) {
        for (key, octant) in self.octants.iter_mut() {
            Self::mark(octant, *key, &mut self.dirty_queue);
        }
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty_queue.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty_queue.len()
    }

    /// Take the queue of dirty octants for one rebuild pass.
    ///
    /// Flags stay set until [`clear_dirty`](Self::clear_dirty); a second call
    /// before new edits yields nothing.
    pub fn dirty_octants(&mut self) -> std::vec::IntoIter<OctantKey> {
        std::mem::take(&mut self.dirty_queue).into_iter()
    }

    pub fn clear_dirty(&mut self, key: OctantKey) {
        if let Some(octant) = self.octants.get_mut(&key) {
            octant.dirty = false;
        }
    }

    /// Remove octants with no members and no batches. Returns how many were removed.
    pub fn sweep_empty(&mut self) -> usize {
        let before = self.octants.len();
        self.octants.retain(|key, octant| {
            let keep = !octant.is_sweepable();
            if !keep {
                log::trace!("Sweeping empty octant {:?}", key);
            }
            keep
        });
        before - self.octants.len()
    }

    pub fn get(&self, key: OctantKey) -> Option<&Octant> {
        self.octants.get(&key)
    }

    pub fn get_mut(&mut self, key: OctantKey) -> Option<&mut Octant> {
        self.octants.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.octants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octants.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = OctantKey> + '_ {
        self.octants.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OctantKey, &Octant)> {
        self.octants.iter().map(|(k, o)| (*k, o))
    }

    /// Total batches owned by all octants
    pub fn batch_count(&self) -> usize {
        self.octants.values().map(|o| o.batches.len()).sum()
    }

    /// Empty the index, returning every batch so the caller can release it.
    pub fn drain_batches(&mut self) -> Vec<RenderBatch> {
        self.dirty_queue.clear();
        self.octants
            .drain()
            .flat_map(|(_, mut octant)| octant.take_batches())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use crate::grid::cell::ItemId;
    use crate::render::attachment::{GeometryHandle, InstanceHandle};

    fn key(x: i32, y: i32, z: i32) -> IndexKey {
        IndexKey::new(IVec3::new(x, y, z)).unwrap()
    }

    #[test]
    fn test_insert_creates_dirty_octant() {
        let mut index = OctantIndex::new(8);
        index.note_insert(key(1, 2, 3));
        index.note_insert(key(7, 7, 7));
        index.note_insert(key(8, 0, 0));

        assert_eq!(index.len(), 2);
        let origin = index.get(OctantKey::new(0, 0, 0)).unwrap();
        assert_eq!(origin.member_count(), 2);
        assert!(origin.is_dirty());
        assert_eq!(index.dirty_count(), 2);
    }

    #[test]
    fn test_negative_coords_floor() {
        let mut index = OctantIndex::new(8);
        index.note_insert(key(-1, 0, 0));
        assert!(index.get(OctantKey::new(-1, 0, 0)).is_some());
    }

    #[test]
    fn test_remove_absent_octant_is_noop() {
        let mut index = OctantIndex::new(8);
        index.note_remove(key(100, 100, 100));
        assert!(index.is_empty());
        assert!(!index.has_dirty());
    }

    #[test]
    fn test_dirty_queue_dedupes() {
        let mut index = OctantIndex::new(8);
        for x in 0..8 {
            index.note_insert(key(x, 0, 0));
        }
        let dirty: Vec<_> = index.dirty_octants().collect();
        assert_eq!(dirty, vec![OctantKey::new(0, 0, 0)]);

        // Consumed: nothing left until the next edit
        assert_eq!(index.dirty_octants().count(), 0);
    }

    #[test]
    fn test_clear_dirty_then_remark() {
        let mut index = OctantIndex::new(4);
        index.note_insert(key(0, 0, 0));
        let okey = index.dirty_octants().next().unwrap();
        index.clear_dirty(okey);
        assert!(!index.get(okey).unwrap().is_dirty());

        index.note_remove(key(0, 0, 0));
        assert!(index.get(okey).unwrap().is_dirty());
        assert_eq!(index.dirty_count(), 1);
    }

    #[test]
    fn test_sweep_keeps_octants_with_batches() {
        let mut index = OctantIndex::new(8);
        index.note_insert(key(0, 0, 0));
        index.note_insert(key(20, 0, 0));
        let okey = OctantKey::new(0, 0, 0);

        index.get_mut(okey).unwrap().set_batches(vec![RenderBatch::new(
            InstanceHandle(1),
            GeometryHandle(1),
            ItemId(1),
            1,
        )]);
        index.note_remove(key(0, 0, 0));
        index.note_remove(key(20, 0, 0));

        assert_eq!(index.sweep_empty(), 1);
        assert!(index.get(okey).is_some());

        let batches = index.get_mut(okey).unwrap().take_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(index.sweep_empty(), 1);
        assert!(index.is_empty());
    }

    #[test]
    fn test_mark_all_dirty() {
        let mut index = OctantIndex::new(2);
        for x in 0..6 {
            index.note_insert(key(x, 0, 0));
        }
        for okey in index.dirty_octants().collect::<Vec<_>>() {
            index.clear_dirty(okey);
        }
        index.mark_all_dirty();
        assert_eq!(index.dirty_count(), 3);
    }

    #[test]
    fn test_drain_batches() {
        let mut index = OctantIndex::new(8);
        index.note_insert(key(0, 0, 0));
        index.get_mut(OctantKey::new(0, 0, 0)).unwrap().set_batches(vec![
            RenderBatch::new(InstanceHandle(1), GeometryHandle(1), ItemId(1), 1),
            RenderBatch::new(InstanceHandle(2), GeometryHandle(2), ItemId(2), 1),
        ]);
        let batches = index.drain_batches();
        assert_eq!(batches.len(), 2);
        assert!(index.is_empty());
        assert!(!index.has_dirty());
    }
}
