//! Cell records and the sparse cell store.

use std::collections::HashMap;

use glam::{IVec3, Mat4, Vec3};

use crate::core::config::MapConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::grid::coord::IndexKey;
use crate::grid::orientation::Orientation;

/// Raw item value that erases a cell when passed to placement calls
pub const ERASE_ITEM: i32 = -1;

/// Identifier of an item mesh in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u16);

impl ItemId {
    /// Interpret a raw placement value: negative means erase.
    pub fn from_raw(raw: i32) -> Result<Option<ItemId>> {
        if raw < 0 {
            return Ok(None);
        }
        u16::try_from(raw)
            .map(|id| Some(ItemId(id)))
            .map_err(|_| Error::InvalidItem(raw))
    }
}

/// A placed item with orientation and sub-cell offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub item: ItemId,
    pub orientation: Orientation,
    pub offset: Vec3,
}

impl Cell {
    pub fn new(item: ItemId, orientation: Orientation, offset: Vec3) -> Self {
        Self { item, orientation, offset }
    }

    /// Transform placing this cell at `coord`, before the item's own mesh transform.
    pub fn placement(&self, coord: IVec3, config: &MapConfig) -> Mat4 {
        let origin = config.map_to_local(coord) + self.offset;
        let basis = self.orientation.to_basis() * config.cell_scale;
        Mat4::from_translation(origin) * Mat4::from_mat3(basis)
    }
}

/// Sparse map from bounded coordinates to cells.
#[derive(Debug, Default)]
pub struct CellStore {
    cells: HashMap<IndexKey, Cell>,
}

impl CellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place or erase a cell.
    ///
    /// A negative `item` erases. Out-of-range coordinates fail before any
    /// mutation. Returns the cell previously stored at `coord`.
    pub fn set(
        &mut self,
        coord: IVec3,
        item: i32,
        orientation: Orientation,
        offset: Vec3,
    ) -> Result<Option<Cell>> {
        let key = IndexKey::new(coord)?;
        let previous = match ItemId::from_raw(item)? {
            Some(item) => self.insert(key, Cell::new(item, orientation, offset)),
            None => self.erase(key),
        };
        Ok(previous)
    }

    /// Stored cell at `coord`; out-of-range coordinates are simply absent.
    pub fn get(&self, coord: IVec3) -> Option<Cell> {
        IndexKey::new(coord).ok().and_then(|key| self.get_key(key))
    }

    /// Erase the cell at `coord`, returning it.
    pub fn remove(&mut self, coord: IVec3) -> Result<Option<Cell>> {
        self.set(coord, ERASE_ITEM, Orientation::IDENTITY, Vec3::ZERO)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, key: IndexKey, cell: Cell) -> Option<Cell> {
        self.cells.insert(key, cell)
    }

    pub fn erase(&mut self, key: IndexKey) -> Option<Cell> {
        self.cells.remove(&key)
    }

    pub fn get_key(&self, key: IndexKey) -> Option<Cell> {
        self.cells.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate stored cells in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (IndexKey, &Cell)> {
        self.cells.iter().map(|(k, c)| (*k, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::coord::COORD_LIMIT;

    fn o(i: u8) -> Orientation {
        Orientation::new(i).unwrap()
    }

    #[test]
    fn test_item_from_raw() {
        assert_eq!(ItemId::from_raw(-1).unwrap(), None);
        assert_eq!(ItemId::from_raw(-42).unwrap(), None);
        assert_eq!(ItemId::from_raw(7).unwrap(), Some(ItemId(7)));
        assert!(matches!(ItemId::from_raw(70_000), Err(Error::InvalidItem(70_000))));
    }

    #[test]
    fn test_set_then_get() {
        let mut store = CellStore::new();
        let coord = IVec3::new(3, -4, 5);
        let offset = Vec3::new(0.25, 0.0, -0.5);

        let previous = store.set(coord, 12, o(5), offset).unwrap();
        assert!(previous.is_none());
        assert_eq!(store.get(coord), Some(Cell::new(ItemId(12), o(5), offset)));
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut store = CellStore::new();
        let coord = IVec3::ZERO;
        store.set(coord, 1, o(0), Vec3::ZERO).unwrap();

        let previous = store.set(coord, 2, o(3), Vec3::ZERO).unwrap();
        assert_eq!(previous.map(|c| c.item), Some(ItemId(1)));
        assert_eq!(store.get(coord).map(|c| c.item), Some(ItemId(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erase_is_idempotent() {
        let mut store = CellStore::new();
        let coord = IVec3::new(1, 1, 1);
        store.set(coord, 4, o(0), Vec3::ZERO).unwrap();

        let first = store.set(coord, ERASE_ITEM, o(0), Vec3::ZERO).unwrap();
        assert!(first.is_some());
        assert_eq!(store.get(coord), None);

        let second = store.remove(coord).unwrap();
        assert!(second.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_out_of_range_leaves_store_unchanged() {
        let mut store = CellStore::new();
        store.set(IVec3::ZERO, 1, o(0), Vec3::ZERO).unwrap();

        for coord in [
            IVec3::new(COORD_LIMIT, 0, 0),
            IVec3::new(0, -COORD_LIMIT, 0),
            IVec3::new(0, 0, COORD_LIMIT + 5),
        ] {
            assert!(matches!(store.set(coord, 1, o(0), Vec3::ZERO), Err(Error::OutOfRange(_))));
            assert!(matches!(store.remove(coord), Err(Error::OutOfRange(_))));
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(IVec3::new(COORD_LIMIT, 0, 0)), None);
    }

    #[test]
    fn test_invalid_item_leaves_store_unchanged() {
        let mut store = CellStore::new();
        assert!(store.set(IVec3::ZERO, 1 << 16, o(0), Vec3::ZERO).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut store = CellStore::new();
        for x in 0..10 {
            store.set(IVec3::new(x, 0, 0), 1, o(0), Vec3::ZERO).unwrap();
        }
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_placement_transform() {
        let config = MapConfig::default();
        let cell = Cell::new(ItemId(0), Orientation::IDENTITY, Vec3::new(0.0, 0.25, 0.0));
        let m = cell.placement(IVec3::new(2, 0, -1), &config);
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(2.5, 0.75, -0.5));
    }
}
