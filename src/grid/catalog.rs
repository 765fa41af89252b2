//! Item mesh catalog: the meshes cells refer to by item id

use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Vec3};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::grid::cell::ItemId;
use crate::math::Aabb;
use crate::render::attachment::GeometryHandle;

/// Lookup of item meshes by id.
///
/// A catalog may lag behind placed content (e.g. during asset reload);
/// unknown items are skipped by batching and bounds, never an error.
pub trait ItemCatalog {
    fn has_item(&self, item: ItemId) -> bool;

    /// Local-space bounds of the item's mesh
    fn mesh_bounds(&self, item: ItemId) -> Option<Aabb>;

    /// Transform applied to the mesh before cell placement
    fn mesh_transform(&self, item: ItemId) -> Option<Mat4>;

    /// Renderer geometry for the item's mesh
    fn mesh_geometry(&self, item: ItemId) -> Option<GeometryHandle>;
}

/// A mesh that can be placed in cells
#[derive(Clone, Debug, PartialEq)]
pub struct ItemMesh {
    pub name: String,
    pub geometry: GeometryHandle,
    pub bounds: Aabb,
    pub transform: Mat4,
}

impl ItemMesh {
    /// Create a new item mesh with identity local transform
    pub fn new(name: impl Into<String>, geometry: GeometryHandle, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            geometry,
            bounds,
            transform: Mat4::IDENTITY,
        }
    }

    /// Unit cube centered on the origin
    pub fn unit_cube(name: impl Into<String>, geometry: GeometryHandle) -> Self {
        Self::new(name, geometry, Aabb::from_center_half_extent(Vec3::ZERO, Vec3::splat(0.5)))
    }

    /// Set the local transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Index file data (serialized as JSON for easy inspection)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LibraryIndex {
    version: u32,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct IndexEntry {
    id: u16,
    name: String,
    geometry: GeometryHandle,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
    transform: [f32; 16],
}

const INDEX_VERSION: u32 = 1;

/// In-memory item catalog
#[derive(Debug, Default)]
pub struct MeshLibrary {
    items: HashMap<ItemId, ItemMesh>,
    names: HashMap<String, ItemId>,
}

impl MeshLibrary {
    /// Create a new empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the mesh for `id`, returning the previous one
    pub fn add_item(&mut self, id: ItemId, mesh: ItemMesh) -> Option<ItemMesh> {
        let previous = self.remove_item(id);
        self.names.insert(mesh.name.clone(), id);
        self.items.insert(id, mesh);
        previous
    }

    /// Remove the mesh for `id`
    pub fn remove_item(&mut self, id: ItemId) -> Option<ItemMesh> {
        let mesh = self.items.remove(&id)?;
        if self.names.get(&mesh.name) == Some(&id) {
            self.names.remove(&mesh.name);
        }
        Some(mesh)
    }

    pub fn get_item(&self, id: ItemId) -> Option<&ItemMesh> {
        self.items.get(&id)
    }

    /// Find an item by name
    pub fn find_item(&self, name: &str) -> Option<ItemId> {
        self.names.get(name).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Item ids in ascending order
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.items.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Load a library from its JSON index file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let index: LibraryIndex = serde_json::from_str(&data)
            .map_err(|e| Error::Config(e.to_string()))?;
        if index.version != INDEX_VERSION {
            return Err(Error::Config(format!("Unsupported library version: {}", index.version)));
        }

        let mut library = Self::new();
        for entry in index.entries {
            let mesh = ItemMesh::new(
                entry.name,
                entry.geometry,
                Aabb::new(Vec3::from_array(entry.bounds_min), Vec3::from_array(entry.bounds_max)),
            )
            .with_transform(Mat4::from_cols_array(&entry.transform));
            library.add_item(ItemId(entry.id), mesh);
        }
        log::info!("Loaded mesh library with {} items", library.item_count());
        Ok(library)
    }

    /// Save the library as a JSON index file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let entries = self
            .item_ids()
            .into_iter()
            .map(|id| {
                let mesh = &self.items[&id];
                IndexEntry {
                    id: id.0,
                    name: mesh.name.clone(),
                    geometry: mesh.geometry,
                    bounds_min: mesh.bounds.min.to_array(),
                    bounds_max: mesh.bounds.max.to_array(),
                    transform: mesh.transform.to_cols_array(),
                }
            })
            .collect();
        let index = LibraryIndex { version: INDEX_VERSION, entries };
        let json = serde_json::to_string_pretty(&index)
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl ItemCatalog for MeshLibrary {
    fn has_item(&self, item: ItemId) -> bool {
        self.items.contains_key(&item)
    }

    fn mesh_bounds(&self, item: ItemId) -> Option<Aabb> {
        self.items.get(&item).map(|m| m.bounds)
    }

    fn mesh_transform(&self, item: ItemId) -> Option<Mat4> {
        self.items.get(&item).map(|m| m.transform)
    }

    fn mesh_geometry(&self, item: ItemId) -> Option<GeometryHandle> {
        self.items.get(&item).map(|m| m.geometry)
    }
}
