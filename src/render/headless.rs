//! CPU-only render attachment with a fixed batch capacity.
//!
//! Keeps every live batch's instance transforms so tools and tests can
//! inspect what would be drawn. Allocation fails once `capacity` batches
//! are live, mirroring a bounded GPU pool.

use std::collections::HashMap;

use glam::Mat4;

use crate::grid::cell::ItemId;
use crate::render::attachment::{BatchError, GeometryHandle, InstanceHandle, RenderAttachment, RenderBatch};

/// Default maximum number of simultaneously live batches
pub const DEFAULT_BATCH_CAPACITY: usize = 65_536;

/// Record of one live batch
#[derive(Clone, Debug)]
pub struct LiveBatch {
    pub geometry: GeometryHandle,
    pub item: ItemId,
    pub instances: Vec<Mat4>,
    pub visible: bool,
}

/// Render attachment that stores batches in memory.
#[derive(Debug)]
pub struct HeadlessAttachment {
    capacity: usize,
    live: HashMap<InstanceHandle, LiveBatch>,
    next_id: u64,
    created_count: u64,
    released_count: u64,
    failed_count: u64,
}

impl HeadlessAttachment {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BATCH_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            live: HashMap::new(),
            next_id: 1,
            created_count: 0,
            released_count: 0,
            failed_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the live batch limit; existing batches are kept.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&LiveBatch> {
        self.live.get(&handle)
    }

    pub fn is_visible(&self, handle: InstanceHandle) -> Option<bool> {
        self.live.get(&handle).map(|b| b.visible)
    }

    pub fn live_batches(&self) -> impl Iterator<Item = (InstanceHandle, &LiveBatch)> {
        self.live.iter().map(|(h, b)| (*h, b))
    }

    /// Total instances across live batches
    pub fn live_instance_count(&self) -> usize {
        self.live.values().map(|b| b.instances.len()).sum()
    }

    pub fn created_count(&self) -> u64 {
        self.created_count
    }

    pub fn released_count(&self) -> u64 {
        self.released_count
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }
}

impl Default for HeadlessAttachment {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderAttachment for HeadlessAttachment {
    fn create_batch(
        &mut self,
        geometry: GeometryHandle,
        item: ItemId,
        instances: &[Mat4],
    ) -> Result<RenderBatch, BatchError> {
        if instances.is_empty() {
            self.failed_count += 1;
            return Err(BatchError::EmptyInstances);
        }
        if self.live.len() >= self.capacity {
            self.failed_count += 1;
            return Err(BatchError::Exhausted { capacity: self.capacity });
        }

        let handle = InstanceHandle(self.next_id);
        self.next_id += 1;
        self.created_count += 1;
        self.live.insert(handle, LiveBatch {
            geometry,
            item,
            instances: instances.to_vec(),
            visible: true,
        });

        Ok(RenderBatch::new(handle, geometry, item, instances.len() as u32))
    }

    fn release_batch(&mut self, batch: RenderBatch) {
        if self.live.remove(&batch.instance()).is_some() {
            self.released_count += 1;
        } else {
            log::warn!("Release of unknown batch {:?}", batch.instance());
        }
    }

    fn set_batch_visible(&mut self, batch: &RenderBatch, visible: bool) {
        if let Some(live) = self.live.get_mut(&batch.instance()) {
            live.visible = visible;
        }
    }
}
