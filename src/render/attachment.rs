//! Render attachment interface and batch handles.

use glam::Mat4;
use thiserror::Error;

use crate::grid::cell::ItemId;

/// Renderer-side geometry for one item mesh, supplied by the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GeometryHandle(pub u64);

/// Renderer-side instanced draw resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// Failure to allocate a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Render attachment exhausted (capacity {capacity})")]
    Exhausted { capacity: usize },

    #[error("Batch has no instances")]
    EmptyInstances,

    #[error("GPU error: {0}")]
    Gpu(String),
}

/// One instanced draw covering every cell of one item within one octant.
///
/// Not `Clone`: the handle must be handed back through
/// [`RenderAttachment::release_batch`] exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct RenderBatch {
    instance: InstanceHandle,
    geometry: GeometryHandle,
    item: ItemId,
    instance_count: u32,
}

impl RenderBatch {
    /// Called by attachment implementations when a batch is allocated.
    pub fn new(instance: InstanceHandle, geometry: GeometryHandle, item: ItemId, instance_count: u32) -> Self {
        Self { instance, geometry, item, instance_count }
    }

    pub fn instance(&self) -> InstanceHandle {
        self.instance
    }

    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }
}

/// Host renderer boundary used by the rebuild pass.
///
/// Calls are synchronous. `create_batch` may fail under resource pressure;
/// the caller keeps the affected cells and retries on a later pass.
pub trait RenderAttachment {
    /// Allocate an instanced draw of `geometry` with one transform per instance.
    fn create_batch(
        &mut self,
        geometry: GeometryHandle,
        item: ItemId,
        instances: &[Mat4],
    ) -> Result<RenderBatch, BatchError>;

    /// Free the renderer resources behind `batch`.
    fn release_batch(&mut self, batch: RenderBatch);

    fn set_batch_visible(&mut self, batch: &RenderBatch, visible: bool);
}

impl<R: RenderAttachment + ?Sized> RenderAttachment for &mut R {
    fn create_batch(
        &mut self,
        geometry: GeometryHandle,
        item: ItemId,
        instances: &[Mat4],
    ) -> Result<RenderBatch, BatchError> {
        (**self).create_batch(geometry, item, instances)
    }

    fn release_batch(&mut self, batch: RenderBatch) {
        (**self).release_batch(batch)
    }

    fn set_batch_visible(&mut self, batch: &RenderBatch, visible: bool) {
        (**self).set_batch_visible(batch, visible)
    }
}

/// Batches allocated during one octant rebuild that are not yet owned by the octant.
///
/// Anything still held when the guard drops is released, so an early exit
/// never leaks renderer resources.
pub struct PendingBatches<'a, R: RenderAttachment + ?Sized> {
    attachment: &'a mut R,
    batches: Vec<RenderBatch>,
}

impl<'a, R: RenderAttachment + ?Sized> PendingBatches<'a, R> {
    pub fn new(attachment: &'a mut R) -> Self {
        Self { attachment, batches: Vec::new() }
    }

    /// Allocate a batch and hold it until [`commit`](Self::commit).
    pub fn create(
        &mut self,
        geometry: GeometryHandle,
        item: ItemId,
        instances: &[Mat4],
        visible: bool,
    ) -> Result<(), BatchError> {
        let batch = self.attachment.create_batch(geometry, item, instances)?;
        if !visible {
            self.attachment.set_batch_visible(&batch, false);
        }
        self.batches.push(batch);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Hand the batches to their owner.
    pub fn commit(mut self) -> Vec<RenderBatch> {
        std::mem::take(&mut self.batches)
    }
}

impl<R: RenderAttachment + ?Sized> Drop for PendingBatches<'_, R> {
    fn drop(&mut self) {
        for batch in self.batches.drain(..) {
            log::debug!("Releasing uncommitted batch for item {:?}", batch.item());
            self.attachment.release_batch(batch);
        }
    }
}
