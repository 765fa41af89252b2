//! wgpu-backed render attachment: one instance storage buffer per batch

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::grid::cell::ItemId;
use crate::render::attachment::{BatchError, GeometryHandle, InstanceHandle, RenderAttachment, RenderBatch};

/// Per-instance data for GPU (must match shader struct exactly)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    /// Column-major model matrix (64 bytes)
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    pub fn from_transform(transform: &Mat4) -> Self {
        Self { model: transform.to_cols_array_2d() }
    }
}

/// A live batch on the GPU
pub struct GpuBatch {
    /// Instance buffer (STORAGE | VERTEX)
    pub buffer: wgpu::Buffer,
    /// Mesh drawn by this batch
    pub geometry: GeometryHandle,
    pub item: ItemId,
    pub instance_count: u32,
    pub visible: bool,
}

/// Render attachment allocating wgpu buffers.
pub struct GpuAttachment {
    device: wgpu::Device,
    queue: wgpu::Queue,
    batches: HashMap<InstanceHandle, GpuBatch>,
    next_id: u64,
    /// Largest instance count a single buffer can hold on this device
    max_instances: usize,
    /// Upper bound on live batches (0 = unbounded)
    max_batches: usize,
}

impl GpuAttachment {
    /// Create an attachment for `device`, sizing batches to its storage limits.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limit = device.limits().max_storage_buffer_binding_size as usize;
        let max_instances = limit / std::mem::size_of::<InstanceRaw>();
        Self {
            device,
            queue,
            batches: HashMap::new(),
            next_id: 1,
            max_instances,
            max_batches: 0,
        }
    }

    /// Limit the number of simultaneously live batches
    pub fn with_max_batches(mut self, max_batches: usize) -> Self {
        self.max_batches = max_batches;
        self
    }

    pub fn batch(&self, handle: InstanceHandle) -> Option<&GpuBatch> {
        self.batches.get(&handle)
    }

    /// Batches to draw this frame
    pub fn visible_batches(&self) -> impl Iterator<Item = &GpuBatch> {
        self.batches.values().filter(|b| b.visible)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

impl RenderAttachment for GpuAttachment {
    fn create_batch(
        &mut self,
        geometry: GeometryHandle,
        item: ItemId,
        instances: &[Mat4],
    ) -> Result<RenderBatch, BatchError> {
        if instances.is_empty() {
            return Err(BatchError::EmptyInstances);
        }
        if instances.len() > self.max_instances {
            return Err(BatchError::Gpu(format!(
                "{} instances exceed the storage binding limit of {}",
                instances.len(),
                self.max_instances
            )));
        }
        if self.max_batches > 0 && self.batches.len() >= self.max_batches {
            return Err(BatchError::Exhausted { capacity: self.max_batches });
        }

        let raw: Vec<InstanceRaw> = instances.iter().map(InstanceRaw::from_transform).collect();
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("trixel_instances"),
            size: std::mem::size_of_val(raw.as_slice()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, bytemuck::cast_slice(&raw));

        let handle = InstanceHandle(self.next_id);
        self.next_id += 1;
        self.batches.insert(handle, GpuBatch {
            buffer,
            geometry,
            item,
            instance_count: instances.len() as u32,
            visible: true,
        });

        Ok(RenderBatch::new(handle, geometry, item, instances.len() as u32))
    }

    fn release_batch(&mut self, batch: RenderBatch) {
        match self.batches.remove(&batch.instance()) {
            Some(gpu) => gpu.buffer.destroy(),
            None => log::warn!("Release of unknown GPU batch {:?}", batch.instance()),
        }
    }

    fn set_batch_visible(&mut self, batch: &RenderBatch, visible: bool) {
        if let Some(gpu) = self.batches.get_mut(&batch.instance()) {
            gpu.visible = visible;
        }
    }
}
