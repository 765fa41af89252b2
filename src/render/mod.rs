//! Render attachment boundary and backends

pub mod attachment;
pub mod headless;
pub mod instance_buffer;

pub use attachment::{BatchError, GeometryHandle, InstanceHandle, PendingBatches, RenderAttachment, RenderBatch};
pub use headless::HeadlessAttachment;
pub use instance_buffer::{GpuAttachment, InstanceRaw};
