//! GPU compute backend.
//!
//! Runs the simulate, raster, compare and reduce stages as wgpu compute passes
//! against buffers allocated once per pipeline.

mod pipeline;

pub use pipeline::GpuPipeline;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Dispatch of {invocations} invocations exceeds workgroup limits")]
    DispatchTooLarge { invocations: u64 },

    #[error("Readback channel closed before the buffer was mapped")]
    ReadbackClosed,
}
