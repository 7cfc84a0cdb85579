use thiserror::Error;

/// Failure modes of the render pipeline.
///
/// Configuration errors (`MissingEntryPoint`, `PipelineCreation`,
/// `NoSuitableDevice`) are fatal at startup. Resource errors abort the frame
/// that hit them; previously uploaded buffers stay bound and the rebuild is
/// retried on the next frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no suitable physical device found")]
    NoSuitableDevice,

    #[error("compute shader `{0}` has no `main` entry point")]
    MissingEntryPoint(&'static str),

    #[error("failed to create {what}: {detail}")]
    PipelineCreation { what: &'static str, detail: String },

    #[error("gpu buffer allocation failed ({count} x {stride} bytes): {detail}")]
    BufferAllocation {
        count: usize,
        stride: usize,
        detail: String,
    },

    #[error("gpu buffer upload failed: {0}")]
    BufferUpload(String),

    #[error("render target allocation failed ({width}x{height}): {detail}")]
    TargetAllocation {
        width: u32,
        height: u32,
        detail: String,
    },

    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),

    #[error("presentation failed: {0}")]
    Present(String),
}
