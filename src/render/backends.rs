pub mod cpu;

/// wgpu texture backend
#[cfg(feature = "backend_wgpu")]
pub mod wgpu;
