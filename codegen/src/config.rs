//! Emitter configuration with bon builders and environment fallbacks.

use bon::bon;

// ============================================================================
// EMITTER
// ============================================================================

/// Device limits and naming used while emitting one fusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Shared memory available to one program instance, in bytes.
    pub shared_memory_bytes: usize,
    /// Software pipelining depth assumed by the shared memory estimate.
    pub num_stages: usize,
    /// Name of the emitted function; the fusion name when unset.
    pub kernel_name: Option<String>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self { shared_memory_bytes: 49152, num_stages: 1, kernel_name: None }
    }
}

#[bon]
impl EmitterConfig {
    #[builder]
    pub fn builder(
        #[builder(default = 49152)] shared_memory_bytes: usize,
        #[builder(default = 1)] num_stages: usize,
        kernel_name: Option<String>,
    ) -> Self {
        Self { shared_memory_bytes, num_stages, kernel_name }
    }

    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// * `TILEGEN_SHARED_MEMORY_BYTES` - shared memory limit (default 49152)
    /// * `TILEGEN_NUM_STAGES` - pipelining depth (default 1)
    /// * `TILEGEN_KERNEL_NAME` - emitted function name
    pub fn from_env() -> Self {
        let shared_memory_bytes =
            std::env::var("TILEGEN_SHARED_MEMORY_BYTES").ok().and_then(|s| s.parse().ok()).unwrap_or(49152);
        let num_stages = std::env::var("TILEGEN_NUM_STAGES").ok().and_then(|s| s.parse().ok()).unwrap_or(1);
        let kernel_name = std::env::var("TILEGEN_KERNEL_NAME").ok().filter(|s| !s.is_empty());

        Self { shared_memory_bytes, num_stages: num_stages.max(1), kernel_name }
    }
}

// ============================================================================
// BUFFER ALIGNMENT
// ============================================================================

/// Guaranteed alignment, in bytes, of kernel argument buffers by allocation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAlignment {
    pub entry_parameter: usize,
    pub constant: usize,
    pub allocated: usize,
}

impl Default for BufferAlignment {
    fn default() -> Self {
        Self { entry_parameter: 16, constant: 128, allocated: 128 }
    }
}

#[bon]
impl BufferAlignment {
    #[builder]
    pub fn builder(
        #[builder(default = 16)] entry_parameter: usize,
        #[builder(default = 128)] constant: usize,
        #[builder(default = 128)] allocated: usize,
    ) -> Self {
        Self { entry_parameter, constant, allocated }
    }
}
