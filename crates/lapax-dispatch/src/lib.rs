//! # Lapax Dispatch
//!
//! Lowers batched dense linear-algebra operations to calls of native
//! accelerator kernels.
//!
//! ## Overview
//!
//! The dispatch layer never computes anything. For each operation it
//! inspects the operand shapes in an execution graph, picks a kernel,
//! asks a [`KernelProvider`] for that kernel's workspace size and opaque
//! parameter blob, pins the memory layout of every buffer, and emits one
//! custom call through a [`Builder`](lapax_ir::Builder). The caller gets
//! back handles to the outputs it asked for, in its own orientation.
//!
//! ```text
//!  operands ──► shape ──► select ──► descriptor ──► layout ──► assemble ──► outputs
//!               resolve    kernel     (provider)     plan       emit call
//! ```
//!
//! | Operation | Kernel                                           |
//! |-----------|--------------------------------------------------|
//! | `trsm`    | `hipblas_trsm_batched`                           |
//! | `potrf`   | `hipsolver_potrf`                                |
//! | `getrf`   | `hipblas_getrf_batched` or `hipsolver_getrf`     |
//! | `geqrf`   | `hipsolver_geqrf`                                |
//! | `orgqr`   | `hipsolver_orgqr`                                |
//! | `syevd`   | `hipsolver_syevd`                                |
//! | `gesvd`   | `hipsolver_gesvd`                                |
//!
//! ## Errors
//!
//! Structural problems (mismatched shapes, unsupported options, element
//! types the provider rejects) fail synchronously with a [`DispatchError`]
//! and emit nothing. Numerical failure of an individual problem in a batch
//! is reported by the kernel in the returned status buffer and is not an
//! error here.
//!
//! ## Example
//!
//! ```
//! use lapax_dispatch::Dispatcher;
//! use lapax_ir::{ArrayShape, Builder, DType, Graph};
//! use lapax_provider::default_provider;
//!
//! let provider = default_provider();
//! let dispatcher = Dispatcher::new(provider.as_ref());
//!
//! let mut graph = Graph::new();
//! let a = graph.parameter(ArrayShape::new(DType::Float32, [10, 4, 4]));
//! let chol = dispatcher.potrf(&mut graph, a, true).unwrap();
//!
//! assert_eq!(graph.array_shape(chol.info).unwrap().dims.as_slice(), &[10]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

pub mod assemble;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod ops;
pub mod select;
pub mod shape;

pub use config::{ConfigError, DispatchConfig};
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use ops::{
    GeqrfOutput, GesvdOutput, GetrfOutput, OrgqrOutput, PotrfOutput, SvdOptions, SyevdOutput,
    TrsmOptions, TrsmOutput,
};
pub use select::{LuKernel, SvdPath};

use descriptor::DescriptorBuilder;
use lapax_provider::KernelProvider;
use std::fmt;

/// Entry point for all operations.
///
/// Holds no mutable state: every call plans from scratch, so one
/// dispatcher can serve several compiler threads.
#[derive(Clone)]
pub struct Dispatcher<'p> {
    provider: &'p dyn KernelProvider,
    config: DispatchConfig,
}

impl<'p> Dispatcher<'p> {
    /// Creates a dispatcher with the default configuration.
    #[must_use]
    pub fn new(provider: &'p dyn KernelProvider) -> Self {
        Self::with_config(provider, DispatchConfig::default())
    }

    /// Creates a dispatcher with an explicit configuration.
    #[must_use]
    pub fn with_config(provider: &'p dyn KernelProvider, config: DispatchConfig) -> Self {
        tracing::debug!(
            provider = provider.name(),
            getrf_batched_threshold = config.getrf_batched_threshold,
            "created dispatcher"
        );
        Self { provider, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The kernel provider.
    #[must_use]
    pub fn provider(&self) -> &'p dyn KernelProvider {
        self.provider
    }

    fn descriptors(&self) -> DescriptorBuilder<'p> {
        DescriptorBuilder::new(self.provider)
    }
}

impl fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}
