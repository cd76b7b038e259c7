//! Per-operation dispatch.
//!
//! Each operation follows the same pipeline: resolve shapes, select a
//! kernel, build its descriptor, plan layouts, then emit the call and hand
//! back the caller-visible outputs. Status buffers are returned as written
//! by the kernel; nothing here inspects them.

mod geqrf;
mod gesvd;
mod getrf;
mod orgqr;
mod potrf;
mod syevd;
mod trsm;

pub use geqrf::GeqrfOutput;
pub use gesvd::{GesvdOutput, SvdOptions};
pub use getrf::GetrfOutput;
pub use orgqr::OrgqrOutput;
pub use potrf::PotrfOutput;
pub use syevd::SyevdOutput;
pub use trsm::{TrsmOptions, TrsmOutput};
