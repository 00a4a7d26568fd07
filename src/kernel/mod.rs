//! Kernel assembly and multi-device dispatch.
//!
//! [`assemble`] turns a recorded trace plus an ordered parameter list into
//! complete WGSL; [`Kernel`] compiles that source once per distinct device
//! context and fans invocations out across partitioned data.

mod assemble;
mod dispatch;

pub use assemble::{assemble, KernelParam, KernelSource, ParamInfo, ParamKind};
pub use dispatch::{build_kernel, Arg, Kernel, ScalarValue, VectorArg};
