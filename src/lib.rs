//! symkern: record numeric algorithms symbolically, generate compute
//! kernels, run them across partitioned device data.
//!
//! Pipeline:
//! 1. [`sym`]: run a generic algorithm over [`Sym<T>`] placeholders; each
//!    assignment lands in a [`Recorder`] as one kernel statement.
//! 2. [`assemble`]: wrap the recorded body and an ordered parameter list
//!    into complete WGSL source.
//! 3. [`kernel`]: compile once per device context, bind [`DeviceVector`]
//!    partitions and scalars positionally, dispatch.
//!
//! ```
//! use symkern::{Recorder, Sym};
//!
//! let rec = Recorder::new();
//! let mut x = Sym::<f32>::vector_param(&rec);
//! let y = Sym::<f32>::vector_param_const(&rec);
//! x += 2.0f32 * &y;
//! assert_eq!(rec.body(), "var0 = (var0 + (2e0f * var1));\n");
//! ```

pub mod error;
pub mod gpu;
pub mod kernel;
pub mod sym;

pub use error::Error;
pub use gpu::{DeviceContext, DeviceVector};
pub use kernel::{assemble, build_kernel, Arg, Kernel, KernelParam, KernelSource, ScalarValue};
pub use sym::{Expr, Recorder, Role, Scalar, Sym};
