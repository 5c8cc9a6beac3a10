pub mod kernel;

pub use self::kernel::{Connectivity, Kernel, KernelRadius, KernelSpec, MeanWindow};
