//! Subprocess execution for kiln: the worker pool, the process runner and the
//! tarball packager.
mod error;
pub use error::{ExecError, ExecResult};

mod utils;
pub use utils::{attach_limits, validate_limits};

pub mod metrics;

pub mod process;
pub use process::{LogConfig, ProcessRunner};

pub mod pool;
pub use pool::{WorkerHandle, WorkerPool, WorkerState};

mod package;
pub use package::TarPackager;
