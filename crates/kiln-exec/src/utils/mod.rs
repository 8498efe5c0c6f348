mod limits;
pub use limits::{attach_limits, validate_limits};

mod log;
