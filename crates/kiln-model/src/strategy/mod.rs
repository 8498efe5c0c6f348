mod retry;
pub use retry::{RetryStrategy, UNKNOWN_ATTEMPT_CAP};
