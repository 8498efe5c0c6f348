mod env;
pub use env::{Env, KeyValue};

mod flag;
pub use flag::Flag;

mod labels;
pub use labels::Labels;

mod constants;
pub use constants::*;

/// Identifier of a build session.
///
/// Owned by the session layer; the engine only uses it to scope directories, URLs and metric tags.
pub type SessionId = String;

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;
