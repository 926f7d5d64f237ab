//! Object storage: source locations and the pre-load reachability check

pub mod probe;
pub mod uri;

pub use probe::{S3ObjectStore, preflight};
pub use uri::StorageUri;
