pub mod checkpoint;
pub mod coordinator;
pub mod entity;
pub mod environment;
pub mod error;
pub mod extract;
pub mod logging;
pub mod registry;
pub mod stats;
pub mod status;
pub mod universe;

pub use error::{ExtractionFailure, FetchError, HarvestError};

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_CHECKPOINT: &str = "checkpoint";
pub const TARGET_COORDINATOR: &str = "coordinator";
pub const TARGET_REGISTRY: &str = "registry";
