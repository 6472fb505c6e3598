//! Grid-cell-to-catchment crosswalk data model and multi-document loader.

pub mod loader;
pub mod types;

pub use loader::CrosswalkLoader;
pub use types::{CatchmentGroup, Crosswalk, ProjectionDescriptor};
