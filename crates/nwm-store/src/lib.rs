//! Object-store adapter used by every stage that reads or writes a forcing
//! input, crosswalk document, or output artifact.

pub mod store;
pub mod uri;

pub use store::ObjectStoreAdapter;
pub use uri::{classify, split_gcs, split_s3, UriKind};
