//! Decodes NWM forcing grid files into the fixed-order variable tensor and
//! valid-time stamp the rest of the pipeline consumes.

mod hdf5_quiet;

pub mod decoder;

pub use decoder::{decode, DecodedGrid};
pub use hdf5_quiet::silence_hdf5_errors;
