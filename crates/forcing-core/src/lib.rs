//! Shared error types and run context for the NWM-to-catchment forcing
//! pipeline. Every other crate in this workspace depends on this one; it
//! carries no I/O of its own.

pub mod context;
pub mod error;

pub use context::{default_nprocs, OutputFormat, RunContext, INPUT_VARIABLES, OUTPUT_VARIABLES};
pub use error::{ForcingError, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_rejects_unknown_tags() {
        assert!(OutputFormat::parse("csv").is_ok());
        assert!(OutputFormat::parse("parquet").is_ok());
        assert!(OutputFormat::parse("tar").is_ok());
        assert!(OutputFormat::parse("netcdf").is_err());
    }

    #[test]
    fn default_nprocs_is_at_least_one() {
        assert!(default_nprocs() >= 1);
    }
}
