//! The immutable run context threaded through every stage of the pipeline.
//!
//! The upstream tool this crate replaces leans on module-level globals
//! (a verbose flag, the storage type, the variable lists, a crosswalk
//! snapshot) that every worker process inherits via `fork`. There is no
//! such mechanism here, so [`RunContext`] plays the same role explicitly:
//! it is built once from the run configuration and cloned (cheaply - it is
//! all `Arc`/`Copy` fields) into every worker.

use std::sync::Arc;

use crate::error::{ForcingError, Result};

/// One of the tabular output formats a run may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Csv,
    Parquet,
    Tar,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            "tar" => Ok(Self::Tar),
            other => Err(ForcingError::configuration(format!(
                "{other} for output_file_type is not accepted! Accepted: csv, parquet, tar"
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Tar => "tar",
        }
    }
}

/// The nine output variables, in the fixed order the downstream hydrologic
/// model expects them.
pub const OUTPUT_VARIABLES: [&str; 9] = [
    "UGRD_10maboveground",
    "VGRD_10maboveground",
    "DLWRF_surface",
    "APCP_surface",
    "precip_rate",
    "TMP_2maboveground",
    "SPFH_2maboveground",
    "PRES_surface",
    "DSWRF_surface",
];

/// The nine input variables read from each NWM grid file, in read order.
/// `RAINRATE` appears twice: once feeding `APCP_surface` unchanged, once
/// feeding `precip_rate` scaled by 3600. The decoder reads it once and
/// derives both outputs from that single buffer (see [`crate::context`]
/// module docs and `nwm-grid`).
pub const INPUT_VARIABLES: [&str; 9] = [
    "U2D", "V2D", "LWDOWN", "RAINRATE", "RAINRATE", "T2D", "Q2D", "PSFC", "SWDOWN",
];

/// Read-only settings shared by every stage and worker of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub verbose: bool,
    pub collect_stats: bool,
    pub nprocs: usize,
    pub nfile_chunk: usize,
    pub output_path: Arc<str>,
    pub output_file_types: Arc<[OutputFormat]>,
}

impl RunContext {
    pub fn wants(&self, fmt: OutputFormat) -> bool {
        self.output_file_types.contains(&fmt)
    }

    /// The non-tar format archive members are serialized in: parquet
    /// whenever it was requested, csv otherwise.
    pub fn archive_member_format(&self) -> OutputFormat {
        if self.wants(OutputFormat::Parquet) {
            OutputFormat::Parquet
        } else {
            OutputFormat::Csv
        }
    }
}

/// `floor(0.5 * logical cpus)`, the default for `run.nprocs`.
pub fn default_nprocs() -> usize {
    (num_cpus::get() as f64 * 0.5).floor().max(1.0) as usize
}
