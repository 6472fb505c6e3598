//! Run configuration: parses a config file path or an inline JSON/YAML
//! blob into a validated [`forcing_core::RunContext`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use forcing_core::{default_nprocs, ForcingError, OutputFormat, Result, RunContext};

/// Top-level shape of a forcing-processor configuration document, mirroring
/// the `forcing.*` / `storage.*` / `run.*` key namespaces. Echoed verbatim
/// to `conf.json` by the metadata collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub forcing: ForcingSection,
    pub storage: StorageSection,
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcingSection {
    /// One or more crosswalk document paths/URIs.
    #[serde(deserialize_with = "one_or_many")]
    pub weight_file: Vec<String>,
    /// Path to a text file containing one NWM input URI per line.
    pub nwm_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    pub output_path: String,
    pub output_file_type: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSection {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub collect_stats: bool,
    pub nprocs: Option<usize>,
    pub nfile_chunk: Option<usize>,
}

/// Accepts either a single string or a list of strings, mirroring the
/// upstream tool's "`weight_file` may be a string or a list" convenience.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

/// Parse `raw` as either a path to a YAML/JSON config file or a literal
/// JSON blob, then validate it into a [`RunContext`].
///
/// Validation happens before any I/O against the input file list or
/// crosswalk documents: only `output_file_type` membership and the shape
/// of the document itself are checked here.
pub fn load(raw: &str) -> Result<(Config, RunContext)> {
    let config = parse_document(raw)?;
    let ctx = validate(&config)?;
    Ok((config, ctx))
}

fn parse_document(raw: &str) -> Result<Config> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(raw).map_err(ForcingError::from);
    }

    let path = std::path::Path::new(raw);
    let contents = std::fs::read_to_string(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&contents).map_err(ForcingError::from)
    } else {
        serde_yaml::from_str(&contents)
            .map_err(|e| ForcingError::configuration(format!("invalid YAML config: {e}")))
    }
}

fn validate(config: &Config) -> Result<RunContext> {
    if config.forcing.weight_file.is_empty() {
        return Err(ForcingError::configuration(
            "forcing.weight_file must name at least one crosswalk document",
        ));
    }

    let mut formats = Vec::with_capacity(config.storage.output_file_type.len());
    for tag in &config.storage.output_file_type {
        formats.push(OutputFormat::parse(tag)?);
    }
    if formats.is_empty() {
        return Err(ForcingError::configuration(
            "storage.output_file_type must name at least one format",
        ));
    }

    let nprocs = config.run.nprocs.unwrap_or_else(default_nprocs).max(1);
    let nfile_chunk = config.run.nfile_chunk.unwrap_or(100_000).max(1);

    Ok(RunContext {
        verbose: config.run.verbose,
        collect_stats: config.run.collect_stats,
        nprocs,
        nfile_chunk,
        output_path: Arc::from(config.storage.output_path.as_str()),
        output_file_types: Arc::from(formats),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_output_format() {
        let json = r#"{
            "forcing": {"weight_file": "w.json", "nwm_file": "files.txt"},
            "storage": {"output_path": "/tmp/out", "output_file_type": ["netcdf"]}
        }"#;
        let err = load(json).unwrap_err();
        assert!(matches!(err, ForcingError::Configuration(_)));
    }

    #[test]
    fn accepts_single_weight_file_as_string() {
        let json = r#"{
            "forcing": {"weight_file": "w.json", "nwm_file": "files.txt"},
            "storage": {"output_path": "/tmp/out", "output_file_type": ["csv"]}
        }"#;
        let (config, ctx) = load(json).unwrap();
        assert_eq!(config.forcing.weight_file, vec!["w.json".to_string()]);
        assert!(ctx.wants(OutputFormat::Csv));
        assert!(ctx.nprocs >= 1);
    }

    #[test]
    fn nfile_chunk_defaults_to_one_hundred_thousand() {
        let json = r#"{
            "forcing": {"weight_file": ["a.json", "b.json"], "nwm_file": "files.txt"},
            "storage": {"output_path": "/tmp/out", "output_file_type": ["csv", "tar"]}
        }"#;
        let (_, ctx) = load(json).unwrap();
        assert_eq!(ctx.nfile_chunk, 100_000);
        assert!(ctx.wants(OutputFormat::Tar));
    }

    #[test]
    fn loads_yaml_from_a_file_path() {
        let yaml = "
forcing:
  weight_file:
    - VPU_16/weights.json
  nwm_file: files.txt
storage:
  output_path: /tmp/out
  output_file_type: [parquet]
run:
  nprocs: 4
";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        std::fs::write(&path, yaml).unwrap();

        let (config, ctx) = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.forcing.weight_file, vec!["VPU_16/weights.json".to_string()]);
        assert_eq!(ctx.nprocs, 4);
        assert!(ctx.wants(OutputFormat::Parquet));
    }
}
