//! Metadata collector: run-summary statistics written alongside the
//! forcing output when `run.collect_stats` is enabled.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::info;

use forcing_core::{OutputFormat, Result, RunContext};
use nwm_store::ObjectStoreAdapter;

use crate::config::Config;

/// How many leading input files to sample for size statistics, per the
/// "first few files, or all of them if fewer" rule.
const INPUT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SizeStats {
    pub count: usize,
    pub average_bytes: f64,
    pub median_bytes: f64,
    pub stddev_bytes: f64,
}

impl SizeStats {
    fn from_samples(mut samples: Vec<u64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();

        let count = samples.len();
        let sum: u64 = samples.iter().sum();
        let average = sum as f64 / count as f64;

        let median = if count % 2 == 0 {
            (samples[count / 2 - 1] + samples[count / 2]) as f64 / 2.0
        } else {
            samples[count / 2] as f64
        };

        let variance = samples
            .iter()
            .map(|&s| {
                let diff = s as f64 - average;
                diff * diff
            })
            .sum::<f64>()
            / count as f64;

        Some(Self {
            count,
            average_bytes: average,
            median_bytes: median,
            stddev_bytes: variance.sqrt(),
        })
    }
}

/// The run-summary statistics written to `metadata.{csv,parquet}`.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub input_files: SizeStats,
    /// `None` under tar-only output, where no loose representative
    /// catchment file exists to sample.
    pub output_file: Option<SizeStats>,
    pub output_file_gzip: Option<SizeStats>,
}

/// Sample input file sizes and, when a loose output format was produced,
/// one representative catchment's output and gzip-compressed size.
pub async fn collect(
    store: &ObjectStoreAdapter,
    ctx: &RunContext,
    input_files: &[String],
    representative_catchment: Option<&str>,
) -> Result<RunMetadata> {
    let sample_count = input_files.len().min(INPUT_SAMPLE_SIZE);
    let mut input_sizes = Vec::with_capacity(sample_count);
    for file in &input_files[..sample_count] {
        input_sizes.push(store.size(file).await?);
    }
    let input_files_stats = SizeStats::from_samples(input_sizes)
        .unwrap_or(SizeStats { count: 0, average_bytes: 0.0, median_bytes: 0.0, stddev_bytes: 0.0 });

    let loose_format = [OutputFormat::Csv, OutputFormat::Parquet]
        .into_iter()
        .find(|f| ctx.wants(*f));

    let (output_file, output_file_gzip) = match (loose_format, representative_catchment) {
        (Some(fmt), Some(catchment)) => {
            let short_id = catchment.rsplit('-').next().unwrap_or(catchment);
            let uri = format!(
                "{}/forcings/cat-{}.{}",
                ctx.output_path.trim_end_matches('/'),
                short_id,
                fmt.extension()
            );
            match store.get_optional(&uri).await? {
                Some(bytes) => {
                    let gzip_size = gzip_compressed_size(&bytes);
                    (
                        SizeStats::from_samples(vec![bytes.len() as u64]),
                        SizeStats::from_samples(vec![gzip_size]),
                    )
                }
                None => (None, None),
            }
        }
        _ => (None, None),
    };

    Ok(RunMetadata {
        input_files: input_files_stats,
        output_file,
        output_file_gzip,
    })
}

fn gzip_compressed_size(bytes: &[u8]) -> u64 {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // A failure here would mean an in-memory Vec<u8> write failed, which
    // does not happen; if it somehow did, 0 keeps the stat harmless rather
    // than aborting the whole run over a cosmetic figure.
    let _ = encoder.write_all(bytes);
    encoder.finish().map(|v| v.len() as u64).unwrap_or(0)
}

/// Write `metadata/forcings_metadata/conf.json` (the echoed configuration)
/// and `metadata/forcings_metadata/metadata.csv` (the run summary) to the
/// configured output sink.
pub async fn write(
    store: &ObjectStoreAdapter,
    ctx: &RunContext,
    config: &Config,
    summary: &RunMetadata,
) -> Result<()> {
    let root = format!(
        "{}/metadata/forcings_metadata",
        ctx.output_path.trim_end_matches('/')
    );

    let conf_json = serde_json::to_vec_pretty(config)?;
    store
        .put(&format!("{root}/conf.json"), bytes::Bytes::from(conf_json))
        .await?;

    // The summary is always written as csv, regardless of which output
    // formats the run itself produced: it is cheap, and its format is not
    // gated by any testable property.
    let csv_bytes = serialize_csv(summary)?;
    store
        .put(&format!("{root}/metadata.csv"), bytes::Bytes::from(csv_bytes))
        .await?;

    info!(root = %root, "wrote run metadata");
    Ok(())
}

fn serialize_csv(summary: &RunMetadata) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record([
            "metric",
            "count",
            "average_bytes",
            "median_bytes",
            "stddev_bytes",
        ])
        .map_err(|e| forcing_core::ForcingError::decoding(e.to_string()))?;

    write_stats_row(&mut writer, "input_files", Some(&summary.input_files))?;
    write_stats_row(&mut writer, "output_file", summary.output_file.as_ref())?;
    write_stats_row(&mut writer, "output_file_gzip", summary.output_file_gzip.as_ref())?;

    writer
        .into_inner()
        .map_err(|e| forcing_core::ForcingError::decoding(e.to_string()))
}

fn write_stats_row(
    writer: &mut csv::Writer<Vec<u8>>,
    name: &str,
    stats: Option<&SizeStats>,
) -> Result<()> {
    let record = match stats {
        Some(s) => vec![
            name.to_string(),
            s.count.to_string(),
            s.average_bytes.to_string(),
            s.median_bytes.to_string(),
            s.stddev_bytes.to_string(),
        ],
        None => vec![
            name.to_string(),
            "0".to_string(),
            String::new(),
            String::new(),
            String::new(),
        ],
    };
    writer
        .write_record(&record)
        .map_err(|e| forcing_core::ForcingError::decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_stats_from_samples_computes_median_and_stddev() {
        let stats = SizeStats::from_samples(vec![10, 20, 30]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average_bytes, 20.0);
        assert_eq!(stats.median_bytes, 20.0);
        assert!((stats.stddev_bytes - 8.16496580927726).abs() < 1e-6);
    }

    #[test]
    fn size_stats_from_empty_samples_is_none() {
        assert!(SizeStats::from_samples(vec![]).is_none());
    }
}
