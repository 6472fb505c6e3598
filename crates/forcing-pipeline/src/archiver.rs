//! Archiver: bundles per-catchment tables into gzip-compressed tar
//! archives, one per crosswalk-document group.

use std::collections::HashMap;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::stream::{self, StreamExt};
use tar::Builder as TarBuilder;
use tracing::info;

use crosswalk::CatchmentGroup;
use forcing_core::{ForcingError, OutputFormat, Result};
use nwm_store::ObjectStoreAdapter;

use crate::emitter::{to_csv_bytes, to_parquet_bytes, CatchmentTable};

/// Build `<label>_forcings.tar.gz` for every group in `groups`, each
/// containing one `cat-<id>.<ext>` member per catchment the group
/// contributed, and write the archives to `output_path/forcings/`.
///
/// Archives are built concurrently, `min(groups.len(), nprocs)` at a time.
pub async fn archive_groups(
    store: &ObjectStoreAdapter,
    output_path: &str,
    groups: &[CatchmentGroup],
    tables_by_catchment: &HashMap<String, CatchmentTable>,
    member_format: OutputFormat,
    nprocs: usize,
) -> Result<()> {
    let concurrency = groups.len().min(nprocs.max(1)).max(1);

    let results: Vec<Result<()>> = stream::iter(groups.iter())
        .map(|group| {
            build_and_write_one(
                store,
                output_path,
                group,
                tables_by_catchment,
                member_format,
            )
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for result in results {
        result?;
    }
    Ok(())
}

async fn build_and_write_one(
    store: &ObjectStoreAdapter,
    output_path: &str,
    group: &CatchmentGroup,
    tables_by_catchment: &HashMap<String, CatchmentTable>,
    member_format: OutputFormat,
) -> Result<()> {
    let archive_bytes = build_archive(group, tables_by_catchment, member_format)?;

    let uri = format!(
        "{}/forcings/{}_forcings.tar.gz",
        output_path.trim_end_matches('/'),
        group.label
    );
    info!(group = %group.label, catchments = group.catchments.len(), uri = %uri, "writing archive");
    store.put(&uri, bytes::Bytes::from(archive_bytes)).await
}

fn build_archive(
    group: &CatchmentGroup,
    tables_by_catchment: &HashMap<String, CatchmentTable>,
    member_format: OutputFormat,
) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = TarBuilder::new(encoder);

    for catchment in &group.catchments {
        let table = tables_by_catchment.get(catchment).ok_or_else(|| {
            ForcingError::Partial {
                catchment: catchment.clone(),
                message: "no table produced for catchment in this group".to_string(),
            }
        })?;

        let bytes = match member_format {
            OutputFormat::Csv => to_csv_bytes(table)?,
            OutputFormat::Parquet => to_parquet_bytes(table)?,
            OutputFormat::Tar => {
                return Err(ForcingError::configuration(
                    "tar cannot be the archive member format",
                ))
            }
        };

        let member_name = format!("{}.{}", table.file_stem(), member_format.extension());
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, &member_name, bytes.as_slice())
            .map_err(|e| ForcingError::Partial {
                catchment: catchment.clone(),
                message: format!("failed to append tar member: {e}"),
            })?;
    }

    let encoder = tar
        .into_inner()
        .map_err(|e| ForcingError::decoding(format!("failed to finalize tar: {e}")))?;
    let bytes = encoder
        .finish()
        .map_err(|e| ForcingError::decoding(format!("failed to finish gzip stream: {e}")))?;
    Ok(bytes)
}
