//! Chunked driver: splits the full file list into fixed-size chunks and
//! runs extraction + emission sequentially, chunk by chunk, under fixed
//! memory.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crosswalk::{CatchmentGroup, Crosswalk};
use forcing_core::{ForcingError, OutputFormat, Result, RunContext};
use nwm_store::ObjectStoreAdapter;

use crate::archiver::archive_groups;
use crate::coordinator::extract_chunk;
use crate::emitter::{build_tables, emit_all_loose, CatchmentTable};

/// Run the full pipeline over `files`: chunked extraction, then emission
/// (loose formats write as each chunk completes; tar output accumulates
/// in memory and is archived once after the last chunk).
pub async fn run(
    ctx: &RunContext,
    files: &[String],
    crosswalk: Arc<Crosswalk>,
    groups: &[CatchmentGroup],
    store: &ObjectStoreAdapter,
) -> Result<()> {
    if files.is_empty() {
        return Err(ForcingError::configuration(
            "nwm_file produced an empty input file list",
        ));
    }

    let catchments = crosswalk.catchments().to_vec();
    let loose_formats: Vec<OutputFormat> = ctx
        .output_file_types
        .iter()
        .copied()
        .filter(|f| *f != OutputFormat::Tar)
        .collect();
    let wants_tar = ctx.wants(OutputFormat::Tar);

    let mut accumulated: HashMap<String, CatchmentTable> = HashMap::new();

    for (chunk_index, chunk) in files.chunks(ctx.nfile_chunk.max(1)).enumerate() {
        let append = chunk_index > 0;
        info!(chunk = chunk_index, files = chunk.len(), append, "processing chunk");

        let cube = extract_chunk(chunk, Arc::clone(&crosswalk), ctx.nprocs).await?;
        let tables = build_tables(&cube, &catchments);

        if !loose_formats.is_empty() {
            emit_all_loose(
                store,
                &ctx.output_path,
                &tables,
                &loose_formats,
                append,
                ctx.nprocs,
            )
            .await?;
        }

        if wants_tar {
            for table in tables {
                accumulated
                    .entry(table.catchment.clone())
                    .and_modify(|existing| existing.append_rows(&table))
                    .or_insert(table);
            }
        }
    }

    if wants_tar {
        let member_format = ctx.archive_member_format();
        archive_groups(
            store,
            &ctx.output_path,
            groups,
            &accumulated,
            member_format,
            ctx.nprocs,
        )
        .await?;
    }

    Ok(())
}
