//! Extraction coordinator: drives the object-store adapter, grid decoder
//! and projector across a worker pool, producing one time-ordered chunk
//! cube.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crosswalk::Crosswalk;
use forcing_core::Result;
use nwm_grid::decode;
use nwm_store::ObjectStoreAdapter;
use projector::project;

use crate::partitioner::{partition, CostModel};

/// A time-ordered `(ntime, nvar, ncatchments)` cube produced by one chunk's
/// extraction pass, plus the parallel valid-time stamps for its time axis.
#[derive(Debug, Clone)]
pub struct ChunkCube {
    pub ntime: usize,
    pub nvar: usize,
    pub ncatchments: usize,
    /// Row-major `(ntime, nvar, ncatchments)`, 32-bit float.
    pub data: Vec<f32>,
    pub times: Vec<String>,
}

impl ChunkCube {
    /// The `(nvar,)` row for catchment `c` at time `t`... generalized to a
    /// full `(ntime,)` series for one `(variable, catchment)` pair, the
    /// shape the emitter needs per output column.
    pub fn series(&self, var: usize, catchment: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.ntime);
        for t in 0..self.ntime {
            let base = t * self.nvar * self.ncatchments + var * self.ncatchments;
            out.push(self.data[base + catchment]);
        }
        out
    }
}

/// Extract one chunk's worth of grid files into a [`ChunkCube`].
///
/// `files` is processed as `nprocs` contiguous slices (per-worker locality);
/// each worker runs the object-store read, grid decode and projection for
/// every file in its slice, in order, and results are concatenated back in
/// worker-submission order, which equals file-list order because slices are
/// contiguous and assigned by index.
pub async fn extract_chunk(
    files: &[String],
    crosswalk: Arc<Crosswalk>,
    nprocs: usize,
) -> Result<ChunkCube> {
    let shares = partition(files.len(), nprocs.max(1), CostModel::EXTRACTION);

    let mut slices = Vec::with_capacity(shares.len());
    let mut offset = 0usize;
    for share in &shares {
        let end = offset + *share as usize;
        slices.push(files[offset..end].to_vec());
        offset = end;
    }

    let last_worker = slices.len().saturating_sub(1);
    let tasks = slices.into_iter().enumerate().map(|(idx, slice)| {
        let crosswalk = Arc::clone(&crosswalk);
        async move { extract_worker(idx, slice, crosswalk, idx == last_worker).await }
    });

    let results = join_all(tasks).await;

    let mut ncatchments = crosswalk.len();
    let mut nvar = 0usize;
    let mut data = Vec::new();
    let mut times = Vec::new();

    for result in results {
        let (slices, worker_times) = result?;
        for slice in slices {
            nvar = slice.nvar;
            ncatchments = slice.ncatchments;
            data.extend_from_slice(&slice.data);
        }
        times.extend(worker_times);
    }

    Ok(ChunkCube {
        ntime: times.len(),
        nvar,
        ncatchments,
        data,
        times,
    })
}

async fn extract_worker(
    worker_index: usize,
    files: Vec<String>,
    crosswalk: Arc<Crosswalk>,
    is_last_worker: bool,
) -> Result<(Vec<projector::CatchmentSlice>, Vec<String>)> {
    let store = ObjectStoreAdapter::new();
    let mut slices = Vec::with_capacity(files.len());
    let mut times = Vec::with_capacity(files.len());

    for file in &files {
        let bytes = store.get(file).await?;
        let grid = tokio::task::spawn_blocking(move || decode(&bytes))
            .await
            .map_err(|e| forcing_core::ForcingError::decoding(e.to_string()))??;

        let tensor = projector::GridTensor::new(9, grid.ysize, grid.xsize, grid.data);
        let slice = project(&tensor, &crosswalk)?;
        times.push(grid.valid_time);
        slices.push(slice);
    }

    if is_last_worker {
        info!(worker = worker_index, files = files.len(), "extraction worker finished");
    } else {
        // Throughput is only logged on the last-scheduled worker to avoid
        // interleaved output across concurrent workers.
        let _ = worker_index;
    }

    if slices.is_empty() {
        warn!(worker = worker_index, "extraction worker assigned no files");
    }

    Ok((slices, times))
}
