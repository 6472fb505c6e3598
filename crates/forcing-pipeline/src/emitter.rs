//! Per-catchment table construction and serialization.
//!
//! Builds one table per catchment from a chunk cube, serializes it to the
//! requested formats, and either writes it directly (loose csv/parquet) or
//! hands it to the archiver (tar).

use std::sync::Arc;

use arrow_array::{ArrayRef, Float32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tracing::warn;

use forcing_core::{ForcingError, OutputFormat, Result, OUTPUT_VARIABLES};
use nwm_store::ObjectStoreAdapter;

use crate::coordinator::ChunkCube;

/// One catchment's accumulated time series: a `time` column plus the nine
/// fixed output-variable columns, all parallel and of equal length.
#[derive(Debug, Clone)]
pub struct CatchmentTable {
    pub catchment: String,
    pub time: Vec<String>,
    /// One `Vec<f32>` per entry of [`OUTPUT_VARIABLES`], same order.
    pub columns: Vec<Vec<f32>>,
}

impl CatchmentTable {
    fn empty(catchment: String) -> Self {
        Self {
            catchment,
            time: Vec::new(),
            columns: vec![Vec::new(); OUTPUT_VARIABLES.len()],
        }
    }

    pub(crate) fn append_rows(&mut self, other: &CatchmentTable) {
        self.time.extend(other.time.iter().cloned());
        for (col, other_col) in self.columns.iter_mut().zip(other.columns.iter()) {
            col.extend_from_slice(other_col);
        }
    }

    /// The suffix after the last `-` in the catchment identifier, e.g.
    /// `cat-27` -> `27`, used to name output files `cat-<id>.<ext>`.
    pub fn short_id(&self) -> &str {
        self.catchment
            .rsplit('-')
            .next()
            .unwrap_or(&self.catchment)
    }

    pub fn file_stem(&self) -> String {
        format!("cat-{}", self.short_id())
    }
}

/// Build one [`CatchmentTable`] per catchment from a chunk cube.
pub fn build_tables(cube: &ChunkCube, catchments: &[String]) -> Vec<CatchmentTable> {
    catchments
        .iter()
        .enumerate()
        .map(|(c, catchment)| {
            let mut table = CatchmentTable::empty(catchment.clone());
            table.time = cube.times.clone();
            for v in 0..cube.nvar {
                table.columns[v] = cube.series(v, c);
            }
            table
        })
        .collect()
}

pub fn to_csv_bytes(table: &CatchmentTable) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    let mut header = vec!["time".to_string()];
    header.extend(OUTPUT_VARIABLES.iter().map(|s| s.to_string()));
    writer
        .write_record(&header)
        .map_err(|e| ForcingError::decoding(format!("csv header write failed: {e}")))?;

    for row in 0..table.time.len() {
        let mut record = vec![table.time[row].clone()];
        for col in &table.columns {
            record.push(col[row].to_string());
        }
        writer
            .write_record(&record)
            .map_err(|e| ForcingError::decoding(format!("csv row write failed: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| ForcingError::decoding(format!("csv flush failed: {e}")))
}

pub fn parse_csv_bytes(catchment: &str, bytes: &[u8]) -> Result<CatchmentTable> {
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let mut table = CatchmentTable::empty(catchment.to_string());

    for record in reader.records() {
        let record = record.map_err(|e| ForcingError::decoding(format!("malformed csv: {e}")))?;
        table.time.push(record.get(0).unwrap_or_default().to_string());
        for (v, col) in table.columns.iter_mut().enumerate() {
            let value: f32 = record
                .get(v + 1)
                .unwrap_or("0")
                .parse()
                .map_err(|_| ForcingError::decoding("malformed csv numeric column"))?;
            col.push(value);
        }
    }

    Ok(table)
}

fn arrow_schema() -> Arc<Schema> {
    let mut fields = vec![Field::new("time", DataType::Utf8, false)];
    fields.extend(
        OUTPUT_VARIABLES
            .iter()
            .map(|name| Field::new(*name, DataType::Float32, false)),
    );
    Arc::new(Schema::new(fields))
}

pub fn to_parquet_bytes(table: &CatchmentTable) -> Result<Vec<u8>> {
    let schema = arrow_schema();
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(table.time.clone()))];
    for col in &table.columns {
        columns.push(Arc::new(Float32Array::from(col.clone())));
    }

    let batch = RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| ForcingError::decoding(format!("failed to build record batch: {e}")))?;

    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)
            .map_err(|e| ForcingError::decoding(format!("failed to open parquet writer: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| ForcingError::decoding(format!("failed to write parquet batch: {e}")))?;
        writer
            .close()
            .map_err(|e| ForcingError::decoding(format!("failed to close parquet writer: {e}")))?;
    }
    Ok(buffer)
}

pub fn parse_parquet_bytes(catchment: &str, bytes: Bytes) -> Result<CatchmentTable> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| ForcingError::decoding(format!("malformed parquet: {e}")))?
        .build()
        .map_err(|e| ForcingError::decoding(format!("malformed parquet: {e}")))?;

    let mut table = CatchmentTable::empty(catchment.to_string());
    for batch in reader {
        let batch = batch.map_err(|e| ForcingError::decoding(format!("malformed parquet batch: {e}")))?;
        let time = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| ForcingError::decoding("parquet time column has wrong type"))?;
        table.time.extend((0..time.len()).map(|i| time.value(i).to_string()));

        for v in 0..OUTPUT_VARIABLES.len() {
            let column = batch
                .column(v + 1)
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| ForcingError::decoding("parquet variable column has wrong type"))?;
            table.columns[v].extend((0..column.len()).map(|i| column.value(i)));
        }
    }

    Ok(table)
}

fn object_uri(output_path: &str, table: &CatchmentTable, fmt: OutputFormat) -> String {
    format!(
        "{}/forcings/{}.{}",
        output_path.trim_end_matches('/'),
        table.file_stem(),
        fmt.extension()
    )
}

/// Write one catchment table in one loose format, honoring append semantics.
///
/// On `append=true`, the existing object is fetched and its rows are
/// prepended to `table`'s before re-serializing and writing the whole
/// object back; a missing target is fatal ([`ForcingError::AppendMissing`]).
pub async fn emit_loose(
    store: &ObjectStoreAdapter,
    output_path: &str,
    table: &CatchmentTable,
    fmt: OutputFormat,
    append: bool,
) -> Result<()> {
    let uri = object_uri(output_path, table, fmt);

    let mut combined = table.clone();
    if append {
        let existing = store.get_optional(&uri).await?;
        match existing {
            Some(bytes) => {
                let mut prior = match fmt {
                    OutputFormat::Csv => parse_csv_bytes(&table.catchment, &bytes)?,
                    OutputFormat::Parquet => parse_parquet_bytes(&table.catchment, bytes)?,
                    OutputFormat::Tar => {
                        return Err(ForcingError::configuration(
                            "tar is not a loose emission format",
                        ))
                    }
                };
                prior.append_rows(&combined);
                combined = prior;
            }
            None => {
                return Err(ForcingError::AppendMissing {
                    catchment: table.catchment.clone(),
                    message: format!("append target {uri} does not exist"),
                })
            }
        }
    }

    let bytes = match fmt {
        OutputFormat::Csv => to_csv_bytes(&combined)?,
        OutputFormat::Parquet => to_parquet_bytes(&combined)?,
        OutputFormat::Tar => {
            return Err(ForcingError::configuration(
                "tar is not a loose emission format",
            ))
        }
    };

    store
        .put(&uri, bytes::Bytes::from(bytes))
        .await
        .map_err(|e| ForcingError::Partial {
            catchment: table.catchment.clone(),
            message: e.to_string(),
        })
}

/// Emit every table in `tables` for every loose format `ctx` requests.
/// Tar output is handled separately by the archiver and is skipped here.
///
/// Writes for one format run concurrently across an emission pool sized by
/// the same partitioner used for extraction, under the emission cost model.
pub async fn emit_all_loose(
    store: &ObjectStoreAdapter,
    output_path: &str,
    tables: &[CatchmentTable],
    formats: &[OutputFormat],
    append: bool,
    nprocs: usize,
) -> Result<()> {
    use futures::stream::{self, StreamExt};

    if tables.is_empty() {
        warn!("emitter received an empty table set");
        return Ok(());
    }

    let pool_size = crate::partitioner::partition(tables.len(), nprocs.max(1), crate::partitioner::CostModel::EMISSION)
        .len()
        .max(1);

    for fmt in formats {
        if *fmt == OutputFormat::Tar {
            continue;
        }
        let results: Vec<Result<()>> = stream::iter(tables.iter())
            .map(|table| emit_loose(store, output_path, table, *fmt, append))
            .buffer_unordered(pool_size)
            .collect()
            .await;
        for result in results {
            result?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> CatchmentTable {
        CatchmentTable {
            catchment: "cat-27".to_string(),
            time: vec!["20230601 0000".to_string(), "20230601 0100".to_string()],
            columns: (0..9)
                .map(|v| vec![v as f32, v as f32 + 0.5])
                .collect(),
        }
    }

    #[test]
    fn short_id_takes_suffix_after_last_dash() {
        let table = sample_table();
        assert_eq!(table.short_id(), "27");
        assert_eq!(table.file_stem(), "cat-27");
    }

    #[test]
    fn csv_round_trips_through_parse() {
        let table = sample_table();
        let bytes = to_csv_bytes(&table).unwrap();
        let parsed = parse_csv_bytes(&table.catchment, &bytes).unwrap();
        assert_eq!(parsed.time, table.time);
        assert_eq!(parsed.columns, table.columns);
    }

    #[test]
    fn append_rows_concatenates_in_order() {
        let mut first = sample_table();
        let mut second = sample_table();
        second.time = vec!["20230601 0200".to_string()];
        second.columns = (0..9).map(|v| vec![v as f32 + 10.0]).collect();

        first.append_rows(&second);
        assert_eq!(first.time.len(), 3);
        assert_eq!(first.time[2], "20230601 0200");
        assert_eq!(first.columns[0], vec![0.0, 0.5, 10.0]);
    }
}
