//! Work partitioning, extraction, emission and archiving stages that turn
//! a crosswalk and a file list into per-catchment forcing output.

pub mod archiver;
pub mod coordinator;
pub mod driver;
pub mod emitter;
pub mod partitioner;

pub use coordinator::{extract_chunk, ChunkCube};
pub use driver::run;
pub use emitter::{build_tables, CatchmentTable};
pub use partitioner::{distribute, partition, rebalance, CostModel};
