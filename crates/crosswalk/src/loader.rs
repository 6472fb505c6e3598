//! Loads one or more crosswalk documents and unions them into a single
//! [`Crosswalk`], recording each document's catchment contributions as a
//! [`CatchmentGroup`].

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use forcing_core::Result;
use nwm_store::ObjectStoreAdapter;

use crate::types::{CatchmentGroup, Crosswalk, ProjectionDescriptor};

/// Wire shape of one crosswalk document: catchment id → `[cells, weights]`.
///
/// Backed by [`IndexMap`] rather than `HashMap` so a single document's
/// catchments are unioned in the order they appear in the file — a plain
/// `HashMap` would randomize that order and break catchment-axis stability
/// even for a single-document crosswalk.
#[derive(Deserialize)]
struct RawDocument(IndexMap<String, (Vec<usize>, Vec<f64>)>);

/// Loads and unions crosswalk documents from local paths or object URIs.
pub struct CrosswalkLoader {
    store: ObjectStoreAdapter,
    vpu_pattern: Regex,
}

impl Default for CrosswalkLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosswalkLoader {
    pub fn new() -> Self {
        Self {
            store: ObjectStoreAdapter::new(),
            vpu_pattern: Regex::new(r"VPU_([^/]+)").expect("static regex is valid"),
        }
    }

    /// Load every document in `paths`, in order, unioning them into one
    /// [`Crosswalk`] (later documents override same-key entries in place)
    /// and returning the per-document [`CatchmentGroup`]s alongside it.
    pub async fn load(&self, paths: &[String]) -> Result<(Crosswalk, Vec<CatchmentGroup>)> {
        let mut crosswalk = Crosswalk::new();
        let mut groups = Vec::with_capacity(paths.len());
        let mut unlabeled_ordinal = 0usize;

        for path in paths {
            let label = match self.vpu_pattern.captures(path) {
                Some(caps) => format!("VPU_{}", &caps[1]),
                None => {
                    unlabeled_ordinal += 1;
                    unlabeled_ordinal.to_string()
                }
            };

            info!(path = %path, label = %label, "loading crosswalk document");
            let bytes = self.store.get(path).await?;
            let raw: RawDocument = serde_json::from_slice(&bytes)?;

            let mut catchments = Vec::with_capacity(raw.0.len());
            for (catchment, (cells, weights)) in raw.0 {
                let descriptor = ProjectionDescriptor::new(cells, weights)?;
                catchments.push(catchment.clone());
                crosswalk.insert(catchment, descriptor);
            }

            groups.push(CatchmentGroup { label, catchments });
        }

        Ok((crosswalk, groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vpu_label_extracted_from_path() {
        let loader = CrosswalkLoader::new();
        let caps = loader
            .vpu_pattern
            .captures("s3://bucket/VPU_16/weights.json")
            .unwrap();
        assert_eq!(&caps[1], "16");
    }

    #[test]
    fn raw_document_parses_cells_and_weights() {
        let json = r#"{"cat-1": [[0, 1], [0.5, 0.5]], "cat-2": [[2], [1.0]]}"#;
        let raw: RawDocument = serde_json::from_str(json).unwrap();
        assert_eq!(raw.0.len(), 2);
        assert_eq!(raw.0["cat-1"].0, vec![0, 1]);
        assert_eq!(raw.0["cat-1"].1, vec![0.5, 0.5]);
    }
}
