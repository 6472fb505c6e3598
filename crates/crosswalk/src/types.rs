//! The crosswalk data model: a catchment's grid-cell indices and coverage
//! weights, and the ordered, unioned mapping built by [`crate::loader`].

use std::collections::HashMap;

use forcing_core::{ForcingError, Result};

/// Flat grid-cell indices and their coverage weights for one catchment.
///
/// `cells` and `weights` are parallel arrays of equal, non-zero length.
/// Index bounds against a particular grid's `(y, x)` extent are not checked
/// here — the grid shape is unknown until a file is decoded — and are
/// instead validated by the projector on first use.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionDescriptor {
    pub cells: Vec<usize>,
    pub weights: Vec<f64>,
}

impl ProjectionDescriptor {
    pub fn new(cells: Vec<usize>, weights: Vec<f64>) -> Result<Self> {
        if cells.is_empty() || weights.is_empty() {
            return Err(ForcingError::crosswalk_integrity(
                "projection descriptor must have at least one cell",
            ));
        }
        if cells.len() != weights.len() {
            return Err(ForcingError::crosswalk_integrity(format!(
                "cells ({}) and weights ({}) length mismatch",
                cells.len(),
                weights.len()
            )));
        }
        let weight_sum: f64 = weights.iter().sum();
        if !(weight_sum > 0.0) {
            return Err(ForcingError::crosswalk_integrity(
                "weight sum must be positive",
            ));
        }
        if weights.iter().any(|w| *w < 0.0) {
            return Err(ForcingError::crosswalk_integrity(
                "weights must be non-negative",
            ));
        }
        Ok(Self { cells, weights })
    }

    /// Check every cell index falls inside a grid of the given flattened
    /// size. Deferred here from load time to first projector use, since the
    /// grid's `(y, x)` extent is only known once a file has been decoded.
    pub fn validate_bounds(&self, flat_grid_len: usize) -> Result<()> {
        if let Some(bad) = self.cells.iter().find(|&&c| c >= flat_grid_len) {
            return Err(ForcingError::crosswalk_integrity(format!(
                "cell index {bad} out of bounds for grid of size {flat_grid_len}"
            )));
        }
        Ok(())
    }
}

/// An ordered catchment-identifier → [`ProjectionDescriptor`] mapping.
///
/// Iteration order is load order: the order crosswalk documents were
/// supplied in, and within a document, the order its catchments were
/// encountered in. A later document's entry overrides an earlier one in
/// place — it does not move the key to the end — matching the semantics of
/// successively unioning Python dictionaries with `|`.
#[derive(Debug, Clone, Default)]
pub struct Crosswalk {
    order: Vec<String>,
    entries: HashMap<String, ProjectionDescriptor>,
}

impl Crosswalk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or override one catchment's descriptor, preserving the
    /// insertion position of a pre-existing key.
    pub fn insert(&mut self, catchment: String, descriptor: ProjectionDescriptor) {
        if !self.entries.contains_key(&catchment) {
            self.order.push(catchment.clone());
        }
        self.entries.insert(catchment, descriptor);
    }

    pub fn get(&self, catchment: &str) -> Option<&ProjectionDescriptor> {
        self.entries.get(catchment)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Catchment identifiers in the authoritative output axis order.
    pub fn catchments(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProjectionDescriptor)> {
        self.order
            .iter()
            .map(move |k| (k, self.entries.get(k).expect("order/entries desync")))
    }
}

/// The set of catchment identifiers contributed by one crosswalk document,
/// keyed by its inferred group label (`VPU_<n>` or a 1-based ordinal).
#[derive(Debug, Clone)]
pub struct CatchmentGroup {
    pub label: String,
    pub catchments: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = ProjectionDescriptor::new(vec![0, 1], vec![1.0]).unwrap_err();
        assert!(matches!(err, ForcingError::CrosswalkIntegrity(_)));
    }

    #[test]
    fn rejects_zero_weight_sum() {
        let err = ProjectionDescriptor::new(vec![0, 1], vec![0.0, 0.0]).unwrap_err();
        assert!(matches!(err, ForcingError::CrosswalkIntegrity(_)));
    }

    #[test]
    fn union_override_keeps_original_position() {
        let mut cw = Crosswalk::new();
        cw.insert(
            "cat-1".into(),
            ProjectionDescriptor::new(vec![0], vec![1.0]).unwrap(),
        );
        cw.insert(
            "cat-2".into(),
            ProjectionDescriptor::new(vec![1], vec![1.0]).unwrap(),
        );
        cw.insert(
            "cat-1".into(),
            ProjectionDescriptor::new(vec![2], vec![2.0]).unwrap(),
        );

        assert_eq!(cw.catchments(), &["cat-1", "cat-2"]);
        assert_eq!(cw.get("cat-1").unwrap().cells, vec![2]);
    }

    #[test]
    fn bounds_validation_catches_out_of_range_cell() {
        let desc = ProjectionDescriptor::new(vec![0, 5], vec![1.0, 1.0]).unwrap();
        assert!(desc.validate_bounds(3).is_err());
        assert!(desc.validate_bounds(6).is_ok());
    }
}
