//! Area-weighted reduction of a decoded grid onto catchments.
//!
//! Stateless and deterministic: the same tensor and crosswalk always
//! produce the same output, and NaNs propagate rather than being masked.

use forcing_core::Result;
use crosswalk::Crosswalk;

/// A decoded variable tensor, `nvar` variables over a flattened `(y, x)`
/// grid of `ysize * xsize` cells, in row-major order.
#[derive(Debug, Clone)]
pub struct GridTensor {
    pub nvar: usize,
    pub ysize: usize,
    pub xsize: usize,
    /// Row-major `(nvar, ysize * xsize)` data.
    pub data: Vec<f32>,
}

impl GridTensor {
    pub fn new(nvar: usize, ysize: usize, xsize: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), nvar * ysize * xsize);
        Self {
            nvar,
            ysize,
            xsize,
            data,
        }
    }

    fn flat_len(&self) -> usize {
        self.ysize * self.xsize
    }

    fn variable(&self, v: usize) -> &[f32] {
        let len = self.flat_len();
        &self.data[v * len..(v + 1) * len]
    }
}

/// A `(nvar, ncatchments)` slice produced by [`project`], in crosswalk
/// iteration order along the catchment axis.
///
/// Stored as 32-bit float, matching the catchment cube's element type and
/// keeping it to 4 bytes per element; the weighted reduction itself
/// accumulates in `f64` (see [`project`]) and is only rounded down to `f32`
/// once, at the point each catchment's value is finalized.
#[derive(Debug, Clone)]
pub struct CatchmentSlice {
    pub nvar: usize,
    pub ncatchments: usize,
    /// Row-major `(nvar, ncatchments)` data.
    pub data: Vec<f32>,
}

impl CatchmentSlice {
    pub fn row(&self, v: usize) -> &[f32] {
        &self.data[v * self.ncatchments..(v + 1) * self.ncatchments]
    }
}

/// Apply the crosswalk's area-weighted reduction to `grid`, producing one
/// column per catchment in the crosswalk's load-time iteration order.
///
/// Cell-index bounds are checked here against `grid`'s flattened extent,
/// since the grid shape is not known at crosswalk-load time. The sum and
/// division accumulate in `f64` for precision, matching how the upstream
/// tool's numpy reduction widens before narrowing back to the `f32` cube on
/// assignment.
pub fn project(grid: &GridTensor, crosswalk: &Crosswalk) -> Result<CatchmentSlice> {
    let flat_len = grid.flat_len();
    let ncatchments = crosswalk.len();
    let mut data = vec![0.0f32; grid.nvar * ncatchments];

    for (col, (_catchment, descriptor)) in crosswalk.iter().enumerate() {
        descriptor.validate_bounds(flat_len)?;
        let weight_sum: f64 = descriptor.weights.iter().sum();

        for v in 0..grid.nvar {
            let variable = grid.variable(v);
            let mut acc = 0.0f64;
            for (&cell, &weight) in descriptor.cells.iter().zip(descriptor.weights.iter()) {
                acc += weight * variable[cell] as f64;
            }
            data[v * ncatchments + col] = (acc / weight_sum) as f32;
        }
    }

    Ok(CatchmentSlice {
        nvar: grid.nvar,
        ncatchments,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosswalk::ProjectionDescriptor;
    use forcing_core::ForcingError;

    fn crosswalk_s1() -> Crosswalk {
        let mut cw = Crosswalk::new();
        cw.insert(
            "cat-1".into(),
            ProjectionDescriptor::new(vec![0, 1], vec![1.0, 1.0]).unwrap(),
        );
        cw.insert(
            "cat-2".into(),
            ProjectionDescriptor::new(vec![2], vec![2.0]).unwrap(),
        );
        cw
    }

    #[test]
    fn scenario_s1_single_variable_area_weighted_mean() {
        // y=1, x=3, nvar=9 per the fixed variable order; only U2D (index 0)
        // is populated, everything else is zero.
        let mut data = vec![0.0f32; 9 * 3];
        data[0] = 10.0;
        data[1] = 20.0;
        data[2] = 30.0;
        let grid = GridTensor::new(9, 1, 3, data);

        let slice = project(&grid, &crosswalk_s1()).unwrap();
        assert_eq!(slice.row(0), &[15.0, 30.0]);
    }

    #[test]
    fn scenario_s2_rainrate_dual_output() {
        // RAINRATE occupies in-indices 3 (APCP identity) and 4 (precip_rate
        // *3600) of the 9-variable tensor, per the fixed mapping.
        let mut data = vec![0.0f32; 9 * 3];
        for x in 0..3 {
            data[3 * 3 + x] = 1.0;
            data[4 * 3 + x] = 1.0 * 3600.0;
        }
        let grid = GridTensor::new(9, 1, 3, data);

        let slice = project(&grid, &crosswalk_s1()).unwrap();
        assert_eq!(slice.row(3), &[1.0, 1.0]);
        assert_eq!(slice.row(4), &[3600.0, 3600.0]);
    }

    #[test]
    fn out_of_range_cell_is_crosswalk_integrity_error() {
        let mut cw = Crosswalk::new();
        cw.insert(
            "cat-1".into(),
            ProjectionDescriptor::new(vec![0, 10], vec![1.0, 1.0]).unwrap(),
        );
        let grid = GridTensor::new(1, 1, 3, vec![0.0; 3]);

        let err = project(&grid, &cw).unwrap_err();
        assert!(matches!(err, ForcingError::CrosswalkIntegrity(_)));
    }

    #[test]
    fn nan_propagates_without_masking() {
        let mut cw = Crosswalk::new();
        cw.insert(
            "cat-1".into(),
            ProjectionDescriptor::new(vec![0, 1], vec![1.0, 1.0]).unwrap(),
        );
        let grid = GridTensor::new(1, 1, 2, vec![f32::NAN, 1.0]);

        let slice = project(&grid, &cw).unwrap();
        assert!(slice.row(0)[0].is_nan());
    }
}
