use crate::error::{Error, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters for a uniformly spaced grid
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridParameters {
    /// The number of grid points, including both end points
    #[serde(rename = "N")]
    pub n: usize,
    pub r_min: f64,
    pub r_max: f64,
}

impl Default for GridParameters {
    fn default() -> Self {
        GridParameters {
            n: 10,
            r_min: 0.0,
            r_max: 10.0,
        }
    }
}

/// A 1D grid of points. For radial problems the first point sits on (or beyond) the axis.
///
/// The grid is immutable once built, so it can be shared by reference between as many
/// operator builders as needed.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    r: Array1<f64>,
    dr: f64,
    cell_widths: Array1<f64>,
}

impl Grid {
    /// Create a grid with `n` uniformly spaced points from `r_min` to `r_max` inclusive
    pub fn new_uniform(r_min: f64, r_max: f64, n: usize) -> Result<Self> {
        if n < 2 {
            return Err(Error::GridTooSmall {
                required: 2,
                found: n,
            });
        }
        if !(r_min.is_finite() && r_max.is_finite()) || r_max <= r_min {
            return Err(Error::Configuration(format!(
                "grid needs finite r_min < r_max, got r_min = {}, r_max = {}",
                r_min, r_max
            )));
        }

        let dr = (r_max - r_min) / (n - 1) as f64;
        let mut r = Array1::from_shape_fn(n, |i| r_min + i as f64 * dr);
        // Pin the end point so it is exactly r_max rather than accumulating rounding
        r[n - 1] = r_max;

        Ok(Self::with_points(r, dr))
    }

    /// Create a grid from `GridParameters`
    pub fn from_parameters(params: &GridParameters) -> Result<Self> {
        Self::new_uniform(params.r_min, params.r_max, params.n)
    }

    /// Create a grid from an explicit, strictly increasing set of points.
    ///
    /// `dr` is then the mean spacing, which is what the uniform stencils use. Stencils that
    /// care about the local spacing read `cell_widths` instead.
    pub fn from_points(points: &[f64]) -> Result<Self> {
        let n = points.len();
        if n < 2 {
            return Err(Error::GridTooSmall {
                required: 2,
                found: n,
            });
        }
        if let Some(i) = points.iter().position(|x| !x.is_finite()) {
            return Err(Error::Configuration(format!(
                "grid point {} is not finite",
                i
            )));
        }
        if let Some(i) = (1..n).find(|&i| points[i] <= points[i - 1]) {
            return Err(Error::Configuration(format!(
                "grid points must be strictly increasing, but r[{}] = {} <= r[{}] = {}",
                i,
                points[i],
                i - 1,
                points[i - 1]
            )));
        }

        let dr = (points[n - 1] - points[0]) / (n - 1) as f64;
        Ok(Self::with_points(Array1::from(points.to_vec()), dr))
    }

    fn with_points(r: Array1<f64>, dr: f64) -> Self {
        let n = r.len();
        // The first cell has no left neighbour, so it borrows the width of the second
        let cell_widths =
            Array1::from_shape_fn(n, |i| if i == 0 { r[1] - r[0] } else { r[i] - r[i - 1] });

        Grid { r, dr, cell_widths }
    }

    /// Returns the number of points in the grid
    pub fn num_points(&self) -> usize {
        self.r.len()
    }

    /// The point coordinates
    pub fn r(&self) -> ArrayView1<'_, f64> {
        self.r.view()
    }

    /// The (mean) spacing between points
    pub fn dr(&self) -> f64 {
        self.dr
    }

    /// The width of the cell to the left of each point. `cell_widths()[0]` repeats the
    /// first interior width.
    pub fn cell_widths(&self) -> ArrayView1<'_, f64> {
        self.cell_widths.view()
    }

    /// Allocate a zeroed field aligned with the grid points
    pub fn generate_field(&self) -> Array1<f64> {
        Array1::zeros(self.num_points())
    }

    /// Whether the grid can carry the radial operators, i.e. it starts at or beyond the axis
    pub fn is_radial(&self) -> bool {
        self.r[0] >= 0.0
    }
}
