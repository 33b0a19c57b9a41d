use crate::banded::DiaMatrix;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::stencil::{self, edge, first_order, second_order, Stencil};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The smallest grid any of the matrix operators can be built on
const MIN_POINTS: usize = 3;

/// Name expected in the `type` field of `FiniteDifferenceParameters`
pub const TYPE_NAME: &str = "FiniteDifference";

/// Point-wise schemes for the first derivative at interior points
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteriorScheme {
    Centered,
    UpwindLeft,
}

impl InteriorScheme {
    pub const ALL: [InteriorScheme; 2] = [InteriorScheme::Centered, InteriorScheme::UpwindLeft];

    pub fn name(&self) -> &'static str {
        match self {
            InteriorScheme::Centered => "centered",
            InteriorScheme::UpwindLeft => "upwind_left",
        }
    }
}

impl FromStr for InteriorScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        InteriorScheme::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| Error::UnknownScheme(s.to_owned()))
    }
}

impl fmt::Display for InteriorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the value at an edge of the grid is reconstructed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Straight line through the two nearest interior points
    Extrapolate,
    /// Weighted average of the two nearest interior points
    Average,
    /// Fit of `a + b r^2` through the two nearest points, evaluated on the axis
    Quadratic,
    /// Zero gradient: copy the nearest interior point
    Flat,
    /// Set the edge value to zero
    Zero,
}

impl FromStr for BoundaryPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extrapolate" => Ok(BoundaryPolicy::Extrapolate),
            "average" => Ok(BoundaryPolicy::Average),
            "quadratic" => Ok(BoundaryPolicy::Quadratic),
            "flat" => Ok(BoundaryPolicy::Flat),
            "zero" => Ok(BoundaryPolicy::Zero),
            _ => Err(Error::Configuration(format!(
                "unknown boundary policy `{}`",
                s
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Row 0, on or nearest to the axis
    Left,
    /// Row N - 1
    Right,
}

/// Input data for a `FiniteDifference`, as it appears in a configuration file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiniteDifferenceParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
}

impl Default for FiniteDifferenceParameters {
    fn default() -> Self {
        FiniteDifferenceParameters {
            kind: TYPE_NAME.to_owned(),
            method: InteriorScheme::Centered.name().to_owned(),
        }
    }
}

/// Builds finite difference operators on a fixed grid.
///
/// Operators are rebuilt on every call. Callers that apply the same operator every step
/// should keep hold of the returned matrix.
#[derive(Clone, Debug)]
pub struct FiniteDifference<'g> {
    grid: &'g Grid,
    dr: f64,
    scheme: InteriorScheme,
}

impl<'g> FiniteDifference<'g> {
    pub fn new(grid: &'g Grid, scheme: InteriorScheme) -> Result<Self> {
        let dr = grid.dr();
        if !(dr.is_finite() && dr > 0.0) {
            return Err(Error::Configuration(format!(
                "grid spacing must be positive, got dr = {}",
                dr
            )));
        }
        Ok(FiniteDifference { grid, dr, scheme })
    }

    /// Create a `FiniteDifference` from configuration input data
    pub fn from_parameters(grid: &'g Grid, params: &FiniteDifferenceParameters) -> Result<Self> {
        if params.kind != TYPE_NAME {
            return Err(Error::Configuration(format!(
                "expected type `{}`, got `{}`",
                TYPE_NAME, params.kind
            )));
        }
        let scheme = params.method.parse()?;
        Self::new(grid, scheme)
    }

    pub fn grid(&self) -> &'g Grid {
        self.grid
    }

    pub fn dr(&self) -> f64 {
        self.dr
    }

    pub fn scheme(&self) -> InteriorScheme {
        self.scheme
    }

    pub fn set_scheme(&mut self, scheme: InteriorScheme) {
        self.scheme = scheme;
    }

    fn n(&self) -> usize {
        self.grid.num_points()
    }

    fn check_size(&self) -> Result<usize> {
        let n = self.n();
        if n < MIN_POINTS {
            return Err(Error::GridTooSmall {
                required: MIN_POINTS,
                found: n,
            });
        }
        Ok(n)
    }

    fn check_radial(&self) -> Result<usize> {
        let n = self.check_size()?;
        if !self.grid.is_radial() {
            return Err(Error::Configuration(format!(
                "radial operators need r[0] >= 0, got r[0] = {}",
                self.grid.r()[0]
            )));
        }
        Ok(n)
    }

    fn check_field(&self, y: &ArrayView1<f64>) {
        assert_eq!(
            y.len(),
            self.n(),
            "field has {} values but the grid has {} points",
            y.len(),
            self.n()
        );
    }

    // Point-wise derivatives

    /// Returns the first derivative function for the configured interior scheme
    pub fn setup_ddx(&self) -> impl Fn(ArrayView1<f64>) -> Array1<f64> + '_ {
        let scheme = self.scheme;
        move |y: ArrayView1<f64>| self.ddx_with(scheme, y)
    }

    /// Returns the first derivative function for the scheme called `name`
    pub fn setup_ddx_named(
        &self,
        name: &str,
    ) -> Result<impl Fn(ArrayView1<f64>) -> Array1<f64> + '_> {
        let scheme: InteriorScheme = name.parse()?;
        Ok(move |y: ArrayView1<f64>| self.ddx_with(scheme, y))
    }

    fn ddx_with(&self, scheme: InteriorScheme, y: ArrayView1<f64>) -> Array1<f64> {
        match scheme {
            InteriorScheme::Centered => self.centered_difference(y),
            InteriorScheme::UpwindLeft => self.upwind_left(y),
        }
    }

    /// Second order central difference at interior points. The end values are copied
    /// through from `y`.
    pub fn centered_difference(&self, y: ArrayView1<f64>) -> Array1<f64> {
        self.check_field(&y);
        let n = y.len();
        let mut d = y.to_owned();
        for i in 1..n.saturating_sub(1) {
            d[i] = stencil::apply(&second_order::CENTRAL_1, i, |j| y[j]) / self.dr;
        }
        d
    }

    /// First order backward difference using the local cell width. The first value is
    /// copied through from `y`.
    pub fn upwind_left(&self, y: ArrayView1<f64>) -> Array1<f64> {
        self.check_field(&y);
        let widths = self.grid.cell_widths();
        let mut d = y.to_owned();
        for i in 1..y.len() {
            d[i] = stencil::apply(&first_order::BACKWARD_1, i, |j| y[j]) / widths[i];
        }
        d
    }

    // Matrix operators

    /// Centered first derivative
    pub fn ddx(&self) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        let (w_below, w_above) = (second_order::CENTRAL_1[0].1, second_order::CENTRAL_1[1].1);

        let below = Array1::from_elem(n, w_below / self.dr);
        let above = Array1::from_elem(n, w_above / self.dr);

        log::debug!("Built ddx operator on {} points", n);
        Ok(DiaMatrix::from_diagonals(&[below, above], &[-1, 1], n))
    }

    /// Centered radial first derivative. Row 0 sits on the axis, where the derivative of
    /// a symmetric field vanishes, so the coupling to row 1 is dropped.
    pub fn ddr(&self) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        let g = 1.0 / (2.0 * self.dr);

        let below = Array1::from_elem(n, -g);
        let mut above = Array1::from_elem(n, g);
        above[1] = 0.0;

        log::debug!("Built ddr operator on {} points", n);
        Ok(DiaMatrix::from_diagonals(&[below, above], &[-1, 1], n))
    }

    /// Second derivative, with a reflection about row 0
    pub fn del2(&self) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        let g2 = 1.0 / (self.dr * self.dr);
        let [(_, w_below), (_, w_diag), (_, w_above)] = second_order::CENTRAL_2;

        let below = Array1::from_elem(n, w_below * g2);
        let diag = Array1::from_elem(n, w_diag * g2);
        let mut above = Array1::from_elem(n, w_above * g2);
        // Ghost point r[-1] = r[1] folds onto the coupling between rows 0 and 1
        above[1] *= 2.0;

        log::debug!("Built del2 operator on {} points", n);
        Ok(DiaMatrix::from_diagonals(&[below, diag, above], &[-1, 0, 1], n))
    }

    /// Curl-like operator coupling radial and azimuthal components in cylindrical
    /// coordinates.
    ///
    /// The edge coefficients (`2/dr` on the axis row, `1/dr` on the diagonal of the outer
    /// row and the zeroed sub-diagonal there) encode assumed boundary physics and are kept
    /// exactly as they are used upstream.
    pub fn radial_curl(&self) -> Result<DiaMatrix> {
        let n = self.check_radial()?;
        let r = self.grid.r();
        let g = 1.0 / (2.0 * self.dr);

        let mut below = Array1::zeros(n);
        for j in 0..n - 2 {
            below[j] = -g * (r[j] / r[j + 1]);
        }

        let mut diag = Array1::zeros(n);
        diag[n - 1] = 1.0 / self.dr;

        let mut above = Array1::zeros(n);
        above[1] = 2.0 / self.dr;
        // Never divides by r[0]
        for j in 2..n {
            above[j] = g * (r[j] / r[j - 1]);
        }

        log::debug!("Built radial_curl operator on {} points", n);
        Ok(DiaMatrix::from_diagonals(&[below, diag, above], &[-1, 0, 1], n))
    }

    /// Radial Laplacian `d2/dr2 + 1/r d/dr`. The `1/r d/dr` term vanishes on the axis by
    /// symmetry, so row 0 only carries the reflected second difference.
    pub fn del2_radial(&self) -> Result<DiaMatrix> {
        let n = self.check_radial()?;
        let r = self.grid.r();
        let g1 = 1.0 / (2.0 * self.dr);
        let g2 = 1.0 / (self.dr * self.dr);

        let mut below = Array1::zeros(n);
        for j in 0..n - 1 {
            below[j] = g2 - g1 / r[j + 1];
        }
        // Padding slot: the limiting value without the 1/r factor
        below[n - 1] = g2 - g1;

        let diag = Array1::from_elem(n, -2.0 * g2);

        let mut above = Array1::zeros(n);
        above[0] = g1 + g2;
        above[1] = 2.0 * g2;
        for j in 2..n {
            above[j] = g1 / r[j - 1] + g2;
        }

        log::debug!("Built del2_radial operator on {} points", n);
        Ok(DiaMatrix::from_diagonals(&[below, diag, above], &[-1, 0, 1], n))
    }

    // Boundary conditions

    /// Identity everywhere except row 0, which is replaced by `stencil` (offsets to the
    /// right of the edge)
    fn left_edge(&self, stencil: &Stencil) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        let mut diagonals = vec![Array1::<f64>::ones(n)];
        let mut offsets = vec![0];
        diagonals[0][0] = 0.0;

        for &(offset, weight) in stencil {
            let mut d = Array1::zeros(n);
            d[offset as usize] = weight;
            diagonals.push(d);
            offsets.push(offset);
        }

        Ok(DiaMatrix::from_diagonals(&diagonals, &offsets, n))
    }

    /// Identity everywhere except row N - 1, which is replaced by the mirror image of
    /// `stencil`
    fn right_edge(&self, stencil: &Stencil) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        let mut diagonals: Vec<Array1<f64>> = vec![];
        let mut offsets = vec![];

        for &(offset, weight) in stencil.iter().rev() {
            let mut d = Array1::zeros(n);
            d[n - 1 - offset as usize] = weight;
            diagonals.push(d);
            offsets.push(-offset);
        }

        let mut diag = Array1::ones(n);
        diag[n - 1] = 0.0;
        diagonals.push(diag);
        offsets.push(0);

        Ok(DiaMatrix::from_diagonals(&diagonals, &offsets, n))
    }

    #[allow(non_snake_case)]
    fn axis_quadratic_weights(&self) -> Result<[(isize, f64); 2]> {
        self.check_radial()?;
        let r = self.grid.r();
        let (r1_sq, r2_sq) = (r[1] * r[1], r[2] * r[2]);
        let R = (r1_sq + r2_sq) / (r2_sq - r1_sq) / 2.0;
        Ok([(1, 0.5 + R), (2, 0.5 - R)])
    }

    /// Linear extrapolation onto row 0: `f0 = 2 f1 - f2`
    pub fn bc_left_extrap(&self) -> Result<DiaMatrix> {
        self.left_edge(&edge::EXTRAPOLATE)
    }

    /// `f0 = 1.5 f1 - 0.5 f2`
    pub fn bc_left_avg(&self) -> Result<DiaMatrix> {
        self.left_edge(&edge::AVERAGE)
    }

    /// Fits `a + b r^2` through points 1 and 2 and evaluates it on the axis, which allows
    /// for the first two points not being equally spaced from it
    pub fn bc_left_quad(&self) -> Result<DiaMatrix> {
        let weights = self.axis_quadratic_weights()?;
        self.left_edge(&weights)
    }

    /// Zero gradient: `f0 = f1`
    pub fn bc_left_flat(&self) -> Result<DiaMatrix> {
        self.left_edge(&edge::FLAT)
    }

    /// `f0 = 0`
    pub fn bc_left_zero(&self) -> Result<DiaMatrix> {
        self.left_edge(&[])
    }

    /// Linear extrapolation onto row N - 1: `f[N-1] = 2 f[N-2] - f[N-3]`
    pub fn bc_right_extrap(&self) -> Result<DiaMatrix> {
        self.right_edge(&edge::EXTRAPOLATE)
    }

    pub fn bc_right_avg(&self) -> Result<DiaMatrix> {
        self.right_edge(&edge::AVERAGE)
    }

    pub fn bc_right_flat(&self) -> Result<DiaMatrix> {
        self.right_edge(&edge::FLAT)
    }

    pub fn bc_right_zero(&self) -> Result<DiaMatrix> {
        self.right_edge(&[])
    }

    /// The boundary matrix for `policy` applied at `edge`
    pub fn boundary(&self, edge: Edge, policy: BoundaryPolicy) -> Result<DiaMatrix> {
        match (edge, policy) {
            (Edge::Left, BoundaryPolicy::Extrapolate) => self.bc_left_extrap(),
            (Edge::Left, BoundaryPolicy::Average) => self.bc_left_avg(),
            (Edge::Left, BoundaryPolicy::Quadratic) => self.bc_left_quad(),
            (Edge::Left, BoundaryPolicy::Flat) => self.bc_left_flat(),
            (Edge::Left, BoundaryPolicy::Zero) => self.bc_left_zero(),
            (Edge::Right, BoundaryPolicy::Extrapolate) => self.bc_right_extrap(),
            (Edge::Right, BoundaryPolicy::Average) => self.bc_right_avg(),
            (Edge::Right, BoundaryPolicy::Quadratic) => Err(Error::Configuration(
                "the quadratic boundary policy is an axis fit and only applies at the left edge"
                    .to_owned(),
            )),
            (Edge::Right, BoundaryPolicy::Flat) => self.bc_right_flat(),
            (Edge::Right, BoundaryPolicy::Zero) => self.bc_right_zero(),
        }
    }

    /// Overwrite the edge rows of `op` so that its output at each edge is reconstructed
    /// from its output at the neighbouring interior points
    pub fn with_boundaries(
        &self,
        op: &DiaMatrix,
        left: BoundaryPolicy,
        right: BoundaryPolicy,
    ) -> Result<DiaMatrix> {
        self.compose_boundaries(op, Some(left), Some(right))
    }

    /// Replace row 0 of `op` with row 0 of `L * op` and row `N - 1` with row `N - 1` of
    /// `R * op`. Both products are taken on `op` itself, so the edges never read each
    /// other's reconstructed rows. An edge given `None` keeps the operator's own row.
    pub fn compose_boundaries(
        &self,
        op: &DiaMatrix,
        left: Option<BoundaryPolicy>,
        right: Option<BoundaryPolicy>,
    ) -> Result<DiaMatrix> {
        let n = self.check_size()?;
        if op.shape() != (n, n) {
            return Err(Error::Configuration(format!(
                "operator is {:?} but the grid has {} points",
                op.shape(),
                n
            )));
        }

        log::trace!(
            "Composing {:?} (left) and {:?} (right) boundaries onto a {}x{} operator",
            left,
            right,
            n,
            n
        );
        let mut composed = op.clone();
        if let Some(policy) = left {
            let reconstructed = self.boundary(Edge::Left, policy)?.matmul(op);
            composed = composed.with_row_from(0, &reconstructed);
        }
        if let Some(policy) = right {
            let reconstructed = self.boundary(Edge::Right, policy)?.matmul(op);
            composed = composed.with_row_from(n - 1, &reconstructed);
        }
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    /// N = 10 points on [0, 10]
    fn grid() -> Grid {
        Grid::new_uniform(0.0, 10.0, 10).unwrap()
    }

    fn assert_storage(d: &DiaMatrix, offsets: &[isize], expected: &[Array1<f64>]) {
        assert_eq!(d.offsets(), offsets);
        assert_eq!(d.data().nrows(), expected.len());
        for (actual, expected) in d.data().outer_iter().zip(expected) {
            assert_eq!(actual.len(), expected.len());
            for (a, e) in actual.iter().zip(expected.iter()) {
                assert_relative_eq!(*a, *e, epsilon = 1e-12, max_relative = 1e-12);
            }
        }
    }

    fn assert_identity_except(d: &DiaMatrix, edge_row: usize) {
        let n = d.shape().0;
        let dense = d.to_dense();
        for i in (0..n).filter(|&i| i != edge_row) {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(dense[[i, j]], expected, "element ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn parse_schemes() {
        assert_eq!("centered".parse::<InteriorScheme>(), Ok(InteriorScheme::Centered));
        assert_eq!("upwind_left".parse::<InteriorScheme>(), Ok(InteriorScheme::UpwindLeft));

        let err = "upwind_right".parse::<InteriorScheme>().unwrap_err();
        assert_eq!(err, Error::UnknownScheme("upwind_right".to_owned()));
        assert!(err.is_configuration());
    }

    #[test]
    fn from_parameters() {
        let grid = grid();
        let fd = FiniteDifference::from_parameters(&grid, &FiniteDifferenceParameters::default())
            .unwrap();
        assert_eq!(fd.scheme(), InteriorScheme::Centered);

        let params = FiniteDifferenceParameters {
            kind: TYPE_NAME.to_owned(),
            method: "upwind_left".to_owned(),
        };
        let fd = FiniteDifference::from_parameters(&grid, &params).unwrap();
        assert_eq!(fd.scheme(), InteriorScheme::UpwindLeft);

        let params = FiniteDifferenceParameters {
            kind: TYPE_NAME.to_owned(),
            method: "spectral".to_owned(),
        };
        assert!(matches!(
            FiniteDifference::from_parameters(&grid, &params),
            Err(Error::UnknownScheme(_))
        ));

        let params = FiniteDifferenceParameters {
            kind: "Interpolator".to_owned(),
            method: "centered".to_owned(),
        };
        assert!(matches!(
            FiniteDifference::from_parameters(&grid, &params),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn setup_ddx() {
        let grid = grid();
        let mut fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = Array1::range(0.0, 10.0, 1.0);

        let centered = fd.setup_ddx()(y.view());
        assert_eq!(centered.shape(), &[10]);
        assert_eq!(centered, fd.centered_difference(y.view()));

        fd.set_scheme(InteriorScheme::UpwindLeft);
        let upwind = fd.setup_ddx()(y.view());
        assert_eq!(upwind.shape(), &[10]);
        assert_eq!(upwind, fd.upwind_left(y.view()));
    }

    #[test]
    fn setup_ddx_named() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = Array1::range(0.0, 10.0, 1.0);

        let upwind = fd.setup_ddx_named("upwind_left").unwrap();
        assert_eq!(upwind(y.view()), fd.upwind_left(y.view()));

        assert!(matches!(
            fd.setup_ddx_named("backward"),
            Err(Error::UnknownScheme(name)) if name == "backward"
        ));
    }

    #[test]
    fn centered_difference() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let dr = grid.dr();
        let y = Array1::range(0.0, 10.0, 1.0).mapv(|v: f64| v * v);

        let d = fd.centered_difference(y.view());
        assert_eq!(d[0], y[0]);
        assert_eq!(d[9], y[9]);
        for i in 1..9 {
            assert_relative_eq!(d[i], (y[i + 1] - y[i - 1]) / (2.0 * dr), max_relative = 1e-12);
        }
    }

    #[test]
    fn upwind_left() {
        let grid = Grid::from_points(&[0.0, 0.5, 1.5, 2.0, 4.0]).unwrap();
        let fd = FiniteDifference::new(&grid, InteriorScheme::UpwindLeft).unwrap();
        let y = array![1.0, 2.0, 0.0, 3.0, 3.0];

        let d = fd.upwind_left(y.view());
        assert_eq!(d[0], 1.0);
        assert_abs_diff_eq!(d[1], 2.0);
        assert_abs_diff_eq!(d[2], -2.0);
        assert_abs_diff_eq!(d[3], 6.0);
        assert_abs_diff_eq!(d[4], 0.0);
    }

    #[test]
    fn derivatives_do_not_touch_input() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = Array1::range(0.0, 10.0, 1.0);
        let copy = y.clone();
        fd.centered_difference(y.view());
        fd.upwind_left(y.view());
        assert_eq!(y, copy);
    }

    #[test]
    fn derivative_of_exponential() {
        // Fine grid so the truncation error is small compared with the tolerance
        let grid = Grid::new_uniform(0.0, 1.0, 1001).unwrap();
        let y = grid.r().mapv(f64::exp);

        for scheme in InteriorScheme::ALL.iter().copied() {
            let fd = FiniteDifference::new(&grid, scheme).unwrap();
            let d = fd.setup_ddx()(y.view());
            let tolerance = match scheme {
                InteriorScheme::Centered => 1e-6,
                InteriorScheme::UpwindLeft => 1e-3,
            };
            for i in 1..grid.num_points() - 1 {
                // Compare against the exact slope at the point the scheme is centred on
                let x = match scheme {
                    InteriorScheme::Centered => grid.r()[i],
                    InteriorScheme::UpwindLeft => grid.r()[i] - 0.5 * grid.dr(),
                };
                assert_relative_eq!(d[i], x.exp(), max_relative = tolerance);
            }
        }
    }

    #[test]
    #[should_panic]
    fn field_length_mismatch() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        fd.centered_difference(Array1::zeros(3).view());
    }

    #[test]
    fn ddx() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let g = 1.0 / (2.0 * fd.dr());

        let d = fd.ddx().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(
            &d,
            &[-1, 1],
            &[Array1::from_elem(n, -g), Array1::from_elem(n, g)],
        );
        assert_ne!(d.get(0, 1), 0.0);
    }

    #[test]
    fn ddx_matches_centered_difference_inside() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = grid.r().mapv(|r| r.sin());
        let from_matrix = fd.ddx().unwrap().dot(y.view());
        let pointwise = fd.centered_difference(y.view());
        for i in 1..grid.num_points() - 1 {
            assert_abs_diff_eq!(from_matrix[i], pointwise[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn ddr() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let g1 = 1.0 / (2.0 * fd.dr());

        let mut above = Array1::from_elem(n, g1);
        above[1] = 0.0;

        let d = fd.ddr().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(&d, &[-1, 1], &[Array1::from_elem(n, -g1), above]);
        assert_eq!(d.get(0, 1), 0.0);
        assert_relative_eq!(d.get(1, 2), g1, max_relative = 1e-12);
    }

    #[test]
    fn del2() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let dr = fd.dr();
        let g = 1.0 / (dr * dr);

        let below = Array1::from_elem(n, g);
        let diag = Array1::from_elem(n, -2.0 * g);
        let mut above = Array1::from_elem(n, g);
        above[1] *= 2.0;

        let d = fd.del2().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(&d, &[-1, 0, 1], &[below, diag, above]);

        assert_relative_eq!(d.get(0, 0), -2.0 / (dr * dr), max_relative = 1e-12);
        assert_relative_eq!(d.get(0, 1), 2.0 / (dr * dr), max_relative = 1e-12);
        assert_relative_eq!(d.get(5, 4), 1.0 / (dr * dr), max_relative = 1e-12);
    }

    #[test]
    fn del2_interior_rows_sum_to_zero() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let dense = fd.del2().unwrap().to_dense();
        for i in 1..grid.num_points() - 1 {
            assert_abs_diff_eq!(dense.row(i).sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn del2_radial_interior_rows_sum_to_zero() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let dense = fd.del2_radial().unwrap().to_dense();
        for i in 1..grid.num_points() - 1 {
            assert_abs_diff_eq!(dense.row(i).sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn del2_is_exact_for_quadratics() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = grid.r().mapv(|r| 3.0 * r * r - r + 2.0);
        let d2 = fd.del2().unwrap().dot(y.view());
        for i in 1..grid.num_points() - 1 {
            assert_relative_eq!(d2[i], 6.0, max_relative = 1e-10);
        }
    }

    #[test]
    fn radial_curl() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let dr = fd.dr();
        let r = grid.r();
        let g = 1.0 / (2.0 * dr);

        let mut below = Array1::zeros(n);
        for j in 0..n - 2 {
            below[j] = -g * r[j] / r[j + 1];
        }
        let mut diag = Array1::zeros(n);
        diag[n - 1] = 1.0 / dr;
        let mut above = Array1::zeros(n);
        above[1] = 2.0 / dr;
        for j in 2..n {
            above[j] = g * r[j] / r[j - 1];
        }

        let d = fd.radial_curl().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(&d, &[-1, 0, 1], &[below, diag, above]);
        assert!(d.data().iter().all(|v| v.is_finite()));

        // Edge rows
        assert_eq!(d.get(0, 0), 0.0);
        assert_relative_eq!(d.get(0, 1), 2.0 / dr, max_relative = 1e-12);
        assert_eq!(d.get(n - 1, n - 2), 0.0);
        assert_relative_eq!(d.get(n - 1, n - 1), 1.0 / dr, max_relative = 1e-12);
        // Axis point couples to row 1 with weight zero since r[0] = 0
        assert_eq!(d.get(1, 0), 0.0);
        assert_relative_eq!(d.get(1, 2), g * r[2] / r[1], max_relative = 1e-12);
    }

    #[test]
    fn del2_radial() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let dr = fd.dr();
        let r = grid.r();
        let g1 = 1.0 / (2.0 * dr);
        let g2 = 1.0 / (dr * dr);

        let d = fd.del2_radial().unwrap();
        let dense = d.to_dense();
        assert_eq!(d.shape(), (n, n));
        assert!(d.data().iter().all(|v| v.is_finite()));

        for i in 0..n {
            assert_relative_eq!(dense[[i, i]], -2.0 * g2, max_relative = 1e-12);
        }
        for i in 1..n {
            assert_relative_eq!(dense[[i, i - 1]], g2 - g1 / r[i], max_relative = 1e-12);
        }
        assert_relative_eq!(dense[[0, 1]], 2.0 * g2, max_relative = 1e-12);
        for i in 1..n - 1 {
            assert_relative_eq!(dense[[i, i + 1]], g2 + g1 / r[i], max_relative = 1e-12);
        }
        assert_relative_eq!(d.diagonal(-1).unwrap()[n - 1], g2 - g1, max_relative = 1e-12);
    }

    #[test]
    fn del2_radial_away_from_axis() {
        // Applied to r^2 the cylindrical Laplacian gives 4 everywhere
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = grid.r().mapv(|r| r * r);
        let lap = fd.del2_radial().unwrap().dot(y.view());
        for i in 1..grid.num_points() - 1 {
            assert_relative_eq!(lap[i], 4.0, max_relative = 1e-10);
        }
    }

    #[test]
    fn radial_operators_need_the_axis_side() {
        let grid = Grid::new_uniform(-1.0, 1.0, 5).unwrap();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        assert!(matches!(fd.radial_curl(), Err(Error::Configuration(_))));
        assert!(matches!(fd.del2_radial(), Err(Error::Configuration(_))));
        assert!(matches!(fd.bc_left_quad(), Err(Error::Configuration(_))));
        // Cartesian operators are fine
        assert!(fd.del2().is_ok());
        assert!(fd.ddx().is_ok());
    }

    #[test]
    fn bc_left_extrap() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let mut diag = Array1::ones(n);
        diag[0] = 0.0;
        let mut above = Array1::zeros(n);
        above[1] = 2.0;
        let mut above2 = Array1::zeros(n);
        above2[2] = -1.0;

        let d = fd.bc_left_extrap().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(&d, &[0, 1, 2], &[diag, above, above2]);
        assert_identity_except(&d, 0);
    }

    #[test]
    fn bc_left_avg() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let mut diag = Array1::ones(n);
        diag[0] = 0.0;
        let mut above = Array1::zeros(n);
        above[1] = 1.5;
        let mut above2 = Array1::zeros(n);
        above2[2] = -0.5;

        let d = fd.bc_left_avg().unwrap();
        assert_storage(&d, &[0, 1, 2], &[diag, above, above2]);
        assert_identity_except(&d, 0);
    }

    #[test]
    #[allow(non_snake_case)]
    fn bc_left_quad() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let r = grid.r();
        let R = (r[1].powi(2) + r[2].powi(2)) / (r[2].powi(2) - r[1].powi(2)) / 2.0;

        let mut diag = Array1::ones(n);
        diag[0] = 0.0;
        let mut above = Array1::zeros(n);
        above[1] = 0.5 + R;
        let mut above2 = Array1::zeros(n);
        above2[2] = 0.5 - R;

        let d = fd.bc_left_quad().unwrap();
        assert_storage(&d, &[0, 1, 2], &[diag, above, above2]);
        assert_identity_except(&d, 0);
    }

    #[test]
    fn bc_left_quad_recovers_even_quadratics() {
        let grid = Grid::from_points(&[0.0, 0.3, 1.0, 1.8]).unwrap();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let y = grid.r().mapv(|r| 5.0 - 2.0 * r * r);
        let fixed = fd.bc_left_quad().unwrap().dot(y.view());
        assert_relative_eq!(fixed[0], 5.0, max_relative = 1e-12);
    }

    #[test]
    fn bc_left_flat() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let mut diag = Array1::ones(n);
        diag[0] = 0.0;
        let mut above = Array1::zeros(n);
        above[1] = 1.0;

        let d = fd.bc_left_flat().unwrap();
        assert_storage(&d, &[0, 1], &[diag, above]);

        let dense = d.to_dense();
        assert_eq!(dense[[0, 0]], 0.0);
        assert_eq!(dense[[0, 1]], 1.0);
        assert!((2..n).all(|j| dense[[0, j]] == 0.0));
        assert_identity_except(&d, 0);
    }

    #[test]
    fn bc_right_extrap() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let mut below2 = Array1::zeros(n);
        below2[n - 3] = -1.0;
        let mut below = Array1::zeros(n);
        below[n - 2] = 2.0;
        let mut diag = Array1::ones(n);
        diag[n - 1] = 0.0;

        let d = fd.bc_right_extrap().unwrap();
        assert_eq!(d.shape(), (n, n));
        assert_storage(&d, &[-2, -1, 0], &[below2, below, diag]);
        assert_identity_except(&d, n - 1);

        let y = grid.r().mapv(|r| 1.0 - 0.5 * r);
        let mut broken = y.clone();
        broken[n - 1] = 100.0;
        let fixed = d.dot(broken.view());
        assert_relative_eq!(fixed[n - 1], y[n - 1], max_relative = 1e-12);
    }

    #[test]
    fn zero_and_mirrored_right_policies() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let left = fd.bc_left_zero().unwrap().to_dense();
        assert!(left.row(0).iter().all(|&v| v == 0.0));

        let right = fd.bc_right_zero().unwrap().to_dense();
        assert!(right.row(n - 1).iter().all(|&v| v == 0.0));

        let avg = fd.bc_right_avg().unwrap();
        assert_eq!(avg.get(n - 1, n - 3), -0.5);
        assert_eq!(avg.get(n - 1, n - 2), 1.5);
        assert_eq!(avg.get(n - 1, n - 1), 0.0);
        assert_identity_except(&avg, n - 1);

        let flat = fd.bc_right_flat().unwrap();
        assert_eq!(flat.get(n - 1, n - 2), 1.0);
        assert_eq!(flat.get(n - 1, n - 1), 0.0);
        assert_identity_except(&flat, n - 1);
    }

    #[test]
    fn boundary_dispatch() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();

        assert_eq!(
            fd.boundary(Edge::Left, BoundaryPolicy::Extrapolate).unwrap(),
            fd.bc_left_extrap().unwrap()
        );
        assert_eq!(
            fd.boundary(Edge::Left, BoundaryPolicy::Quadratic).unwrap(),
            fd.bc_left_quad().unwrap()
        );
        assert_eq!(
            fd.boundary(Edge::Right, BoundaryPolicy::Extrapolate).unwrap(),
            fd.bc_right_extrap().unwrap()
        );
        assert!(matches!(
            fd.boundary(Edge::Right, BoundaryPolicy::Quadratic),
            Err(Error::Configuration(_))
        ));

        assert_eq!(
            "average".parse::<BoundaryPolicy>(),
            Ok(BoundaryPolicy::Average)
        );
        assert!("avg".parse::<BoundaryPolicy>().is_err());
        assert!("mirror".parse::<BoundaryPolicy>().is_err());
    }

    #[test]
    fn with_boundaries_overwrites_edge_rows() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();

        let op = fd.del2().unwrap();
        let composed = fd
            .with_boundaries(&op, BoundaryPolicy::Flat, BoundaryPolicy::Extrapolate)
            .unwrap();

        let op_dense = op.to_dense();
        let dense = composed.to_dense();
        for i in 1..n - 1 {
            for j in 0..n {
                assert_eq!(dense[[i, j]], op_dense[[i, j]]);
            }
        }
        for j in 0..n {
            assert_abs_diff_eq!(dense[[0, j]], op_dense[[1, j]], epsilon = 1e-12);
            assert_abs_diff_eq!(
                dense[[n - 1, j]],
                2.0 * op_dense[[n - 2, j]] - op_dense[[n - 3, j]],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn boundaries_on_smallest_grid() {
        // dr = 1, so del2 is [[-2, 2, 0], [1, -2, 1], [0, 1, -2]]
        let grid = Grid::new_uniform(0.0, 2.0, 3).unwrap();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();

        let op = fd.del2().unwrap();
        let composed = fd
            .with_boundaries(&op, BoundaryPolicy::Extrapolate, BoundaryPolicy::Extrapolate)
            .unwrap();

        let expected = array![[2.0, -5.0, 4.0], [1.0, -2.0, 1.0], [4.0, -6.0, 2.0]];
        let dense = composed.to_dense();
        for (a, e) in dense.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn one_sided_composition() {
        let grid = grid();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let n = grid.num_points();
        let op = fd.del2_radial().unwrap();
        let op_dense = op.to_dense();

        let untouched = fd.compose_boundaries(&op, None, None).unwrap();
        assert_eq!(untouched.to_dense(), op_dense);

        let left_only = fd
            .compose_boundaries(&op, Some(BoundaryPolicy::Flat), None)
            .unwrap()
            .to_dense();
        for j in 0..n {
            assert_abs_diff_eq!(left_only[[0, j]], op_dense[[1, j]], epsilon = 1e-12);
            assert_eq!(left_only[[n - 1, j]], op_dense[[n - 1, j]]);
        }

        let right_only = fd
            .compose_boundaries(&op, None, Some(BoundaryPolicy::Zero))
            .unwrap()
            .to_dense();
        for j in 0..n {
            assert_eq!(right_only[[0, j]], op_dense[[0, j]]);
            assert_eq!(right_only[[n - 1, j]], 0.0);
        }

        let wrong_size = DiaMatrix::identity(n + 1);
        assert!(matches!(
            fd.compose_boundaries(&wrong_size, None, None),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn too_small_grid() {
        let grid = Grid::new_uniform(0.0, 1.0, 2).unwrap();
        let fd = FiniteDifference::new(&grid, InteriorScheme::Centered).unwrap();
        let too_small = |result: Result<DiaMatrix>| {
            matches!(
                result,
                Err(Error::GridTooSmall {
                    required: 3,
                    found: 2
                })
            )
        };

        assert!(too_small(fd.ddx()));
        assert!(too_small(fd.ddr()));
        assert!(too_small(fd.del2()));
        assert!(too_small(fd.radial_curl()));
        assert!(too_small(fd.del2_radial()));
        assert!(too_small(fd.bc_left_extrap()));
        assert!(too_small(fd.bc_left_avg()));
        assert!(too_small(fd.bc_left_quad()));
        assert!(too_small(fd.bc_left_flat()));
        assert!(too_small(fd.bc_right_extrap()));
        assert!(too_small(fd.boundary(Edge::Right, BoundaryPolicy::Zero)));
    }
}
