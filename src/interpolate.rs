use crate::error::{InterpolationError, Result};
use ndarray::prelude::*;
use std::fmt;
use std::str::FromStr;

/// The kinds of 1D interpolation available
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationKind {
    Linear,
    /// Nearest sample, rounding down at midpoints
    Nearest,
    /// Nearest sample, rounding up at midpoints
    NearestUp,
    /// Piecewise constant spline of order zero
    Zero,
    /// Linear spline
    SLinear,
    Quadratic,
    Cubic,
    Previous,
    Next,
}

impl InterpolationKind {
    pub fn name(&self) -> &'static str {
        match self {
            InterpolationKind::Linear => "linear",
            InterpolationKind::Nearest => "nearest",
            InterpolationKind::NearestUp => "nearest-up",
            InterpolationKind::Zero => "zero",
            InterpolationKind::SLinear => "slinear",
            InterpolationKind::Quadratic => "quadratic",
            InterpolationKind::Cubic => "cubic",
            InterpolationKind::Previous => "previous",
            InterpolationKind::Next => "next",
        }
    }

    /// The fewest samples this kind can be built from
    pub fn min_points(&self) -> usize {
        match self {
            InterpolationKind::Nearest
            | InterpolationKind::NearestUp
            | InterpolationKind::Zero
            | InterpolationKind::Previous
            | InterpolationKind::Next => 1,
            InterpolationKind::Linear | InterpolationKind::SLinear => 2,
            InterpolationKind::Quadratic => 3,
            InterpolationKind::Cubic => 4,
        }
    }

    fn spline_order(&self) -> Option<usize> {
        match self {
            InterpolationKind::Quadratic => Some(2),
            InterpolationKind::Cubic => Some(3),
            _ => None,
        }
    }
}

impl Default for InterpolationKind {
    fn default() -> Self {
        InterpolationKind::Linear
    }
}

impl FromStr for InterpolationKind {
    type Err = InterpolationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s {
            "linear" => InterpolationKind::Linear,
            "nearest" => InterpolationKind::Nearest,
            "nearest-up" => InterpolationKind::NearestUp,
            "zero" => InterpolationKind::Zero,
            "slinear" => InterpolationKind::SLinear,
            "quadratic" => InterpolationKind::Quadratic,
            "cubic" => InterpolationKind::Cubic,
            "previous" => InterpolationKind::Previous,
            "next" => InterpolationKind::Next,
            _ => return Err(InterpolationError::UnknownKind(s.to_owned())),
        };
        Ok(kind)
    }
}

impl fmt::Display for InterpolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with a query outside `[x[0], x[n-1]]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutOfBounds {
    Error,
    Fill(f64),
    /// Continue the end pieces. Step-like kinds hold the end sample.
    Extrapolate,
}

impl Default for OutOfBounds {
    fn default() -> Self {
        OutOfBounds::Error
    }
}

/// An interpolating function built from samples `(x[i], y[i])`
#[derive(Clone, Debug)]
pub struct Interpolator1D {
    x: Vec<f64>,
    y: Vec<f64>,
    kind: InterpolationKind,
    bounds: OutOfBounds,
    spline: Option<BSpline>,
}

/// Build an interpolator of the kind named `kind`, e.g. `"linear"` or `"cubic"`
pub fn interpolate_1d(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    kind: &str,
) -> Result<Interpolator1D> {
    let kind = kind.parse()?;
    Interpolator1D::new(x, y, kind)
}

impl Interpolator1D {
    pub fn new(x: ArrayView1<f64>, y: ArrayView1<f64>, kind: InterpolationKind) -> Result<Self> {
        if x.len() != y.len() {
            return Err(InterpolationError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            }
            .into());
        }
        if x.len() < kind.min_points() {
            return Err(InterpolationError::TooFewPoints {
                kind: kind.name(),
                required: kind.min_points(),
                found: x.len(),
            }
            .into());
        }
        if let Some(index) = x.iter().chain(y.iter()).position(|v| !v.is_finite()) {
            return Err(InterpolationError::NonFinite {
                index: index % x.len(),
            }
            .into());
        }
        if let Some(index) = (1..x.len()).find(|&i| x[i] <= x[i - 1]) {
            return Err(InterpolationError::NotStrictlyIncreasing { index }.into());
        }

        let spline = match kind.spline_order() {
            Some(k) => Some(BSpline::interpolating(x, y, k)?),
            None => None,
        };

        log::debug!("Built {} interpolator from {} samples", kind, x.len());
        Ok(Interpolator1D {
            x: x.to_vec(),
            y: y.to_vec(),
            kind,
            bounds: OutOfBounds::default(),
            spline,
        })
    }

    /// Set how queries outside the sampled range are handled
    pub fn with_bounds(mut self, bounds: OutOfBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn kind(&self) -> InterpolationKind {
        self.kind
    }

    /// Evaluate the interpolant at `x`
    pub fn eval(&self, x: f64) -> Result<f64> {
        let n = self.x.len();
        let (min, max) = (self.x[0], self.x[n - 1]);
        if x.is_nan() {
            return Ok(f64::NAN);
        }
        if x < min || x > max {
            match self.bounds {
                OutOfBounds::Error => {
                    return Err(InterpolationError::OutOfBounds { x, min, max }.into())
                }
                OutOfBounds::Fill(value) => return Ok(value),
                OutOfBounds::Extrapolate => {}
            }
        }

        if let Some(spline) = &self.spline {
            return Ok(spline.eval(x));
        }

        if n == 1 {
            return Ok(self.y[0]);
        }

        // Index of the interval [x[i], x[i+1]] holding `x`, clamped to the end intervals
        let i = self.x.partition_point(|&v| v <= x).clamp(1, n - 1) - 1;
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[i], self.y[i + 1]);

        let value = match self.kind {
            InterpolationKind::Linear | InterpolationKind::SLinear => {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
            InterpolationKind::Nearest => {
                if x - x0 <= x1 - x {
                    y0
                } else {
                    y1
                }
            }
            InterpolationKind::NearestUp => {
                if x - x0 < x1 - x {
                    y0
                } else {
                    y1
                }
            }
            InterpolationKind::Previous | InterpolationKind::Zero => {
                if x >= x1 {
                    y1
                } else {
                    y0
                }
            }
            InterpolationKind::Next => {
                if x <= x0 {
                    y0
                } else {
                    y1
                }
            }
            InterpolationKind::Quadratic | InterpolationKind::Cubic => {
                unreachable!("spline kinds are evaluated above")
            }
        };
        Ok(value)
    }

    /// Evaluate the interpolant at each of `xs`
    pub fn eval_array(&self, xs: ArrayView1<f64>) -> Result<Array1<f64>> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// An interpolating B-spline of order `k`
#[derive(Clone, Debug)]
struct BSpline {
    t: Vec<f64>,
    c: Vec<f64>,
    k: usize,
}

impl BSpline {
    /// Knot placement: for k = 2 the knots sit at the midpoints between samples, for odd
    /// k they sit on the samples with the not-a-knot condition at both ends. In both cases
    /// the end knots are repeated k + 1 times.
    fn knots(x: ArrayView1<f64>, k: usize) -> Vec<f64> {
        let n = x.len();
        let mut t = vec![x[0]; k + 1];
        if k % 2 == 0 {
            // Midpoints, dropping the first and last
            t.extend((2..n - 1).map(|i| 0.5 * (x[i - 1] + x[i])));
        } else {
            let m = (k - 1) / 2;
            t.extend((m + 1..n - m - 1).map(|i| x[i]));
        }
        t.extend(std::iter::repeat(x[n - 1]).take(k + 1));
        t
    }

    fn interpolating(x: ArrayView1<f64>, y: ArrayView1<f64>, k: usize) -> Result<Self> {
        let n = x.len();
        let t = Self::knots(x, k);
        debug_assert_eq!(t.len(), n + k + 1);

        // Row i only touches the k + 1 basis functions supported at x[i], all within k
        // columns of the diagonal
        let mut collocation = BandedSystem::zeros(n, k, k);
        for (i, &xi) in x.iter().enumerate() {
            let span = find_span(&t, k, n, xi);
            let basis = basis_functions(&t, k, span, xi);
            for (r, b) in basis.into_iter().enumerate() {
                collocation.set(i, span - k + r, b);
            }
        }

        let c = collocation.solve(y.to_owned())?;
        Ok(BSpline {
            t,
            c: c.to_vec(),
            k,
        })
    }

    fn eval(&self, x: f64) -> f64 {
        let n = self.c.len();
        let span = find_span(&self.t, self.k, n, x);
        basis_functions(&self.t, self.k, span, x)
            .into_iter()
            .enumerate()
            .map(|(r, b)| b * self.c[span - self.k + r])
            .sum()
    }
}

/// The knot span `l` with `t[l] <= x < t[l+1]`, clamped to `k..=n-1` so points on or
/// beyond the ends use the end polynomials
fn find_span(t: &[f64], k: usize, n: usize, x: f64) -> usize {
    t.partition_point(|&v| v <= x).saturating_sub(1).clamp(k, n - 1)
}

/// The `k + 1` non-zero B-spline basis functions on knot span `span`, evaluated at `x`,
/// by the Cox-de Boor recursion
fn basis_functions(t: &[f64], k: usize, span: usize, x: f64) -> Vec<f64> {
    let mut values = vec![0.0; k + 1];
    let mut left = vec![0.0; k + 1];
    let mut right = vec![0.0; k + 1];
    values[0] = 1.0;

    for j in 1..=k {
        left[j] = x - t[span + 1 - j];
        right[j] = t[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// A square system with `lower` sub-diagonals and `upper` super-diagonals, stored by rows.
/// Each row keeps `lower` extra super-diagonal slots for the fill-in of partial pivoting.
struct BandedSystem {
    n: usize,
    lower: usize,
    upper: usize,
    band: Array2<f64>,
}

impl BandedSystem {
    fn zeros(n: usize, lower: usize, upper: usize) -> Self {
        BandedSystem {
            n,
            lower,
            upper,
            band: Array2::zeros((n, 2 * lower + upper + 1)),
        }
    }

    fn slot(&self, row: usize, col: usize) -> [usize; 2] {
        assert!(
            col + self.lower >= row && col <= row + self.lower + self.upper,
            "({}, {}) lies outside the band",
            row,
            col
        );
        [row, col + self.lower - row]
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.band[self.slot(row, col)]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        let slot = self.slot(row, col);
        self.band[slot] = value;
    }

    /// Solve `A x = b` by banded LU with partial pivoting, in O(n (lower + upper) lower)
    fn solve(mut self, mut b: Array1<f64>) -> Result<Array1<f64>> {
        let n = self.n;
        assert_eq!(b.len(), n, "right-hand side does not match the system");
        let scale = self.band.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let width = self.lower + self.upper;

        for col in 0..n {
            let last_row = (col + self.lower).min(n - 1);
            let last_col = (col + width).min(n - 1);

            let pivot = (col..=last_row)
                .max_by(|&i, &j| self.get(i, col).abs().total_cmp(&self.get(j, col).abs()))
                .unwrap_or(col);
            if self.get(pivot, col).abs() <= f64::EPSILON * scale {
                return Err(InterpolationError::Singular.into());
            }
            if pivot != col {
                for j in col..=last_col {
                    let (above, below) = (self.get(col, j), self.get(pivot, j));
                    self.set(col, j, below);
                    self.set(pivot, j, above);
                }
                b.swap(col, pivot);
            }

            for row in col + 1..=last_row {
                let factor = self.get(row, col) / self.get(col, col);
                if factor == 0.0 {
                    continue;
                }
                for j in col..=last_col {
                    let value = self.get(row, j) - factor * self.get(col, j);
                    self.set(row, j, value);
                }
                b[row] -= factor * b[col];
            }
        }

        for row in (0..n).rev() {
            let last_col = (row + width).min(n - 1);
            let sum: f64 = (row + 1..=last_col).map(|j| self.get(row, j) * b[j]).sum();
            b[row] = (b[row] - sum) / self.get(row, row);
        }
        Ok(b)
    }
}
