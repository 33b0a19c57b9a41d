use ndarray::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

/// A square sparse matrix stored by diagonals.
///
/// Storage follows the usual DIA layout: `data[[k, j]]` is the element in column `j` of
/// the diagonal with offset `offsets[k]`, i.e. matrix element `(j - offsets[k], j)`. Slots
/// whose row falls outside the matrix are padding; they are kept as given but never read.
#[derive(Clone, Debug, PartialEq)]
pub struct DiaMatrix {
    n: usize,
    offsets: Vec<isize>,
    data: Array2<f64>,
}

impl DiaMatrix {
    /// Assemble a matrix from diagonals given in DIA storage order.
    ///
    /// # Panics
    /// If the number of diagonals and offsets differ, a diagonal is not of length `n`, an
    /// offset is repeated or an offset lies outside the matrix.
    pub fn from_diagonals(diagonals: &[Array1<f64>], offsets: &[isize], n: usize) -> Self {
        assert_eq!(
            diagonals.len(),
            offsets.len(),
            "one offset is needed per diagonal"
        );

        let mut data = Array2::zeros((offsets.len(), n));
        for (k, (diagonal, &offset)) in diagonals.iter().zip(offsets).enumerate() {
            assert_eq!(diagonal.len(), n, "diagonal {} has the wrong length", offset);
            assert!(
                offset.unsigned_abs() < n.max(1),
                "offset {} is outside a {}x{} matrix",
                offset,
                n,
                n
            );
            assert!(
                !offsets[..k].contains(&offset),
                "offset {} appears more than once",
                offset
            );
            data.row_mut(k).assign(diagonal);
        }

        DiaMatrix {
            n,
            offsets: offsets.to_vec(),
            data,
        }
    }

    /// The `n`x`n` identity
    pub fn identity(n: usize) -> Self {
        DiaMatrix {
            n,
            offsets: vec![0],
            data: Array2::ones((1, n)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n, self.n)
    }

    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// The raw storage, one row per offset
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// The stored diagonal with the given offset, padding included
    pub fn diagonal(&self, offset: isize) -> Option<ArrayView1<'_, f64>> {
        self.offsets
            .iter()
            .position(|&o| o == offset)
            .map(|k| self.data.row(k))
    }

    /// Element `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.n && col < self.n, "({}, {}) out of bounds", row, col);
        let offset = col as isize - row as isize;
        self.diagonal(offset).map_or(0.0, |d| d[col])
    }

    /// Iterate over the stored elements that lie inside the matrix as `(row, col, value)`
    fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.n as isize;
        self.offsets
            .iter()
            .zip(self.data.outer_iter())
            .flat_map(move |(&offset, diagonal)| {
                let cols = offset.max(0)..(n + offset).min(n);
                cols.map(move |col| {
                    let col = col as usize;
                    ((col as isize - offset) as usize, col, diagonal[col])
                })
            })
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n, self.n));
        for (row, col, value) in self.entries() {
            dense[[row, col]] += value;
        }
        dense
    }

    /// Compute the matrix-vector product `self * x`
    pub fn dot(&self, x: ArrayView1<f64>) -> Array1<f64> {
        assert_eq!(x.len(), self.n, "vector length does not match the matrix");
        let mut y = Array1::zeros(self.n);
        for (row, col, value) in self.entries() {
            y[row] += value * x[col];
        }
        y
    }

    /// Compute the matrix product `self * other`, which is again banded with offsets equal
    /// to the pairwise sums of the factors' offsets
    pub fn matmul(&self, other: &DiaMatrix) -> DiaMatrix {
        assert_eq!(self.n, other.n, "matrix sizes do not match");
        let n = self.n;

        let mut diagonals: BTreeMap<isize, Array1<f64>> = BTreeMap::new();
        for (row, mid, a) in self.entries() {
            for (&offset, diagonal) in other.offsets.iter().zip(other.data.outer_iter()) {
                let col = mid as isize + offset;
                if col < 0 || col >= n as isize {
                    continue;
                }
                let col = col as usize;
                let product_offset = col as isize - row as isize;
                diagonals
                    .entry(product_offset)
                    .or_insert_with(|| Array1::zeros(n))[col] += a * diagonal[col];
            }
        }

        DiaMatrix::assemble(diagonals, n)
    }

    /// A copy of `self` whose row `row` is replaced by row `row` of `other`
    pub fn with_row_from(&self, row: usize, other: &DiaMatrix) -> DiaMatrix {
        assert_eq!(self.n, other.n, "matrix sizes do not match");
        assert!(row < self.n, "row {} out of bounds", row);
        let n = self.n;

        let mut diagonals: BTreeMap<isize, Array1<f64>> = BTreeMap::new();
        let kept = self.entries().filter(|&(r, _, _)| r != row);
        let replaced = other.entries().filter(|&(r, _, _)| r == row);
        for (r, col, value) in kept.chain(replaced) {
            diagonals
                .entry(col as isize - r as isize)
                .or_insert_with(|| Array1::zeros(n))[col] += value;
        }

        DiaMatrix::assemble(diagonals, n)
    }

    fn assemble(diagonals: BTreeMap<isize, Array1<f64>>, n: usize) -> DiaMatrix {
        if diagonals.is_empty() {
            return DiaMatrix {
                n,
                offsets: vec![],
                data: Array2::zeros((0, n)),
            };
        }

        let (offsets, diagonals): (Vec<_>, Vec<_>) = diagonals.into_iter().unzip();
        DiaMatrix::from_diagonals(&diagonals, &offsets, n)
    }
}

impl fmt::Display for DiaMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.to_dense().outer_iter() {
            let line: Vec<String> = row.iter().map(|v| format!("{:>12.5e}", v)).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
