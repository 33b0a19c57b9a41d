//! Finite difference stencils as `(offset, weight)` pairs.

pub type Stencil = [(isize, f64)];

pub mod first_order {
    pub static BACKWARD_1: [(isize, f64); 2] = [(0, 1.0), (-1, -1.0)];
}

pub mod second_order {
    pub static CENTRAL_1: [(isize, f64); 2] = [(-1, -0.5), (1, 0.5)];
    pub static CENTRAL_2: [(isize, f64); 3] = [(-1, 1.0), (0, -2.0), (1, 1.0)];
}

/// Stencils that reconstruct an edge value from its interior neighbours. Offsets point
/// into the domain from the left edge; negate them for the right edge.
pub mod edge {
    /// Straight line through the two nearest neighbours
    pub static EXTRAPOLATE: [(isize, f64); 2] = [(1, 2.0), (2, -1.0)];
    pub static AVERAGE: [(isize, f64); 2] = [(1, 1.5), (2, -0.5)];
    /// Zero gradient
    pub static FLAT: [(isize, f64); 1] = [(1, 1.0)];
}

pub fn apply<F>(stencil: &Stencil, i: usize, f: F) -> f64
where
    F: Fn(usize) -> f64,
{
    stencil.iter().fold(0.0, |acc, (k, w)| {
        let offset = (i as isize + k) as usize;
        acc + w * f(offset)
    })
}
