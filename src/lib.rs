pub mod banded;
pub mod config;
pub mod error;
pub mod finite_difference;
pub mod grid;
pub mod interpolate;
mod stencil;
pub mod utilities;

pub use banded::DiaMatrix;
pub use error::{Error, InterpolationError, Result};
pub use finite_difference::{BoundaryPolicy, Edge, FiniteDifference, InteriorScheme};
pub use grid::Grid;
pub use interpolate::{interpolate_1d, InterpolationKind, Interpolator1D, OutOfBounds};
