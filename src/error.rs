use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building operators or interpolators. These are all
/// configuration or programmer errors, so nothing here is worth retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unknown interior scheme `{0}` (expected one of: centered, upwind_left)")]
    UnknownScheme(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("grid has {found} points but at least {required} are needed")]
    GridTooSmall { required: usize, found: usize },

    #[error("interpolation failed: {0}")]
    Interpolation(#[from] InterpolationError),
}

impl Error {
    /// Unknown scheme names are a particular kind of configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::UnknownScheme(_) | Error::Configuration(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("x and y have different lengths ({x} and {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("x must be strictly increasing (violated at index {index})")]
    NotStrictlyIncreasing { index: usize },

    #[error("sample data contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("`{kind}` interpolation needs at least {required} points, got {found}")]
    TooFewPoints {
        kind: &'static str,
        required: usize,
        found: usize,
    },

    #[error("unknown interpolation kind `{0}`")]
    UnknownKind(String),

    #[error("{x} is outside the interpolation range [{min}, {max}]")]
    OutOfBounds { x: f64, min: f64, max: f64 },

    #[error("spline collocation matrix is singular")]
    Singular,
}
