use crate::error::Result;
use crate::finite_difference::{FiniteDifference, FiniteDifferenceParameters};
use crate::grid::{Grid, GridParameters};
use serde::{Deserialize, Serialize};

/// A configuration document describing a grid and the finite difference tool used on it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Grid")]
    pub grid: GridParameters,
    #[serde(rename = "FiniteDifference", default)]
    pub finite_difference: FiniteDifferenceParameters,
}

impl Config {
    pub fn build_grid(&self) -> Result<Grid> {
        Grid::from_parameters(&self.grid)
    }

    pub fn build_finite_difference<'g>(&self, grid: &'g Grid) -> Result<FiniteDifference<'g>> {
        FiniteDifference::from_parameters(grid, &self.finite_difference)
    }
}
