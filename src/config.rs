use crate::assembly::IntegrationMode;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::wave::WaveParameters;
use serde::{Deserialize, Serialize};

/// Number of grid vertices along each side of the unit square
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshParams {
    pub supports_x: usize,
    pub supports_y: usize,
}

impl Default for MeshParams {
    fn default() -> Self {
        MeshParams {
            supports_x: 9,
            supports_y: 9,
        }
    }
}

impl MeshParams {
    pub fn square(supports: usize) -> Self {
        MeshParams {
            supports_x: supports,
            supports_y: supports,
        }
    }

    pub fn build(&self) -> Result<Mesh> {
        Mesh::unit_square(self.supports_x, self.supports_y)
    }
}

/// Contents of a `--config` file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mesh: MeshParams,
    pub integration: IntegrationMode,
    pub wave: WaveParameters,
}
