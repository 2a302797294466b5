use serde::{Deserialize, Serialize};

use super::params::AmConfig;

/// Control messages consumed by the engine at block boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineMsg {
  UpdateConfig { config: AmConfig },
  #[serde(rename_all = "camelCase")]
  StartSpectrum { fft_size: usize },
  StopSpectrum,
}
