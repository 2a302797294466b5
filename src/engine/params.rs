use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Upper bound on the low-pass cascade length. Stage storage is reserved to this size once per
/// channel so a stage-count change never reallocates on the audio thread.
pub const MAX_FILTER_STAGES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CarrierConfig {
  /// Carrier frequency as a fraction of the sample rate.
  pub freq_ratio: f32,
  pub modulation_index: f32,
}

impl Default for CarrierConfig {
  fn default() -> Self { Self { freq_ratio: 0.5, modulation_index: 1.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LpfConfig {
  pub cutoff: f32,
  pub q: f32,
  /// Kept as a float so malformed (non-integer) control input is still representable.
  pub stages: f32,
}

impl Default for LpfConfig {
  fn default() -> Self { Self { cutoff: 4000.0, q: 0.707, stages: 16.0 } }
}

impl LpfConfig {
  /// Number of cascaded sections actually built: rounded, at least 1, at most `MAX_FILTER_STAGES`.
  pub fn stage_count(&self) -> usize {
    let n = self.stages.round().max(1.0);
    (n.min(MAX_FILTER_STAGES as f32)) as usize
  }
}

/// Envelope detector timing, measured in carrier periods.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
  pub attack_time: f32,
  pub release_time: f32,
}

impl Default for DetectorConfig {
  fn default() -> Self { Self { attack_time: 0.5, release_time: 4.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressorConfig {
  pub threshold: f32,
  pub ratio: f32,
  /// Seconds.
  pub release_time: f32,
  pub makeup_gain: f32,
}

impl Default for CompressorConfig {
  fn default() -> Self { Self { threshold: 0.01, ratio: 30.0, release_time: 0.5, makeup_gain: 100.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiodeConfig {
  pub drop: f32,
  pub vt: f32,
  pub gain: f32,
  /// 0 = ideal half-wave, 1 = full diode curve.
  pub blend: f32,
}

impl Default for DiodeConfig {
  fn default() -> Self { Self { drop: 0.55, vt: 0.16, gain: 0.03, blend: 0.1 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoiseConfig {
  pub enabled: bool,
  pub level: f32,
}

impl Default for NoiseConfig {
  fn default() -> Self { Self { enabled: true, level: 0.02 } }
}

/// Full AM simulation configuration. Always replaced as a whole value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmConfig {
  pub carrier: CarrierConfig,
  pub lpf: LpfConfig,
  pub detector: DetectorConfig,
  pub compressor: CompressorConfig,
  pub diode: DiodeConfig,
  pub noise: NoiseConfig,
}

impl AmConfig {
  pub fn from_json_str(s: &str) -> EngineResult<Self> {
    Ok(serde_json::from_str(s)?)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  pub fn to_json_pretty(&self) -> EngineResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn stage_count_rounds_and_floors() {
    let mut lpf = LpfConfig::default();
    lpf.stages = 4.4;
    assert_eq!(lpf.stage_count(), 4);
    lpf.stages = 4.6;
    assert_eq!(lpf.stage_count(), 5);
    lpf.stages = 0.2;
    assert_eq!(lpf.stage_count(), 1);
    lpf.stages = -3.0;
    assert_eq!(lpf.stage_count(), 1);
    lpf.stages = f32::NAN;
    assert_eq!(lpf.stage_count(), 1);
    lpf.stages = 1e9;
    assert_eq!(lpf.stage_count(), MAX_FILTER_STAGES);
  }

  #[test]
  fn parses_camel_case_message_shape() {
    let json = r#"{
      "carrier": { "freqRatio": 0.25, "modulationIndex": 0.8 },
      "lpf": { "cutoff": 3000, "q": 0.5, "stages": 8 },
      "detector": { "attackTime": 1.0, "releaseTime": 6.0 },
      "compressor": { "threshold": 0.05, "ratio": 4, "releaseTime": 0.2, "makeupGain": 2 },
      "diode": { "drop": 0.3, "vt": 0.1, "gain": 0.5, "blend": 0.0 },
      "noise": { "enabled": false, "level": 0.0 }
    }"#;
    let cfg = AmConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.carrier, CarrierConfig { freq_ratio: 0.25, modulation_index: 0.8 });
    assert_eq!(cfg.lpf.stage_count(), 8);
    assert_eq!(cfg.compressor.makeup_gain, 2.0);
    assert!(!cfg.noise.enabled);
  }

  #[test]
  fn missing_sections_fall_back_to_defaults() {
    let cfg = AmConfig::from_json_str(r#"{ "noise": { "enabled": false } }"#).unwrap();
    assert_eq!(cfg.carrier, CarrierConfig::default());
    assert_eq!(cfg.noise, NoiseConfig { enabled: false, level: 0.02 });
  }

  #[test]
  fn json_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("am.json");
    let mut cfg = AmConfig::default();
    cfg.lpf.cutoff = 2500.0;
    std::fs::write(&path, cfg.to_json_pretty().unwrap()).unwrap();
    assert_eq!(AmConfig::from_json_file(&path).unwrap(), cfg);
  }

  #[test]
  fn bad_json_is_a_config_error() {
    let err = AmConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, crate::error::EngineError::Config(_)));
  }
}
