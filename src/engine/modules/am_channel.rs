use std::f32::consts::TAU;

use crate::engine::dsp::{biquad::FilterStage, noise::WhiteNoise};
use crate::engine::params::{AmConfig, MAX_FILTER_STAGES};

/// Lowest carrier frequency ratio used when deriving the phase step.
const MIN_FREQ_RATIO: f32 = 1e-6;

/// Result of one simulated sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelSample {
  /// Clamped receiver output.
  pub output: f32,
  /// Noisy modulated carrier ahead of the detector; only used for spectrum capture.
  pub modulated: f32,
}

/// One audio channel's transmit/receive chain:
/// modulate -> noise -> diode -> envelope -> demodulate -> compress -> low-pass cascade -> clamp.
#[derive(Clone)]
pub struct ChannelProcessor {
  sr: f32,
  cfg: AmConfig,
  // carrier
  phase: f32,
  phase_step: f32,
  // detector
  env: f32,
  attack_coeff: f32,
  release_coeff: f32,
  // compressor
  comp_env: f32,
  comp_release_coeff: f32,
  noise: WhiteNoise,
  lpf: Vec<FilterStage>,
}

impl ChannelProcessor {
  pub fn new(sr: f32, cfg: &AmConfig) -> Self {
    let mut ch = Self {
      sr,
      cfg: *cfg,
      phase: 0.0,
      phase_step: 0.0,
      env: 0.0,
      attack_coeff: 0.0,
      release_coeff: 0.0,
      comp_env: 0.0,
      comp_release_coeff: 0.0,
      noise: WhiteNoise::new(),
      lpf: Vec::with_capacity(MAX_FILTER_STAGES),
    };
    ch.recompute();
    ch
  }

  /// Replaces the config snapshot. Phase, envelopes and existing filter history carry over.
  pub fn update_config(&mut self, cfg: &AmConfig) {
    self.cfg = *cfg;
    self.recompute();
  }

  fn recompute(&mut self) {
    let sr = self.sr;
    let freq_ratio = self.cfg.carrier.freq_ratio.max(MIN_FREQ_RATIO);
    let carrier_hz = sr * freq_ratio;
    // cos() is 2pi-periodic; fold the step below TAU
    self.phase_step = (TAU * carrier_hz / sr).rem_euclid(TAU);

    let period = 1.0 / carrier_hz;
    self.attack_coeff = (-1.0 / (sr * period * self.cfg.detector.attack_time)).exp();
    self.release_coeff = (-1.0 / (sr * period * self.cfg.detector.release_time)).exp();
    self.comp_release_coeff = (-1.0 / (sr * self.cfg.compressor.release_time)).exp();

    let stages = self.cfg.lpf.stage_count();
    // capacity is reserved up front, so this never reallocates
    self.lpf.resize_with(stages, FilterStage::new);
    for stage in self.lpf.iter_mut() {
      stage.update_coefficients(sr, self.cfg.lpf.cutoff, self.cfg.lpf.q);
    }
  }

  #[inline]
  pub fn process_sample(&mut self, x: f32) -> ChannelSample {
    let modulated = self.modulate(x);
    let noisy = if self.cfg.noise.enabled { modulated + self.noise.sample() * self.cfg.noise.level } else { modulated };

    let rectified = self.rectify(noisy);
    self.follow_envelope(rectified);

    let demodulated = finite_or_zero((self.env - 1.0) / self.cfg.carrier.modulation_index);
    let compressed = self.compress(demodulated);
    let filtered = self.lpf.iter_mut().fold(compressed, |s, stage| stage.process(s));
    if !filtered.is_finite() {
      // non-finite history never decays
      self.lpf.iter_mut().for_each(FilterStage::reset);
    }

    ChannelSample { output: clamp_output(filtered), modulated: noisy }
  }

  #[inline]
  fn modulate(&mut self, x: f32) -> f32 {
    let carrier = self.phase.cos();
    let y = (1.0 + self.cfg.carrier.modulation_index * x) * carrier;
    self.phase += self.phase_step;
    // step < TAU, so this repeats only when the sum rounds up to 2*TAU
    while self.phase >= TAU {
      self.phase -= TAU;
    }
    y
  }

  #[inline]
  fn rectify(&self, x: f32) -> f32 {
    let d = &self.cfg.diode;
    let half_wave = x.max(0.0);
    let v = x - d.drop;
    let diode = if v > 0.0 { (v / d.vt).exp_m1() * d.gain } else { 0.0 };
    half_wave * (1.0 - d.blend) + diode * d.blend
  }

  #[inline]
  fn follow_envelope(&mut self, x: f32) {
    let a = if x > self.env { self.attack_coeff } else { self.release_coeff };
    self.env = finite_or_zero(a * self.env + (1.0 - a) * x);
  }

  #[inline]
  fn compress(&mut self, x: f32) -> f32 {
    let c = &self.cfg.compressor;
    let level = x.abs();
    if level > self.comp_env {
      self.comp_env = level;
    } else {
      self.comp_env = self.comp_release_coeff * self.comp_env + (1.0 - self.comp_release_coeff) * level;
    }
    self.comp_env = finite_or_zero(self.comp_env);

    let mut gain = 1.0;
    if self.comp_env > c.threshold {
      let excess_db = 20.0 * (self.comp_env / c.threshold).log10();
      let target = c.threshold * 10.0f32.powf(excess_db / c.ratio / 20.0);
      gain = target / self.comp_env;
    }
    x * gain * c.makeup_gain
  }

  pub fn phase(&self) -> f32 { self.phase }

  pub fn envelope(&self) -> f32 { self.env }

  pub fn compressor_envelope(&self) -> f32 { self.comp_env }

  pub fn stages(&self) -> &[FilterStage] { &self.lpf }
}

#[inline]
fn finite_or_zero(x: f32) -> f32 {
  if x.is_finite() { x } else { 0.0 }
}

/// Non-finite values map to the nearest bound; NaN has none and becomes silence.
#[inline]
pub fn clamp_output(x: f32) -> f32 {
  if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) }
}
