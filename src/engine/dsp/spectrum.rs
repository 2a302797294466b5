//! Windowed radix-2 FFT magnitude analysis over a fixed-size sample ring.

use std::f32::consts::PI;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;

/// Accepts powers of two in `[MIN_FFT_SIZE, MAX_FFT_SIZE]`; everything else is rejected, never rounded.
pub fn validate_fft_size(size: usize) -> EngineResult<usize> {
  if size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
    Ok(size)
  } else {
    Err(EngineError::InvalidFftSize { size, min: MIN_FFT_SIZE, max: MAX_FFT_SIZE })
  }
}

/// Most recent N samples, written at a cursor that wraps modulo N.
pub struct SpectrumRing {
  buf: Vec<f32>,
  pos: usize,
}

impl SpectrumRing {
  pub fn new(size: usize) -> Self { Self { buf: vec![0.0; size], pos: 0 } }

  #[inline]
  pub fn push(&mut self, x: f32) {
    self.buf[self.pos] = x;
    // size is a power of two
    self.pos = (self.pos + 1) & (self.buf.len() - 1);
  }

  /// Raw storage order, not oldest-to-newest.
  pub fn as_slice(&self) -> &[f32] { &self.buf }

  pub fn cursor(&self) -> usize { self.pos }
}

/// Hann-windowed in-place Cooley-Tukey FFT with tables built once per size.
pub struct SpectrumAnalyzer {
  size: usize,
  window: Vec<f32>,
  cos_table: Vec<f32>,
  sin_table: Vec<f32>,
  reverse: Vec<usize>,
  re: Vec<f32>,
  im: Vec<f32>,
  mags: Vec<f32>,
}

impl SpectrumAnalyzer {
  /// `size` must already be validated (see `validate_fft_size`).
  pub fn new(size: usize) -> Self {
    debug_assert!(size.is_power_of_two() && size >= 2);
    let half = size / 2;
    let denom = (size - 1) as f32;
    let window = (0..size).map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denom).cos())).collect();
    let cos_table = (0..half).map(|i| (2.0 * PI * i as f32 / size as f32).cos()).collect();
    let sin_table = (0..half).map(|i| (2.0 * PI * i as f32 / size as f32).sin()).collect();

    let mut reverse = vec![0usize; size];
    let mut limit = 1;
    let mut bit = size >> 1;
    while limit < size {
      for i in 0..limit {
        reverse[i + limit] = reverse[i] + bit;
      }
      limit <<= 1;
      bit >>= 1;
    }

    Self {
      size,
      window,
      cos_table,
      sin_table,
      reverse,
      re: vec![0.0; size],
      im: vec![0.0; size],
      mags: vec![0.0; half],
    }
  }

  pub fn size(&self) -> usize { self.size }

  pub fn bins(&self) -> usize { self.size / 2 }

  /// Returns `size / 2` magnitudes, each `|X[k]| / N`. Reuses internal buffers, no allocation.
  pub fn analyze(&mut self, input: &[f32]) -> &[f32] {
    let n = self.size;
    debug_assert_eq!(input.len(), n);
    for (i, (&x, &w)) in input.iter().zip(self.window.iter()).enumerate() {
      self.re[i] = x * w;
      self.im[i] = 0.0;
    }
    self.forward();
    let scale = 1.0 / n as f32;
    for (k, m) in self.mags.iter_mut().enumerate() {
      *m = (self.re[k] * self.re[k] + self.im[k] * self.im[k]).sqrt() * scale;
    }
    &self.mags
  }

  fn forward(&mut self) {
    let n = self.size;
    let (re, im) = (&mut self.re, &mut self.im);

    for i in 0..n {
      let j = self.reverse[i];
      if j > i {
        re.swap(i, j);
        im.swap(i, j);
      }
    }

    let mut span = 2;
    while span <= n {
      let half = span / 2;
      let step = n / span;
      for start in (0..n).step_by(span) {
        for j in 0..half {
          let k = j * step;
          let c = self.cos_table[k];
          let s = self.sin_table[k];
          let i1 = start + j;
          let i2 = i1 + half;
          let tr = c * re[i2] + s * im[i2];
          let ti = c * im[i2] - s * re[i2];
          re[i2] = re[i1] - tr;
          im[i2] = im[i1] - ti;
          re[i1] += tr;
          im[i1] += ti;
        }
      }
      span <<= 1;
    }
  }
}
