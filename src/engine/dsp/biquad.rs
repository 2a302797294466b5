use std::f32::consts::PI;

/// One RBJ low-pass biquad section, Direct Form I.
///
/// `a0..a2` are the normalized feed-forward terms and `b1, b2` the normalized feedback terms.
/// Recomputing coefficients leaves the sample history untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterStage {
  x1: f32,
  x2: f32,
  y1: f32,
  y2: f32,
  a0: f32,
  a1: f32,
  a2: f32,
  b1: f32,
  b2: f32,
}

impl FilterStage {
  pub fn new() -> Self { Self::default() }

  /// No Nyquist guard: cutoff >= sr/2 gives finite but possibly unstable coefficients.
  pub fn update_coefficients(&mut self, sr: f32, cutoff: f32, q: f32) {
    let w0 = 2.0 * PI * cutoff / sr;
    let cosw = w0.cos();
    let alpha = w0.sin() / (2.0 * q);

    let b0 = (1.0 - cosw) * 0.5;
    let b1 = 1.0 - cosw;
    let b2 = (1.0 - cosw) * 0.5;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cosw;
    let a2 = 1.0 - alpha;

    self.a0 = b0 / a0;
    self.a1 = b1 / a0;
    self.a2 = b2 / a0;
    self.b1 = a1 / a0;
    self.b2 = a2 / a0;
  }

  #[inline]
  pub fn process(&mut self, x: f32) -> f32 {
    let y = self.a0 * x + self.a1 * self.x1 + self.a2 * self.x2 - self.b1 * self.y1 - self.b2 * self.y2;
    self.x2 = self.x1;
    self.x1 = x;
    self.y2 = self.y1;
    self.y1 = y;
    y
  }

  /// Clears the sample history, keeping coefficients.
  pub fn reset(&mut self) {
    self.x1 = 0.0;
    self.x2 = 0.0;
    self.y1 = 0.0;
    self.y2 = 0.0;
  }

  /// (x1, x2, y1, y2)
  pub fn history(&self) -> [f32; 4] { [self.x1, self.x2, self.y1, self.y2] }

  pub fn coefficients(&self) -> [f32; 5] { [self.a0, self.a1, self.a2, self.b1, self.b2] }
}
