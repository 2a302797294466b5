/// xorshift32 white noise in [-1, 1]. Seeded once with 1 and never reseeded.
#[derive(Clone, Copy, Debug)]
pub struct WhiteNoise {
  state: u32,
}

impl Default for WhiteNoise {
  fn default() -> Self { Self { state: 1 } }
}

impl WhiteNoise {
  pub fn new() -> Self { Self::default() }

  #[inline]
  pub fn next_u32(&mut self) -> u32 {
    let mut x = self.state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    self.state = x;
    x
  }

  #[inline]
  pub fn sample(&mut self) -> f32 {
    let x = self.next_u32();
    ((x as f64 / u32::MAX as f64) * 2.0 - 1.0) as f32
  }
}
