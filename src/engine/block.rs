/// Planar multi-channel sample buffer, reused across callbacks.
///
/// Storage only grows; reshaping to a smaller or equal size never reallocates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AudioBlock {
  data: Vec<f32>,
  channels: usize,
  frames: usize,
}

impl AudioBlock {
  pub fn new(channels: usize, frames: usize) -> Self {
    Self { data: vec![0.0; channels * frames], channels, frames }
  }

  pub fn from_channels(chans: &[Vec<f32>]) -> Self {
    let frames = chans.first().map_or(0, |c| c.len());
    let mut block = Self::new(chans.len(), frames);
    for (ch, src) in chans.iter().enumerate() {
      let n = src.len().min(frames);
      block.channel_mut(ch)[..n].copy_from_slice(&src[..n]);
    }
    block
  }

  pub fn channels(&self) -> usize { self.channels }

  pub fn frames(&self) -> usize { self.frames }

  /// Changes the shape. Existing contents become unspecified.
  pub fn reshape(&mut self, channels: usize, frames: usize) {
    let len = channels * frames;
    if self.data.len() < len {
      self.data.resize(len, 0.0);
    }
    self.channels = channels;
    self.frames = frames;
  }

  #[inline]
  pub fn channel(&self, ch: usize) -> &[f32] {
    let start = ch * self.frames;
    &self.data[start..start + self.frames]
  }

  #[inline]
  pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
    let start = ch * self.frames;
    &mut self.data[start..start + self.frames]
  }

  /// Loads `frames` interleaved frames of `channels` channels.
  pub fn read_interleaved(&mut self, interleaved: &[f32], channels: usize) {
    let channels = channels.max(1);
    let frames = interleaved.len() / channels;
    self.reshape(channels, frames);
    for (i, frame) in interleaved.chunks_exact(channels).enumerate() {
      for (ch, &x) in frame.iter().enumerate() {
        self.data[ch * frames + i] = x;
      }
    }
  }

  /// Writes into an interleaved buffer with `out_channels` channels. Output channels beyond this
  /// block's channel count repeat the last channel; missing frames are left untouched.
  pub fn write_interleaved(&self, out: &mut [f32], out_channels: usize) {
    if self.channels == 0 {
      return;
    }
    let out_channels = out_channels.max(1);
    for (i, frame) in out.chunks_exact_mut(out_channels).take(self.frames).enumerate() {
      for (ch, y) in frame.iter_mut().enumerate() {
        let src = ch.min(self.channels - 1);
        *y = self.data[src * self.frames + i];
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn interleave_round_trip_stereo() {
    let mut b = AudioBlock::default();
    b.read_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2);
    assert_eq!(b.channels(), 2);
    assert_eq!(b.frames(), 3);
    assert_eq!(b.channel(0), &[1.0, 2.0, 3.0]);
    assert_eq!(b.channel(1), &[-1.0, -2.0, -3.0]);
    let mut out = vec![0.0; 6];
    b.write_interleaved(&mut out, 2);
    assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
  }

  #[test]
  fn mono_fans_out_to_stereo() {
    let b = AudioBlock::from_channels(&[vec![0.1, 0.2]]);
    let mut out = vec![0.0; 4];
    b.write_interleaved(&mut out, 2);
    assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
  }

  #[test]
  fn shrinking_reshape_keeps_storage() {
    let mut b = AudioBlock::new(2, 128);
    let cap = b.data.capacity();
    b.reshape(1, 64);
    assert_eq!(b.channel(0).len(), 64);
    assert_eq!(b.data.capacity(), cap);
  }
}
