//! Fire-and-forget delivery of spectrum frames from the audio thread.

use std::ops::Deref;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Consumer of spectrum magnitudes.
pub trait SpectrumSink: Send {
  /// Called at a block boundary when capture (re)starts; may allocate.
  fn prepare(&mut self, _bins: usize) {}
  /// Called on the audio thread. Must not allocate or block.
  fn emit(&mut self, magnitudes: &[f32]);
}

/// Discards every frame.
pub struct NullSink;

impl SpectrumSink for NullSink {
  fn emit(&mut self, _magnitudes: &[f32]) {}
}

/// Pool-backed channel sink. Buffers circulate between the audio thread and the consumer, so
/// steady-state emission never touches the allocator. When the consumer falls behind, the oldest
/// queued frame is superseded by the new one.
pub struct SpectrumChannel {
  tx: Sender<Vec<f32>>,
  stale: Receiver<Vec<f32>>,
  free: Receiver<Vec<f32>>,
  recycle: Sender<Vec<f32>>,
  depth: usize,
  bins: usize,
}

/// Consumer side of `spectrum_channel`.
pub struct SpectrumReceiver {
  rx: Receiver<Vec<f32>>,
  recycle: Sender<Vec<f32>>,
}

/// One emitted spectrum. Returns its buffer to the pool when dropped.
pub struct SpectrumFrame {
  data: Vec<f32>,
  recycle: Sender<Vec<f32>>,
}

/// `depth` is the outbound queue length. The pool holds one more buffer than that, so a frame
/// held by the consumer never stalls emission.
pub fn spectrum_channel(depth: usize) -> (SpectrumChannel, SpectrumReceiver) {
  let depth = depth.max(1);
  let (tx, rx) = bounded(depth);
  let (recycle, free) = bounded(depth + 2);
  (
    SpectrumChannel { tx, stale: rx.clone(), free, recycle: recycle.clone(), depth, bins: 0 },
    SpectrumReceiver { rx, recycle },
  )
}

impl SpectrumSink for SpectrumChannel {
  fn prepare(&mut self, bins: usize) {
    if bins == self.bins {
      return;
    }
    self.bins = bins;
    // stale sizes are dropped here instead of on the audio thread
    while self.free.try_recv().is_ok() {}
    for _ in 0..=self.depth {
      let _ = self.recycle.try_send(vec![0.0; bins]);
    }
  }

  fn emit(&mut self, magnitudes: &[f32]) {
    // with every pooled buffer queued, reuse the oldest queued frame
    let mut buf = match self.free.try_recv().or_else(|_| self.stale.try_recv()) {
      Ok(b) => b,
      Err(_) => return,
    };
    if buf.len() != magnitudes.len() {
      // leftover from a previous size that was in flight during prepare
      if buf.capacity() < magnitudes.len() {
        return;
      }
      buf.resize(magnitudes.len(), 0.0);
    }
    buf.copy_from_slice(magnitudes);
    match self.tx.try_send(buf) {
      Ok(()) => {}
      Err(TrySendError::Full(b)) => {
        if let Ok(old) = self.stale.try_recv() {
          let _ = self.recycle.try_send(old);
        }
        if let Err(e) = self.tx.try_send(b) {
          let _ = self.recycle.try_send(e.into_inner());
        }
      }
      Err(TrySendError::Disconnected(b)) => {
        let _ = self.recycle.try_send(b);
      }
    }
  }
}

impl SpectrumReceiver {
  pub fn try_recv(&self) -> Option<SpectrumFrame> {
    self.rx.try_recv().ok().map(|data| self.frame(data))
  }

  /// Blocks until a frame arrives or every sender is gone.
  pub fn recv(&self) -> Option<SpectrumFrame> {
    self.rx.recv().ok().map(|data| self.frame(data))
  }

  /// Newest pending frame; older ones go straight back to the pool.
  pub fn latest(&self) -> Option<SpectrumFrame> {
    let mut last = None;
    while let Some(f) = self.try_recv() {
      last = Some(f);
    }
    last
  }

  fn frame(&self, data: Vec<f32>) -> SpectrumFrame { SpectrumFrame { data, recycle: self.recycle.clone() } }
}

impl SpectrumFrame {
  /// Index of the largest magnitude.
  pub fn peak_bin(&self) -> usize {
    let mut best = 0;
    for (i, &m) in self.data.iter().enumerate() {
      if m > self.data[best] {
        best = i;
      }
    }
    best
  }
}

impl Deref for SpectrumFrame {
  type Target = [f32];
  fn deref(&self) -> &[f32] { &self.data }
}

impl Drop for SpectrumFrame {
  fn drop(&mut self) {
    let data = std::mem::take(&mut self.data);
    let _ = self.recycle.try_send(data);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frames_are_delivered_and_recycled() {
    let (mut sink, rx) = spectrum_channel(2);
    sink.prepare(4);
    sink.emit(&[1.0, 2.0, 3.0, 0.5]);
    let frame = rx.try_recv().unwrap();
    assert_eq!(&*frame, &[1.0, 2.0, 3.0, 0.5]);
    assert_eq!(frame.peak_bin(), 2);
    drop(frame);
    // both pooled buffers are free again
    sink.emit(&[0.0; 4]);
    sink.emit(&[0.0; 4]);
    assert!(rx.try_recv().is_some());
    assert!(rx.try_recv().is_some());
  }

  #[test]
  fn slow_consumer_sees_newest_frame() {
    let (mut sink, rx) = spectrum_channel(1);
    sink.prepare(2);
    for i in 0..10 {
      sink.emit(&[i as f32, 0.0]);
    }
    let frame = rx.try_recv().unwrap();
    assert_eq!(frame[0], 9.0);
    assert!(rx.try_recv().is_none());
  }

  #[test]
  fn full_queue_keeps_the_most_recent_frames() {
    let (mut sink, rx) = spectrum_channel(2);
    sink.prepare(2);
    for i in 0..10 {
      sink.emit(&[i as f32, 0.0]);
    }
    let first = rx.try_recv().unwrap();
    assert_eq!(first[0], 8.0);
    drop(first);
    assert_eq!(rx.latest().unwrap()[0], 9.0);
  }

  #[test]
  fn held_frame_does_not_stall_emission() {
    let (mut sink, rx) = spectrum_channel(1);
    sink.prepare(2);
    sink.emit(&[1.0, 0.0]);
    let held = rx.try_recv().unwrap();
    for i in 2..6 {
      sink.emit(&[i as f32, 0.0]);
    }
    assert_eq!(held[0], 1.0);
    assert_eq!(rx.latest().unwrap()[0], 5.0);
  }

  #[test]
  fn emit_without_prepare_drops() {
    let (mut sink, rx) = spectrum_channel(2);
    sink.emit(&[1.0]);
    assert!(rx.try_recv().is_none());
  }

  #[test]
  fn resize_between_sessions() {
    let (mut sink, rx) = spectrum_channel(2);
    sink.prepare(4);
    sink.emit(&[1.0; 4]);
    let old = rx.try_recv().unwrap();
    sink.prepare(8);
    drop(old);
    sink.emit(&[2.0; 8]);
    let f = rx.latest().unwrap();
    assert_eq!(f.len(), 8);
  }
}
