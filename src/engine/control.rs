//! Latest-wins control mailbox between the control thread and the audio callback.
//!
//! The channel holds at most one pending message. Sending evicts whatever is still pending, so
//! the engine only ever sees the most recent request when it drains at the next block boundary.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::dsp::spectrum::validate_fft_size;
use super::messages::EngineMsg;
use super::params::AmConfig;
use crate::error::EngineResult;

pub fn mailbox() -> (ControlHandle, ControlInbox) {
  let (tx, rx) = bounded(1);
  (ControlHandle { tx, evict: rx.clone() }, ControlInbox { rx })
}

/// Sending side, owned by the control thread. Never blocks.
#[derive(Clone)]
pub struct ControlHandle {
  tx: Sender<EngineMsg>,
  evict: Receiver<EngineMsg>,
}

impl ControlHandle {
  pub fn send(&self, msg: EngineMsg) {
    let mut msg = msg;
    loop {
      match self.tx.try_send(msg) {
        Ok(()) => return,
        Err(TrySendError::Full(m)) => {
          // Drop the stale pending message and retry with ours.
          let _ = self.evict.try_recv();
          msg = m;
        }
        Err(TrySendError::Disconnected(_)) => {
          log::debug!("control message dropped: engine is gone");
          return;
        }
      }
    }
  }

  pub fn update_config(&self, config: AmConfig) { self.send(EngineMsg::UpdateConfig { config }); }

  /// Rejects sizes the engine would not accept; nothing is sent in that case.
  pub fn start_spectrum(&self, fft_size: usize) -> EngineResult<()> {
    validate_fft_size(fft_size)?;
    self.send(EngineMsg::StartSpectrum { fft_size });
    Ok(())
  }

  pub fn stop_spectrum(&self) { self.send(EngineMsg::StopSpectrum); }
}

/// Receiving side, owned by the engine on the audio thread.
pub struct ControlInbox {
  rx: Receiver<EngineMsg>,
}

impl ControlInbox {
  /// Non-blocking. Called once per block before any sample is processed.
  #[inline]
  pub fn take_latest(&self) -> Option<EngineMsg> {
    let mut latest = None;
    while let Ok(msg) = self.rx.try_recv() {
      latest = Some(msg);
    }
    latest
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn empty_mailbox_yields_nothing() {
    let (_handle, inbox) = mailbox();
    assert_eq!(inbox.take_latest(), None);
  }

  #[test]
  fn latest_message_wins() {
    let (handle, inbox) = mailbox();
    handle.start_spectrum(2048).unwrap();
    handle.stop_spectrum();
    let mut cfg = AmConfig::default();
    cfg.lpf.cutoff = 1234.0;
    handle.update_config(cfg);
    assert_eq!(inbox.take_latest(), Some(EngineMsg::UpdateConfig { config: cfg }));
    assert_eq!(inbox.take_latest(), None);
  }

  #[test]
  fn invalid_fft_size_is_not_sent() {
    let (handle, inbox) = mailbox();
    assert!(handle.start_spectrum(1000).is_err());
    assert!(handle.start_spectrum(0).is_err());
    assert_eq!(inbox.take_latest(), None);
  }

  #[test]
  fn sending_after_engine_drop_does_not_block() {
    let (handle, inbox) = mailbox();
    drop(inbox);
    // The handle's own eviction receiver keeps the channel open; repeated sends must still return.
    for _ in 0..4 {
      handle.stop_spectrum();
    }
  }

  #[test]
  fn cloned_handles_share_the_slot() {
    let (handle, inbox) = mailbox();
    let other = handle.clone();
    handle.stop_spectrum();
    other.start_spectrum(512).unwrap();
    assert_eq!(inbox.take_latest(), Some(EngineMsg::StartSpectrum { fft_size: 512 }));
  }
}
