use futures::{future::ready, Stream, StreamExt};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use std::{fmt, io};
use thiserror::Error;
use tracing::{event, Level};

/// Process signals the service reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
  /// Reload configuration and reconnect to devd
  Hangup,
  Terminate,
  Interrupt,
  Quit,
}

#[derive(Debug, Error)]
pub enum SignalWatchError {
  #[error("Failed to register signal handlers")]
  Io(#[from] io::Error),
}

impl Signal {
  const WATCHED: &'static [i32] = &[SIGHUP, SIGTERM, SIGINT, SIGQUIT];

  pub fn from_raw(signal: i32) -> Option<Self> {
    match signal {
      SIGHUP => Some(Self::Hangup),
      SIGTERM => Some(Self::Terminate),
      SIGINT => Some(Self::Interrupt),
      SIGQUIT => Some(Self::Quit),
      _ => None,
    }
  }

  pub fn is_reload(self) -> bool {
    self == Self::Hangup
  }

  pub fn watch() -> Result<impl Stream<Item = Signal>, SignalWatchError> {
    let signals = Signals::new(Self::WATCHED)?;
    event!(target: "devd-hotplug", Level::DEBUG, "listening for SIGHUP and termination signals");

    Ok(signals.filter_map(|raw| ready(Signal::from_raw(raw))))
  }
}

impl fmt::Display for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Hangup => "SIGHUP",
      Self::Terminate => "SIGTERM",
      Self::Interrupt => "SIGINT",
      Self::Quit => "SIGQUIT",
    })
  }
}
