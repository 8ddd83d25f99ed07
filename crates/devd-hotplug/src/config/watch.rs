use super::{Config, ConfigError, ConfigFormat};
use async_stream::stream;
use futures::{
  stream::{LocalBoxStream, StreamExt},
  Stream,
};
use notify::{DebouncedEvent, RecursiveMode, Watcher as _};
use pin_project::pin_project;
use std::{
  path::{Path, PathBuf},
  pin::Pin,
  task::{Context, Poll},
  time::Duration,
};
use thiserror::Error;
use tokio::{io, sync::mpsc::UnboundedReceiver};
use tracing::{event, Level};

const DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigWatcherError {
  #[error(transparent)]
  Notify(#[from] notify::Error),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Bridges notify's blocking channel onto tokio.
#[pin_project]
struct DirWatcher {
  _watcher: notify::RecommendedWatcher,

  #[pin]
  receiver: UnboundedReceiver<DebouncedEvent>,
}

impl DirWatcher {
  fn new(dir: &Path) -> Result<Self, ConfigWatcherError> {
    let (std_sender, std_receiver) = std::sync::mpsc::channel();
    let (async_sender, async_receiver) = tokio::sync::mpsc::unbounded_channel();
    let mut watcher = notify::watcher(std_sender, DEBOUNCE)?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    std::thread::Builder::new()
      .name("config-watcher".into())
      .spawn(move || {
        for event in std_receiver {
          if async_sender.send(event).is_err() {
            break;
          }
        }
      })?;

    Ok(Self {
      _watcher: watcher,
      receiver: async_receiver,
    })
  }
}

impl Stream for DirWatcher {
  type Item = DebouncedEvent;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.project().receiver.get_mut().poll_recv(cx)
  }
}

/// True for events that leave new content at `file`.
fn touches(event: &DebouncedEvent, file: &Path) -> bool {
  match event {
    DebouncedEvent::Write(path) | DebouncedEvent::Create(path) => path == file,
    DebouncedEvent::Rename(_, to) => to == file,
    _ => false,
  }
}

/// Editors often replace the file instead of writing it in place, so the
/// parent directory is watched and events are filtered by path.
fn watched_paths(file: &Path) -> Result<(PathBuf, PathBuf), ConfigWatcherError> {
  let file = file.canonicalize()?;
  let dir = match file.parent() {
    Some(dir) => dir.to_owned(),
    None => file.clone(),
  };

  Ok((dir, file))
}

pub(super) fn watch(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<LocalBoxStream<'static, Result<Config, ConfigError>>, ConfigWatcherError> {
  let (dir, file) = watched_paths(file.as_ref())?;
  let mut watcher = DirWatcher::new(&dir)?;
  event!(target: "devd-hotplug", Level::DEBUG, config.file = %file.display(), "watching config file for changes");

  Ok(
    stream! {
      while let Some(change) = watcher.next().await {
        if touches(&change, &file) {
          event!(target: "devd-hotplug", Level::INFO, config.file = %file.display(), "config file changed");
          yield Config::read(&file, format).await;
        }
      }
    }
    .boxed_local(),
  )
}
