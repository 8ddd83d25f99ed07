//! Test doubles shared by the unit tests.

use crate::{
  classifier::NodeProbe,
  identity::{DeviceIdentity, SystemProperties},
  input::{option, DeviceId, InputError, InputOptions, InputSubsystem},
  registry::RegistrationKey,
};
use async_trait::async_trait;
use std::{
  collections::{BTreeMap, BTreeSet, VecDeque},
  io,
  path::{Path, PathBuf},
  pin::Pin,
  task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Default, Clone)]
pub struct MapProperties(BTreeMap<String, String>);

impl MapProperties {
  pub fn with(mut self, name: &str, value: &str) -> Self {
    self.0.insert(name.into(), value.into());
    self
  }
}

impl SystemProperties for MapProperties {
  fn exists(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }

  fn get_string(&self, name: &str) -> Option<String> {
    self.0.get(name).cloned()
  }
}

/// Device nodes somebody else holds open exclusively.
#[derive(Debug, Default, Clone)]
pub struct HeldNodes(BTreeSet<PathBuf>);

impl HeldNodes {
  pub fn new(paths: &[&str]) -> Self {
    Self(paths.iter().map(PathBuf::from).collect())
  }
}

impl NodeProbe for HeldNodes {
  fn is_free(&self, path: &Path) -> bool {
    !self.0.contains(path)
  }
}

#[derive(Debug, Default)]
pub struct RecordingInput {
  pub added: Vec<(InputOptions, DeviceIdentity)>,
  pub removed: Vec<(String, RegistrationKey)>,
  /// Keys reported as duplicates by `is_duplicate`
  pub known: BTreeSet<RegistrationKey>,
  pub reject: bool,
  pub attempts: usize,
}

impl RecordingInput {
  pub fn added_keys(&self) -> Vec<&str> {
    self
      .added
      .iter()
      .filter_map(|(options, _)| options.get(option::CONFIG_INFO))
      .collect()
  }
}

#[async_trait]
impl InputSubsystem for RecordingInput {
  async fn new_device(
    &mut self,
    options: &InputOptions,
    identity: &DeviceIdentity,
  ) -> Result<DeviceId, InputError> {
    self.attempts += 1;
    if self.reject {
      return Err(InputError::Rejected {
        key: options.get(option::CONFIG_INFO).unwrap_or_default().into(),
        reason: "no driver".into(),
      });
    }

    self.added.push((options.clone(), identity.clone()));
    Ok(DeviceId(self.added.len() as u32))
  }

  async fn remove_devices(&mut self, source: &str, key: &RegistrationKey) -> Result<(), InputError> {
    self.removed.push((source.into(), key.clone()));
    Ok(())
  }

  fn is_duplicate(&self, key: &RegistrationKey) -> bool {
    self.known.contains(key)
  }
}

/// Serves reads from a fixed script of chunks and errors.
#[derive(Debug, Default)]
pub struct ChunkedReader {
  script: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
}

impl ChunkedReader {
  pub fn new<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Self {
    Self {
      script: chunks.into_iter().map(|c| Ok(c.to_vec())).collect(),
    }
  }

  pub fn then_chunk(mut self, chunk: &[u8]) -> Self {
    self.script.push_back(Ok(chunk.to_vec()));
    self
  }

  pub fn then_error(mut self, kind: io::ErrorKind) -> Self {
    self.script.push_back(Err(kind));
    self
  }
}

impl AsyncRead for ChunkedReader {
  fn poll_read(
    self: Pin<&mut Self>,
    _cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
  ) -> Poll<io::Result<()>> {
    let this = self.get_mut();
    match this.script.pop_front() {
      None => Poll::Ready(Ok(())),
      Some(Err(kind)) => Poll::Ready(Err(io::Error::from(kind))),
      Some(Ok(mut chunk)) => {
        let n = buf.remaining().min(chunk.len());
        buf.put_slice(&chunk[..n]);
        if n < chunk.len() {
          this.script.push_front(Ok(chunk.split_off(n)));
        }
        Poll::Ready(Ok(()))
      }
    }
  }
}

/// Collects writes until `broken` is set, then fails them with `BrokenPipe`.
#[derive(Debug, Default)]
pub struct FlakyWriter {
  pub written: Vec<u8>,
  pub broken: bool,
}

impl FlakyWriter {
  fn check(&self) -> io::Result<()> {
    if self.broken {
      Err(io::ErrorKind::BrokenPipe.into())
    } else {
      Ok(())
    }
  }
}

impl AsyncWrite for FlakyWriter {
  fn poll_write(
    self: Pin<&mut Self>,
    _cx: &mut Context<'_>,
    buf: &[u8],
  ) -> Poll<io::Result<usize>> {
    let this = self.get_mut();
    Poll::Ready(this.check().map(|()| {
      this.written.extend_from_slice(buf);
      buf.len()
    }))
  }

  fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(self.check())
  }

  fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(Ok(()))
  }
}
