use std::{collections::TryReserveError, io};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{event, Level};

const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum LineError {
  #[error("Connection closed by peer")]
  Closed,

  #[error("Failed to grow line buffer beyond {capacity} bytes")]
  OutOfMemory {
    capacity: usize,
    #[source]
    source: TryReserveError,
  },

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Splits a byte stream into newline terminated records.
///
/// devd only guarantees line framing, so the stream is consumed one byte at a
/// time and nothing past the current newline is ever read. A partially read
/// line stays in the reader between calls, which makes [`LineReader::next_line`]
/// cancel safe: dropping its future loses no bytes.
#[derive(Debug)]
pub struct LineReader<R> {
  inner: R,
  buf: Vec<u8>,
}

impl<R> LineReader<R>
where
  R: AsyncRead + Unpin,
{
  pub fn new(inner: R) -> Self {
    Self {
      inner,
      buf: Vec::with_capacity(INITIAL_CAPACITY),
    }
  }

  /// Returns the next line without its terminating newline.
  pub async fn next_line(&mut self) -> Result<Vec<u8>, LineError> {
    let mut byte = [0u8; 1];
    loop {
      let read = match self.inner.read(&mut byte).await {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) => {
          self.buf.clear();
          return Err(e.into());
        }
      };

      if read == 0 {
        if !self.buf.is_empty() {
          event!(target: "devd-hotplug", Level::DEBUG, line.len = self.buf.len(), "discarding unterminated line at end of stream");
          self.buf.clear();
        }

        return Err(LineError::Closed);
      }

      if byte[0] == b'\n' {
        let line = self.buf.as_slice().to_vec();
        self.buf.clear();
        self.buf.shrink_to(INITIAL_CAPACITY);
        return Ok(line);
      }

      if self.buf.len() == self.buf.capacity() {
        let capacity = self.buf.capacity().max(INITIAL_CAPACITY);
        if let Err(source) = self.buf.try_reserve_exact(capacity) {
          self.buf.clear();
          return Err(LineError::OutOfMemory { capacity, source });
        }
      }

      self.buf.push(byte[0]);
    }
  }

  #[cfg(test)]
  fn capacity(&self) -> usize {
    self.buf.capacity()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::ChunkedReader;
  use std::time::Duration;
  use tokio::io::AsyncWriteExt;

  async fn collect<R: AsyncRead + Unpin>(reader: &mut LineReader<R>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = reader.next_line().await {
      lines.push(String::from_utf8(line).unwrap());
    }
    lines
  }

  #[tokio::test]
  async fn single_record() {
    let mut reader = LineReader::new(&b"+ums0 extra\n"[..]);
    assert_eq!(reader.next_line().await.unwrap(), b"+ums0 extra".to_vec());
    assert!(matches!(reader.next_line().await, Err(LineError::Closed)));
  }

  #[tokio::test]
  async fn records_are_not_merged_across_chunks() {
    let chunks: &[&[u8]] = &[b"+um", b"s0 ex", b"tra\n-", b"ums0", b"\n"];
    let mut reader = LineReader::new(ChunkedReader::new(chunks.iter().copied()));
    assert_eq!(collect(&mut reader).await, vec!["+ums0 extra", "-ums0"]);

    let mut reader = LineReader::new(ChunkedReader::new(vec![&b"+ums0 extra\n-ums0\n"[..]]));
    assert_eq!(collect(&mut reader).await, vec!["+ums0 extra", "-ums0"]);
  }

  #[tokio::test]
  async fn empty_lines_are_records() {
    let mut reader = LineReader::new(&b"\n+psm0\n\n"[..]);
    assert_eq!(collect(&mut reader).await, vec!["", "+psm0", ""]);
  }

  #[tokio::test]
  async fn interrupted_reads_are_retried() {
    let mut reader = LineReader::new(
      ChunkedReader::new(vec![&b"+uk"[..]])
        .then_error(io::ErrorKind::Interrupted)
        .then_chunk(b"bd0\n"),
    );

    assert_eq!(reader.next_line().await.unwrap(), b"+ukbd0".to_vec());
  }

  #[tokio::test]
  async fn read_errors_end_the_call() {
    let mut reader = LineReader::new(
      ChunkedReader::new(vec![&b"+ums"[..]]).then_error(io::ErrorKind::ConnectionReset),
    );

    match reader.next_line().await {
      Err(LineError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn unterminated_line_is_dropped_at_eof() {
    let mut reader = LineReader::new(&b"+ums0\n-ums"[..]);
    assert_eq!(reader.next_line().await.unwrap(), b"+ums0".to_vec());
    assert!(matches!(reader.next_line().await, Err(LineError::Closed)));
  }

  #[tokio::test]
  async fn buffer_grows_for_long_lines_and_shrinks_back() {
    let mut input = vec![b'x'; 3000];
    input.extend_from_slice(b"\n+ums0\n");
    let mut reader = LineReader::new(&input[..]);

    let line = reader.next_line().await.unwrap();
    assert_eq!(line.len(), 3000);
    assert!(line.iter().all(|&b| b == b'x'));
    assert!(reader.capacity() >= INITIAL_CAPACITY);
    assert!(reader.capacity() < 2 * INITIAL_CAPACITY);

    assert_eq!(reader.next_line().await.unwrap(), b"+ums0".to_vec());
  }

  #[tokio::test]
  async fn dropped_read_keeps_partial_line() {
    let (mut client, server) = tokio::io::duplex(64);
    let mut reader = LineReader::new(server);

    client.write_all(b"+ums").await.unwrap();
    let pending = tokio::time::timeout(Duration::from_millis(20), reader.next_line()).await;
    assert!(pending.is_err());

    client.write_all(b"0 on uhub0\n").await.unwrap();
    assert_eq!(reader.next_line().await.unwrap(), b"+ums0 on uhub0".to_vec());
  }
}
