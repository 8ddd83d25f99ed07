mod line_reader;
mod record;

use std::{io, path::Path};
use tokio::net::UnixStream;
use tracing::{event, Level};

pub use line_reader::{LineError, LineReader};
pub use record::{EventKind, RawEvent};

/// Default location of the devd(8) stream socket.
pub const DEFAULT_SOCKET: &str = "/var/run/devd.pipe";

pub struct Devd;

impl Devd {
  pub async fn connect(socket: impl AsRef<Path>) -> io::Result<UnixStream> {
    let socket = socket.as_ref();
    let stream = UnixStream::connect(socket).await?;
    event!(target: "devd-hotplug", Level::DEBUG, devd.socket = %socket.display(), "connected to devd");

    Ok(stream)
  }
}
