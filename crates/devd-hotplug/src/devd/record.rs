use std::fmt;

const ADD: u8 = b'+';
const REMOVE: u8 = b'-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
  Add,
  Remove,
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EventKind::Add => f.write_str("add"),
      EventKind::Remove => f.write_str("remove"),
    }
  }
}

/// A device attach/detach record from devd.
///
/// devd also emits notify (`!`) and nomatch (`?`) records, those have no
/// `RawEvent` representation and are dropped by [`RawEvent::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
  pub kind: EventKind,
  pub device_name: String,
}

impl RawEvent {
  pub fn parse(line: &[u8]) -> Option<RawEvent> {
    let (&tag, rest) = line.split_first()?;
    let kind = match tag {
      ADD => EventKind::Add,
      REMOVE => EventKind::Remove,
      _ => return None,
    };

    let name = match rest.iter().position(|&b| b == b' ') {
      Some(end) => &rest[..end],
      None => rest,
    };

    Some(RawEvent {
      kind,
      device_name: String::from_utf8_lossy(name).into_owned(),
    })
  }
}
