use super::SystemProperties;

/// System properties read through `sysctlbyname(3)`.
///
/// Only the BSDs expose device descriptions this way, elsewhere every lookup
/// comes back empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sysctl;

impl SystemProperties for Sysctl {
  fn exists(&self, name: &str) -> bool {
    imp::value_len(name).map_or(false, |len| len > 0)
  }

  fn get_string(&self, name: &str) -> Option<String> {
    imp::value(name).map(|mut value| {
      while value.last() == Some(&0) {
        value.pop();
      }
      String::from_utf8_lossy(&value).into_owned()
    })
  }
}

#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
mod imp {
  use std::{ffi::CString, ptr};

  fn query(name: &CString, buf: Option<&mut Vec<u8>>) -> Option<usize> {
    let (oldp, mut len) = match buf {
      Some(buf) => (buf.as_mut_ptr() as *mut libc::c_void, buf.len()),
      None => (ptr::null_mut(), 0),
    };

    // SAFETY: `oldp` is either null, which only asks for the value size, or
    // points to a buffer valid for `len` bytes.
    let ret = unsafe { libc::sysctlbyname(name.as_ptr(), oldp, &mut len, ptr::null(), 0) };
    if ret == 0 {
      Some(len)
    } else {
      None
    }
  }

  pub(super) fn value_len(name: &str) -> Option<usize> {
    query(&CString::new(name).ok()?, None)
  }

  pub(super) fn value(name: &str) -> Option<Vec<u8>> {
    let name = CString::new(name).ok()?;
    let len = query(&name, None)?;
    let mut buf = vec![0u8; len];
    let len = query(&name, Some(&mut buf))?;
    buf.truncate(len);
    Some(buf)
  }
}

#[cfg(not(any(target_os = "freebsd", target_os = "dragonfly")))]
mod imp {
  pub(super) fn value_len(_name: &str) -> Option<usize> {
    None
  }

  pub(super) fn value(_name: &str) -> Option<Vec<u8>> {
    None
  }
}
