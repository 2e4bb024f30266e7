use std::fmt;

use serde::{Deserialize, Serialize};
use rustdds::GUID;

use crate::dds::InstanceHandle;

pub const GID_LENGTH: usize = 16;

/// ROS 2 equivalent of a DDS GUID
///
/// Used as the participant key of the discovery graph. Built-in topic samples
/// carry the participant key as a GUID, disposed samples only carry the
/// instance handle, so both convert into a `Gid`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gid([u8; GID_LENGTH]);

impl Gid {
  pub fn from_bytes(bytes: [u8; GID_LENGTH]) -> Gid {
    Gid(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; GID_LENGTH] {
    &self.0
  }
}

impl fmt::Debug for Gid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in self.0.iter() {
      write!(f, "{:02x}", b)?;
    }
    Ok(())
  }
}

impl fmt::Display for Gid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

impl From<GUID> for Gid {
  fn from(guid: GUID) -> Self {
    Gid(guid.to_bytes())
  }
}

impl From<Gid> for GUID {
  fn from(gid: Gid) -> GUID {
    GUID::from_bytes(gid.0)
  }
}

impl From<InstanceHandle> for Gid {
  fn from(handle: InstanceHandle) -> Self {
    Gid(*handle.as_bytes())
  }
}

#[test]
fn gid_from_disposed_handle_matches_participant_guid() {
  let guid = GUID::from_bytes([
    0x01, 0x0f, 0xaa, 0x42, 0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 1, 0xc1,
  ]);
  let from_guid = Gid::from(guid);
  let from_handle = Gid::from(InstanceHandle::from_guid(guid));
  assert_eq!(from_guid, from_handle);
  assert_eq!(GUID::from(from_guid), guid);
  assert_eq!(from_guid.to_string(), "010faa420000000100000007000001c1");
}
