//! The part of the DDS API that the rmw layer consumes.
//!
//! Entity creation and the wire protocol stay inside the vendor library.
//! What the discovery graph and the wait machinery need from it is collected
//! here: return codes, instance handles, durations, built-in topic samples
//! and the condition / wait set pair.
use std::{fmt, time};

use rustdds::GUID;

mod builtin;
mod condition;
mod participant;
mod wait_set;

pub use builtin::*;
pub use condition::{Condition, ConditionKind, GuardCondition, ReadCondition};
pub use participant::DomainParticipant;
pub use wait_set::WaitSet;

/// DDS `ReturnCode_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnCode {
  Ok,
  Error,
  Unsupported,
  BadParameter,
  PreconditionNotMet,
  OutOfResources,
  NotEnabled,
  ImmutablePolicy,
  InconsistentPolicy,
  AlreadyDeleted,
  Timeout,
  NoData,
  IllegalOperation,
}

impl fmt::Display for ReturnCode {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let s = match self {
      ReturnCode::Ok => "DDS_RETCODE_OK",
      ReturnCode::Error => "DDS_RETCODE_ERROR",
      ReturnCode::Unsupported => "DDS_RETCODE_UNSUPPORTED",
      ReturnCode::BadParameter => "DDS_RETCODE_BAD_PARAMETER",
      ReturnCode::PreconditionNotMet => "DDS_RETCODE_PRECONDITION_NOT_MET",
      ReturnCode::OutOfResources => "DDS_RETCODE_OUT_OF_RESOURCES",
      ReturnCode::NotEnabled => "DDS_RETCODE_NOT_ENABLED",
      ReturnCode::ImmutablePolicy => "DDS_RETCODE_IMMUTABLE_POLICY",
      ReturnCode::InconsistentPolicy => "DDS_RETCODE_INCONSISTENT_POLICY",
      ReturnCode::AlreadyDeleted => "DDS_RETCODE_ALREADY_DELETED",
      ReturnCode::Timeout => "DDS_RETCODE_TIMEOUT",
      ReturnCode::NoData => "DDS_RETCODE_NO_DATA",
      ReturnCode::IllegalOperation => "DDS_RETCODE_ILLEGAL_OPERATION",
    };
    f.write_str(s)
  }
}

/// Opaque per-instance key of a DDS sample.
///
/// For built-in topics the instance is the discovered entity, so the handle
/// carries the 16 GUID bytes of that entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle([u8; 16]);

impl InstanceHandle {
  pub const NIL: InstanceHandle = InstanceHandle([0; 16]);

  pub fn from_bytes(bytes: [u8; 16]) -> InstanceHandle {
    InstanceHandle(bytes)
  }

  pub fn from_guid(guid: GUID) -> InstanceHandle {
    InstanceHandle(guid.to_bytes())
  }

  pub fn as_bytes(&self) -> &[u8; 16] {
    &self.0
  }

  pub fn is_nil(&self) -> bool {
    *self == Self::NIL
  }
}

impl fmt::Debug for InstanceHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "InstanceHandle(")?;
    for b in self.0.iter() {
      write!(f, "{:02x}", b)?;
    }
    write!(f, ")")
  }
}

/// DDS `Duration_t`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration {
  pub sec: i32,
  pub nanosec: u32,
}

impl Duration {
  pub const INFINITE: Duration = Duration {
    sec: 0x7fff_ffff,
    nanosec: 0x7fff_ffff,
  };
  pub const ZERO: Duration = Duration { sec: 0, nanosec: 0 };

  pub fn is_infinite(&self) -> bool {
    *self == Self::INFINITE
  }

  /// `None` means wait forever. Negative durations clamp to zero.
  pub fn to_std(&self) -> Option<time::Duration> {
    if self.is_infinite() {
      None
    } else if self.sec < 0 {
      Some(time::Duration::ZERO)
    } else {
      Some(time::Duration::new(self.sec as u64, self.nanosec))
    }
  }
}

impl From<time::Duration> for Duration {
  fn from(d: time::Duration) -> Duration {
    Duration {
      sec: d.as_secs().min(i32::MAX as u64) as i32,
      nanosec: d.subsec_nanos(),
    }
  }
}
