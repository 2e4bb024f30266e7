//! Bridge from an rmw wait call to a DDS [`WaitSet`].
//!
//! The caller hands in lists of subscriptions, guard conditions, services and
//! clients. Their conditions are attached to the wait set for the duration of
//! one call, and on return every slot whose condition did not fire is
//! cleared to `None`.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::{
  dds::{self, Condition, GuardCondition, ReadCondition, ReturnCode, WaitSet},
  error::{check_attach_condition_error, RetCode, RmwError, RmwResult},
  implementation::{check_implementation, Implementation},
};

/// Implemented by subscription, service and client handles, so that
/// [`wait`] can reach the DDS read condition inside them.
pub trait HasReadCondition {
  fn read_condition(&self) -> Option<&ReadCondition>;
}

/// rmw timeout: seconds and nanoseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RmwTime {
  pub sec: u64,
  pub nsec: u64,
}

impl RmwTime {
  pub const ZERO: RmwTime = RmwTime { sec: 0, nsec: 0 };

  pub fn from_millis(millis: u64) -> RmwTime {
    RmwTime {
      sec: millis / 1000,
      nsec: (millis % 1000) * 1_000_000,
    }
  }

  fn to_dds(self) -> dds::Duration {
    dds::Duration {
      sec: self.sec.min(i32::MAX as u64) as i32,
      nanosec: self.nsec.min(u32::MAX as u64) as u32,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
  Ready,
  Timeout,
}

impl WaitResult {
  pub fn ret_code(&self) -> RetCode {
    match self {
      WaitResult::Ready => RetCode::Ok,
      WaitResult::Timeout => RetCode::Timeout,
    }
  }
}

struct ConnextWaitSetInfo {
  wait_set: WaitSet,
  active_conditions: Vec<Condition>,
}

/// Wait set handle handed out to rmw users.
pub struct RmwWaitSet {
  implementation: Implementation,
  info: ConnextWaitSetInfo,
}

impl RmwWaitSet {
  pub fn implementation(&self) -> Implementation {
    self.implementation
  }
}

/// `max_conditions == 0` means no limit.
pub fn create_wait_set(
  implementation: Implementation,
  max_conditions: usize,
) -> RmwResult<RmwWaitSet> {
  let wait_set = WaitSet::with_max_conditions(max_conditions)
    .map_err(|rc| RmwError::BadAlloc(format!("failed to create wait set: {rc}")))?;
  Ok(RmwWaitSet {
    implementation,
    info: ConnextWaitSetInfo {
      wait_set,
      active_conditions: Vec::with_capacity(max_conditions),
    },
  })
}

pub fn destroy_wait_set(implementation: Implementation, wait_set: RmwWaitSet) -> RmwResult<()> {
  check_implementation("wait set", wait_set.implementation, implementation)
}

// Detaches everything still attached when the wait call returns, on every path.
struct DetachOnDrop<'a> {
  wait_set: &'a mut WaitSet,
}

impl Drop for DetachOnDrop<'_> {
  fn drop(&mut self) {
    for condition in self.wait_set.get_conditions() {
      if let Err(rc) = self.wait_set.detach_condition(&condition) {
        error!("Failed to detach condition from wait set: {rc}");
      }
    }
  }
}

fn attach_entities<T: HasReadCondition>(
  wait_set: &mut WaitSet,
  entities: &[Option<&T>],
  what: &str,
) -> RmwResult<()> {
  for entity in entities {
    let entity = entity.ok_or_else(|| RmwError::error(format!("{what} handle is null")))?;
    let read_condition = entity
      .read_condition()
      .ok_or_else(|| RmwError::error(format!("{what} read condition handle is null")))?;
    check_attach_condition_error(wait_set.attach_condition(read_condition))?;
  }
  Ok(())
}

fn is_active(active_conditions: &[Condition], condition: &Condition) -> bool {
  active_conditions.iter().any(|c| c.same_as(condition))
}

fn clear_inactive<T: HasReadCondition>(
  active_conditions: &[Condition],
  entities: &mut [Option<&T>],
) {
  for slot in entities.iter_mut() {
    let fired = slot
      .and_then(|entity| entity.read_condition())
      .map_or(false, |rc| is_active(active_conditions, rc));
    if !fired {
      *slot = None;
    }
  }
}

/// Block until one of the given entities has work, or the timeout expires.
///
/// `wait_timeout == None` waits forever. On return exactly the slots whose
/// condition was triggered are still `Some`, and triggered guard conditions
/// have been reset.
pub fn wait<S, V, C>(
  implementation: Implementation,
  subscriptions: &mut [Option<&S>],
  guard_conditions: &mut [Option<&GuardCondition>],
  services: &mut [Option<&V>],
  clients: &mut [Option<&C>],
  wait_set: &mut RmwWaitSet,
  wait_timeout: Option<RmwTime>,
) -> RmwResult<WaitResult>
where
  S: HasReadCondition,
  V: HasReadCondition,
  C: HasReadCondition,
{
  check_implementation("wait set", wait_set.implementation, implementation)?;

  let ConnextWaitSetInfo {
    wait_set: dds_wait_set,
    active_conditions,
  } = &mut wait_set.info;
  let guard = DetachOnDrop {
    wait_set: dds_wait_set,
  };

  attach_entities(guard.wait_set, subscriptions, "subscriber info")?;
  for guard_condition in guard_conditions.iter() {
    let guard_condition =
      guard_condition.ok_or_else(|| RmwError::error("guard condition handle is null"))?;
    check_attach_condition_error(guard.wait_set.attach_condition(guard_condition))?;
  }
  attach_entities(guard.wait_set, services, "service info")?;
  attach_entities(guard.wait_set, clients, "client info")?;

  let timeout = wait_timeout.map_or(dds::Duration::INFINITE, RmwTime::to_dds);

  let result = match guard.wait_set.wait(active_conditions, timeout) {
    Ok(()) => WaitResult::Ready,
    Err(ReturnCode::Timeout) => {
      active_conditions.clear();
      WaitResult::Timeout
    }
    Err(rc) => {
      return Err(RmwError::error(format!("failed to wait on wait set: {rc}")));
    }
  };
  trace!("wait: {result:?} with {} active conditions", active_conditions.len());

  clear_inactive(active_conditions, subscriptions);
  for slot in guard_conditions.iter_mut() {
    match *slot {
      Some(guard_condition) if is_active(active_conditions, guard_condition) => {
        guard_condition
          .set_trigger_value(false)
          .map_err(|rc| RmwError::error(format!("failed to set trigger value: {rc}")))?;
      }
      _ => *slot = None,
    }
  }
  clear_inactive(active_conditions, services);
  clear_inactive(active_conditions, clients);

  Ok(result)
}
