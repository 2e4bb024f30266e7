use std::{
  fmt,
  ops::Deref,
  sync::{Arc, Mutex},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use mio::{Ready, SetReadiness};

use super::{wait_set::WaitSetId, ReturnCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionKind {
  Guard,
  Read,
}

struct ConditionState {
  trigger_value: bool,
  // One readiness handle for each WaitSet this condition is attached to.
  attachments: Vec<(WaitSetId, SetReadiness)>,
}

struct ConditionInner {
  kind: ConditionKind,
  state: Mutex<ConditionState>,
}

/// A DDS condition: a boolean trigger value that can be attached to
/// [`WaitSet`](super::WaitSet)s.
///
/// Cloning gives another handle to the same condition. Conditions compare
/// by identity.
#[derive(Clone)]
pub struct Condition {
  inner: Arc<ConditionInner>,
}

impl Condition {
  fn new(kind: ConditionKind) -> Condition {
    Condition {
      inner: Arc::new(ConditionInner {
        kind,
        state: Mutex::new(ConditionState {
          trigger_value: false,
          attachments: Vec::new(),
        }),
      }),
    }
  }

  pub fn kind(&self) -> ConditionKind {
    self.inner.kind
  }

  pub fn trigger_value(&self) -> bool {
    self.inner.state.lock().unwrap().trigger_value
  }

  pub fn same_as(&self, other: &Condition) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  fn set_trigger_value(&self, value: bool) -> Result<(), ReturnCode> {
    let mut state = self.inner.state.lock().unwrap();
    state.trigger_value = value;
    let readiness = if value {
      Ready::readable()
    } else {
      Ready::empty()
    };
    let mut result = Ok(());
    for (wait_set_id, set_readiness) in state.attachments.iter() {
      if let Err(e) = set_readiness.set_readiness(readiness) {
        error!("Cannot signal wait set {wait_set_id}: {e:?}");
        result = Err(ReturnCode::Error);
      }
    }
    result
  }

  pub(super) fn attach(&self, wait_set: WaitSetId, set_readiness: SetReadiness) {
    let mut state = self.inner.state.lock().unwrap();
    if state.trigger_value {
      if let Err(e) = set_readiness.set_readiness(Ready::readable()) {
        warn!("Cannot signal wait set {wait_set} on attach: {e:?}");
      }
    }
    state.attachments.push((wait_set, set_readiness));
  }

  pub(super) fn detach(&self, wait_set: WaitSetId) {
    self
      .inner
      .state
      .lock()
      .unwrap()
      .attachments
      .retain(|(id, _)| *id != wait_set);
  }

  #[cfg(test)]
  pub(super) fn attachment_count(&self) -> usize {
    self.inner.state.lock().unwrap().attachments.len()
  }
}

impl PartialEq for Condition {
  fn eq(&self, other: &Condition) -> bool {
    self.same_as(other)
  }
}

impl Eq for Condition {}

impl fmt::Debug for Condition {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Condition")
      .field("kind", &self.kind())
      .field("trigger_value", &self.trigger_value())
      .finish()
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// Condition whose trigger value is set by the application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardCondition {
  condition: Condition,
}

impl GuardCondition {
  pub fn new() -> GuardCondition {
    GuardCondition {
      condition: Condition::new(ConditionKind::Guard),
    }
  }

  pub fn set_trigger_value(&self, value: bool) -> Result<(), ReturnCode> {
    self.condition.set_trigger_value(value)
  }

  pub fn condition(&self) -> &Condition {
    &self.condition
  }
}

impl Default for GuardCondition {
  fn default() -> Self {
    GuardCondition::new()
  }
}

impl Deref for GuardCondition {
  type Target = Condition;
  fn deref(&self) -> &Condition {
    &self.condition
  }
}

/// Condition that a data reader raises while it has unread samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadCondition {
  condition: Condition,
}

impl ReadCondition {
  pub fn new() -> ReadCondition {
    ReadCondition {
      condition: Condition::new(ConditionKind::Read),
    }
  }

  /// Called by the reader side when samples arrive or are all taken.
  pub fn set_data_available(&self, available: bool) -> Result<(), ReturnCode> {
    self.condition.set_trigger_value(available)
  }

  pub fn condition(&self) -> &Condition {
    &self.condition
  }
}

impl Default for ReadCondition {
  fn default() -> Self {
    ReadCondition::new()
  }
}

impl Deref for ReadCondition {
  type Target = Condition;
  fn deref(&self) -> &Condition {
    &self.condition
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn identity_not_value() {
    let a = GuardCondition::new();
    let b = GuardCondition::new();
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
    assert!(a.condition().same_as(a.clone().condition()));
    assert_eq!(a.kind(), ConditionKind::Guard);
    assert_eq!(ReadCondition::new().kind(), ConditionKind::Read);
  }

  #[test]
  fn trigger_value_is_shared_by_clones() {
    let a = GuardCondition::new();
    let a2 = a.clone();
    assert!(!a2.trigger_value());
    a.set_trigger_value(true).unwrap();
    assert!(a2.trigger_value());
    a2.set_trigger_value(false).unwrap();
    assert!(!a.trigger_value());
  }
}
