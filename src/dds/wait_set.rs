use std::{
  io,
  sync::atomic::{AtomicU64, Ordering},
  time::Instant,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use mio::{Events, Poll, PollOpt, Ready, Registration, Token};

use super::{Condition, Duration, ReturnCode};

pub(crate) type WaitSetId = u64;

static NEXT_WAIT_SET_ID: AtomicU64 = AtomicU64::new(1);

const EVENTS_CAPACITY: usize = 16;

struct Attachment {
  condition: Condition,
  // Keeps the mio registration alive while the condition is attached.
  registration: Registration,
}

/// Blocks until at least one attached [`Condition`] is triggered.
///
/// Every attachment gets its own mio `Registration`, so one condition can be
/// attached to several wait sets at the same time.
pub struct WaitSet {
  id: WaitSetId,
  poll: Poll,
  events: Events,
  attachments: Vec<Attachment>,
  next_token: usize,
  max_conditions: usize,
}

impl WaitSet {
  pub fn new() -> Result<WaitSet, ReturnCode> {
    WaitSet::with_max_conditions(0)
  }

  /// `max_conditions == 0` means no limit.
  pub fn with_max_conditions(max_conditions: usize) -> Result<WaitSet, ReturnCode> {
    let poll = Poll::new().map_err(|e| {
      error!("Cannot create mio::Poll for WaitSet: {e:?}");
      ReturnCode::OutOfResources
    })?;
    Ok(WaitSet {
      id: NEXT_WAIT_SET_ID.fetch_add(1, Ordering::Relaxed),
      poll,
      events: Events::with_capacity(EVENTS_CAPACITY),
      attachments: Vec::new(),
      next_token: 0,
      max_conditions,
    })
  }

  /// Attaching a condition twice is a no-op.
  pub fn attach_condition(&mut self, condition: &Condition) -> Result<(), ReturnCode> {
    if self.is_attached(condition) {
      return Ok(());
    }
    if self.max_conditions > 0 && self.attachments.len() >= self.max_conditions {
      return Err(ReturnCode::OutOfResources);
    }

    let (registration, set_readiness) = Registration::new2();
    let token = Token(self.next_token);
    self.next_token = self.next_token.wrapping_add(1);
    self
      .poll
      .register(&registration, token, Ready::readable(), PollOpt::edge())
      .map_err(|e| {
        error!("Cannot register condition with wait set {}: {e:?}", self.id);
        ReturnCode::Error
      })?;

    condition.attach(self.id, set_readiness);
    self.attachments.push(Attachment {
      condition: condition.clone(),
      registration,
    });
    Ok(())
  }

  pub fn detach_condition(&mut self, condition: &Condition) -> Result<(), ReturnCode> {
    let pos = self
      .attachments
      .iter()
      .position(|a| a.condition.same_as(condition))
      .ok_or(ReturnCode::PreconditionNotMet)?;
    let attachment = self.attachments.remove(pos);
    attachment.condition.detach(self.id);
    self.poll.deregister(&attachment.registration).map_err(|e| {
      warn!("Cannot deregister condition from wait set {}: {e:?}", self.id);
      ReturnCode::Error
    })
  }

  pub fn is_attached(&self, condition: &Condition) -> bool {
    self
      .attachments
      .iter()
      .any(|a| a.condition.same_as(condition))
  }

  /// Currently attached conditions, in attach order.
  pub fn get_conditions(&self) -> Vec<Condition> {
    self
      .attachments
      .iter()
      .map(|a| a.condition.clone())
      .collect()
  }

  /// Wait until some attached condition is triggered, or `timeout` elapses.
  ///
  /// On success `active_conditions` holds exactly the attached conditions
  /// whose trigger value was true. On timeout it is left empty and
  /// `ReturnCode::Timeout` is returned.
  pub fn wait(
    &mut self,
    active_conditions: &mut Vec<Condition>,
    timeout: Duration,
  ) -> Result<(), ReturnCode> {
    let deadline = timeout.to_std().map(|t| Instant::now() + t);

    loop {
      active_conditions.clear();
      active_conditions.extend(
        self
          .attachments
          .iter()
          .filter(|a| a.condition.trigger_value())
          .map(|a| a.condition.clone()),
      );
      if !active_conditions.is_empty() {
        return Ok(());
      }

      let remaining = match deadline {
        None => None,
        Some(deadline) => {
          let now = Instant::now();
          if now >= deadline {
            return Err(ReturnCode::Timeout);
          }
          Some(deadline - now)
        }
      };

      match self.poll.poll(&mut self.events, remaining) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => {
          error!("WaitSet {} poll failed: {e:?}", self.id);
          return Err(ReturnCode::Error);
        }
      }
      trace!(
        "WaitSet {} woke up with {} events",
        self.id,
        self.events.iter().count()
      );
    }
  }
}

impl Drop for WaitSet {
  fn drop(&mut self) {
    for attachment in self.attachments.iter() {
      attachment.condition.detach(self.id);
    }
  }
}

#[cfg(test)]
mod test {
  use std::{thread, time};

  use super::*;
  use crate::dds::{GuardCondition, ReadCondition};

  const SHORT: Duration = Duration {
    sec: 0,
    nanosec: 20_000_000,
  };

  #[test]
  fn already_triggered_returns_at_once() {
    let mut ws = WaitSet::new().unwrap();
    let gc = GuardCondition::new();
    let rc = ReadCondition::new();
    ws.attach_condition(&gc).unwrap();
    ws.attach_condition(&rc).unwrap();
    rc.set_data_available(true).unwrap();

    let mut active = Vec::new();
    ws.wait(&mut active, Duration::INFINITE).unwrap();
    assert_eq!(active, vec![rc.condition().clone()]);
  }

  #[test]
  fn times_out_when_nothing_triggers() {
    let mut ws = WaitSet::new().unwrap();
    let gc = GuardCondition::new();
    ws.attach_condition(&gc).unwrap();

    let mut active = vec![gc.condition().clone()];
    let start = Instant::now();
    assert_eq!(ws.wait(&mut active, SHORT), Err(ReturnCode::Timeout));
    assert!(start.elapsed() >= time::Duration::from_millis(20));
    assert!(active.is_empty());

    assert_eq!(
      ws.wait(&mut active, Duration::ZERO),
      Err(ReturnCode::Timeout)
    );
  }

  #[test]
  fn wakes_on_trigger_from_other_thread() {
    let mut ws = WaitSet::new().unwrap();
    let gc = GuardCondition::new();
    ws.attach_condition(&gc).unwrap();

    let trigger = gc.clone();
    let handle = thread::spawn(move || {
      thread::sleep(time::Duration::from_millis(50));
      trigger.set_trigger_value(true).unwrap();
    });

    let mut active = Vec::new();
    ws.wait(&mut active, Duration { sec: 5, nanosec: 0 })
      .unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].same_as(&gc));
    handle.join().unwrap();
  }

  #[test]
  fn attach_is_idempotent_and_bounded() {
    let mut ws = WaitSet::with_max_conditions(2).unwrap();
    let a = GuardCondition::new();
    let b = GuardCondition::new();
    let c = GuardCondition::new();
    ws.attach_condition(&a).unwrap();
    ws.attach_condition(&a).unwrap();
    assert_eq!(ws.get_conditions().len(), 1);
    assert_eq!(a.attachment_count(), 1);
    ws.attach_condition(&b).unwrap();
    assert_eq!(ws.attach_condition(&c), Err(ReturnCode::OutOfResources));
  }

  #[test]
  fn detach() {
    let mut ws = WaitSet::new().unwrap();
    let a = GuardCondition::new();
    assert_eq!(
      ws.detach_condition(&a),
      Err(ReturnCode::PreconditionNotMet)
    );
    ws.attach_condition(&a).unwrap();
    ws.detach_condition(&a).unwrap();
    assert!(ws.get_conditions().is_empty());
    assert_eq!(a.attachment_count(), 0);

    // a detached condition no longer wakes the wait set
    a.set_trigger_value(true).unwrap();
    let mut active = Vec::new();
    assert_eq!(ws.wait(&mut active, SHORT), Err(ReturnCode::Timeout));
  }

  #[test]
  fn one_condition_many_wait_sets() {
    let mut ws1 = WaitSet::new().unwrap();
    let mut ws2 = WaitSet::new().unwrap();
    let gc = GuardCondition::new();
    ws1.attach_condition(&gc).unwrap();
    ws2.attach_condition(&gc).unwrap();
    assert_eq!(gc.attachment_count(), 2);
    gc.set_trigger_value(true).unwrap();

    let mut active = Vec::new();
    ws1.wait(&mut active, SHORT).unwrap();
    assert_eq!(active.len(), 1);
    ws2.wait(&mut active, SHORT).unwrap();
    assert_eq!(active.len(), 1);

    drop(ws1);
    assert_eq!(gc.attachment_count(), 1);
  }
}
