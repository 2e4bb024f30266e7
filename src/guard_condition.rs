use crate::{
  dds::GuardCondition,
  error::{RmwError, RmwResult},
  implementation::{check_implementation, Implementation},
};

/// Guard condition handle handed out to rmw users.
#[derive(Debug)]
pub struct RmwGuardCondition {
  implementation: Implementation,
  condition: GuardCondition,
}

impl RmwGuardCondition {
  pub fn implementation(&self) -> Implementation {
    self.implementation
  }

  /// The DDS guard condition, for placing into the guard condition list of
  /// [`wait`](crate::wait::wait).
  pub fn condition(&self) -> &GuardCondition {
    &self.condition
  }
}

pub fn create_guard_condition(implementation: Implementation) -> RmwResult<RmwGuardCondition> {
  Ok(RmwGuardCondition {
    implementation,
    condition: GuardCondition::new(),
  })
}

pub fn destroy_guard_condition(
  implementation: Implementation,
  guard_condition: RmwGuardCondition,
) -> RmwResult<()> {
  check_implementation(
    "guard condition",
    guard_condition.implementation,
    implementation,
  )
}

pub fn trigger_guard_condition(
  implementation: Implementation,
  guard_condition: &RmwGuardCondition,
) -> RmwResult<()> {
  check_implementation(
    "guard condition",
    guard_condition.implementation,
    implementation,
  )?;
  guard_condition
    .condition
    .set_trigger_value(true)
    .map_err(|rc| RmwError::Error(format!("failed to set trigger value: {rc}")))
}
