//! Entity status events: liveliness, deadlines, QoS incompatibility, sample
//! loss and matching.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
  dds::ReturnCode,
  error::{ret_from_dds, RmwError, RmwResult},
};

/// See [rmw/event.h](https://github.com/ros2/rmw/blob/master/rmw/include/rmw/event.h)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum EventType {
  LivelinessChanged = 0,
  RequestedDeadlineMissed = 1,
  RequestedQosIncompatible = 2,
  MessageLost = 3,
  LivelinessLost = 4,
  OfferedDeadlineMissed = 5,
  OfferedQosIncompatible = 6,
  SubscriptionMatched = 7,
  PublicationMatched = 8,
}

/// QoS policy named in incompatible QoS statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum QosPolicyKind {
  Invalid = 0,
  Durability = 1,
  Deadline = 2,
  Liveliness = 3,
  Reliability = 4,
  History = 5,
  Lifespan = 6,
}

impl QosPolicyKind {
  /// From DDS `QosPolicyId_t`
  pub fn from_dds_policy_id(policy_id: i32) -> QosPolicyKind {
    match policy_id {
      2 => QosPolicyKind::Durability,
      4 => QosPolicyKind::Deadline,
      8 => QosPolicyKind::Liveliness,
      11 => QosPolicyKind::Reliability,
      13 => QosPolicyKind::History,
      21 => QosPolicyKind::Lifespan,
      _ => QosPolicyKind::Invalid,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivelinessChangedStatus {
  pub alive_count: i32,
  pub not_alive_count: i32,
  pub alive_count_change: i32,
  pub not_alive_count_change: i32,
}

/// Used for deadline misses, sample loss and liveliness loss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStatus {
  pub total_count: i32,
  pub total_count_change: i32,
}

/// `last_policy_id` is the raw DDS `QosPolicyId_t`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibleQosStatus {
  pub total_count: i32,
  pub total_count_change: i32,
  pub last_policy_id: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedStatus {
  pub total_count: i32,
  pub total_count_change: i32,
  pub current_count: i32,
  pub current_count_change: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosIncompatibleEvent {
  pub total_count: i32,
  pub total_count_change: i32,
  pub last_policy_kind: QosPolicyKind,
}

impl From<IncompatibleQosStatus> for QosIncompatibleEvent {
  fn from(s: IncompatibleQosStatus) -> Self {
    QosIncompatibleEvent {
      total_count: s.total_count,
      total_count_change: s.total_count_change,
      last_policy_kind: QosPolicyKind::from_dds_policy_id(s.last_policy_id),
    }
  }
}

/// One taken status, tagged by kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEvent {
  LivelinessChanged(LivelinessChangedStatus),
  RequestedDeadlineMissed(CountStatus),
  RequestedQosIncompatible(QosIncompatibleEvent),
  MessageLost(CountStatus),
  LivelinessLost(CountStatus),
  OfferedDeadlineMissed(CountStatus),
  OfferedQosIncompatible(QosIncompatibleEvent),
  SubscriptionMatched(MatchedStatus),
  PublicationMatched(MatchedStatus),
}

impl StatusEvent {
  pub fn event_type(&self) -> EventType {
    match self {
      StatusEvent::LivelinessChanged(_) => EventType::LivelinessChanged,
      StatusEvent::RequestedDeadlineMissed(_) => EventType::RequestedDeadlineMissed,
      StatusEvent::RequestedQosIncompatible(_) => EventType::RequestedQosIncompatible,
      StatusEvent::MessageLost(_) => EventType::MessageLost,
      StatusEvent::LivelinessLost(_) => EventType::LivelinessLost,
      StatusEvent::OfferedDeadlineMissed(_) => EventType::OfferedDeadlineMissed,
      StatusEvent::OfferedQosIncompatible(_) => EventType::OfferedQosIncompatible,
      StatusEvent::SubscriptionMatched(_) => EventType::SubscriptionMatched,
      StatusEvent::PublicationMatched(_) => EventType::PublicationMatched,
    }
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// DDS `StatusMask`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatusMask(u32);

impl StatusMask {
  pub const NONE: StatusMask = StatusMask(0);
  pub const OFFERED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 1);
  pub const REQUESTED_DEADLINE_MISSED: StatusMask = StatusMask(1 << 2);
  pub const OFFERED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 5);
  pub const REQUESTED_INCOMPATIBLE_QOS: StatusMask = StatusMask(1 << 6);
  pub const SAMPLE_LOST: StatusMask = StatusMask(1 << 7);
  pub const DATA_AVAILABLE: StatusMask = StatusMask(1 << 10);
  pub const LIVELINESS_LOST: StatusMask = StatusMask(1 << 11);
  pub const LIVELINESS_CHANGED: StatusMask = StatusMask(1 << 12);
  pub const PUBLICATION_MATCHED: StatusMask = StatusMask(1 << 13);
  pub const SUBSCRIPTION_MATCHED: StatusMask = StatusMask(1 << 14);

  pub fn bits(&self) -> u32 {
    self.0
  }

  pub fn contains(&self, other: StatusMask) -> bool {
    self.0 & other.0 == other.0
  }
}

impl std::ops::BitOr for StatusMask {
  type Output = StatusMask;
  fn bitor(self, rhs: StatusMask) -> StatusMask {
    StatusMask(self.0 | rhs.0)
  }
}

pub fn status_mask_for(event_type: EventType) -> StatusMask {
  match event_type {
    EventType::LivelinessChanged => StatusMask::LIVELINESS_CHANGED,
    EventType::RequestedDeadlineMissed => StatusMask::REQUESTED_DEADLINE_MISSED,
    EventType::RequestedQosIncompatible => StatusMask::REQUESTED_INCOMPATIBLE_QOS,
    EventType::MessageLost => StatusMask::SAMPLE_LOST,
    EventType::LivelinessLost => StatusMask::LIVELINESS_LOST,
    EventType::OfferedDeadlineMissed => StatusMask::OFFERED_DEADLINE_MISSED,
    EventType::OfferedQosIncompatible => StatusMask::OFFERED_INCOMPATIBLE_QOS,
    EventType::SubscriptionMatched => StatusMask::SUBSCRIPTION_MATCHED,
    EventType::PublicationMatched => StatusMask::PUBLICATION_MATCHED,
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// Status getters of a DDS reader or writer.
///
/// Readers provide the requested / liveliness changed / sample lost /
/// subscription matched statuses, writers the offered / liveliness lost /
/// publication matched ones. Anything not overridden is unsupported.
pub trait EntityStatuses {
  fn liveliness_changed_status(&self) -> Result<LivelinessChangedStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn requested_deadline_missed_status(&self) -> Result<CountStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn requested_incompatible_qos_status(&self) -> Result<IncompatibleQosStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn sample_lost_status(&self) -> Result<CountStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn liveliness_lost_status(&self) -> Result<CountStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn offered_deadline_missed_status(&self) -> Result<CountStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn offered_incompatible_qos_status(&self) -> Result<IncompatibleQosStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn subscription_matched_status(&self) -> Result<MatchedStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
  fn publication_matched_status(&self) -> Result<MatchedStatus, ReturnCode> {
    Err(ReturnCode::Unsupported)
  }
}

fn from_dds<T>(result: Result<T, ReturnCode>) -> RmwResult<T> {
  result.or_else(|rc| match rc {
    ReturnCode::Unsupported => Err(RmwError::Unsupported),
    rc => ret_from_dds(rc)
      .and_then(|()| Err(RmwError::error("status getter failed with DDS_RETCODE_OK"))),
  })
}

/// Take the status of kind `event_type` from `entity`.
pub fn take_status(entity: &dyn EntityStatuses, event_type: EventType) -> RmwResult<StatusEvent> {
  let event = match event_type {
    EventType::LivelinessChanged => {
      StatusEvent::LivelinessChanged(from_dds(entity.liveliness_changed_status())?)
    }
    EventType::RequestedDeadlineMissed => {
      StatusEvent::RequestedDeadlineMissed(from_dds(entity.requested_deadline_missed_status())?)
    }
    EventType::RequestedQosIncompatible => StatusEvent::RequestedQosIncompatible(
      from_dds(entity.requested_incompatible_qos_status())?.into(),
    ),
    EventType::MessageLost => StatusEvent::MessageLost(from_dds(entity.sample_lost_status())?),
    EventType::LivelinessLost => {
      StatusEvent::LivelinessLost(from_dds(entity.liveliness_lost_status())?)
    }
    EventType::OfferedDeadlineMissed => {
      StatusEvent::OfferedDeadlineMissed(from_dds(entity.offered_deadline_missed_status())?)
    }
    EventType::OfferedQosIncompatible => StatusEvent::OfferedQosIncompatible(
      from_dds(entity.offered_incompatible_qos_status())?.into(),
    ),
    EventType::SubscriptionMatched => {
      StatusEvent::SubscriptionMatched(from_dds(entity.subscription_matched_status())?)
    }
    EventType::PublicationMatched => {
      StatusEvent::PublicationMatched(from_dds(entity.publication_matched_status())?)
    }
  };
  Ok(event)
}
