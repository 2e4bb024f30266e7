use std::sync::mpsc::TryRecvError;

use rustdds::GUID;

use super::{InstanceHandle, ReturnCode};

/// Metadata delivered with every sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleInfo {
  pub instance_handle: InstanceHandle,
  /// `false` for disposal and unregistration notices
  pub valid_data: bool,
}

impl SampleInfo {
  pub fn valid(instance_handle: InstanceHandle) -> SampleInfo {
    SampleInfo {
      instance_handle,
      valid_data: true,
    }
  }

  pub fn disposed(instance_handle: InstanceHandle) -> SampleInfo {
    SampleInfo {
      instance_handle,
      valid_data: false,
    }
  }
}

/// Sample of the `DCPSPublication` built-in topic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicationBuiltinTopicData {
  pub key: GUID,
  pub participant_key: GUID,
  pub topic_name: String,
  pub type_name: String,
  pub partition: Vec<String>,
}

/// Sample of the `DCPSSubscription` built-in topic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionBuiltinTopicData {
  pub key: GUID,
  pub participant_key: GUID,
  pub topic_name: String,
  pub type_name: String,
  pub partition: Vec<String>,
}

/// Sample of the `DCPSParticipant` built-in topic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParticipantBuiltinTopicData {
  pub key: GUID,
  pub user_data: Vec<u8>,
}

/// Common view of publication and subscription announcements.
pub trait EndpointBuiltinTopicData {
  fn participant_key(&self) -> GUID;
  fn topic_name(&self) -> &str;
  fn type_name(&self) -> &str;
  fn partition(&self) -> &[String];

  /// Topic name as seen by ROS: `<first partition>/<topic>`, or the bare
  /// topic when there is no partition.
  fn fully_qualified_topic_name(&self) -> String {
    match self.partition().first() {
      Some(partition) if !partition.is_empty() => {
        format!("{}/{}", partition, self.topic_name())
      }
      _ => self.topic_name().to_owned(),
    }
  }
}

macro_rules! impl_endpoint_data {
  ($t:ty) => {
    impl EndpointBuiltinTopicData for $t {
      fn participant_key(&self) -> GUID {
        self.participant_key
      }
      fn topic_name(&self) -> &str {
        &self.topic_name
      }
      fn type_name(&self) -> &str {
        &self.type_name
      }
      fn partition(&self) -> &[String] {
        &self.partition
      }
    }
  };
}

impl_endpoint_data!(PublicationBuiltinTopicData);
impl_endpoint_data!(SubscriptionBuiltinTopicData);

/// Reader of a built-in topic.
///
/// `take` removes every available sample from the reader, and fails with
/// `ReturnCode::NoData` when there is nothing to take.
pub trait BuiltinReader<D> {
  fn take(&self) -> Result<Vec<(D, SampleInfo)>, ReturnCode>;
}

impl<D> BuiltinReader<D> for mio_extras::channel::Receiver<(D, SampleInfo)> {
  fn take(&self) -> Result<Vec<(D, SampleInfo)>, ReturnCode> {
    let mut samples = Vec::new();
    loop {
      match self.try_recv() {
        Ok(sample) => samples.push(sample),
        Err(TryRecvError::Empty) => break,
        Err(TryRecvError::Disconnected) => {
          if samples.is_empty() {
            return Err(ReturnCode::AlreadyDeleted);
          }
          break;
        }
      }
    }
    if samples.is_empty() {
      Err(ReturnCode::NoData)
    } else {
      Ok(samples)
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn publication(partition: &[&str], topic: &str) -> PublicationBuiltinTopicData {
    PublicationBuiltinTopicData {
      key: GUID::from_bytes([1; 16]),
      participant_key: GUID::from_bytes([2; 16]),
      topic_name: topic.to_owned(),
      type_name: "std_msgs::msg::dds_::String_".to_owned(),
      partition: partition.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn fully_qualified_names() {
    assert_eq!(
      publication(&["rt"], "chatter").fully_qualified_topic_name(),
      "rt/chatter"
    );
    assert_eq!(
      publication(&["rq/ns", "ignored"], "add_two_intsRequest").fully_qualified_topic_name(),
      "rq/ns/add_two_intsRequest"
    );
    assert_eq!(
      publication(&[], "rt/chatter").fully_qualified_topic_name(),
      "rt/chatter"
    );
    assert_eq!(
      publication(&[""], "plain").fully_qualified_topic_name(),
      "plain"
    );
  }

  #[test]
  fn channel_reader_takes_everything() {
    let (tx, rx) = mio_extras::channel::channel();
    assert_eq!(
      BuiltinReader::<PublicationBuiltinTopicData>::take(&rx).unwrap_err(),
      ReturnCode::NoData
    );

    let handle = InstanceHandle::from_bytes([1; 16]);
    tx.send((publication(&["rt"], "a"), SampleInfo::valid(handle)))
      .unwrap();
    tx.send((publication(&["rt"], "b"), SampleInfo::disposed(handle)))
      .unwrap();

    let samples = rx.take().unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples[0].1.valid_data);
    assert!(!samples[1].1.valid_data);
    assert_eq!(rx.take().unwrap_err(), ReturnCode::NoData);

    drop(tx);
    assert_eq!(rx.take().unwrap_err(), ReturnCode::AlreadyDeleted);
  }
}
