use std::{collections::BTreeMap, sync::Mutex};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rustdds::GUID;

use super::ParticipantBuiltinTopicData;

/// Local DDS participant, as far as graph queries need it.
///
/// Keeps its own identity and `USER_DATA`, and the built-in topic data of
/// every remote participant discovered so far.
pub struct DomainParticipant {
  guid: GUID,
  domain_id: u16,
  user_data: Vec<u8>,
  discovered: Mutex<BTreeMap<GUID, ParticipantBuiltinTopicData>>,
}

impl DomainParticipant {
  pub fn new(guid: GUID, domain_id: u16, user_data: Vec<u8>) -> DomainParticipant {
    DomainParticipant {
      guid,
      domain_id,
      user_data,
      discovered: Mutex::new(BTreeMap::new()),
    }
  }

  pub fn guid(&self) -> GUID {
    self.guid
  }

  pub fn domain_id(&self) -> u16 {
    self.domain_id
  }

  pub fn user_data(&self) -> &[u8] {
    &self.user_data
  }

  pub fn discovered_participants(&self) -> Vec<GUID> {
    self.discovered.lock().unwrap().keys().copied().collect()
  }

  pub fn discovered_participant_data(&self, key: GUID) -> Option<ParticipantBuiltinTopicData> {
    self.discovered.lock().unwrap().get(&key).cloned()
  }

  pub(crate) fn add_discovered_participant(&self, data: ParticipantBuiltinTopicData) {
    if data.key == self.guid {
      trace!("Ignoring discovery data of the local participant");
      return;
    }
    debug!("Discovered participant {:?}", data.key);
    self.discovered.lock().unwrap().insert(data.key, data);
  }

  pub(crate) fn remove_discovered_participant(&self, key: GUID) -> bool {
    let removed = self.discovered.lock().unwrap().remove(&key).is_some();
    if removed {
      debug!("Participant {:?} left", key);
    }
    removed
  }
}
