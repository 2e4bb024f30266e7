use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::gid::Gid;

/// Topic name to the type names it has been announced with.
///
/// A type occurs once per announcing endpoint, so the lists are multisets.
pub type TopicsTypes = BTreeMap<String, Vec<String>>;

/// Bookkeeping of discovered topics and their types, globally and per
/// participant.
///
/// `topic_to_types` is always the multiset union of all the per-participant
/// maps, and no map ever holds an empty type list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicCache {
  topic_to_types: TopicsTypes,
  participant_to_topics: BTreeMap<Gid, TopicsTypes>,
}

impl TopicCache {
  pub fn new() -> TopicCache {
    TopicCache::default()
  }

  pub fn topic_to_types(&self) -> &TopicsTypes {
    &self.topic_to_types
  }

  pub fn participant_to_topics(&self) -> &BTreeMap<Gid, TopicsTypes> {
    &self.participant_to_topics
  }

  pub fn topics_of(&self, participant: &Gid) -> Option<&TopicsTypes> {
    self.participant_to_topics.get(participant)
  }

  pub fn is_empty(&self) -> bool {
    self.topic_to_types.is_empty()
  }

  /// Record one endpoint on `topic_name` with `type_name`. Always succeeds.
  pub fn add_topic(&mut self, participant: Gid, topic_name: &str, type_name: &str) -> bool {
    debug!("Adding topic '{topic_name}' with type '{type_name}' for participant {participant:?}");
    self
      .participant_to_topics
      .entry(participant)
      .or_default()
      .entry(topic_name.to_owned())
      .or_default()
      .push(type_name.to_owned());
    self
      .topic_to_types
      .entry(topic_name.to_owned())
      .or_default()
      .push(type_name.to_owned());
    true
  }

  /// Forget one endpoint on `topic_name` with `type_name`.
  ///
  /// Returns false and leaves the cache untouched if no such endpoint was
  /// recorded for `participant`.
  pub fn remove_topic(&mut self, participant: &Gid, topic_name: &str, type_name: &str) -> bool {
    if !self.topic_to_types.contains_key(topic_name) {
      debug!("Unexpected removal of topic '{topic_name}': topic is not known");
      return false;
    }

    let participant_now_empty = {
      let topics = match self.participant_to_topics.get_mut(participant) {
        Some(topics) => topics,
        None => {
          debug!(
            "Unexpected removal of topic '{topic_name}': participant {participant:?} is not known"
          );
          return false;
        }
      };
      if !remove_first(topics, topic_name, type_name) {
        if topics.contains_key(topic_name) {
          debug!(
            "Unexpected removal of topic '{topic_name}': type '{type_name}' is not known for participant {participant:?}"
          );
        } else {
          debug!(
            "Unexpected removal of topic '{topic_name}': topic is not known for participant {participant:?}"
          );
        }
        return false;
      }
      topics.is_empty()
    };
    if participant_now_empty {
      self.participant_to_topics.remove(participant);
    }

    if !remove_first(&mut self.topic_to_types, topic_name, type_name) {
      warn!("Topic cache out of sync: '{topic_name}' with '{type_name}' missing from global map");
    }
    debug!("Removed topic '{topic_name}' with type '{type_name}' for participant {participant:?}");
    true
  }

  /// Forget everything `participant` has announced.
  pub fn remove_participant(&mut self, participant: &Gid) -> bool {
    let topics = match self.participant_to_topics.remove(participant) {
      Some(topics) => topics,
      None => {
        debug!("Participant {participant:?} has no topics to remove");
        return false;
      }
    };
    for (topic_name, types) in topics.iter() {
      for type_name in types {
        if !remove_first(&mut self.topic_to_types, topic_name, type_name) {
          warn!(
            "Topic cache out of sync: '{topic_name}' with '{type_name}' missing from global map"
          );
        }
      }
    }
    debug!("Removed all topics of participant {participant:?}");
    true
  }
}

// Remove the first occurrence of `type_name` under `topic_name`, and the topic
// itself if that empties its list.
fn remove_first(map: &mut TopicsTypes, topic_name: &str, type_name: &str) -> bool {
  let types = match map.get_mut(topic_name) {
    Some(types) => types,
    None => return false,
  };
  match types.iter().position(|t| t == type_name) {
    Some(pos) => {
      types.remove(pos);
      if types.is_empty() {
        map.remove(topic_name);
      }
      true
    }
    None => false,
  }
}

impl fmt::Display for TopicCache {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    writeln!(f, "Participant Info: ")?;
    for (participant, topics) in self.participant_to_topics.iter() {
      writeln!(f, "  Topics for participant {participant:?}:")?;
      for (topic_name, types) in topics.iter() {
        writeln!(f, "    {topic_name} <- [{}]", types.iter().join(", "))?;
      }
    }
    writeln!(f, "Cumulative TopicToTypes: ")?;
    for (topic_name, types) in self.topic_to_types.iter() {
      writeln!(f, "  {topic_name} <- [{}]", types.iter().join(", "))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn gid(n: u8) -> Gid {
    Gid::from_bytes([n; 16])
  }

  // global map == multiset union of participant maps, and nothing is empty
  fn check_consistent(cache: &TopicCache) {
    let mut union = TopicsTypes::new();
    for topics in cache.participant_to_topics().values() {
      assert!(!topics.is_empty());
      for (topic, types) in topics {
        assert!(!types.is_empty());
        union
          .entry(topic.clone())
          .or_default()
          .extend(types.iter().cloned());
      }
    }
    let mut global = cache.topic_to_types().clone();
    for types in global.values_mut() {
      assert!(!types.is_empty());
      types.sort();
    }
    for types in union.values_mut() {
      types.sort();
    }
    assert_eq!(global, union);
  }

  #[test]
  fn add_then_remove() {
    let mut cache = TopicCache::new();
    let p1 = gid(1);
    assert!(cache.add_topic(p1, "rt/chatter", "std_msgs::msg::dds_::String_"));
    assert!(cache.add_topic(p1, "rt/chatter", "std_msgs::msg::dds_::String_"));
    assert_eq!(
      cache.topic_to_types()["rt/chatter"],
      vec!["std_msgs::msg::dds_::String_"; 2]
    );
    assert_eq!(cache.topics_of(&p1).unwrap()["rt/chatter"].len(), 2);
    check_consistent(&cache);

    assert!(cache.remove_topic(&p1, "rt/chatter", "std_msgs::msg::dds_::String_"));
    assert_eq!(cache.topic_to_types()["rt/chatter"].len(), 1);
    check_consistent(&cache);

    assert!(cache.remove_topic(&p1, "rt/chatter", "std_msgs::msg::dds_::String_"));
    assert!(cache.is_empty());
    assert!(cache.participant_to_topics().is_empty());
  }

  #[test]
  fn failed_removals_change_nothing() {
    let mut cache = TopicCache::new();
    cache.add_topic(gid(1), "rt/a", "T");
    cache.add_topic(gid(2), "rt/b", "U");
    let before = cache.clone();

    // unknown topic
    assert!(!cache.remove_topic(&gid(1), "rt/zzz", "T"));
    // unknown participant
    assert!(!cache.remove_topic(&gid(3), "rt/a", "T"));
    // topic known globally, but not for this participant
    assert!(!cache.remove_topic(&gid(2), "rt/a", "T"));
    // type not known for this participant
    assert!(!cache.remove_topic(&gid(1), "rt/a", "U"));

    assert_eq!(cache, before);
  }

  #[test]
  fn two_participants_same_topic() {
    let mut cache = TopicCache::new();
    cache.add_topic(gid(1), "rt/a", "T");
    cache.add_topic(gid(2), "rt/a", "T2");
    assert_eq!(cache.topic_to_types()["rt/a"], vec!["T", "T2"]);

    assert!(cache.remove_participant(&gid(1)));
    assert_eq!(cache.topic_to_types()["rt/a"], vec!["T2"]);
    assert!(cache.topics_of(&gid(1)).is_none());
    check_consistent(&cache);

    assert!(!cache.remove_participant(&gid(1)));
    assert!(cache.remove_participant(&gid(2)));
    assert!(cache.is_empty());
  }

  #[test]
  fn two_participants_same_topic_and_type() {
    let string_type = "std_msgs::msg::dds_::String_";
    let mut cache = TopicCache::new();
    cache.add_topic(gid(1), "rt/chatter", string_type);
    cache.add_topic(gid(2), "rt/chatter", string_type);
    assert_eq!(
      cache.topic_to_types()["rt/chatter"],
      vec![string_type, string_type]
    );

    assert!(cache.remove_participant(&gid(1)));
    assert_eq!(cache.topic_to_types()["rt/chatter"], vec![string_type]);
    assert_eq!(
      cache.topics_of(&gid(2)).unwrap()["rt/chatter"],
      vec![string_type]
    );
    check_consistent(&cache);
  }

  #[test]
  fn mixed_sequence_stays_consistent() {
    let topics = ["rt/a", "rt/b", "rq/sRequest", "rr/sReply"];
    let types = ["T", "U"];
    let mut cache = TopicCache::new();
    let mut x: u32 = 12345;
    for _ in 0..500 {
      x = x.wrapping_mul(1_103_515_245).wrapping_add(12345);
      let p = gid((x >> 8) as u8 % 3);
      let topic = topics[(x >> 12) as usize % topics.len()];
      let type_name = types[(x >> 16) as usize % types.len()];
      match (x >> 20) % 5 {
        0 | 1 => {
          cache.add_topic(p, topic, type_name);
        }
        2 | 3 => {
          cache.remove_topic(&p, topic, type_name);
        }
        _ => {
          cache.remove_participant(&p);
        }
      }
      check_consistent(&cache);
    }
  }

  #[test]
  fn display_dump() {
    let mut cache = TopicCache::new();
    cache.add_topic(gid(1), "rt/a", "T");
    let dump = cache.to_string();
    assert!(dump.contains("Participant Info"));
    assert!(dump.contains("Cumulative TopicToTypes"));
    assert!(dump.contains("rt/a <- [T]"));
  }
}
