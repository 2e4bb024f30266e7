//! Graph introspection queries of an [`RmwNode`].

use std::ops::Index;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::{
  discovery::TopicNamesAndTypes,
  error::{RmwError, RmwResult},
  gid::Gid,
  implementation::Implementation,
  names,
  node::{node_name_from_user_data, RmwNode},
};

const SAMPLE_PREFIX: &str = "/Sample_";

/// Names with their type names, sorted by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamesAndTypes {
  entries: Vec<(String, Vec<String>)>,
}

impl NamesAndTypes {
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(name, _)| name.as_str())
  }

  pub fn types_of(&self, name: &str) -> Option<&[String]> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, types)| types.as_slice())
  }

  pub fn iter(&self) -> impl Iterator<Item = &(String, Vec<String>)> {
    self.entries.iter()
  }
}

impl Index<usize> for NamesAndTypes {
  type Output = (String, Vec<String>);
  fn index(&self, i: usize) -> &Self::Output {
    &self.entries[i]
  }
}

fn copy_topics_names_and_types(topics: &TopicNamesAndTypes, no_demangle: bool) -> NamesAndTypes {
  let mut entries: Vec<(String, Vec<String>)> = Vec::with_capacity(topics.len());
  for (topic_name, types) in topics {
    let (name, types) = if no_demangle {
      (topic_name.clone(), types.iter().cloned().collect())
    } else {
      (
        names::demangle_if_ros_topic(topic_name),
        types
          .iter()
          .map(|t| names::demangle_if_ros_type(t))
          .collect(),
      )
    };
    entries.push((name, types));
  }
  // Demangling may reorder names.
  entries.sort_by(|a, b| a.0.cmp(&b.0));
  NamesAndTypes { entries }
}

// Dynamic type support reports service types as `pkg/srv/Sample_Svc`.
fn strip_sample_prefix(type_name: &str) -> String {
  match type_name.find(SAMPLE_PREFIX) {
    Some(n) => format!(
      "{}{}",
      &type_name[..n + 1],
      &type_name[n + SAMPLE_PREFIX.len()..]
    ),
    None => type_name.to_owned(),
  }
}

fn copy_services_to_names_and_types(services: &TopicNamesAndTypes) -> NamesAndTypes {
  NamesAndTypes {
    entries: services
      .iter()
      .map(|(name, types)| {
        (
          name.clone(),
          types.iter().map(|t| strip_sample_prefix(t)).collect(),
        )
      })
      .collect(),
  }
}

fn validate_node_name_and_namespace(node_name: &str, node_namespace: &str) -> RmwResult<()> {
  if node_name.is_empty() {
    return Err(RmwError::InvalidArgument("node name is empty".to_owned()));
  }
  if node_namespace.is_empty() {
    return Err(RmwError::InvalidArgument(
      "node namespace is empty".to_owned(),
    ));
  }
  Ok(())
}

/// Participant key of the node `node_namespace`/`node_name`: ours, or one
/// of the discovered participants.
fn get_key(node: &RmwNode, node_name: &str, node_namespace: &str) -> RmwResult<Gid> {
  let participant = node.participant();
  let is_match = |user_data: &[u8]| {
    node_name_from_user_data(user_data)
      .map_or(false, |(name, ns)| name == node_name && ns == node_namespace)
  };

  if is_match(participant.user_data()) {
    return Ok(Gid::from(participant.guid()));
  }
  for key in participant.discovered_participants() {
    match participant.discovered_participant_data(key) {
      Some(data) if is_match(&data.user_data) => return Ok(Gid::from(data.key)),
      Some(_) => {}
      None => debug!("Participant {key:?} vanished during lookup"),
    }
  }
  Err(RmwError::Error(format!(
    "unable to match node_name/namespace with discovered nodes: {node_name} {node_namespace}"
  )))
}

pub fn get_topic_names_and_types(
  implementation: Implementation,
  node: &RmwNode,
  no_demangle: bool,
) -> RmwResult<NamesAndTypes> {
  node.check_implementation(implementation)?;
  let mut topics = TopicNamesAndTypes::new();
  node
    .publication_listener()
    .fill_topic_names_and_types(no_demangle, &mut topics);
  node
    .subscription_listener()
    .fill_topic_names_and_types(no_demangle, &mut topics);
  Ok(copy_topics_names_and_types(&topics, no_demangle))
}

pub fn get_service_names_and_types(
  implementation: Implementation,
  node: &RmwNode,
) -> RmwResult<NamesAndTypes> {
  node.check_implementation(implementation)?;
  let mut services = TopicNamesAndTypes::new();
  node
    .publication_listener()
    .fill_service_names_and_types(&mut services);
  node
    .subscription_listener()
    .fill_service_names_and_types(&mut services);
  Ok(copy_services_to_names_and_types(&services))
}

pub fn get_publisher_names_and_types_by_node(
  implementation: Implementation,
  node: &RmwNode,
  node_name: &str,
  node_namespace: &str,
  no_demangle: bool,
) -> RmwResult<NamesAndTypes> {
  node.check_implementation(implementation)?;
  validate_node_name_and_namespace(node_name, node_namespace)?;
  let key = get_key(node, node_name, node_namespace)?;
  let mut topics = TopicNamesAndTypes::new();
  node
    .publication_listener()
    .fill_topic_names_and_types_by_guid(no_demangle, &mut topics, &key);
  Ok(copy_topics_names_and_types(&topics, no_demangle))
}

pub fn get_subscriber_names_and_types_by_node(
  implementation: Implementation,
  node: &RmwNode,
  node_name: &str,
  node_namespace: &str,
  no_demangle: bool,
) -> RmwResult<NamesAndTypes> {
  node.check_implementation(implementation)?;
  validate_node_name_and_namespace(node_name, node_namespace)?;
  let key = get_key(node, node_name, node_namespace)?;
  let mut topics = TopicNamesAndTypes::new();
  node
    .subscription_listener()
    .fill_topic_names_and_types_by_guid(no_demangle, &mut topics, &key);
  Ok(copy_topics_names_and_types(&topics, no_demangle))
}

/// Services offered by a node, seen through the request topics it
/// subscribes to.
pub fn get_service_names_and_types_by_node(
  implementation: Implementation,
  node: &RmwNode,
  node_name: &str,
  node_namespace: &str,
) -> RmwResult<NamesAndTypes> {
  node.check_implementation(implementation)?;
  validate_node_name_and_namespace(node_name, node_namespace)?;
  let key = get_key(node, node_name, node_namespace)?;
  let mut services = TopicNamesAndTypes::new();
  node
    .subscription_listener()
    .fill_service_names_and_types_by_guid(&mut services, &key);
  Ok(copy_services_to_names_and_types(&services))
}

pub fn count_publishers(
  implementation: Implementation,
  node: &RmwNode,
  topic_name: &str,
) -> RmwResult<usize> {
  node.check_implementation(implementation)?;
  Ok(node.publication_listener().count_topic(topic_name))
}

pub fn count_subscribers(
  implementation: Implementation,
  node: &RmwNode,
  topic_name: &str,
) -> RmwResult<usize> {
  node.check_implementation(implementation)?;
  Ok(node.subscription_listener().count_topic(topic_name))
}

/// `(name, namespace)` of this node and of every discovered ROS node.
pub fn get_node_names(
  implementation: Implementation,
  node: &RmwNode,
) -> RmwResult<Vec<(String, String)>> {
  node.check_implementation(implementation)?;
  let participant = node.participant();
  let mut node_names = vec![(node.name().to_owned(), node.namespace().to_owned())];
  for key in participant.discovered_participants() {
    match participant
      .discovered_participant_data(key)
      .and_then(|data| node_name_from_user_data(&data.user_data))
    {
      Some(name_and_namespace) => node_names.push(name_and_namespace),
      None => trace!("Participant {key:?} is not a ROS node"),
    }
  }
  Ok(node_names)
}

/// Endpoint info by topic is not available from Connext discovery data.
pub fn get_publishers_info_by_topic(
  implementation: Implementation,
  node: &RmwNode,
  _topic_name: &str,
  _no_mangle: bool,
) -> RmwResult<()> {
  node.check_implementation(implementation)?;
  Err(RmwError::Unsupported)
}

pub fn get_subscriptions_info_by_topic(
  implementation: Implementation,
  node: &RmwNode,
  _topic_name: &str,
  _no_mangle: bool,
) -> RmwResult<()> {
  node.check_implementation(implementation)?;
  Err(RmwError::Unsupported)
}
