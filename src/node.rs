use std::{collections::BTreeMap, sync::Arc};

use async_channel::Receiver;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rustdds::GUID;

use crate::{
  dds::{BuiltinReader, DomainParticipant, ParticipantBuiltinTopicData, ReturnCode},
  discovery::{GraphEvent, GraphNotifier, PublicationListener, SubscriptionListener},
  error::{RmwError, RmwResult},
  gid::Gid,
  guard_condition::{create_guard_condition, RmwGuardCondition},
  implementation::{check_implementation, Implementation},
  names::NodeName,
};

/// Configuration for [`create_node`]
#[derive(Clone, Debug)]
pub struct NodeOptions {
  domain_id: u16,
  localhost_only: bool,
  participant_guid: Option<GUID>,
}

impl NodeOptions {
  pub fn new() -> NodeOptions {
    NodeOptions {
      domain_id: 0,
      localhost_only: false,
      participant_guid: None,
    }
  }

  /// Set the DDS Domain Id.
  ///
  /// Please refer to the
  /// [ROS_DOMAIN_ID](https://docs.ros.org/en/iron/Concepts/Intermediate/About-Domain-ID.html)
  /// or DDS documentation.
  pub fn domain_id(mut self, domain_id: u16) -> NodeOptions {
    self.domain_id = domain_id;
    self
  }

  /// Restrict discovery to the local host.
  pub fn localhost_only(mut self, localhost_only: bool) -> NodeOptions {
    self.localhost_only = localhost_only;
    self
  }

  /// Use a GUID assigned by the DDS library instead of generating one.
  pub fn participant_guid(mut self, guid: GUID) -> NodeOptions {
    self.participant_guid = Some(guid);
    self
  }
}

impl Default for NodeOptions {
  fn default() -> Self {
    Self::new()
  }
}

/// Parse `key=value;key=value;` participant user data.
pub(crate) fn parse_key_value(user_data: &[u8]) -> BTreeMap<String, String> {
  String::from_utf8_lossy(user_data)
    .split(';')
    .filter_map(|pair| pair.split_once('='))
    .filter(|(key, _)| !key.is_empty())
    .map(|(key, value)| (key.to_owned(), value.to_owned()))
    .collect()
}

/// `(name, namespace)` announced in participant user data, if any.
pub(crate) fn node_name_from_user_data(user_data: &[u8]) -> Option<(String, String)> {
  let mut map = parse_key_value(user_data);
  let name = map.remove("name")?;
  let namespace = map.remove("namespace")?;
  Some((name, namespace))
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// Per-node DDS state: the participant, its discovery listeners and the
/// graph guard condition.
///
/// Listeners are declared before the notifier that owns the graph guard
/// condition, so they are dropped first.
pub struct ConnextNodeInfo {
  participant: DomainParticipant,
  publication_listener: PublicationListener,
  subscription_listener: SubscriptionListener,
  graph_notifier: Arc<GraphNotifier>,
}

/// Node handle handed out to rmw users.
pub struct RmwNode {
  implementation: Implementation,
  name: NodeName,
  options: NodeOptions,
  info: ConnextNodeInfo,
}

pub fn create_node(
  implementation: Implementation,
  name: &str,
  namespace: &str,
  options: NodeOptions,
) -> RmwResult<RmwNode> {
  let node_name = NodeName::new(namespace, name).map_err(|e| {
    RmwError::InvalidArgument(format!("invalid node name '{name}' in '{namespace}': {e}"))
  })?;

  let graph_guard_condition = create_guard_condition(implementation)?;
  let graph_notifier = Arc::new(GraphNotifier::new(implementation, graph_guard_condition));

  let user_data = format!("name={name};namespace={namespace};").into_bytes();
  let guid = options
    .participant_guid
    .unwrap_or_else(GUID::new_participant_guid);
  let participant = DomainParticipant::new(guid, options.domain_id, user_data);

  info!(
    "Created node {} on domain {} (localhost_only={})",
    node_name, options.domain_id, options.localhost_only
  );

  Ok(RmwNode {
    implementation,
    name: node_name,
    options,
    info: ConnextNodeInfo {
      participant,
      publication_listener: PublicationListener::new(graph_notifier.clone()),
      subscription_listener: SubscriptionListener::new(graph_notifier.clone()),
      graph_notifier,
    },
  })
}

pub fn destroy_node(implementation: Implementation, node: RmwNode) -> RmwResult<()> {
  check_implementation("node", node.implementation, implementation)?;
  info!("Destroying node {}", node.name);
  Ok(())
}

impl RmwNode {
  pub fn implementation(&self) -> Implementation {
    self.implementation
  }

  pub fn name(&self) -> &str {
    self.name.base_name()
  }

  pub fn namespace(&self) -> &str {
    self.name.namespace()
  }

  pub fn node_name(&self) -> &NodeName {
    &self.name
  }

  pub fn domain_id(&self) -> u16 {
    self.options.domain_id
  }

  pub fn localhost_only(&self) -> bool {
    self.options.localhost_only
  }

  pub fn participant(&self) -> &DomainParticipant {
    &self.info.participant
  }

  pub fn gid(&self) -> Gid {
    Gid::from(self.info.participant.guid())
  }

  pub fn publication_listener(&self) -> &PublicationListener {
    &self.info.publication_listener
  }

  pub fn subscription_listener(&self) -> &SubscriptionListener {
    &self.info.subscription_listener
  }

  /// Triggered whenever the discovery graph changes.
  pub fn graph_guard_condition(&self) -> &RmwGuardCondition {
    self.info.graph_notifier.graph_guard_condition()
  }

  /// Async stream of graph changes. Slow receivers miss events, but the
  /// graph guard condition is always triggered.
  pub fn graph_events(&self) -> Receiver<GraphEvent> {
    self.info.graph_notifier.graph_events()
  }

  pub(crate) fn check_implementation(&self, implementation: Implementation) -> RmwResult<()> {
    check_implementation("node", self.implementation, implementation)
  }

  /// Feed `DCPSParticipant` samples.
  ///
  /// A disposed participant takes all of its topics with it, and the graph
  /// guard condition is triggered once for the batch.
  pub fn on_participant_data(&self, reader: &dyn BuiltinReader<ParticipantBuiltinTopicData>) {
    let samples = match reader.take() {
      Ok(samples) => samples,
      Err(ReturnCode::NoData) => return,
      Err(rc) => {
        error!("Failed to take participant samples: {rc}");
        return;
      }
    };
    if samples.is_empty() {
      return;
    }

    for (data, sample_info) in samples {
      if sample_info.valid_data {
        self.info.participant.add_discovered_participant(data);
      } else {
        let gid = Gid::from(sample_info.instance_handle);
        self
          .info
          .participant
          .remove_discovered_participant(GUID::from(gid));
        self.info.publication_listener.remove_participant(&gid);
        self.info.subscription_listener.remove_participant(&gid);
      }
    }
    self.info.graph_notifier.notify(GraphEvent::ParticipantsChanged);
  }
}

#[cfg(test)]
mod test {
  use test_case::test_case;

  use super::*;
  use crate::{dds::SampleInfo, dds::InstanceHandle, error::RetCode};

  #[test_case("talker", "/" => true ; "root namespace")]
  #[test_case("talker", "/ns/deeper" => true ; "nested namespace")]
  #[test_case("", "/" => false ; "empty name")]
  #[test_case("2talker", "/" => false ; "leading digit")]
  #[test_case("talker", "ns" => false ; "relative namespace")]
  #[test_case("talker", "/ns/" => false ; "trailing slash")]
  fn node_name_validation(name: &str, namespace: &str) -> bool {
    match create_node(Implementation::Connext, name, namespace, NodeOptions::new()) {
      Ok(_) => true,
      Err(e) => {
        assert_eq!(e.ret_code(), RetCode::InvalidArgument);
        false
      }
    }
  }

  #[test]
  fn options_and_user_data() {
    let guid = GUID::from_bytes([7; 16]);
    let node = create_node(
      Implementation::Connext,
      "talker",
      "/demo",
      NodeOptions::new()
        .domain_id(42)
        .localhost_only(true)
        .participant_guid(guid),
    )
    .unwrap();
    assert_eq!(node.domain_id(), 42);
    assert!(node.localhost_only());
    assert_eq!(node.participant().guid(), guid);
    assert_eq!(node.name(), "talker");
    assert_eq!(node.namespace(), "/demo");
    assert_eq!(
      node.participant().user_data(),
      b"name=talker;namespace=/demo;"
    );
    assert_eq!(
      node_name_from_user_data(node.participant().user_data()),
      Some(("talker".to_owned(), "/demo".to_owned()))
    );
  }

  #[test]
  fn generated_guids_differ() {
    let a = create_node(Implementation::Connext, "a", "/", NodeOptions::new()).unwrap();
    let b = create_node(Implementation::Connext, "b", "/", NodeOptions::new()).unwrap();
    assert_ne!(a.participant().guid(), b.participant().guid());
    assert_ne!(a.gid(), b.gid());
  }

  #[test]
  fn key_value_parsing() {
    let map = parse_key_value(b"name=a;namespace=/;junk;=x;empty=;");
    assert_eq!(map.get("name").map(String::as_str), Some("a"));
    assert_eq!(map.get("namespace").map(String::as_str), Some("/"));
    assert_eq!(map.get("empty").map(String::as_str), Some(""));
    assert_eq!(map.len(), 3);
    assert_eq!(node_name_from_user_data(b"name=a;"), None);
  }

  #[test]
  fn destroy_rejects_foreign_node() {
    let node = create_node(Implementation::ConnextDynamic, "n", "/", NodeOptions::new()).unwrap();
    assert_eq!(
      destroy_node(Implementation::Connext, node)
        .unwrap_err()
        .ret_code(),
      RetCode::IncorrectRmwImplementation
    );
    let node = create_node(Implementation::Connext, "n", "/", NodeOptions::new()).unwrap();
    assert!(destroy_node(Implementation::Connext, node).is_ok());
  }

  struct EmptyReader;

  impl BuiltinReader<ParticipantBuiltinTopicData> for EmptyReader {
    fn take(&self) -> Result<Vec<(ParticipantBuiltinTopicData, SampleInfo)>, ReturnCode> {
      Ok(Vec::new())
    }
  }

  #[test]
  fn empty_participant_batch_does_not_trigger() {
    let node = create_node(Implementation::Connext, "n", "/", NodeOptions::new()).unwrap();
    let events = node.graph_events();
    node.on_participant_data(&EmptyReader);
    assert!(!node.graph_guard_condition().condition().trigger_value());
    assert!(events.try_recv().is_err());
  }

  #[test]
  fn participant_disposal_removes_topics() {
    let node = create_node(Implementation::Connext, "n", "/", NodeOptions::new()).unwrap();
    let remote = GUID::from_bytes([9; 16]);
    let remote_gid = Gid::from(remote);

    let (tx, rx) = mio_extras::channel::channel();
    tx.send((
      ParticipantBuiltinTopicData {
        key: remote,
        user_data: b"name=listener;namespace=/;".to_vec(),
      },
      SampleInfo::valid(InstanceHandle::from_guid(remote)),
    ))
    .unwrap();
    node.on_participant_data(&rx);
    assert_eq!(node.participant().discovered_participants(), vec![remote]);

    node
      .publication_listener()
      .add_information(remote_gid, InstanceHandle::from_bytes([1; 16]), "rt/a", "T");
    node
      .subscription_listener()
      .add_information(remote_gid, InstanceHandle::from_bytes([2; 16]), "rt/b", "T");

    let gc = node.graph_guard_condition().condition().clone();
    gc.set_trigger_value(false).unwrap();
    let events = node.graph_events();

    tx.send((
      ParticipantBuiltinTopicData {
        key: remote,
        user_data: Vec::new(),
      },
      SampleInfo::disposed(InstanceHandle::from_guid(remote)),
    ))
    .unwrap();
    node.on_participant_data(&rx);

    assert!(node.participant().discovered_participants().is_empty());
    assert_eq!(node.publication_listener().count_topic("/a"), 0);
    assert_eq!(node.subscription_listener().count_topic("/b"), 0);
    assert!(gc.trigger_value());
    assert_eq!(events.try_recv(), Ok(GraphEvent::ParticipantsChanged));
    assert!(events.try_recv().is_err());
  }
}
