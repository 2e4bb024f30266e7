use std::{
  collections::{BTreeMap, BTreeSet},
  ops::Deref,
  sync::{Arc, Mutex},
};

use async_channel::Receiver;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use super::topic_cache::TopicCache;
use crate::{
  dds::{
    BuiltinReader, EndpointBuiltinTopicData, InstanceHandle, PublicationBuiltinTopicData,
    ReturnCode, SubscriptionBuiltinTopicData,
  },
  gid::Gid,
  guard_condition::{trigger_guard_condition, RmwGuardCondition},
  implementation::Implementation,
  names,
};

/// Topic or service names, each with the set of its type names.
pub type TopicNamesAndTypes = BTreeMap<String, BTreeSet<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
  Publisher,
  Subscriber,
}

/// Change notification of the discovery graph.
///
/// Sent on the channels of [`DiscoveryListener::graph_events`] every time the
/// graph guard condition is triggered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
  EndpointsChanged(EntityKind),
  ParticipantsChanged,
}

/// Graph guard condition together with the async subscribers of graph events.
///
/// Shared by both listeners of a node.
pub struct GraphNotifier {
  implementation: Implementation,
  graph_guard_condition: RmwGuardCondition,
  event_senders: Mutex<Vec<async_channel::Sender<GraphEvent>>>,
}

impl GraphNotifier {
  pub fn new(implementation: Implementation, graph_guard_condition: RmwGuardCondition) -> Self {
    GraphNotifier {
      implementation,
      graph_guard_condition,
      event_senders: Mutex::new(Vec::new()),
    }
  }

  pub fn graph_guard_condition(&self) -> &RmwGuardCondition {
    &self.graph_guard_condition
  }

  pub fn notify(&self, event: GraphEvent) {
    if let Err(e) = trigger_guard_condition(self.implementation, &self.graph_guard_condition) {
      error!("Failed to trigger graph guard condition: {e}");
    }
    self.send_graph_event(&event);
  }

  fn send_graph_event(&self, event: &GraphEvent) {
    let mut closed = Vec::new();
    let mut sender_array = self.event_senders.lock().unwrap();
    for (i, sender) in sender_array.iter().enumerate() {
      match sender.try_send(event.clone()) {
        Ok(()) => {}
        Err(async_channel::TrySendError::Closed(_)) => closed.push(i),
        Err(_) => {}
      }
    }

    // remove senders that reported they were closed
    for c in closed.iter().rev() {
      sender_array.swap_remove(*c);
    }
  }

  pub fn graph_events(&self) -> Receiver<GraphEvent> {
    let (sender, receiver) = async_channel::bounded(8);
    self.event_senders.lock().unwrap().push(sender);
    receiver
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
struct TopicDescriptor {
  instance_handle: InstanceHandle,
  participant: Gid,
  topic_name: String,
  type_name: String,
}

#[derive(Default)]
struct ListenerState {
  cache: TopicCache,
  descriptors: Vec<TopicDescriptor>,
}

/// Keeps the [`TopicCache`] of one endpoint kind up to date from built-in
/// topic samples, and answers graph queries from it.
///
/// All methods lock internal state, so the listener can be fed from the
/// discovery thread while user threads query it.
pub struct DiscoveryListener {
  entity_kind: EntityKind,
  state: Mutex<ListenerState>,
  notifier: Arc<GraphNotifier>,
}

impl DiscoveryListener {
  pub fn new(entity_kind: EntityKind, notifier: Arc<GraphNotifier>) -> DiscoveryListener {
    DiscoveryListener {
      entity_kind,
      state: Mutex::new(ListenerState::default()),
      notifier,
    }
  }

  pub fn entity_kind(&self) -> EntityKind {
    self.entity_kind
  }

  /// An endpoint was announced.
  pub fn add_information(
    &self,
    participant: Gid,
    instance_handle: InstanceHandle,
    topic_name: &str,
    type_name: &str,
  ) {
    let mut state = self.state.lock().unwrap();
    state.descriptors.push(TopicDescriptor {
      instance_handle,
      participant,
      topic_name: topic_name.to_owned(),
      type_name: type_name.to_owned(),
    });
    state.cache.add_topic(participant, topic_name, type_name);
  }

  /// An endpoint was disposed. Unknown handles are ignored.
  pub fn remove_information(&self, instance_handle: InstanceHandle) {
    let mut state = self.state.lock().unwrap();
    let pos = match state
      .descriptors
      .iter()
      .position(|d| d.instance_handle == instance_handle)
    {
      Some(pos) => pos,
      None => {
        debug!(
          "{:?} listener: no endpoint with {instance_handle:?} to remove",
          self.entity_kind
        );
        return;
      }
    };
    let descriptor = state.descriptors.remove(pos);
    state.cache.remove_topic(
      &descriptor.participant,
      &descriptor.topic_name,
      &descriptor.type_name,
    );
  }

  /// A participant left. Drops its topics and endpoint records.
  ///
  /// Returns false if the participant had no topics.
  pub fn remove_participant(&self, participant: &Gid) -> bool {
    let mut state = self.state.lock().unwrap();
    state.descriptors.retain(|d| d.participant != *participant);
    state.cache.remove_participant(participant)
  }

  pub fn trigger_graph_guard_condition(&self) {
    self
      .notifier
      .notify(GraphEvent::EndpointsChanged(self.entity_kind));
  }

  pub fn graph_events(&self) -> Receiver<GraphEvent> {
    self.notifier.graph_events()
  }

  /// Number of endpoints on the topic whose demangled name is `topic_name`.
  pub fn count_topic(&self, topic_name: &str) -> usize {
    let state = self.state.lock().unwrap();
    state
      .cache
      .topic_to_types()
      .iter()
      .find(|(name, _)| names::demangle_if_ros_topic(name) == topic_name)
      .map_or(0, |(_, types)| types.len())
  }

  /// Merge all known topics into `topic_names_and_types`.
  ///
  /// Unless `no_demangle` is set, only topics carrying the ROS topic prefix
  /// are included. Names are added as seen on DDS.
  pub fn fill_topic_names_and_types(
    &self,
    no_demangle: bool,
    topic_names_and_types: &mut TopicNamesAndTypes,
  ) {
    let state = self.state.lock().unwrap();
    fill_topics(
      state.cache.topic_to_types().iter(),
      no_demangle,
      topic_names_and_types,
    );
  }

  /// Like [`fill_topic_names_and_types`](Self::fill_topic_names_and_types),
  /// restricted to one participant.
  pub fn fill_topic_names_and_types_by_guid(
    &self,
    no_demangle: bool,
    topic_names_and_types: &mut TopicNamesAndTypes,
    participant: &Gid,
  ) {
    let state = self.state.lock().unwrap();
    match state.cache.topics_of(participant) {
      Some(topics) => fill_topics(topics.iter(), no_demangle, topic_names_and_types),
      None => debug!("No topics for participant {participant:?}"),
    }
  }

  /// Merge all known services into `services`, with demangled names and
  /// types.
  pub fn fill_service_names_and_types(&self, services: &mut TopicNamesAndTypes) {
    let state = self.state.lock().unwrap();
    fill_services(state.cache.topic_to_types().iter(), services);
  }

  pub fn fill_service_names_and_types_by_guid(
    &self,
    services: &mut TopicNamesAndTypes,
    participant: &Gid,
  ) {
    let state = self.state.lock().unwrap();
    match state.cache.topics_of(participant) {
      Some(topics) => fill_services(topics.iter(), services),
      None => debug!("No services for participant {participant:?}"),
    }
  }

  /// Run `f` on the cache while holding the listener lock.
  pub fn with_cache<R>(&self, f: impl FnOnce(&TopicCache) -> R) -> R {
    let state = self.state.lock().unwrap();
    f(&state.cache)
  }

  fn on_data_available<D: EndpointBuiltinTopicData>(&self, reader: &dyn BuiltinReader<D>) {
    let samples = match reader.take() {
      Ok(samples) => samples,
      Err(ReturnCode::NoData) => return,
      Err(rc) => {
        error!(
          "{:?} listener: failed to take built-in topic samples: {rc}",
          self.entity_kind
        );
        return;
      }
    };
    if samples.is_empty() {
      return;
    }

    for (data, info) in samples {
      if info.valid_data {
        let topic_name = data.fully_qualified_topic_name();
        trace!(
          "{:?} listener: endpoint {:?} on '{topic_name}'",
          self.entity_kind,
          info.instance_handle
        );
        self.add_information(
          Gid::from(data.participant_key()),
          info.instance_handle,
          &topic_name,
          data.type_name(),
        );
      } else {
        self.remove_information(info.instance_handle);
      }
    }
    self.trigger_graph_guard_condition();
  }
}

fn fill_topics<'a>(
  topics: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
  no_demangle: bool,
  topic_names_and_types: &mut TopicNamesAndTypes,
) {
  for (topic_name, types) in topics {
    if !no_demangle && names::ros_prefix_if_exists(topic_name) != names::ROS_TOPIC_PREFIX {
      continue;
    }
    topic_names_and_types
      .entry(topic_name.clone())
      .or_default()
      .extend(types.iter().cloned());
  }
}

fn fill_services<'a>(
  topics: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
  services: &mut TopicNamesAndTypes,
) {
  for (topic_name, types) in topics {
    let service_name = names::demangle_service_from_topic(topic_name);
    if service_name.is_empty() {
      continue;
    }
    for type_name in types {
      let service_type = names::demangle_service_type_only(type_name);
      if !service_type.is_empty() {
        services
          .entry(service_name.clone())
          .or_default()
          .insert(service_type);
      }
    }
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// Listener on the `DCPSPublication` built-in topic
pub struct PublicationListener(DiscoveryListener);

impl PublicationListener {
  pub fn new(notifier: Arc<GraphNotifier>) -> Self {
    PublicationListener(DiscoveryListener::new(EntityKind::Publisher, notifier))
  }

  /// Drain `reader`, update the cache, and trigger the graph guard condition
  /// once for the whole batch.
  pub fn on_data_available(&self, reader: &dyn BuiltinReader<PublicationBuiltinTopicData>) {
    self.0.on_data_available(reader)
  }
}

impl Deref for PublicationListener {
  type Target = DiscoveryListener;
  fn deref(&self) -> &DiscoveryListener {
    &self.0
  }
}

/// Listener on the `DCPSSubscription` built-in topic
pub struct SubscriptionListener(DiscoveryListener);

impl SubscriptionListener {
  pub fn new(notifier: Arc<GraphNotifier>) -> Self {
    SubscriptionListener(DiscoveryListener::new(EntityKind::Subscriber, notifier))
  }

  pub fn on_data_available(&self, reader: &dyn BuiltinReader<SubscriptionBuiltinTopicData>) {
    self.0.on_data_available(reader)
  }
}

impl Deref for SubscriptionListener {
  type Target = DiscoveryListener;
  fn deref(&self) -> &DiscoveryListener {
    &self.0
  }
}

#[cfg(test)]
mod test {
  use std::thread;

  use futures::executor::block_on;
  use rustdds::GUID;

  use super::*;
  use crate::{
    dds::SampleInfo,
    guard_condition::create_guard_condition,
    names::{MessageTypeName, ServiceTypeName},
  };

  fn notifier() -> Arc<GraphNotifier> {
    let gc = create_guard_condition(Implementation::Connext).unwrap();
    Arc::new(GraphNotifier::new(Implementation::Connext, gc))
  }

  fn handle(n: u8) -> InstanceHandle {
    InstanceHandle::from_bytes([n; 16])
  }

  fn gid(n: u8) -> Gid {
    Gid::from_bytes([n; 16])
  }

  fn publication(
    n: u8,
    participant: u8,
    partition: &str,
    topic: &str,
    type_name: &str,
  ) -> (PublicationBuiltinTopicData, SampleInfo) {
    (
      PublicationBuiltinTopicData {
        key: GUID::from_bytes([n; 16]),
        participant_key: GUID::from_bytes([participant; 16]),
        topic_name: topic.to_owned(),
        type_name: type_name.to_owned(),
        partition: vec![partition.to_owned()],
      },
      SampleInfo::valid(handle(n)),
    )
  }

  #[test]
  fn add_and_remove_by_handle() {
    let listener = DiscoveryListener::new(EntityKind::Publisher, notifier());
    listener.add_information(gid(1), handle(10), "rt/chatter", "T");
    listener.add_information(gid(1), handle(11), "rt/chatter", "T");
    assert_eq!(listener.count_topic("/chatter"), 2);

    listener.remove_information(handle(10));
    assert_eq!(listener.count_topic("/chatter"), 1);

    // unknown handle is ignored
    listener.remove_information(handle(99));
    assert_eq!(listener.count_topic("/chatter"), 1);

    listener.remove_information(handle(11));
    assert_eq!(listener.count_topic("/chatter"), 0);
    assert!(listener.with_cache(|c| c.is_empty()));
  }

  #[test]
  fn remove_participant_drops_descriptors() {
    let listener = DiscoveryListener::new(EntityKind::Subscriber, notifier());
    listener.add_information(gid(1), handle(10), "rt/a", "T");
    listener.add_information(gid(2), handle(20), "rt/a", "T");
    assert!(listener.remove_participant(&gid(1)));
    assert!(!listener.remove_participant(&gid(1)));
    assert_eq!(listener.count_topic("/a"), 1);

    // late dispose of an endpoint of the removed participant is a no-op
    listener.remove_information(handle(10));
    assert_eq!(listener.count_topic("/a"), 1);
  }

  #[test]
  fn topic_names_filtering() {
    let listener = DiscoveryListener::new(EntityKind::Publisher, notifier());
    let string_type = MessageTypeName::new("std_msgs", "String").dds_msg_type();
    listener.add_information(gid(1), handle(1), "rt/chatter", &string_type);
    listener.add_information(gid(1), handle(2), "DCPSCustom", "Custom");
    listener.add_information(gid(2), handle(3), "rt/other", &string_type);

    let mut topics = TopicNamesAndTypes::new();
    listener.fill_topic_names_and_types(false, &mut topics);
    assert_eq!(
      topics.keys().collect::<Vec<_>>(),
      vec!["rt/chatter", "rt/other"]
    );

    let mut all = TopicNamesAndTypes::new();
    listener.fill_topic_names_and_types(true, &mut all);
    assert_eq!(all.len(), 3);

    let mut by_guid = TopicNamesAndTypes::new();
    listener.fill_topic_names_and_types_by_guid(false, &mut by_guid, &gid(2));
    assert_eq!(by_guid.keys().collect::<Vec<_>>(), vec!["rt/other"]);

    let mut none = TopicNamesAndTypes::new();
    listener.fill_topic_names_and_types_by_guid(false, &mut none, &gid(7));
    assert!(none.is_empty());
  }

  #[test]
  fn service_names() {
    let listener = DiscoveryListener::new(EntityKind::Subscriber, notifier());
    let svc = ServiceTypeName::new("example_interfaces", "AddTwoInts");
    listener.add_information(gid(1), handle(1), "rq/add_two_intsRequest", &svc.dds_request_type());
    listener.add_information(
      gid(2),
      handle(2),
      "rr/ns/add_two_intsReply",
      &svc.dds_response_type(),
    );
    listener.add_information(gid(2), handle(3), "rt/chatter", "std_msgs::msg::dds_::String_");

    let mut services = TopicNamesAndTypes::new();
    listener.fill_service_names_and_types(&mut services);
    assert_eq!(services.len(), 2);
    assert!(services["/add_two_ints"].contains("example_interfaces/srv/AddTwoInts"));
    assert!(services.contains_key("/ns/add_two_ints"));

    let mut services = TopicNamesAndTypes::new();
    listener.fill_service_names_and_types_by_guid(&mut services, &gid(2));
    assert_eq!(services.keys().collect::<Vec<_>>(), vec!["/ns/add_two_ints"]);
  }

  #[test]
  fn batch_triggers_once() {
    let notifier = notifier();
    let listener = PublicationListener::new(notifier.clone());
    let events = listener.graph_events();
    let (tx, rx) = mio_extras::channel::channel();

    // nothing to take: no trigger
    listener.on_data_available(&rx);
    assert!(!notifier.graph_guard_condition().condition().trigger_value());
    assert!(events.try_recv().is_err());

    tx.send(publication(1, 1, "rt", "chatter", "T")).unwrap();
    tx.send(publication(2, 1, "rt", "chatter", "T")).unwrap();
    tx.send((publication(1, 1, "rt", "chatter", "T").0, SampleInfo::disposed(handle(1))))
      .unwrap();
    listener.on_data_available(&rx);

    assert_eq!(listener.count_topic("/chatter"), 1);
    assert!(notifier.graph_guard_condition().condition().trigger_value());
    assert_eq!(
      events.try_recv(),
      Ok(GraphEvent::EndpointsChanged(EntityKind::Publisher))
    );
    assert!(events.try_recv().is_err());
  }

  // A reader that reports success with nothing in it.
  struct EmptyReader;

  impl<D> BuiltinReader<D> for EmptyReader {
    fn take(&self) -> Result<Vec<(D, SampleInfo)>, ReturnCode> {
      Ok(Vec::new())
    }
  }

  #[test]
  fn empty_batch_does_not_trigger() {
    let notifier = notifier();
    let publications = PublicationListener::new(notifier.clone());
    let subscriptions = SubscriptionListener::new(notifier.clone());
    let events = notifier.graph_events();

    publications.on_data_available(&EmptyReader);
    subscriptions.on_data_available(&EmptyReader);

    assert!(!notifier.graph_guard_condition().condition().trigger_value());
    assert!(events.try_recv().is_err());
  }

  #[test]
  fn closed_event_receivers_are_dropped() {
    let notifier = notifier();
    let kept = notifier.graph_events();
    drop(notifier.graph_events());
    notifier.notify(GraphEvent::ParticipantsChanged);
    assert_eq!(notifier.event_senders.lock().unwrap().len(), 1);
    assert_eq!(block_on(kept.recv()), Ok(GraphEvent::ParticipantsChanged));
  }

  #[test]
  fn concurrent_feed_and_query() {
    let listener = Arc::new(DiscoveryListener::new(EntityKind::Publisher, notifier()));
    let writer = {
      let listener = listener.clone();
      thread::spawn(move || {
        for i in 0..200u8 {
          listener.add_information(gid(i % 4), handle(i), "rt/busy", "T");
        }
        for i in 0..200u8 {
          listener.remove_information(handle(i));
        }
      })
    };
    for _ in 0..200 {
      let n = listener.count_topic("/busy");
      assert!(n <= 200);
      let mut topics = TopicNamesAndTypes::new();
      listener.fill_topic_names_and_types(false, &mut topics);
    }
    writer.join().unwrap();
    assert_eq!(listener.count_topic("/busy"), 0);
  }
}
