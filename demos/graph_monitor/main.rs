use std::{sync::Arc, thread, time::Duration};

use log::{error, info};
use rmw_connext::{
  create_node,
  dds::{
    InstanceHandle, ParticipantBuiltinTopicData, PublicationBuiltinTopicData, ReadCondition,
    SampleInfo, SubscriptionBuiltinTopicData,
  },
  graph,
  names::MessageTypeName,
  wait::{self, HasReadCondition, RmwTime, WaitResult},
  Implementation, NodeOptions, RmwNode,
};
use rustdds::GUID;

const IMPL: Implementation = Implementation::Connext;

// The monitor waits on nothing but the graph guard condition.
struct NoEntity;

impl HasReadCondition for NoEntity {
  fn read_condition(&self) -> Option<&ReadCondition> {
    None
  }
}

fn main() {
  pretty_env_logger::init();

  let node = Arc::new(create_node(IMPL, "graph_monitor", "/", NodeOptions::new()).unwrap());
  println!(">>> graph_monitor node {} started", node.node_name());

  let events = node.graph_events();
  let event_printer = thread::spawn(move || {
    while let Ok(event) = futures::executor::block_on(events.recv()) {
      println!(">>> graph event: {event:?}");
    }
  });

  let discovery = {
    let node = node.clone();
    thread::spawn(move || simulate_discovery(&node))
  };

  let mut wait_set = wait::create_wait_set(IMPL, 1).unwrap();
  loop {
    let mut guards = [Some(node.graph_guard_condition().condition())];
    let result = wait::wait::<NoEntity, NoEntity, NoEntity>(
      IMPL,
      &mut [],
      &mut guards,
      &mut [],
      &mut [],
      &mut wait_set,
      Some(RmwTime::from_millis(1000)),
    );
    match result {
      Ok(WaitResult::Ready) => print_graph(&node),
      Ok(WaitResult::Timeout) => {
        info!("Graph quiet for a second, exiting");
        break;
      }
      Err(e) => {
        error!("wait failed: {e}");
        break;
      }
    }
  }

  discovery.join().unwrap();
  wait::destroy_wait_set(IMPL, wait_set).unwrap();
  // Dropping the node closes the graph event channel.
  match Arc::try_unwrap(node) {
    Ok(node) => rmw_connext::destroy_node(IMPL, node).unwrap(),
    Err(_) => error!("node still shared at exit"),
  }
  event_printer.join().unwrap();
}

fn print_graph(node: &RmwNode) {
  let topics = graph::get_topic_names_and_types(IMPL, node, false).unwrap();
  for (name, types) in topics.iter() {
    let publishers = graph::count_publishers(IMPL, node, name).unwrap();
    let subscribers = graph::count_subscribers(IMPL, node, name).unwrap();
    println!(">>> topic {name} {types:?} pub={publishers} sub={subscribers}");
  }
  for (name, namespace) in graph::get_node_names(IMPL, node).unwrap() {
    println!(">>> node {name} in {namespace}");
  }
}

// Plays the part of the vendor discovery thread.
fn simulate_discovery(node: &RmwNode) {
  let remote = GUID::from_bytes([7; 16]);
  let type_name = MessageTypeName::new("std_msgs", "String").dds_msg_type();

  let (participants, participant_reader) = mio_extras::channel::channel();
  let (publications, publication_reader) = mio_extras::channel::channel();
  let (subscriptions, subscription_reader) = mio_extras::channel::channel();

  thread::sleep(Duration::from_millis(100));
  participants
    .send((
      ParticipantBuiltinTopicData {
        key: remote,
        user_data: b"name=listener;namespace=/demo;".to_vec(),
      },
      SampleInfo::valid(InstanceHandle::from_guid(remote)),
    ))
    .unwrap();
  node.on_participant_data(&participant_reader);

  thread::sleep(Duration::from_millis(100));
  publications
    .send((
      PublicationBuiltinTopicData {
        key: GUID::from_bytes([8; 16]),
        participant_key: node.participant().guid(),
        topic_name: "chatter".to_string(),
        type_name: type_name.clone(),
        partition: vec!["rt".to_string()],
      },
      SampleInfo::valid(InstanceHandle::from_bytes([8; 16])),
    ))
    .unwrap();
  node.publication_listener().on_data_available(&publication_reader);

  thread::sleep(Duration::from_millis(100));
  subscriptions
    .send((
      SubscriptionBuiltinTopicData {
        key: GUID::from_bytes([9; 16]),
        participant_key: remote,
        topic_name: "chatter".to_string(),
        type_name,
        partition: vec!["rt".to_string()],
      },
      SampleInfo::valid(InstanceHandle::from_bytes([9; 16])),
    ))
    .unwrap();
  node.subscription_listener().on_data_available(&subscription_reader);

  thread::sleep(Duration::from_millis(300));
  participants
    .send((
      ParticipantBuiltinTopicData {
        key: remote,
        user_data: Vec::new(),
      },
      SampleInfo::disposed(InstanceHandle::from_guid(remote)),
    ))
    .unwrap();
  node.on_participant_data(&participant_reader);
}
