//! Mapping between ROS 2 names and the names seen on DDS.
//!
//! * Node names, e.g. `/turtlesim` in namespace `/`
//! * Topic and service names, e.g. `/chatter` is carried on DDS topic
//!   `rt/chatter`, and service `/add_two_ints` on `rq/add_two_intsRequest`
//!   and `rr/add_two_intsReply`
//! * Message and service types, e.g. `std_msgs/msg/String` is the DDS type
//!   `std_msgs::msg::dds_::String_`
//!
//! See [topic and service name mapping to DDS](https://design.ros2.org/articles/topic_and_service_names.html)

use std::fmt;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

pub const ROS_TOPIC_PREFIX: &str = "rt";
pub const ROS_SERVICE_REQUESTER_PREFIX: &str = "rq";
pub const ROS_SERVICE_RESPONSE_PREFIX: &str = "rr";
pub const ROS_PARAMETER_PREFIX: &str = "rp";
pub const ROS_ACTION_PREFIX: &str = "ra";
pub const ROS_TOPIC_PUBLISHER_PREFIX: &str = "rs";

pub const ROS_PREFIXES: [&str; 6] = [
  ROS_TOPIC_PREFIX,
  ROS_SERVICE_REQUESTER_PREFIX,
  ROS_SERVICE_RESPONSE_PREFIX,
  ROS_TOPIC_PUBLISHER_PREFIX,
  ROS_PARAMETER_PREFIX,
  ROS_ACTION_PREFIX,
];

const REQUEST_TOPIC_SUFFIX: &str = "Request";
const REPLY_TOPIC_SUFFIX: &str = "Reply";

/// Names for Nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName {
  namespace: String,
  base_name: String,
}

impl NodeName {
  pub fn new(namespace: &str, base_name: &str) -> Result<NodeName, NameError> {
    match base_name.chars().next() {
      None => return Err(NameError::Empty),
      Some(c) if c.is_ascii_alphabetic() || c == '_' => { /*ok*/ }
      Some(other) => return Err(NameError::BadChar(other)),
    }

    if let Some(bad) = base_name
      .chars()
      .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
      return Err(NameError::BadChar(bad));
    }

    // Node namespaces are absolute.
    match namespace.chars().next() {
      None => return Err(NameError::Empty),
      Some('/') => { /*ok*/ }
      Some(other) => return Err(NameError::BadChar(other)),
    }

    if let Some(bad) = namespace
      .chars()
      .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '/'))
    {
      return Err(NameError::BadChar(bad));
    }

    if (namespace.ends_with('/') && namespace != "/") || namespace.contains("//") {
      return Err(NameError::BadSlash(
        namespace.to_owned(),
        base_name.to_owned(),
      ));
    }

    Ok(NodeName {
      namespace: namespace.to_owned(),
      base_name: base_name.to_owned(),
    })
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }
  pub fn base_name(&self) -> &str {
    &self.base_name
  }

  pub fn fully_qualified_name(&self) -> String {
    let mut fqn = self.namespace.clone();
    if !fqn.ends_with('/') {
      fqn.push('/');
    }
    fqn.push_str(&self.base_name);
    fqn
  }
}

impl fmt::Display for NodeName {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.fully_qualified_name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
  Empty,
  BadChar(char),
  BadSlash(String, String),
}

impl fmt::Display for NameError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      NameError::Empty => write!(f, "Name must not be empty"),
      NameError::BadChar(c) => write!(f, "Bad characters in name: {c:?}"),
      NameError::BadSlash(ns, n) => write!(
        f,
        "Invalid placement of separator slashes. namespace={ns} name={n}"
      ),
    }
  }
}

impl std::error::Error for NameError {}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// Name of a `.msg` type, e.g. `std_msgs/msg/String`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTypeName {
  ros2_package_name: String,
  ros2_type_name: String,
}

impl MessageTypeName {
  pub fn new(package_name: &str, type_name: &str) -> Self {
    MessageTypeName {
      ros2_package_name: package_name.to_owned(),
      ros2_type_name: type_name.to_owned(),
    }
  }

  pub fn package_name(&self) -> &str {
    self.ros2_package_name.as_str()
  }

  pub fn type_name(&self) -> &str {
    self.ros2_type_name.as_str()
  }

  /// Convert to type name used over DDS
  pub fn dds_msg_type(&self) -> String {
    slash_to_colons(self.ros2_package_name.clone() + "/msg/dds_/" + &self.ros2_type_name + "_")
  }
}

impl fmt::Display for MessageTypeName {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/msg/{}", self.ros2_package_name, self.ros2_type_name)
  }
}

fn slash_to_colons(s: String) -> String {
  s.replace('/', "::")
}

fn colons_to_slash(s: &str) -> String {
  s.replace("::", "/")
}

/// Similar to [`MessageTypeName`], but names a Service type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTypeName {
  msg: MessageTypeName,
}

impl ServiceTypeName {
  pub fn new(package_name: &str, type_name: &str) -> Self {
    ServiceTypeName {
      msg: MessageTypeName::new(package_name, type_name),
    }
  }

  pub fn package_name(&self) -> &str {
    self.msg.package_name()
  }

  pub fn type_name(&self) -> &str {
    self.msg.type_name()
  }

  pub fn dds_request_type(&self) -> String {
    slash_to_colons(
      self.package_name().to_owned() + "/srv/dds_/" + self.type_name() + "_Request_",
    )
  }

  pub fn dds_response_type(&self) -> String {
    slash_to_colons(
      self.package_name().to_owned() + "/srv/dds_/" + self.type_name() + "_Response_",
    )
  }
}

impl fmt::Display for ServiceTypeName {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}/srv/{}", self.package_name(), self.type_name())
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

/// The ROS prefix of a DDS topic name, or `""` if there is none.
///
/// A prefix only counts when it is followed by a slash, so `rtopic` has none.
pub fn ros_prefix_if_exists(topic_name: &str) -> &'static str {
  ROS_PREFIXES
    .iter()
    .find(|prefix| {
      topic_name
        .strip_prefix(*prefix)
        .map_or(false, |rest| rest.starts_with('/'))
    })
    .copied()
    .unwrap_or("")
}

/// `rt/chatter` becomes `/chatter`. Names without a ROS prefix are returned
/// unchanged.
pub fn demangle_if_ros_topic(topic_name: &str) -> String {
  let prefix = ros_prefix_if_exists(topic_name);
  topic_name[prefix.len()..].to_owned()
}

/// `std_msgs::msg::dds_::String_` becomes `std_msgs/msg/String`. Anything that
/// does not look like a ROS message type is returned unchanged.
pub fn demangle_if_ros_type(dds_type_name: &str) -> String {
  const NS_MARKER: &str = "::msg::dds_::";

  if !dds_type_name.ends_with('_') {
    return dds_type_name.to_owned();
  }
  let marker_pos = match dds_type_name.find(NS_MARKER) {
    Some(pos) => pos,
    None => return dds_type_name.to_owned(),
  };
  let package = colons_to_slash(&dds_type_name[..marker_pos]);
  let start = marker_pos + NS_MARKER.len();
  if start >= dds_type_name.len() {
    return dds_type_name.to_owned();
  }
  let type_name = &dds_type_name[start..dds_type_name.len() - 1];
  format!("{package}/msg/{type_name}")
}

/// Service name from the fully qualified name of a request or reply topic.
///
/// `rq/add_two_intsRequest` and `rr/add_two_intsReply` both become
/// `/add_two_ints`. Returns `""` for anything that is not a service topic.
pub fn demangle_service_from_topic(topic_name: &str) -> String {
  let prefix = ros_prefix_if_exists(topic_name);
  let suffix = match prefix {
    ROS_SERVICE_REQUESTER_PREFIX => REQUEST_TOPIC_SUFFIX,
    ROS_SERVICE_RESPONSE_PREFIX => REPLY_TOPIC_SUFFIX,
    _ => return String::new(),
  };
  match topic_name.rfind(suffix) {
    Some(pos) if pos + suffix.len() == topic_name.len() && pos >= prefix.len() => {
      topic_name[prefix.len()..pos].to_owned()
    }
    Some(_) => {
      warn!(
        "Service topic '{topic_name}' has the service prefix and a suffix, but not at the end"
      );
      String::new()
    }
    None => {
      warn!("Service topic '{topic_name}' has the service prefix but no suffix");
      String::new()
    }
  }
}

/// `example_interfaces::srv::dds_::AddTwoInts_Request_` becomes
/// `example_interfaces/srv/AddTwoInts`. Returns `""` for anything that is not
/// a ROS service request or response type.
pub fn demangle_service_type_only(dds_type_name: &str) -> String {
  const NS_MARKER: &str = "::srv::dds_::";

  let marker_pos = match dds_type_name.find(NS_MARKER) {
    Some(pos) => pos,
    None => return String::new(),
  };
  let start = marker_pos + NS_MARKER.len();
  let type_name = match ["_Response_", "_Request_"]
    .iter()
    .find_map(|suffix| dds_type_name.strip_suffix(suffix))
  {
    Some(without_suffix) if without_suffix.len() > start => &without_suffix[start..],
    Some(_) => return String::new(),
    None => {
      warn!("Service type '{dds_type_name}' does not end in _Request_ or _Response_");
      return String::new();
    }
  };
  let package = colons_to_slash(&dds_type_name[..marker_pos]);
  format!("{package}/srv/{type_name}")
}

/// DDS topic name for ROS topic `topic_name`.
///
/// With `avoid_ros_namespace_conventions` the name is used as is.
pub fn process_topic_name(topic_name: &str, avoid_ros_namespace_conventions: bool) -> String {
  if avoid_ros_namespace_conventions {
    topic_name.to_owned()
  } else {
    format!("{ROS_TOPIC_PREFIX}{topic_name}")
  }
}

/// DDS topic and partition names used for one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTopicNames {
  pub request_topic: String,
  pub response_topic: String,
  pub request_partition: Option<String>,
  pub response_partition: Option<String>,
}

impl ServiceTopicNames {
  pub fn fully_qualified_request_topic(&self) -> String {
    join_partition(&self.request_partition, &self.request_topic)
  }
  pub fn fully_qualified_response_topic(&self) -> String {
    join_partition(&self.response_partition, &self.response_topic)
  }
}

fn join_partition(partition: &Option<String>, topic: &str) -> String {
  match partition {
    Some(p) => format!("{p}/{topic}"),
    None => topic.to_owned(),
  }
}

/// Split ROS service name into the DDS request/reply topics and partitions.
///
/// The last name component becomes the topic, the namespace part goes into
/// the partition behind the `rq` / `rr` prefix.
pub fn process_service_name(
  service_name: &str,
  avoid_ros_namespace_conventions: bool,
) -> ServiceTopicNames {
  let trimmed = service_name.trim_start_matches('/');
  let (namespace, base_name) = match trimmed.rsplit_once('/') {
    Some((ns, base)) => (Some(ns), base),
    None => (None, trimmed),
  };

  let partition = |prefix: &str| match (avoid_ros_namespace_conventions, namespace) {
    (true, ns) => ns.map(str::to_owned),
    (false, Some(ns)) => Some(format!("{prefix}/{ns}")),
    (false, None) => Some(prefix.to_owned()),
  };

  ServiceTopicNames {
    request_topic: format!("{base_name}{REQUEST_TOPIC_SUFFIX}"),
    response_topic: format!("{base_name}{REPLY_TOPIC_SUFFIX}"),
    request_partition: partition(ROS_SERVICE_REQUESTER_PREFIX),
    response_partition: partition(ROS_SERVICE_RESPONSE_PREFIX),
  }
}

// -------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------

#[test]
fn test_node_name() {
  assert!(NodeName::new("/", "talker").is_ok());
  assert!(NodeName::new("/ns/sub", "_talker2").is_ok());
  assert_eq!(NodeName::new("/", ""), Err(NameError::Empty));
  assert_eq!(NodeName::new("", "talker"), Err(NameError::Empty));
  assert_eq!(NodeName::new("/", "2talker"), Err(NameError::BadChar('2')));
  assert_eq!(NodeName::new("ns", "talker"), Err(NameError::BadChar('n')));
  assert_eq!(NodeName::new("/", "tal-ker"), Err(NameError::BadChar('-')));
  assert!(NodeName::new("/ns/", "talker").is_err());
  assert!(NodeName::new("/a//b", "talker").is_err());

  assert_eq!(
    NodeName::new("/", "talker").unwrap().fully_qualified_name(),
    "/talker"
  );
  assert_eq!(
    NodeName::new("/ns", "talker").unwrap().fully_qualified_name(),
    "/ns/talker"
  );
}

#[test]
fn test_ros_prefix() {
  assert_eq!(ros_prefix_if_exists("rt/chatter"), "rt");
  assert_eq!(ros_prefix_if_exists("rq/add_two_intsRequest"), "rq");
  assert_eq!(ros_prefix_if_exists("rr/ns/add_two_intsReply"), "rr");
  assert_eq!(ros_prefix_if_exists("ra/fibonacci"), "ra");
  assert_eq!(ros_prefix_if_exists("rtopic"), "");
  assert_eq!(ros_prefix_if_exists("/chatter"), "");
  assert_eq!(ros_prefix_if_exists(""), "");
}

#[test]
fn test_demangle_topic() {
  assert_eq!(demangle_if_ros_topic("rt/chatter"), "/chatter");
  assert_eq!(demangle_if_ros_topic("rt/ns/chatter"), "/ns/chatter");
  assert_eq!(demangle_if_ros_topic("DCPSPublication"), "DCPSPublication");
}

#[test]
fn test_demangle_type() {
  assert_eq!(
    demangle_if_ros_type("std_msgs::msg::dds_::String_"),
    "std_msgs/msg/String"
  );
  assert_eq!(
    demangle_if_ros_type(&MessageTypeName::new("geometry_msgs", "Twist").dds_msg_type()),
    "geometry_msgs/msg/Twist"
  );
  assert_eq!(demangle_if_ros_type("MyPlainType"), "MyPlainType");
  assert_eq!(demangle_if_ros_type("foo::Bar_"), "foo::Bar_");
}

#[test]
fn test_demangle_service() {
  assert_eq!(
    demangle_service_from_topic("rq/add_two_intsRequest"),
    "/add_two_ints"
  );
  assert_eq!(
    demangle_service_from_topic("rr/add_two_intsReply"),
    "/add_two_ints"
  );
  assert_eq!(
    demangle_service_from_topic("rq/ns/add_two_intsRequest"),
    "/ns/add_two_ints"
  );
  assert_eq!(demangle_service_from_topic("rt/chatter"), "");
  assert_eq!(demangle_service_from_topic("rq/add_two_ints"), "");
  assert_eq!(demangle_service_from_topic("rq/RequestFoo"), "");
  assert_eq!(demangle_service_from_topic("rr/add_two_intsRequest"), "");

  let svc = ServiceTypeName::new("example_interfaces", "AddTwoInts");
  assert_eq!(
    demangle_service_type_only(&svc.dds_request_type()),
    "example_interfaces/srv/AddTwoInts"
  );
  assert_eq!(
    demangle_service_type_only(&svc.dds_response_type()),
    "example_interfaces/srv/AddTwoInts"
  );
  assert_eq!(demangle_service_type_only("std_msgs::msg::dds_::String_"), "");
  assert_eq!(
    demangle_service_type_only("example_interfaces::srv::dds_::AddTwoInts"),
    ""
  );
}

#[test]
fn test_process_names() {
  assert_eq!(process_topic_name("/chatter", false), "rt/chatter");
  assert_eq!(process_topic_name("/chatter", true), "/chatter");

  let names = process_service_name("/add_two_ints", false);
  assert_eq!(names.request_topic, "add_two_intsRequest");
  assert_eq!(names.response_partition.as_deref(), Some("rr"));
  assert_eq!(
    demangle_service_from_topic(&names.fully_qualified_request_topic()),
    "/add_two_ints"
  );

  let names = process_service_name("/ns/add_two_ints", false);
  assert_eq!(names.request_partition.as_deref(), Some("rq/ns"));
  assert_eq!(
    demangle_service_from_topic(&names.fully_qualified_response_topic()),
    "/ns/add_two_ints"
  );

  let names = process_service_name("/add_two_ints", true);
  assert_eq!(names.request_partition, None);
  assert_eq!(names.fully_qualified_request_topic(), "add_two_intsRequest");
}
