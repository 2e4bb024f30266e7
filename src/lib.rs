//! ROS 2 middleware (rmw) layer over RTI Connext DDS
//!
//! This crate keeps track of the ROS graph as seen through the DDS built-in
//! discovery topics, and bridges the rmw wait primitive onto DDS wait sets.
//!
//! # Example
//!
//! ```
//! use rmw_connext::{
//!   dds::ReadCondition, graph, guard_condition, wait, Implementation, NodeOptions,
//! };
//!
//! struct Subscription(ReadCondition);
//!
//! impl wait::HasReadCondition for Subscription {
//!   fn read_condition(&self) -> Option<&ReadCondition> {
//!     Some(&self.0)
//!   }
//! }
//!
//! let implementation = Implementation::Connext;
//! let node = rmw_connext::create_node(implementation, "talker", "/", NodeOptions::new()).unwrap();
//!
//! // The node always knows itself.
//! let names = graph::get_node_names(implementation, &node).unwrap();
//! assert_eq!(names, vec![("talker".to_string(), "/".to_string())]);
//!
//! // Wake a wait through a guard condition.
//! let gc = guard_condition::create_guard_condition(implementation).unwrap();
//! guard_condition::trigger_guard_condition(implementation, &gc).unwrap();
//! let mut wait_set = wait::create_wait_set(implementation, 0).unwrap();
//! let mut guards = [Some(gc.condition())];
//! let result = wait::wait::<Subscription, Subscription, Subscription>(
//!   implementation,
//!   &mut [],
//!   &mut guards,
//!   &mut [],
//!   &mut [],
//!   &mut wait_set,
//!   None,
//! )
//! .unwrap();
//! assert_eq!(result, wait::WaitResult::Ready);
//! assert!(guards[0].is_some());
//! ```

/// DDS entities and value types used by this layer
pub mod dds;
/// Built-in topic listeners and the topic cache
pub mod discovery;
pub mod error;
pub mod event;
pub mod gid;
/// Graph introspection queries
pub mod graph;
pub mod guard_condition;
pub mod implementation;
/// ROS names and their DDS mangling
pub mod names;
pub mod node;
pub mod wait;

pub use error::{RetCode, RmwError, RmwResult};
pub use gid::Gid;
pub use implementation::Implementation;
pub use node::{create_node, destroy_node, NodeOptions, RmwNode};
