//! Discovery graph: what topics and services exist, and who offers them.
//!
//! The built-in topic listeners feed a [`TopicCache`] each, and trigger the
//! node's graph guard condition when the graph changes.

mod listener;
mod topic_cache;

pub use listener::{
  DiscoveryListener, EntityKind, GraphEvent, GraphNotifier, PublicationListener,
  SubscriptionListener, TopicNamesAndTypes,
};
pub use topic_cache::{TopicCache, TopicsTypes};
