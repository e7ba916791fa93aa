// src/ingest/providers/mod.rs
pub mod cloud;
pub mod starlink;
pub mod windows;

use std::sync::Arc;

use crate::ingest::types::{Topic, TopicProfile};

/// Built-in profile for a topic.
pub fn profile_for(topic: Topic) -> Arc<dyn TopicProfile> {
    match topic {
        Topic::Windows => Arc::new(windows::WindowsTopic::new()),
        Topic::Cloud => Arc::new(cloud::CloudTopic::new()),
        Topic::Starlink => Arc::new(starlink::StarlinkTopic::new()),
    }
}
