//! Shared helpers for sync engine integration tests.
//!
//! - [`directory`] - scripted in-process directory client that records every call
//! - [`links`] - link store wrapper with switchable failures
//! - [`fixtures`] - providers, objects and evaluators used across test files

#![allow(dead_code)]

pub mod directory;
pub mod fixtures;
pub mod links;

pub use directory::{Call, MockDirectory};
pub use fixtures::*;
pub use links::FaultyLinkStore;

use directory_sync::events::{ChannelEventSink, SyncEvent};
use directory_sync::{SyncClient, SyncConfig};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything a sync client test needs to observe.
pub struct Harness {
    pub client: SyncClient<MockDirectory, FaultyLinkStore>,
    pub directory: MockDirectory,
    pub links: FaultyLinkStore,
    pub events: UnboundedReceiver<SyncEvent>,
}

impl Harness {
    pub fn new(provider: directory_sync::Provider) -> Self {
        Self::with_config(provider, SyncConfig::default())
    }

    pub fn with_config(provider: directory_sync::Provider, config: SyncConfig) -> Self {
        let directory = MockDirectory::new();
        let links = FaultyLinkStore::new();
        let (sink, events) = ChannelEventSink::new();
        let client = SyncClient::builder(provider, directory.clone(), links.clone())
            .with_config(config)
            .with_evaluator(literal_evaluator())
            .with_event_sink(Arc::new(sink))
            .build()
            .expect("valid test configuration");

        Self {
            client,
            directory,
            links,
            events,
        }
    }

    /// Drain every event recorded so far.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
