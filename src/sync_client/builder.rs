//! Builder for [`SyncClient`] instances.

use crate::config::{ConfigError, SyncConfig};
use crate::directory::DirectoryClient;
use crate::events::{EventSink, LogEventSink, TransientLogLimiter};
use crate::mapping::{MappingEvaluator, RhaiMappingEvaluator};
use crate::provider::Provider;
use crate::schema::SchemaBuilder;
use crate::storage::LinkStore;
use crate::sync_client::SyncClient;
use std::sync::Arc;

/// Assembles a [`SyncClient`] for one provider.
///
/// Only the provider, the directory client and the link table are required.
/// Everything else defaults: [`SyncConfig::default`], a [`RhaiMappingEvaluator`]
/// bounded by the config's evaluator limits, and a [`LogEventSink`].
pub struct SyncClientBuilder<D, L> {
    provider: Provider,
    directory: D,
    links: L,
    config: SyncConfig,
    evaluator: Option<Arc<dyn MappingEvaluator>>,
    events: Option<Arc<dyn EventSink>>,
    transient_log: Option<Arc<TransientLogLimiter>>,
}

impl<D, L> SyncClientBuilder<D, L>
where
    D: DirectoryClient,
    L: LinkStore + Clone + 'static,
{
    pub fn new(provider: Provider, directory: D, links: L) -> Self {
        Self {
            provider,
            directory,
            links,
            config: SyncConfig::default(),
            evaluator: None,
            events: None,
            transient_log: None,
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn MappingEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a transient-failure limiter between clients of the same provider,
    /// e.g. the user and group clients.
    pub fn with_transient_log_limiter(mut self, limiter: Arc<TransientLogLimiter>) -> Self {
        self.transient_log = Some(limiter);
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<SyncClient<D, L>, ConfigError> {
        self.config.validate()?;
        if self.provider.id.trim().is_empty() {
            return Err(ConfigError::invalid("provider.id", "must not be empty"));
        }

        let config = Arc::new(self.config);
        let evaluator = self.evaluator.unwrap_or_else(|| {
            Arc::new(RhaiMappingEvaluator::with_limits(config.evaluator.clone()))
                as Arc<dyn MappingEvaluator>
        });
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(LogEventSink) as Arc<dyn EventSink>);
        let transient_log = self
            .transient_log
            .unwrap_or_else(|| Arc::new(TransientLogLimiter::new(config.transient_log_interval())));

        Ok(SyncClient {
            schema: SchemaBuilder::new(evaluator, events.clone(), config.clone()),
            provider: Arc::new(self.provider),
            directory: self.directory,
            links: self.links,
            events,
            config,
            transient_log,
        })
    }
}
