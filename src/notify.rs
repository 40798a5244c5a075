use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::key::ObjectKey;
use crate::registry::{CacheControl, CacheRegistry};

/// What a change notification asks the receiving cache to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    Invalidate,
    Clear,
}

/// Change notification for one entity, as published by the reference-data
/// maintenance pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheNotification {
    pub entity: String,
    pub action: NotifyAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ObjectKey>,
}

/// Handles notifications for one entity.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: CacheNotification);

    /// Entity name this handler consumes.
    fn entity(&self) -> &str;
}

/// Default handler: translates a notification into an invalidation or clear
/// on the cache it wraps.
pub struct InvalidationHandler {
    control: Arc<dyn CacheControl>,
}

impl InvalidationHandler {
    pub fn new(control: Arc<dyn CacheControl>) -> Self {
        Self { control }
    }
}

#[async_trait]
impl NotificationHandler for InvalidationHandler {
    async fn handle(&self, notification: CacheNotification) {
        match notification.action {
            NotifyAction::Invalidate => match &notification.key {
                Some(key) => {
                    let removed = self.control.invalidate_object(key);
                    debug!(
                        entity = %notification.entity,
                        key = %key,
                        removed,
                        "processed invalidation notification"
                    );
                }
                None => {
                    warn!(entity = %notification.entity, "invalidation without a key ignored");
                }
            },
            NotifyAction::Clear => {
                let removed = self.control.clear();
                debug!(entity = %notification.entity, removed, "processed clear notification");
            }
        }
    }

    fn entity(&self) -> &str {
        self.control.name()
    }
}

/// Fans incoming change notifications out to per-entity handlers.
pub struct NotificationDispatcher {
    handlers: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A dispatcher with one [`InvalidationHandler`] per cache currently in
    /// the registry.
    pub fn for_registry(registry: &CacheRegistry) -> Self {
        let mut dispatcher = Self::new();
        for name in registry.names() {
            if let Some(control) = registry.get(&name) {
                dispatcher.register_handler(Arc::new(InvalidationHandler::new(control)));
            }
        }
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.insert(handler.entity().to_string(), handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Routes one notification; entities without a handler are dropped.
    pub async fn dispatch(&self, notification: CacheNotification) {
        match self.handlers.get(&notification.entity) {
            Some(handler) => handler.handle(notification).await,
            None => {
                debug!(
                    entity = %notification.entity,
                    "no handler registered; notification dropped"
                );
            }
        }
    }

    /// Parses a JSON payload and dispatches it; malformed payloads are
    /// logged and dropped.
    pub async fn process_payload(&self, payload: &str) {
        match serde_json::from_str::<CacheNotification>(payload) {
            Ok(notification) => self.dispatch(notification).await,
            Err(err) => {
                error!(error = %err, "failed to parse notification payload");
                debug!(payload, "offending payload");
            }
        }
    }

    /// Drains a notification channel until every sender is gone.
    pub async fn run(&self, mut notifications: mpsc::Receiver<CacheNotification>) {
        while let Some(notification) = notifications.recv().await {
            self.dispatch(notification).await;
        }
        debug!("notification channel closed");
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
