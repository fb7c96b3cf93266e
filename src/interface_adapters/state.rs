use crate::domain::SyncTuning;
use crate::use_cases::ObjectRegistry;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    // Active replicated objects and their tasks.
    pub object_registry: Arc<ObjectRegistry>,
    // Object used when a connection does not name one.
    pub default_object_id: Arc<str>,
    // Tuning handed to every node on connect.
    pub tuning: SyncTuning,
}
