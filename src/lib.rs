//! Contract approval workflow service

pub mod api;
pub mod audit;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod permissions;
pub mod store;
pub mod workflow;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::engine::ContractEngine;
use crate::notify::NotificationDispatcher;
use crate::permissions::StaticPermissionTable;

/// Application state shared across handlers
pub struct AppState {
    pub engine: ContractEngine,
}

impl AppState {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn NotificationDispatcher>) -> Arc<Self> {
        Arc::new(Self {
            engine: ContractEngine::new(pool, Arc::new(StaticPermissionTable), notifier),
        })
    }
}
