use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::payments::PaymentGateway;
use crate::services::tracking::ErrorTracker;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub tracker: Box<dyn ErrorTracker>,
    pub payments: Box<dyn PaymentGateway>,
}

impl AppState {
    /// Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow!("database lock poisoned")))
    }
}
