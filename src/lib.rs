pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{Error, Result};

use crate::database::postgres::PgAttemptStore;
use crate::services::attempt_service::AttemptService;
use crate::services::grading_service::GradingPolicy;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub attempt_service: AttemptService<PgAttemptStore>,
}

impl AppState {
    pub fn new(pool: PgPool, policy: GradingPolicy) -> Self {
        let attempt_service = AttemptService::new(PgAttemptStore::new(pool.clone()), policy);

        Self {
            pool,
            attempt_service,
        }
    }
}
