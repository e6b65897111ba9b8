pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::postgres::PgStore;
use crate::middleware::auth::JwtVerifier;
use crate::services::{application_service::ApplicationService, storage_service::ResumeStorage};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub application_service: ApplicationService,
    pub resume_storage: ResumeStorage,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let store = Arc::new(PgStore::new(pool));
        let application_service = ApplicationService::new(store.clone(), store.clone(), store);

        Self {
            application_service,
            resume_storage: ResumeStorage::new(&config.uploads_dir),
            jwt: JwtVerifier::new(&config.jwt_secret),
        }
    }

    pub fn from_parts(
        application_service: ApplicationService,
        resume_storage: ResumeStorage,
        jwt: JwtVerifier,
    ) -> Self {
        Self {
            application_service,
            resume_storage,
            jwt,
        }
    }
}
