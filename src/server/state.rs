use axum::extract::FromRef;

use crate::catalog_store::{CatalogStore, RatingStore};
use crate::ratings::RatingService;
use crate::user::UserManager;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedRatingStore = Arc<dyn RatingStore>;
pub type GuardedRatingService = Arc<RatingService>;
pub type GuardedUserManager = Arc<Mutex<UserManager>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog_store: GuardedCatalogStore,
    pub rating_store: GuardedRatingStore,
    pub rating_service: GuardedRatingService,
    pub user_manager: GuardedUserManager,
    pub version: &'static str,
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRatingStore {
    fn from_ref(input: &ServerState) -> Self {
        input.rating_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRatingService {
    fn from_ref(input: &ServerState) -> Self {
        input.rating_service.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
