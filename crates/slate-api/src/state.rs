//! Application state.

use std::sync::Arc;

use anyhow::Context;

use slate_firestore::{
    FirestoreClient, FirestoreResponseCache, ProjectRepository, SceneRepository, ScheduleRepository,
};

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;
use crate::services::{
    BuilderConfig, GeminiConfig, GeminiPlanner, PlannerConfig, ScheduleBuilder, SchedulePlanner,
    ScheduleStores, ScheduleViewService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub builder: Arc<ScheduleBuilder>,
    pub schedules: Arc<ScheduleViewService>,
    pub auth: Arc<TokenVerifier>,
    /// Probed by `/ready`; absent when running on non-Firestore stores.
    pub firestore: Option<FirestoreClient>,
}

impl AppState {
    /// Create state backed by Firestore and Gemini.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let firestore = FirestoreClient::from_env()
            .await
            .context("Failed to create Firestore client")?;

        let stores = ScheduleStores {
            projects: Arc::new(ProjectRepository::new(firestore.clone())),
            scenes: Arc::new(SceneRepository::new(firestore.clone())),
            days: Arc::new(ScheduleRepository::new(firestore.clone())),
            cache: Arc::new(FirestoreResponseCache::new(firestore.clone())),
        };

        let planner_config = PlannerConfig::from_env();
        let planner = GeminiPlanner::new(GeminiConfig::from_env(), planner_config.clone())
            .context("Failed to create Gemini planner")?;

        Ok(Self::from_parts(
            config,
            stores,
            Arc::new(planner),
            &planner_config,
            Some(firestore),
        ))
    }

    /// Assemble state from explicit collaborators.
    pub fn from_parts(
        config: ApiConfig,
        stores: ScheduleStores,
        planner: Arc<dyn SchedulePlanner>,
        planner_config: &PlannerConfig,
        firestore: Option<FirestoreClient>,
    ) -> Self {
        let schedules = ScheduleViewService::new(
            stores.projects.clone(),
            stores.days.clone(),
            stores.cache.clone(),
            config.cache.view_ttl_secs,
        );
        let builder = ScheduleBuilder::new(
            stores,
            planner,
            BuilderConfig::new(planner_config, config.cache.schedule_ttl_secs),
        );

        Self {
            auth: Arc::new(TokenVerifier::from_config(&config)),
            builder: Arc::new(builder),
            schedules: Arc::new(schedules),
            config,
            firestore,
        }
    }
}
