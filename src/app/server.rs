use crate::adapters::{AirtableStore, InMemoryStore, JwksKeySource};
use crate::api::{build_router, AppState, TokenSource};
use crate::config::{AppConfig, StoreBackend};
use crate::core::directory::GroupDirectory;
use crate::core::identity::{IdentityGate, StaticKeySource};
use crate::core::reconciler::GroupReconciler;
use crate::domain::ports::{KeySource, RecordStore};
use crate::utils::error::Result;
use std::sync::Arc;

pub fn build_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    match config.store.backend {
        StoreBackend::Airtable => {
            tracing::info!(
                "🗄️ Using Airtable base {} (tables: {}, {})",
                config.store.base_key.as_deref().unwrap_or("?"),
                config.store.students_table,
                config.store.groups_table
            );
            Ok(Arc::new(AirtableStore::new(&config.store)?))
        }
        StoreBackend::Memory => {
            let store = match &config.store.seed_path {
                Some(path) => InMemoryStore::from_roster_path(path)?,
                None => InMemoryStore::default(),
            };
            tracing::warn!("⚠️ Using in-memory store; registrations are lost on restart");
            Ok(Arc::new(store))
        }
    }
}

pub fn build_identity(config: &AppConfig) -> Result<IdentityGate> {
    let keys: Arc<dyn KeySource> = match &config.auth.shared_secret {
        Some(secret) => Arc::new(StaticKeySource::from_secret(secret.as_bytes())),
        None => Arc::new(JwksKeySource::new(config.jwks_url())),
    };

    Ok(IdentityGate::new(
        keys,
        config.jwt_algorithm()?,
        &config.auth.audience,
        &config.auth.domain,
    ))
}

pub fn build_state(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<AppState> {
    let reconciler = GroupReconciler::new(Arc::clone(&store), config.group_rules())?;
    let directory = GroupDirectory::new(store, &config.student_id, config.store.max_records)?;

    Ok(AppState {
        reconciler: Arc::new(reconciler),
        directory: Arc::new(directory),
        identity: Arc::new(build_identity(config)?),
        tokens: TokenSource {
            cookie: config.auth.cookie.clone(),
            header: config.auth.header.clone(),
        },
    })
}

pub async fn serve(config: AppConfig) -> Result<()> {
    let store = build_store(&config)?;
    let state = build_state(&config, store)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("🚀 Listening on http://{}", config.server.bind);
    tracing::info!(
        "Groups of {} to {} students, identifiers matching {:?}",
        config.groups.min_size,
        config.groups.max_size,
        config.student_id
    );

    axum::serve(listener, app).await?;
    Ok(())
}
