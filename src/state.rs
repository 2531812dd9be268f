use std::sync::Arc;

use tracing::info;

use crate::auth::password::hash_password;
use crate::config::AppConfig;
use crate::store::{LedgerStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(PgStore::init(&config).await?) as Arc<dyn LedgerStore>;
        let state = Self { store, config };
        state.bootstrap_admin().await?;
        Ok(state)
    }

    pub fn from_parts(store: Arc<dyn LedgerStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// Create the configured administrative user if it does not exist yet.
    /// An existing user is never modified.
    async fn bootstrap_admin(&self) -> anyhow::Result<()> {
        let Some(admin) = &self.config.admin else {
            return Ok(());
        };
        if self
            .store
            .find_user_by_username(&admin.username)
            .await?
            .is_some()
        {
            return Ok(());
        }
        let hash = hash_password(&admin.password)?;
        let identity = self
            .store
            .create_account(&admin.username, &hash, true)
            .await?;
        info!(user_id = %identity.user_id, username = %identity.username, "admin user bootstrapped");
        Ok(())
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self {
            store: Arc::new(crate::store::mem::MemStore::new()),
            config: Arc::new(AppConfig::for_tests()),
        }
    }
}
