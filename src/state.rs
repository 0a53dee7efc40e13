use crate::config_store::ConfigStore;
use crate::db::DbPool;
use crate::external::LotSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<ConfigStore>,
    pub lots: Arc<dyn LotSource>,
}

impl axum::extract::FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
