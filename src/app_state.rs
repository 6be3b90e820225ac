use std::sync::Arc;

use crate::ai::TaskClassifier;
use crate::config::Config;
use crate::db::MongoDB;

#[derive(Clone)]
pub struct AppState {
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub classifier: Arc<dyn TaskClassifier>,
}
