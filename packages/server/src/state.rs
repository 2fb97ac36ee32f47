use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use crate::authz::RolePolicy;
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::sessions::SessionCache;
use crate::utils::jwt::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub sessions: Arc<dyn SessionCache>,
    pub mailer: Arc<dyn Mailer>,
    pub policy: Arc<RolePolicy>,
    /// Parent of every per-request cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}
