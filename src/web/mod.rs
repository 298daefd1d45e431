pub mod admin;

use crate::state::HealthSummary;
use crate::telemetry::SystemSnapshot;
use axum::{routing::get, Router};
use tokio::sync::watch;

/// 管理接口共享状态，只读取编排器发布的快照
#[derive(Clone)]
pub struct AdminState {
    pub streams: watch::Receiver<HealthSummary>,
    pub system: watch::Receiver<SystemSnapshot>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/sys/status", get(admin::sys_status)) // 系统状态
        .route("/streams", get(admin::list_streams)) // 流健康状态
        .with_state(state)
}
