use crate::state::HealthSummary;
use crate::telemetry::SystemSnapshot;
use crate::web::AdminState;
use axum::{extract::State, Json};

/// 获取系统状态 API
/// 返回最近一次上报控制器时采集的资源占用、上行码率和带宽容量
pub async fn sys_status(State(state): State<AdminState>) -> Json<SystemSnapshot> {
    Json(state.system.borrow().clone())
}

/// 获取流健康状态 API
/// 返回最近一次监控周期的汇总结果
pub async fn list_streams(State(state): State<AdminState>) -> Json<HealthSummary> {
    Json(state.streams.borrow().clone())
}
