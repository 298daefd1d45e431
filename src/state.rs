use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// 控制器下发的流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Inactive,
    /// 未识别的状态一律按非活跃处理
    #[serde(other)]
    Other,
}

/// 单路流的期望状态快照 (每次轮询整体替换)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub stream_id: String,
    /// 推流目标地址
    #[serde(alias = "stream_url")]
    pub output_url: String,
    pub status: StreamStatus,
    pub source_urls: Vec<String>,
    /// 外部上报的最后出帧时间 (unix 秒)
    #[serde(default)]
    pub last_frame_timestamp: Option<f64>,
}

impl StreamDescriptor {
    pub fn is_active(&self) -> bool {
        self.status == StreamStatus::Active
    }
}

/// 控制器响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub streams: Vec<StreamDescriptor>,
}

/// 监管器所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorPhase {
    /// 无进程 (例如没有可用的源)
    Dormant,
    /// 进程已启动，仍在宽限期内
    Starting,
    Running,
    Unhealthy,
}

/// 单路流健康报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub stream_id: String,
    pub phase: SupervisorPhase,
    pub alive: bool,
    pub restart_count: u32,
    pub error: Option<String>,
}

/// 所有流的健康汇总，随下一次拉取上报，同时供管理接口读取
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSummary {
    pub alive: usize,
    pub dead: usize,
    pub streams: Vec<StreamReport>,
}

impl HealthSummary {
    pub fn from_reports(streams: Vec<StreamReport>) -> Self {
        let alive = streams.iter().filter(|r| r.alive).count();
        Self {
            alive,
            dead: streams.len() - alive,
            streams,
        }
    }
}

/// 当前 unix 时间 (秒)
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
