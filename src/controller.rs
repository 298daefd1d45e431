use crate::config::ControllerConfig;
use crate::state::{DesiredState, HealthSummary, StreamDescriptor};
use crate::telemetry::SystemSnapshot;
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// 随每次拉取上报给控制器的设备状态
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub device_id: String,
    pub system: SystemSnapshot,
    pub streams: HealthSummary,
}

/// 期望状态来源
#[async_trait]
pub trait DesiredStateSource: Send + Sync {
    /// 失败时返回空列表
    async fn fetch(&self, report: &StatusReport) -> Vec<StreamDescriptor>;
}

/// 粗粒度网络连通性检测
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

pub struct ControllerClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ControllerClient {
    pub fn new(config: &ControllerConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()
            .context("failed to build controller HTTP client")?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            http,
        })
    }

    async fn try_fetch(&self, report: &StatusReport) -> anyhow::Result<DesiredState> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(report)
            .send()
            .await
            .context("controller request failed")?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("controller responded with {}", status);
        }
        let state = response
            .json::<DesiredState>()
            .await
            .context("failed to decode desired state")?;
        Ok(state)
    }
}

#[async_trait]
impl DesiredStateSource for ControllerClient {
    async fn fetch(&self, report: &StatusReport) -> Vec<StreamDescriptor> {
        match self.try_fetch(report).await {
            Ok(state) => {
                debug!("Fetched {} stream descriptors", state.streams.len());
                state.streams
            }
            Err(e) => {
                // 拉取失败视为期望状态为空
                warn!("Failed to fetch desired state for {}: {:#}", report.device_id, e);
                Vec::new()
            }
        }
    }
}

/// 以 TCP 建连判断公网是否可达
pub struct TcpReachability {
    addr: String,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            addr: config.reachability_addr.clone(),
            timeout: Duration::from_secs(config.reachability_timeout_sec),
        }
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Reachability check to {} failed: {}", self.addr, e);
                false
            }
            Err(_) => {
                debug!("Reachability check to {} timed out", self.addr);
                false
            }
        }
    }
}
