use crate::controller::{DesiredStateSource, Reachability, StatusReport};
use crate::state::{HealthSummary, StreamDescriptor};
use crate::supervisor::{StreamSupervisor, SupervisorContext};
use crate::telemetry::{SystemSnapshot, Telemetry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub device_id: String,
    /// 监控周期
    pub monitor_interval: Duration,
    /// 空闲休眠粒度
    pub quantum: Duration,
}

/// 编排器发布的最新状态，管理接口只读取这里
pub struct StatusPublisher {
    streams: watch::Sender<HealthSummary>,
    system: watch::Sender<SystemSnapshot>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self {
            streams: watch::channel(HealthSummary::default()).0,
            system: watch::channel(SystemSnapshot::default()).0,
        }
    }
}

impl StatusPublisher {
    pub fn subscribe_streams(&self) -> watch::Receiver<HealthSummary> {
        self.streams.subscribe()
    }

    pub fn subscribe_system(&self) -> watch::Receiver<SystemSnapshot> {
        self.system.subscribe()
    }
}

/// 网关编排器
///
/// 负责:
/// - 从控制器拉取期望状态
/// - 按期望状态创建、更新、移除各路监管器
/// - 周期性检查监管器健康状况，异常时重启
/// - 随拉取请求上报设备和流的状态
///
/// 监管器集合只由编排器自身修改，不需要加锁。
pub struct GatewayOrchestrator {
    supervisors: HashMap<String, StreamSupervisor>,
    ctx: Arc<SupervisorContext>,
    source: Arc<dyn DesiredStateSource>,
    reachability: Arc<dyn Reachability>,
    telemetry: Telemetry,
    options: GatewayOptions,
    last_tick: Instant,
    summary: HealthSummary,
    status: Arc<StatusPublisher>,
}

impl GatewayOrchestrator {
    pub fn new(
        ctx: Arc<SupervisorContext>,
        source: Arc<dyn DesiredStateSource>,
        reachability: Arc<dyn Reachability>,
        telemetry: Telemetry,
        options: GatewayOptions,
        status: Arc<StatusPublisher>,
    ) -> Self {
        Self {
            supervisors: HashMap::new(),
            ctx,
            source,
            reachability,
            telemetry,
            options,
            last_tick: Instant::now(),
            summary: HealthSummary::default(),
            status,
        }
    }

    #[cfg(test)]
    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.ctx.shutdown.clone()
    }

    #[cfg(test)]
    pub fn supervisor(&self, stream_id: &str) -> Option<&StreamSupervisor> {
        self.supervisors.get(stream_id)
    }

    #[cfg(test)]
    pub fn stream_count(&self) -> usize {
        self.supervisors.len()
    }

    #[cfg(test)]
    pub fn summary(&self) -> &HealthSummary {
        &self.summary
    }

    /// 主循环，直到收到关闭信号
    pub async fn run(&mut self) {
        info!("Starting gateway service for device {}", self.options.device_id);
        let shutdown = self.ctx.shutdown.clone();

        let desired = self.fetch_desired().await;
        self.reconcile(&desired).await;
        self.last_tick = Instant::now();

        while !shutdown.is_cancelled() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.options.quantum) => {}
            }
            if self.last_tick.elapsed() >= self.options.monitor_interval {
                self.monitor_tick().await;
                self.last_tick = Instant::now();
            }
        }

        self.stop_all().await;
        info!("Gateway service for device {} stopped", self.options.device_id);
    }

    /// 一次监控周期
    ///
    /// 网络不可达时发出关闭信号，不再处理任何监管器。
    pub async fn monitor_tick(&mut self) {
        if !self.reachability.is_reachable().await {
            warn!("Network unavailable for device {}", self.options.device_id);
            self.ctx.shutdown.cancel();
            return;
        }

        let desired = self.fetch_desired().await;
        self.reconcile(&desired).await;
        self.check_health().await;
    }

    /// 使监管器集合与期望状态一致
    pub async fn reconcile(&mut self, desired: &[StreamDescriptor]) {
        if self.ctx.shutdown.is_cancelled() {
            return;
        }

        let active: Vec<&StreamDescriptor> = desired.iter().filter(|d| d.is_active()).collect();
        for descriptor in &active {
            match self.supervisors.get_mut(&descriptor.stream_id) {
                Some(supervisor) => {
                    supervisor.update(descriptor).await;
                }
                None => {
                    info!("Stream [{}] added", descriptor.stream_id);
                    let mut supervisor = StreamSupervisor::new(descriptor, self.ctx.clone());
                    supervisor.start().await;
                    self.supervisors
                        .insert(descriptor.stream_id.clone(), supervisor);
                }
            }
        }

        let wanted: HashSet<&str> = active.iter().map(|d| d.stream_id.as_str()).collect();
        let removed: Vec<String> = self
            .supervisors
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in removed {
            if let Some(mut supervisor) = self.supervisors.remove(&id) {
                supervisor.stop();
                info!("Stream [{}] removed", id);
            }
        }
    }

    /// 检查所有监管器，重启不健康的
    async fn check_health(&mut self) {
        let mut reports = Vec::with_capacity(self.supervisors.len());
        for supervisor in self.supervisors.values_mut() {
            let healthy = supervisor.is_healthy();
            // 先取出诊断信息，再重启
            let report = supervisor.report();
            if !healthy {
                warn!(
                    "Stream [{}] unhealthy ({}). Restarting...",
                    supervisor.id(),
                    supervisor.last_health()
                );
                supervisor.restart().await;
            }
            reports.push(report);
        }
        reports.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));

        self.summary = HealthSummary::from_reports(reports);
        self.status.streams.send_replace(self.summary.clone());
    }

    async fn fetch_desired(&mut self) -> Vec<StreamDescriptor> {
        let system = self.telemetry.snapshot();
        self.status.system.send_replace(system.clone());
        let report = StatusReport {
            device_id: self.options.device_id.clone(),
            system,
            streams: self.summary.clone(),
        };
        self.source.fetch(&report).await
    }

    /// 停止所有监管器，并等待被终止的进程全部回收
    async fn stop_all(&mut self) {
        for (_, mut supervisor) in self.supervisors.drain() {
            supervisor.stop();
        }
        self.ctx.reapers.close();
        self.ctx.reapers.wait().await;
    }
}
