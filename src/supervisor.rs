use crate::command;
use crate::config::{EncoderSettings, HealthPolicy};
use crate::engine::{Launcher, WorkerProcess};
use crate::probe::{self, Prober, SourceCheck};
use crate::state::{unix_now, StreamDescriptor, StreamReport, StreamStatus, SupervisorPhase};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// 所有监管器共享的依赖
pub struct SupervisorContext {
    pub prober: Arc<dyn Prober>,
    pub launcher: Arc<dyn Launcher>,
    pub encoder: EncoderSettings,
    pub health: HealthPolicy,
    /// 编排器的关闭信号
    pub shutdown: CancellationToken,
    /// 已终止进程的回收任务
    pub reapers: TaskTracker,
}

/// 单次健康检查的结论
#[derive(Debug, Clone, PartialEq)]
pub enum Health {
    Dormant,
    Starting,
    Running,
    /// 进程已退出
    Exited(String),
    /// 有可用源但编码进程未能启动
    LaunchFailed(String),
    /// 进程存活但心跳陈旧，`None` 表示从未上报过心跳
    Stale(Option<f64>),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        !matches!(
            self,
            Health::Exited(_) | Health::LaunchFailed(_) | Health::Stale(_)
        )
    }

    pub fn phase(&self) -> SupervisorPhase {
        match self {
            Health::Dormant => SupervisorPhase::Dormant,
            Health::Starting => SupervisorPhase::Starting,
            Health::Running => SupervisorPhase::Running,
            Health::Exited(_) | Health::LaunchFailed(_) | Health::Stale(_) => {
                SupervisorPhase::Unhealthy
            }
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Dormant => write!(f, "dormant"),
            Health::Starting => write!(f, "starting"),
            Health::Running => write!(f, "running"),
            Health::Exited(detail) => write!(f, "{}", detail.lines().next().unwrap_or("exited")),
            Health::LaunchFailed(reason) => write!(f, "failed to start encoder: {reason}"),
            Health::Stale(Some(age)) => write!(f, "no output for {age:.0}s"),
            Health::Stale(None) => write!(f, "no output reported"),
        }
    }
}

/// 单路流的监管器，独占一个编码进程
pub struct StreamSupervisor {
    id: String,
    output_url: String,
    status: StreamStatus,
    source_urls: Vec<String>,
    last_frame_timestamp: Option<f64>,
    checks: Vec<SourceCheck>,
    valid_source_urls: Vec<String>,
    process: Option<WorkerProcess>,
    start_time: Option<Instant>,
    /// 最近一次启动失败的原因，成功启动或停止后清除
    launch_failure: Option<String>,
    /// 当前进程的退出是否已记录
    exit_recorded: bool,
    /// 最近一次健康检查的结论
    last_health: Health,
    last_error: Option<String>,
    restart_count: u32,
    ctx: Arc<SupervisorContext>,
}

impl StreamSupervisor {
    pub fn new(descriptor: &StreamDescriptor, ctx: Arc<SupervisorContext>) -> Self {
        Self {
            id: descriptor.stream_id.clone(),
            output_url: descriptor.output_url.clone(),
            status: descriptor.status,
            source_urls: descriptor.source_urls.clone(),
            last_frame_timestamp: descriptor.last_frame_timestamp,
            checks: Vec::new(),
            valid_source_urls: Vec::new(),
            process: None,
            start_time: None,
            launch_failure: None,
            exit_recorded: false,
            last_health: Health::Dormant,
            last_error: None,
            restart_count: 0,
            ctx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[cfg(test)]
    pub fn valid_source_urls(&self) -> &[String] {
        &self.valid_source_urls
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    #[cfg(test)]
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    #[cfg(test)]
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }

    /// 应用新的期望状态
    ///
    /// 心跳时间总是更新；其余字段与探测结果都未变化时不重启。
    /// 返回是否发生了重启。
    pub async fn update(&mut self, descriptor: &StreamDescriptor) -> bool {
        self.last_frame_timestamp = descriptor.last_frame_timestamp;

        let unchanged = self.output_url == descriptor.output_url
            && self.status == descriptor.status
            && self.source_urls == descriptor.source_urls;
        if unchanged {
            let before = self.valid_source_urls.clone();
            self.validate_source_urls().await;
            if before == self.valid_source_urls {
                return false;
            }
            info!(
                "Stream [{}] source availability changed: {:?} -> {:?}",
                self.id, before, self.valid_source_urls
            );
            // 刚完成的探测结果直接用于启动
            self.stop();
            self.restart_count = self.restart_count.saturating_add(1);
            self.launch();
            return true;
        }

        info!("Stream [{}] descriptor changed", self.id);
        self.output_url = descriptor.output_url.clone();
        self.status = descriptor.status;
        self.source_urls = descriptor.source_urls.clone();
        self.restart().await;
        true
    }

    pub async fn validate_source_urls(&mut self) {
        self.checks = probe::validate(self.ctx.prober.as_ref(), &self.source_urls).await;
        self.valid_source_urls = probe::valid_urls(&self.checks);
        for check in self.checks.iter().filter(|c| !c.valid) {
            warn!("Stream [{}] source {} invalid: {}", self.id, check.url, check.diagnostic);
        }
    }

    pub async fn start(&mut self) {
        if self.ctx.shutdown.is_cancelled() {
            return;
        }
        self.validate_source_urls().await;
        self.launch();
    }

    /// 按当前的探测结果启动编码进程
    fn launch(&mut self) {
        self.launch_failure = None;
        if self.ctx.shutdown.is_cancelled() {
            return;
        }
        if self.valid_source_urls.is_empty() {
            warn!("Stream [{}] has no valid source, staying dormant", self.id);
            return;
        }

        let args = command::build(&self.output_url, &self.valid_source_urls, &self.ctx.encoder);
        match self.ctx.launcher.launch(&self.id, &args) {
            Ok(process) => {
                self.process = Some(process);
                self.start_time = Some(Instant::now());
                self.exit_recorded = false;
            }
            Err(e) => {
                error!("Stream [{}] failed to start: {}", self.id, e);
                let reason = e.to_string();
                self.last_error = Some(format!("failed to start encoder: {reason}"));
                self.launch_failure = Some(reason);
            }
        }
    }

    pub fn stop(&mut self) {
        self.start_time = None;
        self.launch_failure = None;
        let Some(process) = self.process.take() else {
            return;
        };
        if let Err(e) = process.terminate(self.ctx.health.stop_timeout(), &self.ctx.reapers) {
            error!("Error stopping stream [{}]: {}", self.id, e);
        }
        info!("Stream [{}] stopped.", self.id);
    }

    pub async fn restart(&mut self) {
        self.stop();
        self.restart_count = self.restart_count.saturating_add(1);
        self.start().await;
    }

    pub fn is_healthy(&mut self) -> bool {
        self.evaluate(Instant::now(), unix_now()).is_healthy()
    }

    /// 健康检查，时间由调用方传入
    ///
    /// 依次检查: 进程是否退出或未能启动、宽限期后心跳是否陈旧。
    pub fn evaluate(&mut self, now: Instant, wall_now: f64) -> Health {
        let health = self.check(now, wall_now);
        self.last_health = health.clone();
        health
    }

    fn check(&mut self, now: Instant, wall_now: f64) -> Health {
        if let Some(process) = self.process.as_mut() {
            match process.try_exit() {
                Ok(Some(status)) => {
                    let detail = format!(
                        "encoder exited with {}\nstdout: {}\nstderr: {}",
                        status,
                        process.stdout_tail(),
                        process.stderr_tail()
                    );
                    if !self.exit_recorded {
                        warn!("Stream [{}] exited unexpectedly with: {}", self.id, status);
                        self.exit_recorded = true;
                        self.last_error = Some(detail.clone());
                    }
                    return Health::Exited(detail);
                }
                Ok(None) => {}
                Err(e) => error!("Process monitor error [{}]: {}", self.id, e),
            }
        }

        if let Some(reason) = &self.launch_failure {
            return Health::LaunchFailed(reason.clone());
        }
        let Some(started) = self.start_time else {
            return Health::Dormant;
        };
        if now.saturating_duration_since(started) <= self.ctx.health.grace_period() {
            return Health::Starting;
        }

        let threshold = self.ctx.health.staleness_threshold_sec as f64;
        let fresh = self
            .last_frame_timestamp
            .is_some_and(|ts| wall_now - ts <= threshold);
        if !fresh {
            let stale = Health::Stale(self.last_frame_timestamp.map(|ts| wall_now - ts));
            if self.last_error.is_none() {
                self.last_error = Some(stale.to_string());
            }
            return stale;
        }
        Health::Running
    }

    /// 汇总当前的诊断信息，读取后清空进程错误
    pub fn collect_error(&mut self) -> Option<String> {
        let mut parts: Vec<String> = self
            .checks
            .iter()
            .filter(|c| !c.valid)
            .map(|c| format!("source {} invalid: {}", c.url, c.diagnostic))
            .collect();
        if let Some(err) = self.last_error.take() {
            parts.push(err);
        }
        if self.valid_source_urls.is_empty() {
            parts.push("no valid source urls".to_string());
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    pub fn last_health(&self) -> &Health {
        &self.last_health
    }

    /// 按最近一次健康检查生成报告 (会消费诊断信息)
    pub fn report(&mut self) -> StreamReport {
        StreamReport {
            stream_id: self.id.clone(),
            phase: self.last_health.phase(),
            alive: self.last_health.is_healthy(),
            restart_count: self.restart_count,
            error: self.collect_error(),
        }
    }
}

impl Drop for StreamSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::spawn_captured;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::process::Command;

    /// 按预设结果返回的探测器，可在测试中修改
    #[derive(Default)]
    pub struct ScriptedProber {
        pub invalid: Mutex<HashSet<String>>,
        pub probes: AtomicUsize,
    }

    impl ScriptedProber {
        pub fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        pub fn set_invalid(&self, urls: &[&str]) {
            let mut invalid = self.invalid.lock().unwrap();
            invalid.clear();
            invalid.extend(urls.iter().map(|s| s.to_string()));
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, url: &str) -> SourceCheck {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let valid = !self.invalid.lock().unwrap().contains(url);
            SourceCheck {
                url: url.to_string(),
                valid,
                diagnostic: if valid {
                    "h264 1920x1080 25/1".to_string()
                } else {
                    "Connection refused".to_string()
                },
            }
        }
    }

    /// 记录启动参数，用 shell 脚本代替 ffmpeg
    pub struct RecordingLauncher {
        pub script: Mutex<String>,
        pub launches: AtomicUsize,
        pub last_args: Mutex<Vec<String>>,
        /// 置位时下一次启动失败
        pub fail_next: AtomicBool,
    }

    impl RecordingLauncher {
        pub fn new(script: &str) -> Self {
            Self {
                script: Mutex::new(script.to_string()),
                launches: AtomicUsize::new(0),
                last_args: Mutex::new(Vec::new()),
                fail_next: AtomicBool::new(false),
            }
        }

        pub fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }
    }

    impl Launcher for RecordingLauncher {
        fn launch(&self, stream_id: &str, args: &[String]) -> std::io::Result<WorkerProcess> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            *self.last_args.lock().unwrap() = args.to_vec();
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(std::io::Error::other("Resource temporarily unavailable"));
            }
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.script.lock().unwrap().as_str());
            spawn_captured(cmd, stream_id)
        }
    }

    pub fn context(
        prober: Arc<ScriptedProber>,
        launcher: Arc<RecordingLauncher>,
        shutdown: CancellationToken,
    ) -> Arc<SupervisorContext> {
        Arc::new(SupervisorContext {
            prober,
            launcher,
            encoder: EncoderSettings::default(),
            health: HealthPolicy {
                stop_timeout_sec: 1,
                ..HealthPolicy::default()
            },
            shutdown,
            reapers: TaskTracker::new(),
        })
    }

    pub fn descriptor(id: &str, sources: &[&str]) -> StreamDescriptor {
        StreamDescriptor {
            stream_id: id.to_string(),
            output_url: format!("rtsp://relay:8554/{id}"),
            status: StreamStatus::Active,
            source_urls: sources.iter().map(|s| s.to_string()).collect(),
            last_frame_timestamp: None,
        }
    }

    struct Fixture {
        prober: Arc<ScriptedProber>,
        launcher: Arc<RecordingLauncher>,
        shutdown: CancellationToken,
    }

    impl Fixture {
        fn new(script: &str) -> Self {
            Self {
                prober: Arc::new(ScriptedProber::default()),
                launcher: Arc::new(RecordingLauncher::new(script)),
                shutdown: CancellationToken::new(),
            }
        }

        fn supervisor(&self, d: &StreamDescriptor) -> StreamSupervisor {
            StreamSupervisor::new(
                d,
                context(self.prober.clone(), self.launcher.clone(), self.shutdown.clone()),
            )
        }
    }

    #[tokio::test]
    async fn start_launches_with_valid_sources() {
        let fx = Fixture::new("sleep 30");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;

        assert!(sup.is_running());
        assert_eq!(fx.launcher.launches(), 1);
        assert!(sup.is_healthy());
        assert_eq!(sup.evaluate(Instant::now(), unix_now()), Health::Starting);
    }

    #[tokio::test]
    async fn invalid_first_source_falls_back_to_single_mode() {
        let fx = Fixture::new("sleep 30");
        fx.prober.set_invalid(&["rtsp://cam/1"]);
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1", "rtsp://cam/2"]));
        sup.start().await;

        assert_eq!(sup.valid_source_urls(), &["rtsp://cam/2".to_string()]);
        let args = fx.launcher.last_args.lock().unwrap().clone();
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert!(args.contains(&"rtsp://cam/2".to_string()));
    }

    #[tokio::test]
    async fn no_valid_source_stays_dormant() {
        let fx = Fixture::new("sleep 30");
        fx.prober.set_invalid(&["rtsp://cam/1"]);
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;

        assert!(!sup.is_running());
        assert_eq!(fx.launcher.launches(), 0);
        assert_eq!(sup.evaluate(Instant::now(), unix_now()), Health::Dormant);

        let err = sup.collect_error().unwrap();
        assert!(err.contains("source rtsp://cam/1 invalid: Connection refused"));
        assert!(err.contains("no valid source urls"));
    }

    #[tokio::test]
    async fn start_is_skipped_after_shutdown() {
        let fx = Fixture::new("sleep 30");
        fx.shutdown.cancel();
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;
        assert!(!sup.is_running());
        assert_eq!(fx.launcher.launches(), 0);
    }

    #[tokio::test]
    async fn identical_update_does_not_restart() {
        let fx = Fixture::new("sleep 30");
        let d = descriptor("s1", &["rtsp://cam/1"]);
        let mut sup = fx.supervisor(&d);
        sup.start().await;

        let mut heartbeat = d.clone();
        heartbeat.last_frame_timestamp = Some(unix_now());
        assert!(!sup.update(&heartbeat).await);
        assert_eq!(fx.launcher.launches(), 1);
        assert_eq!(sup.restart_count(), 0);
    }

    #[tokio::test]
    async fn update_restarts_on_source_change() {
        let fx = Fixture::new("sleep 30");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;

        assert!(sup.update(&descriptor("s1", &["rtsp://cam/1", "rtsp://cam/2"])).await);
        assert_eq!(fx.launcher.launches(), 2);
        assert_eq!(sup.valid_source_urls().len(), 2);
        assert_eq!(sup.restart_count(), 1);
    }

    #[tokio::test]
    async fn update_restarts_when_validation_outcome_changes() {
        let fx = Fixture::new("sleep 30");
        fx.prober.set_invalid(&["rtsp://cam/1"]);
        let d = descriptor("s1", &["rtsp://cam/1"]);
        let mut sup = fx.supervisor(&d);
        sup.start().await;
        assert!(!sup.is_running());

        // 源恢复后，相同的下发也会触发启动
        fx.prober.set_invalid(&[]);
        let probes = fx.prober.probes();
        assert!(sup.update(&d).await);
        assert!(sup.is_running());
        assert_eq!(fx.launcher.launches(), 1);
        // 每个源只探测一次
        assert_eq!(fx.prober.probes(), probes + 1);
    }

    #[tokio::test]
    async fn exited_process_is_unhealthy_with_diagnostics() {
        let fx = Fixture::new("echo 'Connection timed out' >&2; exit 1");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!sup.is_healthy());
        // 退出后仍保持不健康，直到重启
        assert!(!sup.is_healthy());

        let err = sup.collect_error().unwrap();
        assert!(err.contains("exit status: 1"));
        assert!(err.contains("Connection timed out"));
        // 同一次失败只报告一次
        assert_eq!(sup.collect_error(), None);
    }

    #[tokio::test]
    async fn restart_recovers_exited_process() {
        let fx = Fixture::new("exit 2");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!sup.is_healthy());

        *fx.launcher.script.lock().unwrap() = "sleep 30".to_string();
        sup.restart().await;
        assert!(sup.is_healthy());
        assert_eq!(fx.launcher.launches(), 2);
    }

    #[tokio::test]
    async fn heartbeat_is_ignored_during_grace_period() {
        let fx = Fixture::new("sleep 30");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;

        let now = Instant::now();
        let wall = unix_now();
        assert_eq!(sup.evaluate(now, wall), Health::Starting);
        assert_eq!(sup.evaluate(now + Duration::from_secs(149), wall), Health::Starting);
    }

    #[tokio::test]
    async fn grace_period_ends_exactly_at_boundary() {
        let fx = Fixture::new("sleep 30");
        let mut d = descriptor("s1", &["rtsp://cam/1"]);
        let wall = unix_now().floor();
        d.last_frame_timestamp = Some(wall - 60.0);
        let mut sup = fx.supervisor(&d);
        sup.start().await;
        let started = sup.start_time().unwrap();
        let grace = Duration::from_secs(150);

        // 宽限期内心跳陈旧也视为启动中
        assert_eq!(sup.evaluate(started + grace, wall), Health::Starting);
        assert_eq!(
            sup.evaluate(started + grace + Duration::from_millis(1), wall),
            Health::Stale(Some(60.0))
        );
    }

    #[tokio::test]
    async fn fresh_heartbeat_during_grace_is_still_starting() {
        let fx = Fixture::new("sleep 30");
        let mut d = descriptor("s1", &["rtsp://cam/1"]);
        let wall = unix_now().floor();
        d.last_frame_timestamp = Some(wall - 1.0);
        let mut sup = fx.supervisor(&d);
        sup.start().await;
        let started = sup.start_time().unwrap();

        assert_eq!(sup.evaluate(started + Duration::from_secs(10), wall), Health::Starting);
        assert_eq!(sup.evaluate(started + Duration::from_secs(151), wall), Health::Running);
    }

    #[tokio::test]
    async fn stale_heartbeat_after_grace_is_unhealthy() {
        let fx = Fixture::new("sleep 30");
        let mut d = descriptor("s1", &["rtsp://cam/1"]);
        let wall = unix_now().floor();
        d.last_frame_timestamp = Some(wall - 5.0);
        let mut sup = fx.supervisor(&d);
        sup.start().await;

        let now = Instant::now() + Duration::from_secs(151);
        assert_eq!(sup.evaluate(now, wall), Health::Running);
        assert_eq!(sup.evaluate(now, wall + 6.0), Health::Stale(Some(11.0)));
        assert!(sup.collect_error().unwrap().contains("no output for 11s"));
    }

    #[tokio::test]
    async fn missing_heartbeat_after_grace_is_unhealthy() {
        let fx = Fixture::new("sleep 30");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;

        let after_grace = Instant::now() + Duration::from_secs(151);
        assert_eq!(sup.evaluate(after_grace, unix_now()), Health::Stale(None));
        // 宽限期内仍视为健康
        assert!(sup.is_healthy());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let fx = Fixture::new("sleep 30");
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;
        sup.stop();
        assert!(!sup.is_running());
        sup.stop();
        assert!(!sup.is_running());
        assert_eq!(sup.evaluate(Instant::now(), unix_now()), Health::Dormant);
    }

    #[tokio::test]
    async fn launch_failure_is_recorded() {
        struct FailingLauncher;
        impl Launcher for FailingLauncher {
            fn launch(&self, _: &str, _: &[String]) -> std::io::Result<WorkerProcess> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg not found"))
            }
        }

        let ctx = Arc::new(SupervisorContext {
            prober: Arc::new(ScriptedProber::default()),
            launcher: Arc::new(FailingLauncher),
            encoder: EncoderSettings::default(),
            health: HealthPolicy::default(),
            shutdown: CancellationToken::new(),
            reapers: TaskTracker::new(),
        });
        let mut sup = StreamSupervisor::new(&descriptor("s1", &["rtsp://cam/1"]), ctx);
        sup.start().await;
        assert!(!sup.is_running());
        assert!(sup.collect_error().unwrap().contains("ffmpeg not found"));

        // 有可用源却未能启动，需交由下一周期重启
        let health = sup.evaluate(Instant::now(), unix_now());
        assert_eq!(health, Health::LaunchFailed("ffmpeg not found".to_string()));
        assert_eq!(health.phase(), SupervisorPhase::Unhealthy);
        assert!(!sup.is_healthy());

        sup.stop();
        assert_eq!(sup.evaluate(Instant::now(), unix_now()), Health::Dormant);
    }

    #[tokio::test]
    async fn successful_relaunch_clears_launch_failure() {
        let fx = Fixture::new("sleep 30");
        fx.launcher.fail_next.store(true, Ordering::SeqCst);
        let mut sup = fx.supervisor(&descriptor("s1", &["rtsp://cam/1"]));
        sup.start().await;
        assert!(!sup.is_healthy());

        sup.restart().await;
        assert!(sup.is_running());
        assert_eq!(sup.evaluate(Instant::now(), unix_now()), Health::Starting);
        assert_eq!(fx.launcher.launches(), 2);
    }
}
