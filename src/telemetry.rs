use crate::config::{SpeedtestConfig, SpeedtestVariant, TelemetryConfig};
use crate::state::unix_now;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

/// 虚拟网卡与回环接口前缀，不计入上行流量
const VIRTUAL_IFACE_PREFIXES: &[&str] = &["lo", "docker", "br-", "veth", "virbr", "tun", "tap"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkCapacity {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// 测量时间 (unix 秒)
    pub timestamp: f64,
}

/// 系统资源快照 (百分比)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    /// 两次采样之间的实际上行码率
    pub upload_mbps: f64,
    pub network_capacity: Option<NetworkCapacity>,
}

/// 遥测采集器，由控制循环独占
pub struct Telemetry {
    last_tx: Option<(Instant, u64)>,
    capacity: CapacityCache,
}

impl Telemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            last_tx: None,
            capacity: CapacityCache::new(config),
        }
    }

    pub fn snapshot(&mut self) -> SystemSnapshot {
        let cpu_usage = match (sys_info::loadavg(), sys_info::cpu_num()) {
            (Ok(load), Ok(cores)) if cores > 0 => (load.one / f64::from(cores) * 100.0).min(100.0),
            _ => 0.0,
        };
        let memory_usage = sys_info::mem_info()
            .map(|m| used_percent(m.total, m.avail))
            .unwrap_or(0.0);
        let disk_usage = sys_info::disk_info()
            .map(|d| used_percent(d.total, d.free))
            .unwrap_or(0.0);

        SystemSnapshot {
            cpu_usage,
            memory_usage,
            disk_usage,
            upload_mbps: self.sample_upload(),
            network_capacity: self.capacity.current(),
        }
    }

    fn sample_upload(&mut self) -> f64 {
        let Ok(content) = std::fs::read_to_string("/proc/net/dev") else {
            return 0.0;
        };
        let now = Instant::now();
        let sent = physical_tx_bytes(&content);
        let rate = match self.last_tx {
            Some((at, prev)) => upload_mbps(prev, sent, now.duration_since(at)),
            None => 0.0,
        };
        self.last_tx = Some((now, sent));
        rate
    }
}

fn used_percent(total: u64, free: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (total.saturating_sub(free)) as f64 / total as f64 * 100.0
}

/// 汇总物理网卡的发送字节数 (/proc/net/dev 格式)
fn physical_tx_bytes(proc_net_dev: &str) -> u64 {
    proc_net_dev
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, counters) = line.split_once(':')?;
            let iface = iface.trim();
            if VIRTUAL_IFACE_PREFIXES.iter().any(|p| iface.starts_with(p)) {
                return None;
            }
            counters.split_whitespace().nth(8)?.parse::<u64>().ok()
        })
        .sum()
}

fn upload_mbps(prev: u64, current: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(prev) as f64 * 8.0 / secs / 1_000_000.0
}

/// 带宽容量测量结果的文件缓存
///
/// 缓存过期时在后台重新测量，不阻塞控制循环。
struct CapacityCache {
    path: PathBuf,
    expiry: f64,
    speedtest: Option<SpeedtestConfig>,
    refreshing: Arc<AtomicBool>,
}

impl CapacityCache {
    fn new(config: &TelemetryConfig) -> Self {
        Self {
            path: config.cache_path.clone(),
            expiry: config.cache_expiry_sec as f64,
            speedtest: config.speedtest.clone(),
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn current(&self) -> Option<NetworkCapacity> {
        let speedtest = self.speedtest.as_ref()?;
        let cached = read_cache(&self.path);
        if let Some(capacity) = cached.filter(|c| is_fresh(c, unix_now(), self.expiry)) {
            return Some(capacity);
        }

        if !self.refreshing.swap(true, Ordering::SeqCst) {
            let speedtest = speedtest.clone();
            let path = self.path.clone();
            let refreshing = self.refreshing.clone();
            tokio::spawn(async move {
                match run_speedtest(&speedtest).await {
                    Ok(capacity) => {
                        info!(
                            "Network capacity: {:.2} Mbps down / {:.2} Mbps up",
                            capacity.download_mbps, capacity.upload_mbps
                        );
                        if let Err(e) = write_cache(&path, &capacity) {
                            warn!("Failed to write speedtest cache: {:#}", e);
                        }
                    }
                    Err(e) => warn!("Speedtest failed: {:#}", e),
                }
                refreshing.store(false, Ordering::SeqCst);
            });
        }
        None
    }
}

fn is_fresh(capacity: &NetworkCapacity, now: f64, expiry: f64) -> bool {
    capacity.timestamp > now - expiry
}

fn read_cache(path: &Path) -> Option<NetworkCapacity> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(capacity) => Some(capacity),
        Err(e) => {
            warn!("Failed to read cached speedtest: {}", e);
            None
        }
    }
}

fn write_cache(path: &Path, capacity: &NetworkCapacity) -> anyhow::Result<()> {
    let json = serde_json::to_string(capacity)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

async fn run_speedtest(config: &SpeedtestConfig) -> anyhow::Result<NetworkCapacity> {
    let mut cmd = Command::new(&config.binary);
    match config.variant {
        SpeedtestVariant::Ookla => cmd.args(["--accept-license", "--accept-gdpr", "-f", "json"]),
        SpeedtestVariant::Python => cmd.arg("--json"),
    };
    cmd.kill_on_drop(true);

    let started = Instant::now();
    let output = tokio::time::timeout(Duration::from_secs(config.timeout_sec), cmd.output())
        .await
        .context("speedtest timed out")?
        .with_context(|| format!("failed to run {}", config.binary))?;
    if !output.status.success() {
        anyhow::bail!(
            "speedtest exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let (download_mbps, upload_mbps) =
        parse_speedtest(config.variant, &String::from_utf8_lossy(&output.stdout))?;
    info!("Speedtest took {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(NetworkCapacity {
        download_mbps,
        upload_mbps,
        timestamp: unix_now(),
    })
}

#[derive(Deserialize)]
struct OoklaReport {
    download: OoklaBandwidth,
    upload: OoklaBandwidth,
}

#[derive(Deserialize)]
struct OoklaBandwidth {
    /// 字节/秒
    bandwidth: f64,
}

#[derive(Deserialize)]
struct PythonReport {
    /// 比特/秒
    #[serde(default)]
    download: f64,
    #[serde(default)]
    upload: f64,
}

/// 解析测速输出，返回 (下行, 上行) Mbps
fn parse_speedtest(variant: SpeedtestVariant, stdout: &str) -> anyhow::Result<(f64, f64)> {
    match variant {
        SpeedtestVariant::Ookla => {
            let report: OoklaReport =
                serde_json::from_str(stdout).context("invalid Ookla speedtest output")?;
            Ok((
                report.download.bandwidth * 8.0 / 1_000_000.0,
                report.upload.bandwidth * 8.0 / 1_000_000.0,
            ))
        }
        SpeedtestVariant::Python => {
            let report: PythonReport =
                serde_json::from_str(stdout).context("invalid speedtest-cli output")?;
            Ok((report.download / 1_000_000.0, report.upload / 1_000_000.0))
        }
    }
}
