use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub health: HealthPolicy,
    #[serde(default)]
    pub encoder: EncoderSettings,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// 本地管理接口监听地址
    pub listen: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_binary: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe_binary: String,

    /// 监控周期 (秒)
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_sec: u64,
    /// 控制循环空闲休眠粒度 (毫秒)
    #[serde(default = "default_loop_quantum")]
    pub loop_quantum_ms: u64,
    /// 网络不可用时外层循环的重试间隔 (秒)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_sec: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// 期望状态拉取地址
    pub endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_sec: u64,

    /// 粗粒度连通性检测目标
    #[serde(default = "default_reachability_addr")]
    pub reachability_addr: String,
    #[serde(default = "default_reachability_timeout")]
    pub reachability_timeout_sec: u64,
}

/// 健康检查策略
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthPolicy {
    /// 启动宽限期，期间不做心跳陈旧判断
    pub grace_period_sec: u64,
    /// 心跳超过该时长视为陈旧
    pub staleness_threshold_sec: u64,
    /// 单个源地址探测超时
    pub probe_timeout_sec: u64,
    /// SIGTERM 之后等待退出的时长，超时则强制结束
    pub stop_timeout_sec: u64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            grace_period_sec: 150,
            staleness_threshold_sec: 10,
            probe_timeout_sec: 5,
            stop_timeout_sec: 5,
        }
    }
}

impl HealthPolicy {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_sec)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_sec)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_sec)
    }
}

/// 编码参数
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EncoderSettings {
    pub frame_rate: u32,
    /// 2x2 画面中单格分辨率
    pub cell_width: u32,
    pub cell_height: u32,
    /// 单路模式下的最大分辨率 (保持宽高比)
    pub single_max_width: u32,
    pub single_max_height: u32,
    pub single_bitrate: String,
    pub grid_bitrate: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            frame_rate: 15,
            cell_width: 960,
            cell_height: 540,
            single_max_width: 1280,
            single_max_height: 720,
            single_bitrate: "1M".to_string(),
            grid_bitrate: "2M".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    /// 设备树中的硬件序列号
    pub serial_path: PathBuf,
    /// 无序列号时使用的本地 ID 文件，不存在则生成
    pub fallback_path: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            serial_path: PathBuf::from("/sys/firmware/devicetree/base/serial-number"),
            fallback_path: home.join("device-id"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 未配置时不上报网络带宽容量
    pub speedtest: Option<SpeedtestConfig>,
    /// 带宽测量结果缓存文件
    pub cache_path: PathBuf,
    pub cache_expiry_sec: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            speedtest: None,
            cache_path: PathBuf::from("/tmp/network_speedtest.json"),
            cache_expiry_sec: 1800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpeedtestConfig {
    pub binary: String,
    pub variant: SpeedtestVariant,
    #[serde(default = "default_speedtest_timeout")]
    pub timeout_sec: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeedtestVariant {
    /// Ookla 官方客户端
    Ookla,
    /// python speedtest-cli
    Python,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_loop_quantum() -> u64 {
    1000
}

fn default_retry_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_reachability_addr() -> String {
    "8.8.8.8:53".to_string()
}

fn default_reachability_timeout() -> u64 {
    3
}

fn default_speedtest_timeout() -> u64 {
    120
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let yaml = r#"
server:
  listen: "127.0.0.1:8090"
controller:
  endpoint: "https://controller.example/api/streams"
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.server.ffmpeg_binary, "ffmpeg");
        assert_eq!(cfg.server.monitor_interval_sec, 60);
        assert_eq!(cfg.server.loop_quantum_ms, 1000);
        assert_eq!(cfg.controller.reachability_addr, "8.8.8.8:53");
        assert_eq!(cfg.health.grace_period_sec, 150);
        assert_eq!(cfg.health.staleness_threshold_sec, 10);
        assert_eq!(cfg.encoder, EncoderSettings::default());
        assert!(cfg.telemetry.speedtest.is_none());
    }

    #[test]
    fn speedtest_variant_parses() {
        let yaml = r#"
speedtest:
  binary: "/usr/bin/speedtest"
  variant: ookla
cache_expiry_sec: 600
"#;
        let cfg: TelemetryConfig = serde_yaml::from_str(yaml).unwrap();
        let st = cfg.speedtest.unwrap();
        assert_eq!(st.variant, SpeedtestVariant::Ookla);
        assert_eq!(st.timeout_sec, 120);
        assert_eq!(cfg.cache_expiry_sec, 600);
        assert_eq!(cfg.cache_path, PathBuf::from("/tmp/network_speedtest.json"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vtx-relay.yaml");
        std::fs::write(
            &path,
            "server:\n  listen: \"0.0.0.0:8090\"\ncontroller:\n  endpoint: \"http://c\"\nhealth:\n  grace_period_sec: 30\n  staleness_threshold_sec: 5\n  probe_timeout_sec: 2\n  stop_timeout_sec: 1\n",
        )
        .unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.health.grace_period(), Duration::from_secs(30));
        assert_eq!(cfg.controller.endpoint, "http://c");
    }

    #[test]
    fn sample_config_loads() {
        let cfg = AppConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/vtx-relay.yaml")).unwrap();
        assert_eq!(cfg.server.listen, "0.0.0.0:8090");
        assert_eq!(cfg.encoder.single_max_width, 1280);
        assert!(cfg.telemetry.speedtest.is_none());
    }
}
