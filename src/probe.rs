use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// 单个源地址的探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCheck {
    pub url: String,
    pub valid: bool,
    /// 成功时为探测输出，失败时为错误输出
    pub diagnostic: String,
}

/// 源地址探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> SourceCheck;
}

/// 调用 ffprobe 读取编码、分辨率和帧率
pub struct FfprobeProber {
    binary: String,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn args(url: &str) -> Vec<&str> {
        let mut args = vec!["-v", "error"];
        if url.starts_with("rtsp://") || url.starts_with("rtsps://") {
            args.extend(["-rtsp_transport", "tcp"]);
        }
        args.extend([
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name,width,height,r_frame_rate",
            "-of",
            "json",
            url,
        ]);
        args
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, url: &str) -> SourceCheck {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let invalid = |diagnostic: String| SourceCheck {
            url: url.to_string(),
            valid: false,
            diagnostic,
        };

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return invalid(format!("failed to run {}: {}", self.binary, e)),
            Err(_) => return invalid(format!("probe timed out after {:?}", self.timeout)),
        };

        let valid = output.status.success();
        let raw = if valid { output.stdout } else { output.stderr };
        let mut diagnostic = String::from_utf8_lossy(&raw).trim().to_string();
        if !valid && diagnostic.is_empty() {
            diagnostic = format!("probe exited with {}", output.status);
        }
        debug!("Probe [{}] valid={}", url, valid);

        SourceCheck {
            url: url.to_string(),
            valid,
            diagnostic,
        }
    }
}

/// 依次探测所有地址，结果顺序与输入一致
///
/// 各地址的探测互不依赖，这里并发执行。
pub async fn validate(prober: &dyn Prober, urls: &[String]) -> Vec<SourceCheck> {
    futures::future::join_all(urls.iter().map(|url| prober.probe(url))).await
}

/// 保持原有顺序，过滤出可用地址
pub fn valid_urls(checks: &[SourceCheck]) -> Vec<String> {
    checks
        .iter()
        .filter(|c| c.valid)
        .map(|c| c.url.clone())
        .collect()
}
