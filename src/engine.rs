use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// 每路输出最多保留的行数
const TAIL_LINES: usize = 40;

/// 子进程输出的尾部缓存，进程退出后用于诊断
#[derive(Clone, Default)]
pub struct OutputTail {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl OutputTail {
    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if lines.len() == TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// 一个正在受监管的编码进程
pub struct WorkerProcess {
    child: Child,
    stdout: OutputTail,
    stderr: OutputTail,
    /// 本进程输出读取任务的取消令牌
    scope: CancellationToken,
}

impl WorkerProcess {
    /// 进程是否已退出 (不阻塞)
    pub fn try_exit(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    #[cfg(test)]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn stdout_tail(&self) -> String {
        self.stdout.snapshot()
    }

    pub fn stderr_tail(&self) -> String {
        self.stderr.snapshot()
    }

    /// 发送 SIGTERM 并在后台回收进程
    ///
    /// 超过 `grace` 仍未退出则强制结束。回收任务登记在 `reapers` 中，
    /// 退出前需等待其完成。
    pub fn terminate(self, grace: Duration, reapers: &TaskTracker) -> std::io::Result<()> {
        let WorkerProcess {
            mut child, scope, ..
        } = self;
        scope.cancel();

        let signalled = send_sigterm(&mut child);

        // 运行时已关闭时无法后台回收，直接强制结束
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return child.start_kill();
        };
        reapers.spawn_on(
            async move {
                match tokio::time::timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => debug!("Worker exited after termination: {}", status),
                    Ok(Err(e)) => warn!("Failed to reap worker: {}", e),
                    Err(_) => {
                        warn!("Worker ignored SIGTERM for {:?}, killing", grace);
                        if let Err(e) = child.kill().await {
                            error!("Failed to kill worker: {}", e);
                        }
                    }
                }
            },
            &runtime,
        );

        signalled
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // id 为 None 说明进程已被回收
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(std::io::Error::other)?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// 进程启动接口
pub trait Launcher: Send + Sync {
    fn launch(&self, stream_id: &str, args: &[String]) -> std::io::Result<WorkerProcess>;
}

/// 使用 ffmpeg 作为编码进程
pub struct Engine {
    ffmpeg_binary: String,
}

impl Engine {
    pub fn new(ffmpeg_binary: impl Into<String>) -> Self {
        Self {
            ffmpeg_binary: ffmpeg_binary.into(),
        }
    }
}

impl Launcher for Engine {
    fn launch(&self, stream_id: &str, args: &[String]) -> std::io::Result<WorkerProcess> {
        info!("Starting stream [{}]: {} {}", stream_id, self.ffmpeg_binary, args.join(" "));
        let mut cmd = Command::new(&self.ffmpeg_binary);
        cmd.args(args);
        spawn_captured(cmd, stream_id).map_err(|e| {
            error!("Failed to spawn FFmpeg process: {}", e);
            e
        })
    }
}

/// 启动进程并捕获 stdout/stderr
///
/// 输出由后台任务持续读取，避免管道写满阻塞子进程。
pub fn spawn_captured(mut cmd: Command, stream_id: &str) -> std::io::Result<WorkerProcess> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    // 回收任务被中止时也不遗留进程
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let scope = CancellationToken::new();
    let stdout = OutputTail::default();
    let stderr = OutputTail::default();

    if let Some(out) = child.stdout.take() {
        tokio::spawn(drain(out, stdout.clone(), scope.clone()));
    }
    if let Some(err) = child.stderr.take() {
        tokio::spawn(drain(err, stderr.clone(), scope.clone()));
    }
    debug!("Stream [{}] worker pid {:?}", stream_id, child.id());

    Ok(WorkerProcess {
        child,
        stdout,
        stderr,
        scope,
    })
}

async fn drain<R>(reader: R, tail: OutputTail, scope: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => tail.push(line),
                _ => break,
            },
        }
    }
}
