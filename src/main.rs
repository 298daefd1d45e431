mod command;
mod config;
mod controller;
mod engine;
mod gateway;
mod identity;
mod probe;
mod state;
mod supervisor;
mod telemetry;
mod web;

use clap::Parser;
use config::AppConfig;
use controller::{ControllerClient, Reachability, TcpReachability};
use engine::Engine;
use gateway::{GatewayOptions, GatewayOrchestrator, StatusPublisher};
use probe::FfprobeProber;
use std::sync::Arc;
use std::time::Duration;
use supervisor::SupervisorContext;
use telemetry::Telemetry;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// VTX Relay - Edge Stream Relay Gateway
/// 按控制器下发的期望状态维护本机的转发/拼接流，并监管各路编码进程
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "vtx-relay.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统，默认 info 级别，可通过 RUST_LOG 覆盖
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let device_id = identity::resolve_device_id(&config.identity)?;
    info!("VTX Relay initialized. Device: {}", device_id);

    // 进程级关闭信号，每轮运行的编排器持有其子令牌
    let shutdown = CancellationToken::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    // 启动本地管理接口
    let status = Arc::new(StatusPublisher::default());
    let app = web::router(web::AdminState {
        streams: status.subscribe_streams(),
        system: status.subscribe_system(),
    });
    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!("Listening on {}", config.server.listen);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await });
        if let Err(e) = serve.await {
            error!("Admin server error: {}", e);
        }
    });

    let source = Arc::new(ControllerClient::new(&config.controller)?);
    let reachability = Arc::new(TcpReachability::new(&config.controller));
    let options = GatewayOptions {
        device_id,
        monitor_interval: Duration::from_secs(config.server.monitor_interval_sec),
        quantum: Duration::from_millis(config.server.loop_quantum_ms),
    };
    let retry_delay = Duration::from_secs(config.server.retry_delay_sec);

    // 外层重试循环: 网络恢复后重建编排器
    while !shutdown.is_cancelled() {
        if !wait_for_network(reachability.as_ref(), &shutdown, retry_delay).await {
            break;
        }

        let ctx = Arc::new(SupervisorContext {
            prober: Arc::new(FfprobeProber::new(
                config.server.ffprobe_binary.clone(),
                config.health.probe_timeout(),
            )),
            launcher: Arc::new(Engine::new(config.server.ffmpeg_binary.clone())),
            encoder: config.encoder.clone(),
            health: config.health.clone(),
            shutdown: shutdown.child_token(),
            reapers: TaskTracker::new(),
        });
        let mut gateway = GatewayOrchestrator::new(
            ctx,
            source.clone(),
            reachability.clone(),
            Telemetry::new(&config.telemetry),
            options.clone(),
            status.clone(),
        );
        gateway.run().await;

        if !shutdown.is_cancelled() {
            warn!("Gateway run ended, retrying in {:?}", retry_delay);
            sleep_or_cancel(&shutdown, retry_delay).await;
        }
    }

    info!("Terminating...");
    Ok(())
}

/// 等待网络可达，收到关闭信号时返回 false
async fn wait_for_network(
    reachability: &dyn Reachability,
    shutdown: &CancellationToken,
    retry_delay: Duration,
) -> bool {
    while !reachability.is_reachable().await {
        warn!("Network unavailable. Retrying...");
        if !sleep_or_cancel(shutdown, retry_delay).await {
            return false;
        }
    }
    !shutdown.is_cancelled()
}

async fn sleep_or_cancel(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// 将 SIGINT/SIGTERM 转换为关闭信号
async fn listen_for_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C");
    }

    shutdown.cancel();
}
