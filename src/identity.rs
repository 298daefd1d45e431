use crate::config::IdentityConfig;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// 解析设备 ID
///
/// 优先读取硬件序列号；没有时读取本地 ID 文件，文件不存在则生成新的 UUID 并保存。
pub fn resolve_device_id(config: &IdentityConfig) -> anyhow::Result<String> {
    if config.serial_path.exists() {
        return read_id(&config.serial_path);
    }
    if config.fallback_path.exists() {
        return read_id(&config.fallback_path);
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = config.fallback_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&config.fallback_path, &id)
        .with_context(|| format!("writing {}", config.fallback_path.display()))?;
    info!("Generated device id {} at {:?}", id, config.fallback_path);
    Ok(id)
}

fn read_id(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    // 设备树中的序列号以 NUL 结尾
    Ok(raw.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
}
