use crate::config::EncoderSettings;
use tracing::warn;

/// 2x2 画面的格数
pub const GRID_SLOTS: usize = 4;

/// 依次为左上、右上、左下、右下
const GRID_LAYOUT: &str = "0_0|w0_0|0_h0|w0_h0";

/// 构建编码进程参数 (不含可执行文件本身)
///
/// - 1 路输入: 低延迟单路转码
/// - 2~4 路输入: 2x2 拼接，缺失的格子用纯黑画面填充
///
/// 超过 4 路时只取前 4 路。调用方保证 `valid_urls` 非空。
pub fn build(output_url: &str, valid_urls: &[String], settings: &EncoderSettings) -> Vec<String> {
    if valid_urls.len() > GRID_SLOTS {
        warn!(
            "{} valid sources for [{}], only the first {} are composed",
            valid_urls.len(),
            output_url,
            GRID_SLOTS
        );
    }

    match valid_urls {
        [] => Vec::new(),
        [single] => build_single(output_url, single, settings),
        many => build_grid(output_url, &many[..many.len().min(GRID_SLOTS)], settings),
    }
}

fn build_single(output_url: &str, source: &str, settings: &EncoderSettings) -> Vec<String> {
    let mut args = prefix();
    args.extend(strs(&["-fflags", "nobuffer", "-flags", "low_delay"]));
    push_input(&mut args, source);

    let scale = format!(
        "scale=w={}:h={}:force_original_aspect_ratio=decrease:force_divisible_by=2",
        settings.single_max_width, settings.single_max_height
    );
    args.push("-vf".to_string());
    args.push(scale);

    args.push("-an".to_string());
    push_video_encoding(&mut args, settings, &settings.single_bitrate);
    push_output(&mut args, output_url);
    args
}

fn build_grid(output_url: &str, sources: &[String], settings: &EncoderSettings) -> Vec<String> {
    let mut args = prefix();
    for source in sources {
        push_input(&mut args, source);
    }

    // 填充缺失的格子
    let filler = format!(
        "color=c=black:s={}x{}:r={}",
        settings.cell_width, settings.cell_height, settings.frame_rate
    );
    for _ in sources.len()..GRID_SLOTS {
        args.extend(strs(&["-f", "lavfi", "-i"]));
        args.push(filler.clone());
    }

    args.push("-filter_complex".to_string());
    args.push(grid_filter(settings));
    args.extend(strs(&["-map", "[out]", "-an"]));
    push_video_encoding(&mut args, settings, &settings.grid_bitrate);
    push_output(&mut args, output_url);
    args
}

/// 先缩放每一路，再用 xstack 按光栅顺序拼接
fn grid_filter(settings: &EncoderSettings) -> String {
    let mut graph = String::new();
    for slot in 0..GRID_SLOTS {
        graph.push_str(&format!(
            "[{slot}:v]scale={}:{},setsar=1[v{slot}];",
            settings.cell_width, settings.cell_height
        ));
    }
    for slot in 0..GRID_SLOTS {
        graph.push_str(&format!("[v{slot}]"));
    }
    graph.push_str(&format!(
        "xstack=inputs={GRID_SLOTS}:layout={GRID_LAYOUT}[out]"
    ));
    graph
}

fn prefix() -> Vec<String> {
    strs(&["-hide_banner", "-loglevel", "warning"])
}

fn push_input(args: &mut Vec<String>, source: &str) {
    if is_rtsp(source) {
        args.extend(strs(&["-rtsp_transport", "tcp"]));
    }
    args.extend(strs(&["-thread_queue_size", "512", "-i"]));
    args.push(source.to_string());
}

fn push_video_encoding(args: &mut Vec<String>, settings: &EncoderSettings, bitrate: &str) {
    args.push("-r".to_string());
    args.push(settings.frame_rate.to_string());
    args.extend(strs(&[
        "-pix_fmt",
        "yuv420p",
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
    ]));
    args.push("-b:v".to_string());
    args.push(bitrate.to_string());
    args.push("-maxrate".to_string());
    args.push(bitrate.to_string());
    args.push("-bufsize".to_string());
    args.push(double_rate(bitrate));
}

/// 根据目标协议选择封装格式
fn push_output(args: &mut Vec<String>, output_url: &str) {
    if is_rtsp(output_url) {
        args.extend(strs(&["-rtsp_transport", "tcp", "-f", "rtsp"]));
    } else if output_url.starts_with("rtmp://") || output_url.starts_with("rtmps://") {
        args.extend(strs(&["-f", "flv"]));
    } else {
        args.extend(strs(&["-f", "mpegts"]));
    }
    args.push(output_url.to_string());
}

fn is_rtsp(url: &str) -> bool {
    url.starts_with("rtsp://") || url.starts_with("rtsps://")
}

/// 缓冲区取码率的两倍，例如 "2M" -> "4M"
fn double_rate(rate: &str) -> String {
    let split = rate
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rate.len());
    let (digits, unit) = rate.split_at(split);
    match digits.parse::<u64>() {
        Ok(n) => format!("{}{}", n.saturating_mul(2), unit),
        Err(_) => rate.to_string(),
    }
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| format!("rtsp://172.17.0.1:8554/stream{i}"))
            .collect()
    }

    fn count(args: &[String], flag: &str) -> usize {
        args.iter().filter(|a| *a == flag).count()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn single_source_has_no_grid() {
        let args = build("rtsp://relay/out", &urls(1), &EncoderSettings::default());
        assert_eq!(count(&args, "-i"), 1);
        assert_eq!(count(&args, "-filter_complex"), 0);
        assert!(!args.iter().any(|a| a.contains("xstack")));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(value_after(&args, "-r"), Some("15"));
        assert_eq!(value_after(&args, "-maxrate"), Some("1M"));
        assert_eq!(value_after(&args, "-bufsize"), Some("2M"));
        assert!(value_after(&args, "-vf")
            .unwrap()
            .contains("force_divisible_by=2"));
        assert_eq!(args.last().map(String::as_str), Some("rtsp://relay/out"));
    }

    #[test]
    fn single_source_forces_tcp_transport() {
        let args = build("rtsp://relay/out", &urls(1), &EncoderSettings::default());
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input - 3], "tcp");
        assert_eq!(args[input - 4], "-rtsp_transport");
    }

    #[test]
    fn grid_always_has_four_inputs() {
        for n in 2..=4 {
            let args = build("rtsp://relay/out", &urls(n), &EncoderSettings::default());
            assert_eq!(count(&args, "-i"), 4, "{n} sources");
            assert_eq!(count(&args, "lavfi"), 4 - n);

            let graph = value_after(&args, "-filter_complex").unwrap();
            assert!(graph.ends_with("[v0][v1][v2][v3]xstack=inputs=4:layout=0_0|w0_0|0_h0|w0_h0[out]"));
            for slot in 0..4 {
                assert!(graph.contains(&format!("[{slot}:v]scale=960:540")));
            }
            assert_eq!(value_after(&args, "-map"), Some("[out]"));
            assert_eq!(value_after(&args, "-bufsize"), Some("4M"));
        }
    }

    #[test]
    fn grid_keeps_source_order() {
        let sources = urls(3);
        let args = build("rtsp://relay/out", &sources, &EncoderSettings::default());
        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(&inputs[..3], &[sources[0].as_str(), sources[1].as_str(), sources[2].as_str()]);
        assert_eq!(inputs[3], "color=c=black:s=960x540:r=15");
    }

    #[test]
    fn extra_sources_are_truncated() {
        let sources = urls(6);
        let args = build("rtsp://relay/out", &sources, &EncoderSettings::default());
        assert_eq!(count(&args, "-i"), 4);
        assert!(!args.contains(&sources[4]));
        assert!(!args.contains(&sources[5]));
    }

    #[test]
    fn output_muxer_follows_scheme() {
        let settings = EncoderSettings::default();
        let rtmp = build("rtmp://live/app/key", &urls(1), &settings);
        assert_eq!(value_after(&rtmp, "-f"), Some("flv"));

        let srt = build("srt://live:9000", &urls(2), &settings);
        assert_eq!(srt[srt.len() - 2], "mpegts");

        let rtsp = build("rtsp://relay/out", &urls(2), &settings);
        assert_eq!(rtsp[rtsp.len() - 2], "rtsp");
    }

    #[test]
    fn non_rtsp_input_skips_transport_flag() {
        let args = build(
            "rtsp://relay/out",
            &["http://cam/stream.m3u8".to_string()],
            &EncoderSettings::default(),
        );
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_ne!(args[input - 3], "tcp");
    }

    #[test]
    fn empty_sources_build_nothing() {
        assert!(build("rtsp://relay/out", &[], &EncoderSettings::default()).is_empty());
    }

    #[test]
    fn double_rate_keeps_unit() {
        assert_eq!(double_rate("2M"), "4M");
        assert_eq!(double_rate("1500k"), "3000k");
        assert_eq!(double_rate("800000"), "1600000");
        assert_eq!(double_rate("fast"), "fast");
    }
}
