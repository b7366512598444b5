mod application;
mod domain;
mod infrastructure;
mod logging;

use crate::application::session::CaptureSession;
use crate::application::stats::{StatKind, StatsCollector};
use crate::domain::config::AppConfig;
use crate::domain::registry::DeviceProfileRegistry;
use crate::domain::types::OutputKind;
use crate::infrastructure::decoder::ImageDecoderAdapter;
use crate::infrastructure::mock_channel::MockChannelEnumerator;
use crate::logging::init_logging;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    // ログシステムの初期化（非同期ファイル出力）
    let log_dir = PathBuf::from("logs");
    let _guard = init_logging("info", false, Some(log_dir));
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）

    tracing::info!("DepthWithColor starting...");

    match run() {
        Ok(_) => {
            tracing::info!("DepthWithColor terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// アプリケーションのメイン処理
fn run() -> anyhow::Result<()> {
    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("Loaded configuration from config.toml");
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    // 設定の検証
    config.validate()?;

    tracing::info!("Configuration validated successfully");
    tracing::info!(
        "Capture: device_index={}, grab_timeout={:?}",
        config.capture.device_index,
        config.capture.grab_timeout()
    );
    tracing::info!(
        "Mock source: model_id=0x{:04X}, frame_interval={:?}",
        config.mock_source.model_id,
        config.mock_source.frame_interval()
    );

    // モックチャネル列挙アダプタの初期化（実カメラの代替）
    let enumerator = MockChannelEnumerator::new(
        config.mock_source.model_id,
        config.mock_source.frame_interval(),
        config.mock_source.callback_delay(),
    );

    // セッションの構築とオープン
    let mut session = CaptureSession::new(
        Box::new(ImageDecoderAdapter::new()),
        DeviceProfileRegistry::new(),
        config.capture.grab_timeout(),
    );
    session.open(&enumerator, config.capture.device_index)?;

    if !session.is_opened() {
        anyhow::bail!(
            "no capture device found at index {}",
            config.capture.device_index
        );
    }

    tracing::info!("Starting capture loop (grab -> retrieve depth/color)...");

    // キャプチャループ（ブロッキング）
    let mut stats = StatsCollector::new(config.stats.report_interval());
    loop {
        let grab_start = Instant::now();
        let grabbed = session.grab_frame();
        stats.record_duration(StatKind::Grab, grab_start.elapsed());

        if grabbed {
            stats.record_frame();

            let depth_start = Instant::now();
            if let Some(frame) = session.retrieve_frame(OutputKind::DepthMap) {
                stats.record_duration(StatKind::DepthRetrieve, depth_start.elapsed());
                if let Some(map) = frame.into_depth() {
                    tracing::trace!(width = map.width, height = map.height, "depth map retrieved");
                }
            }

            let color_start = Instant::now();
            match session.retrieve_frame(OutputKind::BgrImage) {
                Some(frame) => {
                    stats.record_duration(StatKind::ColorRetrieve, color_start.elapsed());
                    if let Some(image) = frame.into_bgr() {
                        tracing::trace!(
                            width = image.width,
                            height = image.height,
                            "bgr image retrieved"
                        );
                    }
                }
                None => stats.record_decode_failure(),
            }
        } else {
            stats.record_timeout();
        }

        if stats.should_report() {
            stats.report_and_reset();
        }
    }
}
