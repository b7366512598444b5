//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。
//! ストリームプロファイル等のデバイス固有定数はレジストリが所有するため、
//! ここではセッションの動作パラメータのみを扱う。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult};

/// アプリケーション設定のルート構造
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// キャプチャセッション設定
    pub capture: CaptureConfig,
    /// 統計出力設定
    pub stats: StatsConfig,
    /// モックストリームソース設定（デモバイナリ用）
    #[serde(default)]
    pub mock_source: MockSourceConfig,
}

/// キャプチャセッション設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaptureConfig {
    /// オープンするデバイスのインデックス
    ///
    /// 通常は0
    pub device_index: usize,

    /// grab待ちのタイムアウト（ミリ秒）
    ///
    /// 0 = プロファイルのフレームレートから自動導出（30fpsなら約33ms）
    /// デフォルト: 0
    #[serde(default)]
    pub grab_timeout_ms: u64,
}

impl CaptureConfig {
    /// grabタイムアウトの明示指定をDurationとして取得
    ///
    /// # Returns
    /// - `Some(Duration)`: 明示指定あり
    /// - `None`: 自動導出（フレーム周期を使用）
    pub fn grab_timeout(&self) -> Option<Duration> {
        if self.grab_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.grab_timeout_ms))
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            grab_timeout_ms: 0,
        }
    }
}

/// 統計出力設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatsConfig {
    /// 統計情報の出力間隔（秒）
    pub report_interval_sec: u64,
}

impl StatsConfig {
    /// デフォルトの統計出力間隔（秒）
    pub const DEFAULT_REPORT_INTERVAL_SEC: u64 = 10;

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_sec)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval_sec: Self::DEFAULT_REPORT_INTERVAL_SEC,
        }
    }
}

/// モックストリームソース設定
///
/// デモバイナリはハードウェアドライバの代わりにモックアダプタを接続する。
/// 実機ドライバは外部コラボレータであり、このクレートの範囲外。
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MockSourceConfig {
    /// 合成フレームの配信間隔（ミリ秒）
    ///
    /// デフォルト: 33ms（約30fps）
    pub frame_interval_ms: u64,

    /// コールバック内の擬似処理遅延（ミリ秒）
    ///
    /// teardown経路の動作確認用。0で無効。
    #[serde(default)]
    pub callback_delay_ms: u64,

    /// モックが名乗るデバイスモデルID
    ///
    /// 0 = ジェネリックモデル
    #[serde(default)]
    pub model_id: u16,
}

impl MockSourceConfig {
    /// デフォルトの配信間隔（ミリ秒）
    pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn callback_delay(&self) -> Option<Duration> {
        if self.callback_delay_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.callback_delay_ms))
        }
    }
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: Self::DEFAULT_FRAME_INTERVAL_MS,
            callback_delay_ms: 0,
            model_id: 0,
        }
    }
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| DomainError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    #[allow(dead_code)]
    pub fn write_default<P: AsRef<Path>>(path: P) -> DomainResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config).map_err(|e| {
            DomainError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| DomainError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> DomainResult<()> {
        if self.stats.report_interval_sec == 0 {
            return Err(DomainError::Configuration(
                "Stats report interval must be greater than 0".to_string(),
            ));
        }

        if self.mock_source.frame_interval_ms == 0 {
            return Err(DomainError::Configuration(
                "Mock frame interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.capture.device_index, 0);
        assert_eq!(config.capture.grab_timeout_ms, 0);
        assert!(config.capture.grab_timeout().is_none());
        assert_eq!(config.stats.report_interval_sec, 10);
        assert_eq!(config.mock_source.frame_interval_ms, 33);
    }

    #[test]
    fn test_grab_timeout_explicit() {
        let config = CaptureConfig {
            device_index: 0,
            grab_timeout_ms: 50,
        };
        assert_eq!(config.grab_timeout(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        // 統計間隔0は不正
        config.stats.report_interval_sec = 0;
        assert!(config.validate().is_err());

        config.stats.report_interval_sec = 10;

        // モック配信間隔0は不正
        config.mock_source.frame_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_write_and_reload() {
        let dir = tempfile::tempdir().expect("一時ディレクトリが作成できません");
        let path = dir.path().join("config.toml");

        AppConfig::write_default(&path).expect("設定の書き出しに失敗しました");
        let config = AppConfig::from_file(&path).expect("設定の再読み込みに失敗しました");

        config.validate().expect("再読み込みした設定が不正です");
        assert_eq!(config.capture.device_index, 0);
    }

    #[test]
    fn test_config_loads() {
        // config.tomlが正常に読み込めることを確認
        let config = AppConfig::from_file("config.toml").expect("config.tomlが読み込めません");
        config
            .validate()
            .expect("設定値のバリデーションに失敗しました");
    }

    #[test]
    fn test_config_example_loads() {
        // config.toml.exampleが正常に読み込めることを確認
        let config = AppConfig::from_file("config.toml.example")
            .expect("config.toml.exampleが読み込めません");
        config
            .validate()
            .expect("設定値のバリデーションに失敗しました");
    }

    #[test]
    fn test_mock_source_parsing() {
        let toml = r#"
            frame_interval_ms = 16
            callback_delay_ms = 5
            model_id = 1648
        "#;
        let config: MockSourceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        assert_eq!(config.callback_delay(), Some(Duration::from_millis(5)));
        assert_eq!(config.model_id, 1648);
    }
}
