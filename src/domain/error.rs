/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - セッションファサードの外にはエラーを出さない：
///   公開操作はbool / Option / センチネル値で失敗を伝える（ポーリング消費モデル）

use thiserror::Error;

/// Domain層の統一エラー型
#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum DomainError {
    /// ストリームチャネル関連のエラー（起動・停止・配信）
    #[error("Capture error: {0}")]
    Capture(String),

    /// 圧縮カラーフレームのデコード失敗
    #[error("Decode error: {0}")]
    Decode(String),

    /// ベンダプロパティI/Oのエラー
    #[error("Property error: {0}")]
    Property(String),

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// タイムアウトエラー
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// デバイス不在（Recoverable）
    ///
    /// 列挙結果が空の場合など。セッションはClosedのまま留まり、
    /// isOpened()=falseとして観測できる。
    #[error("Device not available")]
    DeviceNotAvailable,

    /// 初期化エラー
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// その他のエラー
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Domain層の統一Result型
pub type DomainResult<T> = Result<T, DomainError>;
