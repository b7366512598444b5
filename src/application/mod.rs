//! Application Layer
//!
//! セッション管理、フレーム同期、統計管理などのユースケースを実装します。
//!
//! ## モジュール構成
//! - `session`: キャプチャセッション（open/grab/retrieve/closeの状態機械）
//! - `synchronizer`: カラー/デプスのフレーム同期（最新のみ上書き）
//! - `stats`: 統計情報管理（FPS、レイテンシ、タイムアウト回数）

pub mod session;
pub mod stats;
pub mod synchronizer;
