//! Infrastructure層: 外部技術の統合
//!
//! Domain層のtraitを実装し、外部ライブラリ（image）やモックの
//! フレームソースと接続する。

pub mod decoder;
pub mod mock_channel;
