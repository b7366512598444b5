/// Port定義（Clean Architectureのインターフェース）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Application層がDIで注入する。

use std::sync::Arc;

use crate::domain::{BgrImage, DomainResult, Frame, StreamKind, StreamProfile};

/// フレーム配信コールバック
///
/// アダプタ所有のコールバックスレッドから呼び出される。
/// `Arc`共有のため、セッション側の状態はコールバック内部で
/// 排他制御すること（FrameSynchronizerが担う）。
pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync>;

/// チャネルに対するベンダ固有プロパティのキー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelControl {
    /// デプス→カラーのアライメントを切り替える（ペイロード: 1バイトのフラグ）
    DepthToColorAlign,
    /// キャリブレーションブロブを読み出す
    CameraParam,
}

/// ストリームチャネルポート: ハードウェアの1ストリームを抽象化
///
/// # stop()の契約
/// `stop()`は**同期的**でなければならない：実行中のコールバック呼び出しが
/// 完了するまでブロックし、復帰後は一切のコールバックが発生しないことを
/// 保証する。この契約によりteardown時のuse-after-freeを排除する
/// （実行時検査ではなく事前条件として扱う）。
pub trait StreamChannelPort: Send {
    /// このチャネルが配信するモダリティ
    fn stream_kind(&self) -> StreamKind;

    /// デバイスモデル識別子（光学系・解像度・挙動の異なるバリアントを区別）
    fn model_id(&self) -> u16;

    /// 非同期配信を開始する
    ///
    /// アダプタ所有のスレッド上で、停止されるまでキャプチャごとに
    /// `on_frame`を呼び出す。
    ///
    /// # Returns
    /// - `Ok(())`: 配信開始成功
    /// - `Err(DomainError)`: 起動失敗（二重start等）
    fn start(&mut self, profile: StreamProfile, on_frame: FrameSink) -> DomainResult<()>;

    /// 配信を停止する（同期的、上記の契約を参照）
    fn stop(&mut self);

    /// ベンダ固有プロパティの読み出し
    fn get_property(&mut self, key: ChannelControl) -> DomainResult<Vec<u8>>;

    /// ベンダ固有プロパティの書き込み
    fn set_property(&mut self, key: ChannelControl, data: &[u8]) -> DomainResult<()>;
}

/// チャネル列挙ポート: デバイスインデックスからチャネル群を取得
pub trait ChannelEnumeratorPort {
    /// 指定デバイスのストリームチャネル群を列挙する
    ///
    /// # Returns
    /// - `Ok(vec![])`: デバイス不在（非致命、セッションはClosedのまま）
    /// - `Ok(channels)`: 列挙成功
    /// - `Err(DomainError)`: トランスポート障害
    fn enumerate(&self, device_index: usize) -> DomainResult<Vec<Box<dyn StreamChannelPort>>>;
}

/// デコーダポート: 圧縮カラービットストリームのデコードを抽象化
pub trait DecoderPort: Send {
    /// 圧縮ビットストリームをBGR画像へデコードする
    ///
    /// # Returns
    /// - `Some(BgrImage)`: デコード成功
    /// - `None`: 破損・不完全なビットストリーム（非致命、呼び出し側が破棄）
    fn decode_bgr(&self, encoded: &[u8]) -> Option<BgrImage>;
}
