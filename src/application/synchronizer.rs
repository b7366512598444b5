//! フレームシンクロナイザ
//!
//! 独立したクロックで動く2つの非同期プロデューサ（カラー/デプスの
//! コールバックスレッド）を、単一の同期コンシューマ（grab/retrieve）へ
//! 突き合わせる。キューは持たない：未消費の古いフレームは新しい到着で
//! 黙って置き換えられる（最新のみ上書きポリシー、低レイテンシ最優先）。

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::domain::{Frame, StreamKind};

/// ペンディングスロットとラッチ済みスナップショット
///
/// 両者を1つのMutexで守ることで、grabでラッチされるスナップショットが
/// 更新途中で裂けないことを保証する。
#[derive(Debug, Default)]
struct SyncSlots {
    pending_depth: Option<Frame>,
    pending_color: Option<Frame>,
    grabbed_depth: Option<Frame>,
    grabbed_color: Option<Frame>,
}

/// フレームシンクロナイザ
///
/// ストリーム種別ごとにペンディングバッファを最大1つだけ保持し、
/// `wait_for_frames`で両スロットをアトミックにスナップショットへ移す。
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    slots: Mutex<SyncSlots>,
    pair_ready: Condvar,
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// カラーフレームの到着（アダプタのコールバックスレッドから呼ばれる）
    ///
    /// 未消費の古いフレームは黙って置き換えられる。
    pub fn on_color_frame(&self, frame: Frame) {
        let mut slots = self.slots.lock().unwrap();
        slots.pending_color = Some(frame);
        self.pair_ready.notify_all();
    }

    /// デプスフレームの到着（アダプタのコールバックスレッドから呼ばれる）
    pub fn on_depth_frame(&self, frame: Frame) {
        let mut slots = self.slots.lock().unwrap();
        slots.pending_depth = Some(frame);
        self.pair_ready.notify_all();
    }

    /// 両モダリティのフレームが揃うまで待機し、スナップショットをラッチする
    ///
    /// タイムアウトまでに揃わなくても、その時点のペンディングスロットを
    /// スナップショットへ移す（単一モダリティのデバイスを許容するため）。
    /// 述語はwakeのたびに再評価される（spurious wakeup耐性）。
    ///
    /// # Returns
    /// ラッチしたスナップショットの少なくとも一方が存在すればtrue
    pub fn wait_for_frames(&self, timeout: Duration) -> bool {
        let slots = self.slots.lock().unwrap();
        let (mut slots, _timeout_result) = self
            .pair_ready
            .wait_timeout_while(slots, timeout, |s| {
                s.pending_depth.is_none() || s.pending_color.is_none()
            })
            .unwrap();

        slots.grabbed_depth = slots.pending_depth.take();
        slots.grabbed_color = slots.pending_color.take();

        slots.grabbed_depth.is_some() || slots.grabbed_color.is_some()
    }

    /// ラッチ済みスナップショットから1モダリティ分を取り出す（単一消費）
    ///
    /// 取り出しはスロットをクリアする：同じ種別への2回目の呼び出しは、
    /// 次のgrabを挟まない限りNoneを返す。
    pub fn take_grabbed(&self, kind: StreamKind) -> Option<Frame> {
        let mut slots = self.slots.lock().unwrap();
        match kind {
            StreamKind::Depth => slots.grabbed_depth.take(),
            StreamKind::Color => slots.grabbed_color.take(),
        }
    }

    /// 全スロットを破棄する（teardown用）
    ///
    /// 呼び出し前に全チャネルが停止済みであること（同期stop契約）。
    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap();
        *slots = SyncSlots::default();
    }
}
