//! キャプチャセッション
//!
//! カラー/デプスのストリームチャネル群のライフサイクル（enumerate →
//! start → stop）と、grab/retrieveの公開サーフェスを担うユースケース層。
//! ハードウェアの差異はポート越しに吸収し、ここではプロトコル
//! （状態遷移・後処理・プロパティ解決）だけを扱う。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::application::synchronizer::FrameSynchronizer;
use crate::domain::{
    CameraIntrinsics, ChannelControl, ChannelEnumeratorPort, DecoderPort, DepthMap, DeviceProfile,
    DeviceProfileRegistry, DomainError, DomainResult, OutputKind, RetrievedFrame, SessionProperty,
    StreamChannelPort, StreamKind,
};

/// セッションの状態
///
/// Closed → Opening → Opened の一方向にのみ遷移し、closeでClosedへ戻る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Closed,
    Opening,
    Opened,
}

/// キャプチャセッション
///
/// 所有するチャネル群と、コールバックスレッドと共有するシンクロナイザを
/// 束ねる。grab/retrieveは単一のコンシューマスレッドから呼ばれる前提。
pub struct CaptureSession {
    state: SessionState,
    channels: Vec<Box<dyn StreamChannelPort>>,
    synchronizer: Arc<FrameSynchronizer>,
    registry: DeviceProfileRegistry,
    decoder: Box<dyn DecoderPort>,
    /// openで解決したデプスプロファイル（後処理パラメータの出所）
    depth_profile: Option<DeviceProfile>,
    intrinsics: Option<CameraIntrinsics>,
    /// キャリブレーションスケール（open時に一度だけ導出、最低1）
    calibration_scale: u32,
    /// grabの待機上限（設定で上書き可能、既定はフレーム周期）
    grab_timeout: Duration,
    grab_timeout_override: Option<Duration>,
}

impl CaptureSession {
    pub fn new(
        decoder: Box<dyn DecoderPort>,
        registry: DeviceProfileRegistry,
        grab_timeout_override: Option<Duration>,
    ) -> Self {
        let default_interval = registry.default_profile().color_profile.frame_interval();
        Self {
            state: SessionState::Closed,
            channels: Vec::new(),
            synchronizer: Arc::new(FrameSynchronizer::new()),
            registry,
            decoder,
            depth_profile: None,
            intrinsics: None,
            calibration_scale: 1,
            grab_timeout: grab_timeout_override.unwrap_or(default_interval),
            grab_timeout_override,
        }
    }

    /// セッションを開く
    ///
    /// 列挙されたチャネルを種別ごとに構成・起動する。デバイスが1台も
    /// 見つからない場合はエラーにせず、Closedのまま復帰する（呼び出し側は
    /// `is_opened`で判定する）。いずれかのチャネルのstart失敗は致命で、
    /// 起動済みチャネルを同期的に巻き戻してからエラーを返す。
    pub fn open(
        &mut self,
        enumerator: &dyn ChannelEnumeratorPort,
        device_index: usize,
    ) -> DomainResult<()> {
        if self.state != SessionState::Closed {
            return Err(DomainError::Initialization(format!(
                "session already open (state: {:?})",
                self.state
            )));
        }

        let channels = enumerator.enumerate(device_index)?;
        if channels.is_empty() {
            warn!(device_index, "no stream channels found, session stays closed");
            return Ok(());
        }

        self.state = SessionState::Opening;
        self.channels = channels;

        if let Err(e) = self.start_channels() {
            warn!(error = %e, "channel startup failed, rolling back");
            self.close();
            return Err(e);
        }

        self.state = SessionState::Opened;
        info!(
            device_index,
            channels = self.channels.len(),
            calibration_scale = self.calibration_scale,
            "capture session opened"
        );
        Ok(())
    }

    /// 全チャネルを構成・起動する（openの内部工程）
    fn start_channels(&mut self) -> DomainResult<()> {
        let default_profile = self.registry.default_profile().clone();
        let reference_width = self.registry.reference_width();

        for channel in self.channels.iter_mut() {
            match channel.stream_kind() {
                StreamKind::Color => {
                    let sink = {
                        let sync = Arc::clone(&self.synchronizer);
                        Arc::new(move |frame| sync.on_color_frame(frame))
                    };
                    channel.start(default_profile.color_profile, sink)?;
                    debug!("color channel started");
                }
                StreamKind::Depth => {
                    // アライメント設定の失敗は非致命（非対応ファームウェアを許容）
                    if let Err(e) = channel.set_property(ChannelControl::DepthToColorAlign, &[1]) {
                        warn!(error = %e, "depth-to-color alignment not applied");
                    }

                    let profile = self.registry.resolve(channel.model_id()).clone();
                    let sink = {
                        let sync = Arc::clone(&self.synchronizer);
                        Arc::new(move |frame| sync.on_depth_frame(frame))
                    };
                    channel.start(profile.depth_profile, sink)?;
                    debug!(model_id = profile.model_id, profile = profile.name, "depth channel started");

                    // キャリブレーション取得の失敗も非致命（スケールは1のまま）
                    if self.intrinsics.is_none() {
                        match channel.get_property(ChannelControl::CameraParam) {
                            Ok(blob) => match CameraIntrinsics::from_calibration_blob(&blob) {
                                Some(intrinsics) => {
                                    self.calibration_scale =
                                        intrinsics.calibration_scale(reference_width);
                                    self.intrinsics = Some(intrinsics);
                                }
                                None => {
                                    warn!(len = blob.len(), "calibration blob too short, ignored")
                                }
                            },
                            Err(e) => warn!(error = %e, "calibration read failed, ignored"),
                        }
                    }

                    if self.grab_timeout_override.is_none() {
                        self.grab_timeout = profile.depth_profile.frame_interval();
                    }
                    self.depth_profile = Some(profile);
                }
            }
        }
        Ok(())
    }

    pub fn is_opened(&self) -> bool {
        self.state == SessionState::Opened
    }

    /// 両モダリティのフレームが揃うのを待ってスナップショットをラッチする
    ///
    /// タイムアウトしても片方だけ届いていればtrue。セッションが開いて
    /// いなければ待たずにfalse。
    pub fn grab_frame(&self) -> bool {
        if self.state != SessionState::Opened {
            return false;
        }
        self.synchronizer.wait_for_frames(self.grab_timeout)
    }

    /// ラッチ済みスナップショットから1フレームを取り出す（単一消費）
    ///
    /// デプスはプロファイルのスケール・クロップを適用済みの値、カラーは
    /// デコード済みBGRで返す。対象スロットが空、またはデコード失敗は
    /// Noneを返し、ストリームは継続する。
    pub fn retrieve_frame(&self, kind: OutputKind) -> Option<RetrievedFrame> {
        match kind {
            OutputKind::DepthMap => {
                let frame = self.synchronizer.take_grabbed(StreamKind::Depth)?;
                Some(RetrievedFrame::Depth(self.postprocess_depth(frame)))
            }
            OutputKind::BgrImage => {
                let frame = self.synchronizer.take_grabbed(StreamKind::Color)?;
                match self.decoder.decode_bgr(&frame.data) {
                    Some(image) => Some(RetrievedFrame::Bgr(image)),
                    None => {
                        debug!(len = frame.data.len(), "color frame decode failed, dropped");
                        None
                    }
                }
            }
        }
    }

    /// デプス後処理：クロップ → 値スケール
    ///
    /// クロップ矩形はフレーム実寸に収まり、かつバッファが宣言サイズ分
    /// 埋まっている場合のみ適用する（プロファイルと実配信サイズの不一致、
    /// 途中で切れた転送を許容）。スケールは全ピクセルに乗算し、
    /// 最近傍整数へ丸める。
    fn postprocess_depth(&self, frame: crate::domain::Frame) -> DepthMap {
        let pixels = frame.depth_pixels();
        let (crop, scale) = match &self.depth_profile {
            Some(profile) => (profile.depth_crop, profile.depth_scale),
            None => (None, 1.0),
        };

        let declared_len = frame.width as usize * frame.height as usize;
        let (pixels, width, height) = match crop {
            Some(rect) if rect.fits_in(frame.width, frame.height) && pixels.len() >= declared_len => {
                let mut cropped = Vec::with_capacity((rect.width * rect.height) as usize);
                for row in rect.y..rect.y + rect.height {
                    let start = (row * frame.width + rect.x) as usize;
                    cropped.extend_from_slice(&pixels[start..start + rect.width as usize]);
                }
                (cropped, rect.width, rect.height)
            }
            _ => (pixels, frame.width, frame.height),
        };

        let pixels = if (scale - 1.0).abs() < f32::EPSILON {
            pixels
        } else {
            pixels
                .into_iter()
                .map(|p| (p as f32 * scale + 0.5) as u16)
                .collect()
        };

        DepthMap {
            pixels,
            width,
            height,
        }
    }

    /// プロパティ値を取得する
    ///
    /// 生IDはジェネレータ選択ビットを含んでいてよい（マスクして無視）。
    /// 内部パラメータはキャリブレーションスケールで除算した値を返す。
    /// 未知のID、または内部パラメータ未取得の場合は0.0。
    pub fn get_property(&self, raw_id: i32) -> f64 {
        let (_selector, prop) = SessionProperty::unpack(raw_id);
        let Some(prop) = prop else {
            debug!(raw_id, "unknown property id");
            return 0.0;
        };
        match &self.intrinsics {
            Some(intrinsics) => {
                (intrinsics.component(prop) / self.calibration_scale as f32) as f64
            }
            None => {
                debug!(?prop, "intrinsics not available");
                0.0
            }
        }
    }

    /// プロパティ値の設定（非対応）
    ///
    /// 書き込み可能なプロパティは存在しない。常にfalseを返し、要求内容を
    /// 診断ログに残す。
    pub fn set_property(&mut self, raw_id: i32, value: f64) -> bool {
        warn!(raw_id, value, "unsupported property write ignored");
        false
    }

    /// セッションを閉じる
    ///
    /// チャネルの停止が先、バッファ解放が後。stopは同期契約なので、
    /// clearの時点でコールバックは発火しない。冪等。
    pub fn close(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.stop();
        }
        self.channels.clear();
        self.synchronizer.clear();
        self.depth_profile = None;
        self.intrinsics = None;
        self.calibration_scale = 1;
        if self.state != SessionState::Closed {
            info!("capture session closed");
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
