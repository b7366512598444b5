/// モックストリームチャネルアダプタ
///
/// 実カメラなしでセッションを動かすための合成フレームソース。
/// チャネルごとにワーカースレッドを1本立て、フレーム周期ごとに
/// 合成フレームを生成してシンクへ配信する。stopはワーカーのjoinまで
/// ブロックする（同期stop契約）。

use std::io::Cursor;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use image::ImageFormat;
use tracing::{debug, warn};

use crate::domain::{
    CameraIntrinsics, ChannelControl, ChannelEnumeratorPort, DeviceProfileRegistry, DomainError,
    DomainResult, Frame, FrameSink, StreamChannelPort, StreamKind, StreamProfile,
};

/// モックストリームチャネル
pub struct MockStreamChannel {
    kind: StreamKind,
    model_id: u16,
    /// 合成フレームの配信周期
    frame_interval: Duration,
    /// シンク呼び出し前の人工遅延（teardown競合の再現用）
    callback_delay: Option<Duration>,
    intrinsics: CameraIntrinsics,
    align_enabled: bool,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MockStreamChannel {
    pub fn new(
        kind: StreamKind,
        model_id: u16,
        frame_interval: Duration,
        callback_delay: Option<Duration>,
        intrinsics: CameraIntrinsics,
    ) -> Self {
        Self {
            kind,
            model_id,
            frame_interval,
            callback_delay,
            intrinsics,
            align_enabled: false,
            stop_tx: None,
            worker: None,
        }
    }

    /// 指定プロファイルの合成デプスフレームを生成
    ///
    /// 行方向のグラデーションにtickを加えた動きのあるパターン。
    fn synthesize_depth(profile: &StreamProfile, tick: u64) -> Frame {
        let (width, height) = (profile.width, profile.height);
        let mut data = Vec::with_capacity((width * height * 2) as usize);
        for row in 0..height {
            let value = ((row as u64 * 4 + tick) % 0x3FFF) as u16;
            for _ in 0..width {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        Frame::new_depth(data, width, height, profile.format)
    }

    /// 指定プロファイルの合成カラービットストリームを生成（JPEG単色）
    ///
    /// エンコードはstart時に1回だけ行い、以後はバッファを複製する。
    fn synthesize_color_bitstream(profile: &StreamProfile) -> Vec<u8> {
        let img = image::RgbImage::from_fn(profile.width, profile.height, |x, _| {
            image::Rgb([(x % 256) as u8, 128, 64])
        });
        let mut buf = Cursor::new(Vec::new());
        if let Err(e) = image::DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Jpeg) {
            warn!(error = %e, "mock JPEG encode failed, delivering empty bitstream");
        }
        buf.into_inner()
    }
}

impl StreamChannelPort for MockStreamChannel {
    fn stream_kind(&self) -> StreamKind {
        self.kind
    }

    fn model_id(&self) -> u16 {
        self.model_id
    }

    fn start(&mut self, profile: StreamProfile, on_frame: FrameSink) -> DomainResult<()> {
        if self.worker.is_some() {
            return Err(DomainError::Capture("channel already started".to_string()));
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let kind = self.kind;
        let interval = self.frame_interval;
        let callback_delay = self.callback_delay;
        let color_bitstream = match kind {
            StreamKind::Color => Self::synthesize_color_bitstream(&profile),
            StreamKind::Depth => Vec::new(),
        };

        let worker = std::thread::Builder::new()
            .name(format!("mock-{:?}-channel", kind).to_lowercase())
            .spawn(move || {
                let mut tick: u64 = 0;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    let frame = match kind {
                        StreamKind::Depth => Self::synthesize_depth(&profile, tick),
                        StreamKind::Color => Frame::new_color(color_bitstream.clone()),
                    };
                    tick += 1;

                    if let Some(delay) = callback_delay {
                        std::thread::sleep(delay);
                    }
                    (on_frame)(frame);
                }
                debug!(?kind, "mock channel worker stopped");
            })
            .map_err(|e| DomainError::Capture(format!("failed to spawn mock worker: {}", e)))?;

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // ワーカーが既に終了していても失敗は無害
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(kind = ?self.kind, "mock channel worker panicked");
            }
        }
    }

    fn get_property(&mut self, key: ChannelControl) -> DomainResult<Vec<u8>> {
        match key {
            ChannelControl::CameraParam => Ok(self.intrinsics.to_calibration_blob()),
            ChannelControl::DepthToColorAlign => Ok(vec![self.align_enabled as u8]),
        }
    }

    fn set_property(&mut self, key: ChannelControl, data: &[u8]) -> DomainResult<()> {
        match key {
            ChannelControl::DepthToColorAlign => {
                self.align_enabled = data.first().copied().unwrap_or(0) != 0;
                Ok(())
            }
            ChannelControl::CameraParam => Err(DomainError::Property(
                "camera parameters are read-only".to_string(),
            )),
        }
    }
}

impl Drop for MockStreamChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// モックチャネル列挙アダプタ
///
/// デバイスindex 0にデプス+カラーの1組を見せる。それ以外のindexは
/// 空（デバイス不在）を返す。
pub struct MockChannelEnumerator {
    model_id: u16,
    frame_interval: Duration,
    callback_delay: Option<Duration>,
}

impl MockChannelEnumerator {
    pub fn new(model_id: u16, frame_interval: Duration, callback_delay: Option<Duration>) -> Self {
        Self {
            model_id,
            frame_interval,
            callback_delay,
        }
    }

    /// モデルに応じた内部パラメータを合成
    ///
    /// 主点はデプスプロファイルの画像中心に置く。基準解像度なら
    /// キャリブレーションスケール1、高解像度バリアントなら2相当になる。
    fn synthesize_intrinsics(&self) -> CameraIntrinsics {
        let registry = DeviceProfileRegistry::new();
        let profile = registry.resolve(self.model_id).depth_profile;
        let focal = profile.width as f32 * 0.9;
        CameraIntrinsics::new(
            focal,
            focal,
            profile.width as f32 / 2.0,
            profile.height as f32 / 2.0,
        )
    }
}

impl ChannelEnumeratorPort for MockChannelEnumerator {
    fn enumerate(&self, device_index: usize) -> DomainResult<Vec<Box<dyn StreamChannelPort>>> {
        if device_index != 0 {
            return Ok(Vec::new());
        }

        let intrinsics = self.synthesize_intrinsics();
        let channels: Vec<Box<dyn StreamChannelPort>> = vec![
            Box::new(MockStreamChannel::new(
                StreamKind::Depth,
                self.model_id,
                self.frame_interval,
                self.callback_delay,
                intrinsics,
            )),
            Box::new(MockStreamChannel::new(
                StreamKind::Color,
                self.model_id,
                self.frame_interval,
                self.callback_delay,
                intrinsics,
            )),
        ];
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use crate::domain::FrameFormat;

    #[test]
    fn test_mock_channel_delivers_frames() {
        let mut channel = MockStreamChannel::new(
            StreamKind::Depth,
            0,
            Duration::from_millis(5),
            None,
            CameraIntrinsics::new(570.0, 570.0, 320.0, 240.0),
        );
        let delivered = Arc::new(AtomicUsize::new(0));

        let sink: FrameSink = {
            let delivered = Arc::clone(&delivered);
            Arc::new(move |frame: Frame| {
                assert_eq!(frame.width, 640);
                assert_eq!(frame.height, 480);
                assert_eq!(frame.data.len(), 640 * 480 * 2);
                delivered.fetch_add(1, Ordering::SeqCst);
            })
        };

        channel
            .start(StreamProfile::new(640, 480, 30, FrameFormat::Y16), sink)
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        channel.stop();

        assert!(delivered.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_stop_is_synchronous() {
        let mut channel = MockStreamChannel::new(
            StreamKind::Depth,
            0,
            Duration::from_millis(5),
            Some(Duration::from_millis(10)),
            CameraIntrinsics::new(570.0, 570.0, 320.0, 240.0),
        );
        let delivered = Arc::new(AtomicUsize::new(0));

        let sink: FrameSink = {
            let delivered = Arc::clone(&delivered);
            Arc::new(move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            })
        };

        channel
            .start(StreamProfile::new(320, 240, 30, FrameFormat::Y16), sink)
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        channel.stop();

        // stop復帰後はコールバックが発火しない
        let after_stop = delivered.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(delivered.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_double_start_rejected() {
        let mut channel = MockStreamChannel::new(
            StreamKind::Depth,
            0,
            Duration::from_millis(100),
            None,
            CameraIntrinsics::new(570.0, 570.0, 320.0, 240.0),
        );
        let profile = StreamProfile::new(640, 480, 30, FrameFormat::Y16);
        let sink: FrameSink = Arc::new(|_| {});

        channel.start(profile, Arc::clone(&sink)).unwrap();
        assert!(channel.start(profile, sink).is_err());
        channel.stop();
    }

    #[test]
    fn test_property_surface() {
        let intrinsics = CameraIntrinsics::new(570.0, 570.0, 320.0, 240.0);
        let mut channel = MockStreamChannel::new(
            StreamKind::Depth,
            0,
            Duration::from_millis(100),
            None,
            intrinsics,
        );

        let blob = channel.get_property(ChannelControl::CameraParam).unwrap();
        assert_eq!(
            CameraIntrinsics::from_calibration_blob(&blob),
            Some(intrinsics)
        );

        channel
            .set_property(ChannelControl::DepthToColorAlign, &[1])
            .unwrap();
        assert_eq!(
            channel
                .get_property(ChannelControl::DepthToColorAlign)
                .unwrap(),
            vec![1]
        );

        assert!(channel
            .set_property(ChannelControl::CameraParam, &[0; 32])
            .is_err());
    }

    #[test]
    fn test_enumerator_device_presence() {
        let enumerator = MockChannelEnumerator::new(0, Duration::from_millis(33), None);

        let channels = enumerator.enumerate(0).unwrap();
        assert_eq!(channels.len(), 2);
        let kinds: Vec<StreamKind> = channels.iter().map(|c| c.stream_kind()).collect();
        assert!(kinds.contains(&StreamKind::Depth));
        assert!(kinds.contains(&StreamKind::Color));

        assert!(enumerator.enumerate(1).unwrap().is_empty());
    }
}
