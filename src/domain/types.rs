/// コア型定義
///
/// Domain層の中心となるデータ構造。
/// ストリームプロファイル、フレーム、キャリブレーション情報など、
/// すべての処理で共有される不変の型。

use std::time::Duration;

/// ストリームの種別（モダリティ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// カラーストリーム（圧縮ビットストリーム）
    Color,
    /// デプスストリーム（非圧縮16bit）
    Depth,
}

/// フレームのピクセルフォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Motion JPEG（圧縮、可変サイズ）
    Mjpg,
    /// 16bitデプス
    Y16,
    /// 14bitデプス（16bitコンテナで配信される）
    Y14,
}

impl FrameFormat {
    /// 圧縮フォーマットか判定
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpg)
    }

    /// 1ピクセルあたりのバイト数（圧縮フォーマットは0）
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpg => 0,
            FrameFormat::Y16 | FrameFormat::Y14 => 2,
        }
    }
}

/// ストリームチャネルに要求するプロファイル
///
/// デバイス+ストリーム種別のペアごとに選択される不変の値。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamProfile {
    pub width: u32,
    pub height: u32,
    /// 目標フレームレート（fps）
    pub frame_rate: u32,
    pub format: FrameFormat,
}

impl StreamProfile {
    pub const fn new(width: u32, height: u32, frame_rate: u32, format: FrameFormat) -> Self {
        Self {
            width,
            height,
            frame_rate,
            format,
        }
    }

    /// 1フレーム分の周期を取得（grab待ちのタイムアウト境界に使用）
    ///
    /// 30fpsなら約33ms。frame_rate=0の場合は33msにフォールバック。
    pub fn frame_interval(&self) -> Duration {
        if self.frame_rate == 0 {
            return Duration::from_millis(33);
        }
        Duration::from_millis(1000 / self.frame_rate as u64)
    }
}

/// キャプチャされた1フレーム
///
/// ハードウェアコラボレータが生成し、消費されるまでシンクロナイザが
/// 一時的に所有する。カラーは圧縮ビットストリームのためwidth/height/strideは
/// 名目値、デプスは実寸。
#[derive(Debug, Clone)]
pub struct Frame {
    /// 生バッファ（カラー: 圧縮ビットストリーム、デプス: u16リトルエンディアン列）
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1行あたりのバイト数（圧縮フォーマットは0）
    pub stride: u32,
    pub format: FrameFormat,
}

impl Frame {
    /// 圧縮カラーフレームを作成（バッファはopaque）
    pub fn new_color(data: Vec<u8>) -> Self {
        Self {
            data,
            width: 0,
            height: 0,
            stride: 0,
            format: FrameFormat::Mjpg,
        }
    }

    /// 非圧縮デプスフレームを作成（stride = width * 2）
    pub fn new_depth(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data,
            width,
            height,
            stride: width * 2,
            format,
        }
    }

    /// デプスピクセルをu16列として取り出す
    ///
    /// 圧縮フォーマットの場合は空列を返す。
    pub fn depth_pixels(&self) -> Vec<u16> {
        if self.format.is_compressed() {
            return Vec::new();
        }
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// デプス後処理で適用されるクロップ矩形（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 指定サイズのフレームに収まるか判定
    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}

/// カメラ内部パラメータ（焦点距離・主点）
///
/// キャリブレーションブロブから取り出した生値。公開プロパティとしては
/// `calibration_scale`で除算した値を返す。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    /// キャリブレーションブロブの長さ（バイト）
    ///
    /// レイアウト: f32リトルエンディアン x 8
    /// [0..16) カラー側 fx, fy, cx, cy / [16..32) デプス側 fx, fy, cx, cy
    pub const BLOB_LEN: usize = 32;

    /// デプス側グループのオフセット（バイト）
    const DEPTH_GROUP_OFFSET: usize = 16;

    pub const fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// キャリブレーションブロブからデプス側内部パラメータを取り出す
    ///
    /// # Returns
    /// - `Some(CameraIntrinsics)`: パース成功
    /// - `None`: ブロブ長が不足
    pub fn from_calibration_blob(blob: &[u8]) -> Option<Self> {
        if blob.len() < Self::BLOB_LEN {
            return None;
        }
        let mut values = [0f32; 4];
        for (i, value) in values.iter_mut().enumerate() {
            let at = Self::DEPTH_GROUP_OFFSET + i * 4;
            *value = f32::from_le_bytes([blob[at], blob[at + 1], blob[at + 2], blob[at + 3]]);
        }
        Some(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// キャリブレーションブロブへエンコード（モック・テスト用）
    ///
    /// カラー側グループにはデプス側と同じ値を書き込む。
    pub fn to_calibration_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(Self::BLOB_LEN);
        for _ in 0..2 {
            for value in [self.fx, self.fy, self.cx, self.cy] {
                blob.extend_from_slice(&value.to_le_bytes());
            }
        }
        blob
    }

    /// キャリブレーションスケールを導出
    ///
    /// 主点X座標と基準解像度幅から算出する整数スケール。基準解像度
    /// (640幅)のデバイスでは1、高解像度バリアントでは2以上になる。
    /// 0にはならない（最低1に丸める）。
    pub fn calibration_scale(&self, reference_width: u32) -> u32 {
        if reference_width == 0 {
            return 1;
        }
        let scale = (self.cx * 2.0 / reference_width as f32 + 0.5) as u32;
        scale.max(1)
    }

    /// プロパティ種別に対応する生の成分を取得
    pub fn component(&self, prop: SessionProperty) -> f32 {
        match prop {
            SessionProperty::IntrinsicFx => self.fx,
            SessionProperty::IntrinsicFy => self.fy,
            SessionProperty::IntrinsicCx => self.cx,
            SessionProperty::IntrinsicCy => self.cy,
        }
    }
}

/// retrieveで要求するフレーム種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// 後処理済みデプスマップ
    DepthMap,
    /// デコード済みBGR画像
    BgrImage,
}

/// 後処理済みデプスマップ（スケール・クロップ適用済み）
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub pixels: Vec<u16>,
    pub width: u32,
    pub height: u32,
}

/// デコード済みBGR画像（3バイト/ピクセル、連続メモリ）
#[derive(Debug, Clone, PartialEq)]
pub struct BgrImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// retrieveの結果
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedFrame {
    Depth(DepthMap),
    Bgr(BgrImage),
}

impl RetrievedFrame {
    pub fn into_depth(self) -> Option<DepthMap> {
        match self {
            RetrievedFrame::Depth(map) => Some(map),
            RetrievedFrame::Bgr(_) => None,
        }
    }

    pub fn into_bgr(self) -> Option<BgrImage> {
        match self {
            RetrievedFrame::Bgr(image) => Some(image),
            RetrievedFrame::Depth(_) => None,
        }
    }
}

/// デプスジェネレータ選択フラグ（プロパティIDに埋め込まれるビット領域）
pub const GENERATOR_DEPTH: i32 = 1 << 29;
/// イメージジェネレータ選択フラグ
pub const GENERATOR_IMAGE: i32 = 1 << 28;
/// IRジェネレータ選択フラグ
pub const GENERATOR_IR: i32 = 1 << 27;
/// ジェネレータ選択ビット領域のマスク（ディスパッチ前に取り除く）
pub const GENERATOR_MASK: i32 = GENERATOR_DEPTH | GENERATOR_IMAGE | GENERATOR_IR;

/// 内部パラメータFXのプロパティID
pub const PROP_INTRINSIC_FX: i32 = 26001;
/// 内部パラメータFYのプロパティID
pub const PROP_INTRINSIC_FY: i32 = 26002;
/// 内部パラメータCXのプロパティID
pub const PROP_INTRINSIC_CX: i32 = 26003;
/// 内部パラメータCYのプロパティID
pub const PROP_INTRINSIC_CY: i32 = 26004;

/// セッションが公開するプロパティ
///
/// 外部ファサードはジェネレータ選択ビットを含む整数IDを渡してくるため、
/// `unpack`でマスクしてからタグ付きenumに変換する。マジックビットへの
/// 依存をこの境界で断ち切る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProperty {
    IntrinsicFx,
    IntrinsicFy,
    IntrinsicCx,
    IntrinsicCy,
}

impl SessionProperty {
    /// 生のプロパティIDからセレクタ部とプロパティ部を分離
    ///
    /// # Returns
    /// - `(selector, Some(prop))`: 既知のプロパティID
    /// - `(selector, None)`: 未知のID（非致命、呼び出し側がセンチネルを返す）
    pub fn unpack(raw_id: i32) -> (i32, Option<Self>) {
        let selector = raw_id & GENERATOR_MASK;
        let prop = match raw_id & !GENERATOR_MASK {
            PROP_INTRINSIC_FX => Some(Self::IntrinsicFx),
            PROP_INTRINSIC_FY => Some(Self::IntrinsicFy),
            PROP_INTRINSIC_CX => Some(Self::IntrinsicCx),
            PROP_INTRINSIC_CY => Some(Self::IntrinsicCy),
            _ => None,
        };
        (selector, prop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_properties() {
        assert!(FrameFormat::Mjpg.is_compressed());
        assert!(!FrameFormat::Y16.is_compressed());
        assert_eq!(FrameFormat::Mjpg.bytes_per_pixel(), 0);
        assert_eq!(FrameFormat::Y16.bytes_per_pixel(), 2);
        assert_eq!(FrameFormat::Y14.bytes_per_pixel(), 2);
    }

    #[test]
    fn test_stream_profile_frame_interval() {
        let profile = StreamProfile::new(640, 480, 30, FrameFormat::Y16);
        assert_eq!(profile.frame_interval(), Duration::from_millis(33));

        // frame_rate=0でもパニックしない
        let degenerate = StreamProfile::new(640, 480, 0, FrameFormat::Y16);
        assert_eq!(degenerate.frame_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_depth_pixels_round_trip() {
        let pixels: Vec<u16> = vec![0, 100, 1000, 65535];
        let mut data = Vec::new();
        for p in &pixels {
            data.extend_from_slice(&p.to_le_bytes());
        }
        let frame = Frame::new_depth(data, 2, 2, FrameFormat::Y16);
        assert_eq!(frame.stride, 4);
        assert_eq!(frame.depth_pixels(), pixels);
    }

    #[test]
    fn test_depth_pixels_on_compressed_frame() {
        let frame = Frame::new_color(vec![0xFF, 0xD8, 0xFF]);
        assert!(frame.depth_pixels().is_empty());
    }

    #[test]
    fn test_crop_rect_fits() {
        let rect = CropRect::new(320, 160, 640, 480);
        assert!(rect.fits_in(1280, 800));
        assert!(rect.fits_in(960, 640));
        assert!(!rect.fits_in(640, 480));
    }

    #[test]
    fn test_calibration_blob_round_trip() {
        let intrinsics = CameraIntrinsics::new(570.5, 571.25, 320.0, 240.0);
        let blob = intrinsics.to_calibration_blob();
        assert_eq!(blob.len(), CameraIntrinsics::BLOB_LEN);

        let parsed = CameraIntrinsics::from_calibration_blob(&blob).unwrap();
        assert_eq!(parsed, intrinsics);
    }

    #[test]
    fn test_calibration_blob_too_short() {
        assert!(CameraIntrinsics::from_calibration_blob(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_calibration_scale_reference_resolution() {
        // 基準解像度（主点320 @ 幅640）ではスケール1
        let intrinsics = CameraIntrinsics::new(570.0, 570.0, 320.0, 240.0);
        assert_eq!(intrinsics.calibration_scale(640), 1);
    }

    #[test]
    fn test_calibration_scale_high_resolution() {
        // 1280x800バリアント（主点640）ではスケール2
        let intrinsics = CameraIntrinsics::new(1140.0, 1140.0, 640.0, 400.0);
        assert_eq!(intrinsics.calibration_scale(640), 2);
    }

    #[test]
    fn test_calibration_scale_never_zero() {
        let intrinsics = CameraIntrinsics::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(intrinsics.calibration_scale(640), 1);
        assert_eq!(intrinsics.calibration_scale(0), 1);
    }

    #[test]
    fn test_property_unpack_known() {
        let (selector, prop) = SessionProperty::unpack(PROP_INTRINSIC_CX | GENERATOR_DEPTH);
        assert_eq!(selector, GENERATOR_DEPTH);
        assert_eq!(prop, Some(SessionProperty::IntrinsicCx));
    }

    #[test]
    fn test_property_unpack_all_generator_bits() {
        let raw = PROP_INTRINSIC_FX | GENERATOR_DEPTH | GENERATOR_IMAGE | GENERATOR_IR;
        let (selector, prop) = SessionProperty::unpack(raw);
        assert_eq!(selector, GENERATOR_MASK);
        assert_eq!(prop, Some(SessionProperty::IntrinsicFx));
    }

    #[test]
    fn test_property_unpack_unknown() {
        let (selector, prop) = SessionProperty::unpack(99999);
        assert_eq!(selector, 0);
        assert!(prop.is_none());
    }

    #[test]
    fn test_retrieved_frame_accessors() {
        let map = DepthMap {
            pixels: vec![1, 2],
            width: 2,
            height: 1,
        };
        let retrieved = RetrievedFrame::Depth(map.clone());
        assert_eq!(retrieved.clone().into_depth(), Some(map));
        assert!(retrieved.into_bgr().is_none());
    }
}
