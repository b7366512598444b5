/// デバイスプロファイルレジストリ
///
/// デバイスモデル識別子から使用するストリームプロファイルと
/// 後処理パラメータを引くデータ駆動テーブル。
/// モデルIDによる分岐をキャプチャロジックに埋め込まず、
/// デバイスファミリの追加をテーブル挿入1件で済ませる。

use crate::domain::{CropRect, FrameFormat, StreamProfile};

/// 広視野バリアントのモデルID（1280x800デプス + 固定クロップ窓）
pub const MODEL_WIDE_FOV: u16 = 0x0670;
/// コンパクトToFバリアントのモデルID（640x480デプス、ポストスケールのみ）
pub const MODEL_COMPACT_TOF: u16 = 0x0660;

/// 1デバイスファミリ分のプロファイルと後処理パラメータ
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub model_id: u16,
    pub name: &'static str,
    /// カラーチャネルに要求するプロファイル
    pub color_profile: StreamProfile,
    /// デプスチャネルに要求するプロファイル
    pub depth_profile: StreamProfile,
    /// retrieve時にデプスへ適用するクロップ窓（なければそのまま出力）
    pub depth_crop: Option<CropRect>,
    /// retrieve時にデプスピクセルへ乗じるスケール係数
    pub depth_scale: f32,
}

/// デバイスプロファイルレジストリ
///
/// `resolve`は失敗しない：未知のモデルはデフォルトエントリに退避する。
#[derive(Debug, Clone)]
pub struct DeviceProfileRegistry {
    entries: Vec<DeviceProfile>,
    default_profile: DeviceProfile,
}

impl DeviceProfileRegistry {
    /// 既知デバイスファミリを登録した標準レジストリを作成
    pub fn new() -> Self {
        let default_color = StreamProfile::new(640, 480, 30, FrameFormat::Mjpg);
        let default_profile = DeviceProfile {
            model_id: 0,
            name: "generic",
            color_profile: default_color,
            depth_profile: StreamProfile::new(640, 480, 30, FrameFormat::Y16),
            depth_crop: None,
            depth_scale: 1.0,
        };

        let entries = vec![
            DeviceProfile {
                model_id: MODEL_WIDE_FOV,
                name: "wide-fov-800p",
                color_profile: default_color,
                depth_profile: StreamProfile::new(1280, 800, 30, FrameFormat::Y14),
                depth_crop: Some(CropRect::new(320, 160, 640, 480)),
                depth_scale: 0.8,
            },
            DeviceProfile {
                model_id: MODEL_COMPACT_TOF,
                name: "compact-tof-480p",
                color_profile: default_color,
                depth_profile: StreamProfile::new(640, 480, 30, FrameFormat::Y14),
                depth_crop: None,
                depth_scale: 0.8,
            },
        ];

        Self {
            entries,
            default_profile,
        }
    }

    /// モデルIDからプロファイルを解決する
    ///
    /// 未知のモデルはデフォルトエントリに退避するため、失敗しない。
    pub fn resolve(&self, model_id: u16) -> &DeviceProfile {
        self.entries
            .iter()
            .find(|entry| entry.model_id == model_id)
            .unwrap_or(&self.default_profile)
    }

    /// デフォルトエントリを取得
    pub fn default_profile(&self) -> &DeviceProfile {
        &self.default_profile
    }

    /// キャリブレーションスケール算出の基準解像度幅
    ///
    /// デフォルトプロファイルの幅（640）。基準解像度のデバイスで
    /// スケールが1になるように定義される。
    pub fn reference_width(&self) -> u32 {
        self.default_profile.depth_profile.width
    }
}

impl Default for DeviceProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}
