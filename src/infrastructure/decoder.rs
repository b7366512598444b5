/// 画像デコーダアダプタ
///
/// imageクレートを使用したMJPGビットストリームのデコード実装。
/// デコード失敗はNoneで表現し、ストリーム全体は停止させない。

use image::ImageFormat;

use crate::domain::{BgrImage, DecoderPort};

/// 画像デコーダアダプタ
pub struct ImageDecoderAdapter;

impl ImageDecoderAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageDecoderAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderPort for ImageDecoderAdapter {
    fn decode_bgr(&self, encoded: &[u8]) -> Option<BgrImage> {
        let decoded = match image::load_from_memory_with_format(encoded, ImageFormat::Jpeg) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!(error = %e, len = encoded.len(), "JPEG decode failed");
                return None;
            }
        };

        let rgb = decoded.to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());

        // RGB → BGR（チャネル入れ替えのみ、アロケーションは1回）
        let mut data = rgb.into_raw();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }

        Some(BgrImage {
            data,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// テスト用のJPEGを生成（左上が赤の単色チェック付きパターン）
    fn encode_test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |_, _| image::Rgb([255u8, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_valid_jpeg() {
        let decoder = ImageDecoderAdapter::new();
        let encoded = encode_test_jpeg(64, 48);

        let image = decoder.decode_bgr(&encoded).unwrap();
        assert_eq!(image.width, 64);
        assert_eq!(image.height, 48);
        assert_eq!(image.data.len(), 64 * 48 * 3);

        // 赤一色のソース → BGRではB≈0, G≈0, R≈255（JPEG劣化を許容）
        assert!(image.data[0] < 30, "B channel: {}", image.data[0]);
        assert!(image.data[2] > 225, "R channel: {}", image.data[2]);
    }

    #[test]
    fn test_decode_garbage_returns_none() {
        let decoder = ImageDecoderAdapter::new();
        assert!(decoder.decode_bgr(&[0xDE, 0xAD, 0xBE, 0xEF]).is_none());
        assert!(decoder.decode_bgr(&[]).is_none());
    }
}
