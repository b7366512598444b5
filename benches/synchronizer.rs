//! フレームシンクロナイザのHot Pathベンチマーク
//!
//! コールバックスレッドからの配信（スロット上書き）と、ペア揃い済み
//! grabの所要時間を計測する。どちらもフレーム周期（33ms）に対して
//! 無視できるオーダーであること。

use criterion::{criterion_group, criterion_main, Criterion};
use std::time::Duration;

use DepthWithColor::application::synchronizer::FrameSynchronizer;
use DepthWithColor::domain::{Frame, FrameFormat, StreamKind};

fn make_depth_frame() -> Frame {
    // 640x480 Y16相当のバッファ
    Frame::new_depth(vec![0u8; 640 * 480 * 2], 640, 480, FrameFormat::Y16)
}

fn bench_frame_delivery(c: &mut Criterion) {
    let sync = FrameSynchronizer::new();
    let frame = make_depth_frame();

    c.bench_function("on_depth_frame (slot overwrite)", |b| {
        b.iter(|| {
            sync.on_depth_frame(std::hint::black_box(frame.clone()));
        })
    });
}

fn bench_grab_ready_pair(c: &mut Criterion) {
    let sync = FrameSynchronizer::new();

    c.bench_function("wait_for_frames (pair already pending)", |b| {
        b.iter(|| {
            sync.on_depth_frame(make_depth_frame());
            sync.on_color_frame(Frame::new_color(vec![0u8; 32 * 1024]));
            assert!(sync.wait_for_frames(Duration::from_millis(33)));
            sync.take_grabbed(StreamKind::Depth);
            sync.take_grabbed(StreamKind::Color);
        })
    });
}

criterion_group!(benches, bench_frame_delivery, bench_grab_ready_pair);
criterion_main!(benches);
