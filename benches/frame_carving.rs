use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use streameye::frame::{FrameAccumulator, Separator};

fn make_stream(frame_count: usize, payload_len: usize) -> Vec<u8> {
    let mut stream = Vec::with_capacity(frame_count * (payload_len + 4));
    for i in 0..frame_count {
        stream.push(0xFF);
        stream.push(0xD8);
        stream.extend(std::iter::repeat((i % 256) as u8).take(payload_len));
        stream.push(0xFF);
        stream.push(0xD9);
    }
    stream
}

fn bench_auto_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_carving_auto");
    for payload_len in [1024usize, 64 * 1024] {
        let stream = make_stream(200, payload_len);
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_len),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut acc = FrameAccumulator::new(Separator::Auto);
                    let mut frames = 0;
                    loop {
                        match acc.feed(if frames == 0 { stream } else { &[] }) {
                            streameye::frame::FrameEvent::Ready(_) => frames += 1,
                            streameye::frame::FrameEvent::Pending => break,
                            streameye::frame::FrameEvent::Overflow => break,
                        }
                    }
                    frames
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_auto_mode);
criterion_main!(benches);
