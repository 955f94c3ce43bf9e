use std::hint::black_box;

use bmpload::{Bitmap, Format};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

fn decode(c: &mut Criterion) {
    let (width, height) = (1024, 768);
    let pixels = (0..width * height * 4).map(|i| (i % 251) as u8).collect();
    let bitmap = Bitmap::from_rgba8(width, height, pixels).unwrap();

    let mut group = c.benchmark_group("decode");
    for format in [Format::Bgr24, Format::Bgra32] {
        let file = bitmap.encode(format).unwrap();
        group.throughput(Throughput::Bytes(file.len() as u64));
        group.bench_function(format!("{format:?}"), |b| {
            b.iter(|| Bitmap::decode(black_box(&file)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, decode);
criterion_main!(benches);
