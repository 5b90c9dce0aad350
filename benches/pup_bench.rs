use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strided_pup::{BasicType, Datatype, DispatchConfig, Engine};

fn layouts() -> Vec<(&'static str, Arc<Datatype>)> {
    let dbl = Datatype::basic(BasicType::Double);
    let vector = Datatype::vector(256, 4, 9, &dbl).unwrap();
    let indexed = Datatype::hindexed_block(
        128,
        2,
        &(0..128).rev().map(|j| j * 8 * 5).collect::<Vec<isize>>(),
        &dbl,
    )
    .unwrap();
    let nested = Datatype::contiguous(16, &Datatype::vector(32, 3, 7, &dbl).unwrap()).unwrap();
    vec![
        ("hvector_blklen_4", vector),
        ("blkhindx_blklen_2", indexed),
        ("contig_hvector_blklen_3", nested),
    ]
}

fn bench_pack(c: &mut Criterion) {
    let specialized = Engine::default();
    let generic = Engine::new(DispatchConfig::default().with_max_depth(0));
    let mut group = c.benchmark_group("pack");
    for (name, dt) in layouts() {
        let count = 8;
        let src = vec![1u64; dt.described_len(count).unwrap()];
        let src: &[u8] = bytemuck::cast_slice(&src);
        let mut dst = vec![0u64; dt.packed_len(count).unwrap()];
        group.throughput(Throughput::Bytes((count * dt.size_bytes()) as u64));

        group.bench_with_input(BenchmarkId::new("specialized", name), &dt, |b, dt| {
            b.iter(|| {
                specialized
                    .pack(src, count, dt, bytemuck::cast_slice_mut(&mut dst))
                    .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("generic", name), &dt, |b, dt| {
            b.iter(|| {
                generic
                    .pack(src, count, dt, bytemuck::cast_slice_mut(&mut dst))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let specialized = Engine::default();
    let generic = Engine::new(DispatchConfig::default().with_max_depth(0));
    let mut group = c.benchmark_group("unpack");
    for (name, dt) in layouts() {
        let count = 8;
        let src = vec![1u64; dt.packed_len(count).unwrap()];
        let src: &[u8] = bytemuck::cast_slice(&src);
        let mut dst = vec![0u64; dt.described_len(count).unwrap()];
        group.throughput(Throughput::Bytes((count * dt.size_bytes()) as u64));

        group.bench_with_input(BenchmarkId::new("specialized", name), &dt, |b, dt| {
            b.iter(|| {
                specialized
                    .unpack(src, bytemuck::cast_slice_mut(&mut dst), count, dt)
                    .unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("generic", name), &dt, |b, dt| {
            b.iter(|| {
                generic
                    .unpack(src, bytemuck::cast_slice_mut(&mut dst), count, dt)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pack, bench_unpack);
criterion_main!(benches);
