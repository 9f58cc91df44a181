//! NTT throughput benchmarks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rvzk_primitives::ntt::{batch_interpolate_ntt, interpolate_ntt, zk_shift};
use rvzk_primitives::Fp;

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate_ntt");
    for log_size in [9usize, 12, 16] {
        let size = 1 << log_size;
        let data: Vec<Fp> = (0..size as u32).map(|i| Fp::new(i.wrapping_mul(747796405))).collect();
        group.bench_with_input(BenchmarkId::from_parameter(log_size), &data, |b, data| {
            b.iter(|| {
                let mut scratch = data.clone();
                interpolate_ntt(&mut scratch);
                scratch
            })
        });
    }
    group.finish();
}

fn bench_code_matrix(c: &mut Criterion) {
    // The shape MethodId works on at its smallest level: 512 x 16.
    let rows = 512;
    let cols = 16;
    let matrix: Vec<Fp> = (0..(rows * cols) as u32).map(Fp::new).collect();

    c.bench_function("code_matrix_interpolate_shift", |b| {
        b.iter(|| {
            let mut scratch = matrix.clone();
            batch_interpolate_ntt(&mut scratch, cols);
            zk_shift(&mut scratch, cols);
            scratch
        })
    });
}

criterion_group!(benches, bench_interpolate, bench_code_matrix);
criterion_main!(benches);
