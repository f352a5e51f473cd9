use criterion::{criterion_group, criterion_main};

use caustics::bench_caustics;

mod magnification;
use magnification::bench_magnification;

criterion_group!(benches_caustics, bench_caustics);
criterion_group!(benches_magnification, bench_magnification);
criterion_main!(benches_caustics, benches_magnification);
