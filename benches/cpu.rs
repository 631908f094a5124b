use criterion::{criterion_group, criterion_main, Criterion};
use matcha::gb::GameBoy;

fn benchmark_cpu_clock(c: &mut Criterion) {
    let mut gb = GameBoy::new();
    gb.load_rom_empty().unwrap();
    gb.boot();

    c.bench_function("cpu_cycles", |b| {
        b.iter(|| {
            gb.clocks_cycles(1_000_000);
        })
    });
}

criterion_group!(benches, benchmark_cpu_clock);
criterion_main!(benches);
