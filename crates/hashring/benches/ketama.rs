use criterion::{criterion_group, criterion_main, Criterion};
use hashring::Ketama;

fn bench_get(c: &mut Criterion) {
    let ring = Ketama::new(160);
    for i in 0..200 {
        ring.add(&format!("10.0.{}.{}:9000", i / 256, i % 256));
    }

    c.bench_function("ketama_get_200_nodes", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i = i.wrapping_add(1);
            ring.get(&format!("key-{i}"))
        });
    });
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("ketama_add_single_node", |b| {
        let ring = Ketama::new(160);
        for i in 0..199 {
            ring.add(&format!("10.0.{}.{}:9000", i / 256, i % 256));
        }
        let mut i = 199u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            ring.add(&format!("10.0.{}.{}:9000", i / 256, i % 256));
        });
    });
}

criterion_group!(benches, bench_get, bench_add);
criterion_main!(benches);
