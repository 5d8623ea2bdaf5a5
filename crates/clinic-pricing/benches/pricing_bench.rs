use clinic_core::{default_services, Service};
use clinic_pricing::{compute_pricing, compute_sensitivity, PortfolioSummary};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_services(n: usize) -> Vec<Service> {
    let base = default_services();
    (0..n)
        .map(|i| {
            let mut s = base[i % base.len()].clone();
            s.display_name = format!("{} #{i}", s.display_name);
            s
        })
        .collect()
}

fn bench_pricing(c: &mut Criterion) {
    let services = build_services(50);
    c.bench_function("price 50 services", |b| {
        b.iter(|| {
            let results = compute_pricing(black_box(&services), 49_500.0, 0.35).unwrap();
            black_box(PortfolioSummary::from_results(&results, 49_500.0))
        })
    });
}

fn bench_sensitivity(c: &mut Criterion) {
    let range: Vec<i64> = (1..=500).collect();
    c.bench_function("sensitivity 500 points", |b| {
        b.iter(|| black_box(compute_sensitivity(450.0, 9_000.0, 0.35, black_box(&range))))
    });
}

criterion_group!(benches, bench_pricing, bench_sensitivity);
criterion_main!(benches);
