use criterion::{criterion_group, criterion_main, Criterion};
use sim_core::{load_catalog, Category, EngineConfig, Lever};
use sim_runtime::{sample, ScenarioEngine};

fn bench_catalog(c: &mut Criterion) {
    let wb = sample::workbook();
    let cfg = EngineConfig::default();
    c.bench_function("load_catalog", |b| {
        b.iter(|| {
            let _ = load_catalog(&wb, &cfg);
        })
    });
}

fn bench_scenario(c: &mut Criterion) {
    let base = sample::workbook();
    let cfg = EngineConfig::default();
    let catalog = match load_catalog(&base, &cfg) {
        Ok(catalog) => catalog,
        Err(err) => panic!("sample catalog: {err}"),
    };
    let engine = ScenarioEngine::new(cfg);
    let row = match catalog.find(Category::MP, "MP 1") {
        Ok(row) => row.clone(),
        Err(err) => panic!("sample row: {err}"),
    };
    c.bench_function("simulate_quantity", |b| {
        b.iter(|| {
            let mut wb = base.clone();
            let _ = engine.simulate(&mut wb, &row, Lever::Quantity, 12.5);
        })
    });
}

criterion_group!(benches, bench_catalog, bench_scenario);
criterion_main!(benches);
