use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use billing_recon::{
    config::{KeywordTables, Labels, ReconConfig},
    data::Value,
    dataset::Dataset,
    enrich::enrich,
    pipeline,
};

fn billing(rows: usize) -> Dataset {
    let headers = ["Profesional", "Codigo", "Nombre Procedimiento", "Fecha", "Cantidad"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            vec![
                Value::Text(format!("{} - Profesional {}", i % 97, i % 13)),
                Value::Text(format!("{:03}", i % 500)),
                Value::Text(format!("Procedimiento {}", i % 700)),
                Value::Text(format!("{:02}/03/2024", (i % 28) + 1)),
                Value::Text(((i % 4) + 1).to_string()),
            ]
        })
        .collect();
    Dataset::new(headers, rows)
}

fn catalog(rows: usize) -> Dataset {
    let headers = ["Codigo", "Nombre Procedimiento", "Valor"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            vec![
                Value::Text(format!("{:03}", i % 400)),
                Value::Text(format!("procedimiento {}", i)),
                Value::Text((1000 + i * 10).to_string()),
            ]
        })
        .collect();
    Dataset::new(headers, rows)
}

fn bench_enrich(c: &mut Criterion) {
    let primary = billing(20_000);
    let reference = catalog(1_000);
    let tables = KeywordTables::default();
    let labels = Labels::default();
    let config = ReconConfig::default();

    let mut group = c.benchmark_group("reconcile_20k");
    group.sample_size(20);
    group.bench_function("enrich", |b| {
        b.iter(|| enrich(&primary, &reference, &tables, &labels).expect("enrich"))
    });
    group.bench_function("reconcile_and_sanitize", |b| {
        b.iter_batched(
            || (primary.clone(), reference.clone()),
            |(primary, reference)| {
                pipeline::reconcile(&primary, &reference, &config).expect("reconcile")
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_enrich);
criterion_main!(benches);
