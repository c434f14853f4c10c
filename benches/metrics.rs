//! Benchmarks for metric evaluation over generated surveys

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use survey_metrics::{BundleSpec, MetricBundle, Partition};
use survey_testdata::{generate_survey, SurveyConfig};

fn partitions() -> Vec<Partition> {
    let config = SurveyConfig::new()
        .with_nights(365)
        .with_fields(24)
        .with_visits_per_night(60)
        .with_seed(1);
    generate_survey(&config)
        .and_then(|s| s.partitions_by_field())
        .unwrap()
}

fn load_bundle(json: &str) -> MetricBundle {
    MetricBundle::from_spec(&BundleSpec::from_json(json).unwrap()).unwrap()
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    let config = SurveyConfig::new().with_nights(90).with_seed(1);

    group.bench_function("generate_90_nights", |b| {
        b.iter(|| black_box(generate_survey(&config).unwrap()))
    });

    let survey = generate_survey(&config).unwrap();
    group.throughput(Throughput::Elements(survey.len() as u64));
    group.bench_function("partition_by_field", |b| {
        b.iter(|| black_box(survey.partitions_by_field().unwrap()))
    });

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    let parts = partitions();
    let visits: usize = parts.iter().map(|p| p.data.len()).sum();
    group.throughput(Throughput::Elements(visits as u64));

    let cases = [
        ("simple_median_depth", r#"{"metric": {"metric": "Simple", "statistic": "Median"}}"#),
        ("inter_night_gaps", r#"{"metric": {"metric": "VisitGaps"}}"#),
        ("tgaps_histogram", r#"{"metric": {"metric": "Tgaps"}}"#),
        ("periodogram", r#"{"metric": {"metric": "Periodogram"}}"#),
        ("visit_groups", r#"{"metric": {"metric": "VisitGroups"}}"#),
        ("transient", r#"{"metric": {"metric": "Transient"}}"#),
        ("parallax", r#"{"metric": {"metric": "Parallax"}}"#),
    ];
    for (name, json) in cases {
        let bundle = load_bundle(json);
        group.bench_function(name, |b| b.iter(|| black_box(bundle.evaluate(&parts).unwrap())));
    }

    group.finish();
}

fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel");
    let parts = partitions();
    let bundle = load_bundle(
        r#"{"metric": {"metric": "PeriodRecovery"}, "summaries": [{"statistic": "Median"}]}"#,
    );

    group.bench_function("period_recovery_sequential", |b| {
        b.iter(|| black_box(bundle.evaluate(&parts).unwrap()))
    });
    group.bench_function("period_recovery_parallel", |b| {
        b.iter(|| black_box(bundle.evaluate_parallel(&parts).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_generation, bench_metrics, bench_parallel);
criterion_main!(benches);
