// Survey Testdata - Pipeline integration tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic surveys pushed through every metric type and the bundle
//! pipeline.

use survey_metrics::{
    BundleSpec, MetricBundle, MetricSpec, MetricValue, Partition, SummaryValue,
};
use survey_testdata::{generate_survey, Survey, SurveyConfig};

const ALL_METRICS: &[&str] = &[
    r#"{"metric": "Simple", "col": "airmass", "statistic": "Median"}"#,
    r#"{"metric": "Simple", "col": "filter", "statistic": "CountUnique"}"#,
    r#"{"metric": "VisitGaps", "scope": "InterNight"}"#,
    r#"{"metric": "Uniformity"}"#,
    r#"{"metric": "Tgaps"}"#,
    r#"{"metric": "PhaseGap"}"#,
    r#"{"metric": "Periodogram", "n_periods": 40}"#,
    r#"{"metric": "PeriodRecovery", "n_trial": 400, "n_phases": 2}"#,
    r#"{"metric": "VisitGroups", "filter_col": "filter"}"#,
    r#"{"metric": "PairFraction"}"#,
    r#"{"metric": "Transient", "peak_mag": {"g": 21.0, "r": 21.0}, "n_filters": 2}"#,
    r#"{"metric": "NChanges"}"#,
    r#"{"metric": "MinTimeBetweenStates"}"#,
    r#"{"metric": "NStateChangesFasterThan"}"#,
    r#"{"metric": "MaxStateChangesWithin"}"#,
    r#"{"metric": "Teff", "normed": true}"#,
    r#"{"metric": "OpenShutterFraction"}"#,
    r#"{"metric": "Completeness", "g": 20, "r": 40}"#,
    r#"{"metric": "Parallax"}"#,
    r#"{"metric": "ProperMotion", "normalize": true}"#,
    r#"{"metric": "ParallaxCoverage"}"#,
    r#"{"metric": "ParallaxHaDegen"}"#,
    r#"{"metric": "RadiusObs", "statistic": "Rms"}"#,
    r#"{"metric": "TimeHistogram", "statistic": "Accumulate", "bins": [0, 30, 60, 90]}"#,
];

fn survey() -> Survey {
    let config = SurveyConfig::new()
        .with_nights(90)
        .with_fields(5)
        .with_visits_per_night(30)
        .with_seed(7);
    generate_survey(&config).unwrap()
}

fn reversed(partitions: &[Partition]) -> Vec<Partition> {
    partitions
        .iter()
        .map(|p| {
            let order: Vec<usize> = (0..p.data.len()).rev().collect();
            Partition::new(p.point.clone(), p.data.take(&order))
        })
        .collect()
}

#[test]
fn test_every_metric_runs_on_generated_survey() {
    let partitions = survey().partitions_by_field().unwrap();
    for json in ALL_METRICS {
        let spec = MetricSpec::from_json(json).unwrap();
        let metric = spec.build().unwrap();
        let bundle = MetricBundle::new(metric);
        let output = bundle.evaluate(&partitions).unwrap();
        let raw = &output.series[0];
        assert_eq!(raw.values.len(), partitions.len(), "{}", json);
        assert!(
            raw.values.iter().any(|v| !v.is_invalid()),
            "{} was invalid on every field",
            json
        );
    }
}

#[test]
fn test_empty_partition_is_invalid_for_every_metric() {
    let survey = survey();
    let empty = Survey::to_slice(&[]).unwrap();
    let point = survey.partitions_by_field().unwrap()[0].point.clone();
    for json in ALL_METRICS {
        let metric = MetricSpec::from_json(json).unwrap().build().unwrap();
        let value = metric.run(&empty, &point).unwrap();
        assert!(value.is_invalid(), "{}", json);
    }
}

#[test]
fn test_cadence_metrics_ignore_row_order() {
    let partitions = survey().partitions_by_field().unwrap();
    let backwards = reversed(&partitions);
    let cadence = [
        r#"{"metric": "VisitGaps"}"#,
        r#"{"metric": "VisitGaps", "scope": "IntraNight", "statistic": "Min"}"#,
        r#"{"metric": "Uniformity"}"#,
        r#"{"metric": "Tgaps", "all_gaps": true}"#,
        r#"{"metric": "PhaseGap"}"#,
        r#"{"metric": "Periodogram", "n_periods": 40}"#,
        r#"{"metric": "NChanges"}"#,
        r#"{"metric": "MaxStateChangesWithin"}"#,
        r#"{"metric": "VisitGroups"}"#,
    ];
    for json in cadence {
        let bundle = MetricBundle::new(MetricSpec::from_json(json).unwrap().build().unwrap());
        let forward = bundle.evaluate(&partitions).unwrap();
        let backward = bundle.evaluate(&backwards).unwrap();
        assert_eq!(forward.to_json().unwrap(), backward.to_json().unwrap(), "{}", json);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let partitions = survey().partitions_by_field().unwrap();
    for json in [
        r#"{"metric": {"metric": "Transient"}, "summaries": [{"statistic": "Mean"}]}"#,
        r#"{"metric": {"metric": "PeriodRecovery", "n_trial": 400},
            "summaries": [{"statistic": "Median"}]}"#,
        r#"{"metric": {"metric": "Tgaps"}, "summaries": [{"statistic": "Max"}]}"#,
    ] {
        let bundle = MetricBundle::from_spec(&BundleSpec::from_json(json).unwrap()).unwrap();
        let sequential = bundle.evaluate(&partitions).unwrap();
        let parallel = bundle.evaluate_parallel(&partitions).unwrap();
        assert_eq!(sequential.to_json().unwrap(), parallel.to_json().unwrap());
    }
}

#[test]
fn test_randomized_metrics_are_reproducible() {
    let partitions = survey().partitions_by_field().unwrap();
    let metric = MetricSpec::from_json(r#"{"metric": "Transient", "seed": 11}"#)
        .unwrap()
        .build()
        .unwrap();
    let first: Vec<MetricValue> = partitions
        .iter()
        .map(|p| metric.run(&p.data, &p.point).unwrap())
        .collect();
    // a different evaluation order gives the same per-partition values
    let mut second: Vec<(u64, MetricValue)> = partitions
        .iter()
        .rev()
        .map(|p| (p.point.sid, metric.run(&p.data, &p.point).unwrap()))
        .collect();
    second.reverse();
    let second: Vec<MetricValue> = second.into_iter().map(|(_, v)| v).collect();
    assert_eq!(first, second);
}

#[test]
fn test_summaries_across_fields() {
    let partitions = survey().partitions_by_field().unwrap();
    let spec = BundleSpec::from_json(
        r#"{
            "metric": {"metric": "Completeness", "r": 10},
            "reduce": ["Joint"],
            "summaries": [
                {"statistic": "Min"},
                {"statistic": "FracBelowCountingInvalid", "cut": 1000.0},
                {"statistic": "Identity"}
            ]
        }"#,
    )
    .unwrap();
    let output = MetricBundle::from_spec(&spec).unwrap().evaluate(&partitions).unwrap();
    let joint = output.series("Completeness Joint").unwrap();

    let min = joint.summary("Min").and_then(|v| v.as_scalar()).unwrap();
    assert!(min >= 0.0);
    assert_eq!(
        joint.summary("FracBelowCountingInvalid").and_then(|v| v.as_scalar()),
        Some(1.0)
    );
    match joint.summary("Identity") {
        Some(SummaryValue::Passthrough(values)) => assert_eq!(values.len(), partitions.len()),
        other => panic!("unexpected identity summary {:?}", other),
    }
}

#[test]
fn test_whole_survey_partition() {
    let survey = survey();
    let whole = survey.whole().unwrap();
    assert_eq!(whole.data.len(), survey.len());
    let metric = MetricSpec::from_json(r#"{"metric": "OpenShutterFraction"}"#)
        .unwrap()
        .build()
        .unwrap();
    let fraction = metric.run(&whole.data, &whole.point).unwrap().as_scalar().unwrap();
    // 30 s exposures in 34 s visits plus slews of at least 2 s
    assert!(fraction > 0.5 && fraction < 30.0 / 36.0);
}
