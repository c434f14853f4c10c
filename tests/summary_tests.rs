//! Survey-level summaries through the public API

use approx::assert_relative_eq;
use survey_metrics::*;

fn scalars(values: &[f64]) -> Vec<MetricValue> {
    values.iter().map(|v| MetricValue::scalar(*v)).collect()
}

fn summarize(statistic: SummaryStatistic, values: &[MetricValue]) -> SummaryValue {
    SummaryMetric::new(statistic).unwrap().summarize(values)
}

#[test]
fn test_no_values_is_invalid() {
    for statistic in [
        SummaryStatistic::Mean,
        SummaryStatistic::Median,
        SummaryStatistic::Min,
        SummaryStatistic::Rms,
        SummaryStatistic::FracBelowCountingInvalid { cut: 1.0 },
    ] {
        assert!(summarize(statistic, &[]).is_invalid());
    }
}

#[test]
fn test_all_invalid_is_invalid() {
    let values = vec![MetricValue::Invalid; 4];
    assert!(summarize(SummaryStatistic::Mean, &values).is_invalid());
    assert!(summarize(SummaryStatistic::Count, &values).is_invalid());
}

#[test]
fn test_single_value() {
    let values = scalars(&[7.5]);
    assert_eq!(summarize(SummaryStatistic::Mean, &values).as_scalar(), Some(7.5));
    assert_eq!(summarize(SummaryStatistic::Median, &values).as_scalar(), Some(7.5));
}

#[test]
fn test_even_count_median_averages_middle_values() {
    let values = scalars(&[4.0, 1.0, 3.0, 2.0]);
    assert_eq!(summarize(SummaryStatistic::Mean, &values).as_scalar(), Some(2.5));
    assert_eq!(summarize(SummaryStatistic::Median, &values).as_scalar(), Some(2.5));
}

#[test]
fn test_invalid_entries_are_skipped() {
    let mut values = scalars(&[1.0, 2.0, 3.0]);
    values.push(MetricValue::Invalid);
    values.push(MetricValue::scalar(f64::NAN));
    assert_eq!(summarize(SummaryStatistic::Count, &values).as_scalar(), Some(3.0));
    assert_eq!(summarize(SummaryStatistic::Max, &values).as_scalar(), Some(3.0));
    assert_eq!(
        summarize(SummaryStatistic::FracBelow { cut: 2.5 }, &values).as_scalar(),
        Some(2.0 / 3.0)
    );
    // invalid entries count in the denominator but never fall below the cut
    assert_eq!(
        summarize(SummaryStatistic::FracBelowCountingInvalid { cut: 2.5 }, &values).as_scalar(),
        Some(2.0 / 5.0)
    );
}

#[test]
fn test_percentile_and_rms() {
    let values = scalars(&[0.0, 10.0, 20.0, 30.0, 40.0]);
    let p = summarize(SummaryStatistic::Percentile { percentile: 25.0 }, &values);
    assert_relative_eq!(p.as_scalar().unwrap(), 10.0);
    let rms = summarize(SummaryStatistic::Rms, &values).as_scalar().unwrap();
    assert_relative_eq!(rms, 200.0_f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_identity_keeps_positions() {
    let values = vec![
        MetricValue::scalar(1.0),
        MetricValue::Invalid,
        MetricValue::scalar(3.0),
    ];
    assert_eq!(
        summarize(SummaryStatistic::Identity, &values),
        SummaryValue::Passthrough(vec![Some(1.0), None, Some(3.0)])
    );
}

#[test]
fn test_invalid_statistic_options_rejected() {
    assert!(SummaryMetric::new(SummaryStatistic::Percentile { percentile: 120.0 }).is_err());
    assert!(SummaryMetric::new(SummaryStatistic::CountAbove { cut: f64::NAN }).is_err());
}

#[test]
fn test_summaries_in_bundle_spec() {
    let spec = BundleSpec::from_json(
        r#"{
            "metric": {"metric": "Simple", "col": "airmass", "statistic": "Max"},
            "summaries": [
                {"statistic": "Mean"},
                {"statistic": "CountAbove", "cut": 1.5}
            ]
        }"#,
    )
    .unwrap();
    let partitions: Vec<Partition> = [[1.0, 1.2], [1.4, 2.0], [1.1, 1.6]]
        .iter()
        .enumerate()
        .map(|(i, airmass)| {
            let data = DataSlice::new().with_floats("airmass", airmass.to_vec()).unwrap();
            Partition::new(SlicePoint::new(i as u64), data)
        })
        .collect();
    let output = MetricBundle::from_spec(&spec).unwrap().evaluate(&partitions).unwrap();
    let series = &output.series[0];
    assert_relative_eq!(
        series.summary("Mean").and_then(|v| v.as_scalar()).unwrap(),
        1.6,
        epsilon = 1e-12
    );
    assert_eq!(
        series.summary("Count > 1.5").and_then(|v| v.as_scalar()),
        Some(2.0)
    );
}
