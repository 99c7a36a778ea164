//! Grouping of filtered records into the figures shown on the dashboard.
//!
//! Every function recomputes from the full input. Sums keep full precision, rounding
//! only happens in [`format_average`].
use std::collections::BTreeMap;

use crate::record::{Line, MeasurementType, Month, Record};

/// Number of records per measurement type, in the fixed type order, zero buckets included.
pub fn count_by_type(records: &[Record]) -> Vec<(MeasurementType, usize)> {
    MeasurementType::ALL
        .iter()
        .map(|t| (*t, records.iter().filter(|r| r.measurement_type == *t).count()))
        .collect()
}

/// Number of records per line, in the fixed line order, zero buckets included.
pub fn count_by_line(records: &[Record]) -> Vec<(Line, usize)> {
    Line::ALL
        .iter()
        .map(|l| (*l, records.iter().filter(|r| r.line == *l).count()))
        .collect()
}

/// For each measurement type, the number of records per month over all years.
pub fn monthly_counts_by_type(records: &[Record]) -> Vec<(MeasurementType, [usize; 12])> {
    MeasurementType::ALL
        .iter()
        .map(|t| {
            let mut counts = [0usize; 12];
            for record in records.iter().filter(|r| r.measurement_type == *t) {
                counts[record.month.ordinal()] += 1;
            }
            (*t, counts)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
/// Summed values of one (year, month) period.
pub struct PeriodBucket {
    pub year: i32,
    pub month: Month,
    pub total: f64,
    pub count: usize,
}

impl PeriodBucket {
    /// Composite key, e.g. `2565-มกราคม`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }

    /// Axis label, e.g. `มกราคม 2565`.
    pub fn label(&self) -> String {
        format!("{} {}", self.month, self.year)
    }
}

/// Sums values per (year, month), ordered by year and then month position.
pub fn sum_by_period(records: &[Record]) -> Vec<PeriodBucket> {
    let mut grouped: BTreeMap<(i32, Month), (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry((record.year, record.month)).or_insert((0.0, 0));
        entry.0 += record.value;
        entry.1 += 1;
    }
    grouped
        .into_iter()
        .map(|((year, month), (total, count))| PeriodBucket {
            year,
            month,
            total,
            count,
        })
        .collect()
}

/// Number of records per year present in the input, years ascending.
pub fn count_by_year(records: &[Record]) -> Vec<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.year).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    /// `sum / count`, or 0 for an empty input.
    pub average: f64,
}

pub fn summarize(records: &[Record]) -> Summary {
    let count = records.len();
    let sum: f64 = records.iter().map(|r| r.value).sum();
    let average = if count == 0 { 0.0 } else { sum / count as f64 };
    Summary { count, sum, average }
}

/// Mean of the period totals, the reference line of the period chart.
pub fn period_mean(buckets: &[PeriodBucket]) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    buckets.iter().map(|b| b.total).sum::<f64>() / buckets.len() as f64
}

/// Two decimal places, for display only.
pub fn format_average(average: f64) -> String {
    format!("{:.2}", average)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, month: Month, line: Line, measurement_type: MeasurementType, value: f64) -> Record {
        Record::new(year, month, line, measurement_type, value)
    }

    #[test]
    fn category_counts_keep_empty_buckets() {
        let records: Vec<Record> = (0..5)
            .map(|i| record(2565, Month::January, Line::North, MeasurementType::Tsp, i as f64))
            .collect();
        assert_eq!(
            count_by_type(&records),
            vec![(MeasurementType::Tsp, 5), (MeasurementType::Tsa, 0), (MeasurementType::Ta, 0)]
        );
        assert_eq!(count_by_line(&[]).len(), Line::ALL.len());
        assert!(count_by_line(&[]).iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn periods_are_summed_in_chronological_order() {
        let records = vec![
            record(2565, Month::January, Line::Red, MeasurementType::Tsp, 10.0),
            record(2565, Month::January, Line::Red, MeasurementType::Tsp, 5.0),
            record(2565, Month::February, Line::Red, MeasurementType::Tsp, 3.0),
        ];
        let buckets: Vec<(String, f64)> = sum_by_period(&records).iter().map(|b| (b.key(), b.total)).collect();
        assert_eq!(
            buckets,
            vec![("2565-มกราคม".to_string(), 15.0), ("2565-กุมภาพันธ์".to_string(), 3.0)]
        );
    }

    #[test]
    fn period_order_is_not_lexical() {
        // lexically "2565-ธันวาคม" < "2565-มกราคม", chronologically it is the other way round
        let records = vec![
            record(2566, Month::January, Line::West, MeasurementType::Ta, 1.0),
            record(2565, Month::December, Line::West, MeasurementType::Ta, 1.0),
            record(2565, Month::January, Line::West, MeasurementType::Ta, 1.0),
        ];
        let order: Vec<(i32, Month)> = sum_by_period(&records).iter().map(|b| (b.year, b.month)).collect();
        assert_eq!(
            order,
            vec![(2565, Month::January), (2565, Month::December), (2566, Month::January)]
        );
        assert_eq!(sum_by_period(&records)[0].label(), "มกราคม 2565");
    }

    #[test]
    fn monthly_counts_and_years() {
        let records = vec![
            record(2566, Month::March, Line::West, MeasurementType::Tsa, 1.0),
            record(2564, Month::March, Line::West, MeasurementType::Tsa, 1.0),
            record(2564, Month::April, Line::North, MeasurementType::Ta, 1.0),
        ];
        let monthly = monthly_counts_by_type(&records);
        assert_eq!(monthly[1].0, MeasurementType::Tsa);
        assert_eq!(monthly[1].1[Month::March.ordinal()], 2);
        assert_eq!(monthly[2].1[Month::April.ordinal()], 1);
        assert_eq!(monthly[0].1.iter().sum::<usize>(), 0);
        assert_eq!(count_by_year(&records), vec![(2564, 2), (2566, 1)]);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.average, 0.0);
        assert_eq!(format_average(summary.average), "0.00");
        assert_eq!(period_mean(&[]), 0.0);
    }

    #[test]
    fn average_keeps_precision_until_formatted() {
        let records = vec![
            record(2565, Month::May, Line::Red, MeasurementType::Tsp, 1.0),
            record(2565, Month::May, Line::Red, MeasurementType::Tsp, 1.0),
            record(2565, Month::June, Line::Red, MeasurementType::Tsp, 2.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(format_average(summary.average), "1.33");
        assert_eq!(period_mean(&sum_by_period(&records)), 2.0);
    }
}
