//! Filtering and display ordering of record collections.
use std::cmp::Ordering;

use crate::record::{Line, MeasurementType, Month, Record};

#[derive(Debug, Clone, Default, PartialEq)]
/// Independently optional predicates, combined with a logical AND.
///
/// Ranges are inclusive. Month ranges compare the position in the fixed month list and
/// never wrap around a year boundary, so a range from December to January matches nothing.
pub struct FilterSpec {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub month_from: Option<Month>,
    pub month_to: Option<Month>,
    pub line: Option<Line>,
    pub measurement_type: Option<MeasurementType>,
}

impl FilterSpec {
    pub fn with_year(self, year: i32) -> Self {
        self.with_years(Some(year), Some(year))
    }

    pub fn with_years(mut self, from: Option<i32>, to: Option<i32>) -> Self {
        self.year_from = from;
        self.year_to = to;
        self
    }

    pub fn with_month(self, month: Month) -> Self {
        self.with_months(Some(month), Some(month))
    }

    pub fn with_months(mut self, from: Option<Month>, to: Option<Month>) -> Self {
        self.month_from = from;
        self.month_to = to;
        self
    }

    pub fn with_line(mut self, line: Line) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_type(mut self, measurement_type: MeasurementType) -> Self {
        self.measurement_type = Some(measurement_type);
        self
    }

    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        *self == FilterSpec::default()
    }

    /// The year when the range selects exactly one.
    pub fn exact_year(&self) -> Option<i32> {
        match (self.year_from, self.year_to) {
            (Some(from), Some(to)) if from == to => Some(from),
            _ => None,
        }
    }

    pub fn exact_month(&self) -> Option<Month> {
        match (self.month_from, self.month_to) {
            (Some(from), Some(to)) if from == to => Some(from),
            _ => None,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.year_from.map_or(true, |from| record.year >= from)
            && self.year_to.map_or(true, |to| record.year <= to)
            && self.month_from.map_or(true, |from| record.month.ordinal() >= from.ordinal())
            && self.month_to.map_or(true, |to| record.month.ordinal() <= to.ordinal())
            && self.line.map_or(true, |line| record.line == line)
            && self.measurement_type.map_or(true, |t| record.measurement_type == t)
    }
}

/// Returns the records matching `spec`. The source collection is left untouched.
pub fn filter(records: &[Record], spec: &FilterSpec) -> Vec<Record> {
    records.iter().filter(|record| spec.matches(record)).cloned().collect()
}

/// Display order: year ascending, then month by its position in the fixed list.
pub fn display_order(a: &Record, b: &Record) -> Ordering {
    a.year
        .cmp(&b.year)
        .then_with(|| a.month.ordinal().cmp(&b.month.ordinal()))
}

/// Stable sort into display order. Records of the same period keep their relative order.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(display_order);
}
