//! View synchronization: the displayed table and every chart series are derived from one
//! cached collection and the current filter, and are rebuilt together on every change.
use crate::aggregate::{self, PeriodBucket, Summary};
use crate::error::{StoreError, ValidationError};
use crate::query::{self, FilterSpec};
use crate::record::{Line, MeasurementType, Record, RecordForm, RecordId, MONTH_NAMES};

/// Column labels of the table and of every export, in column order.
pub const COLUMN_LABELS: [&str; 5] = ["ปี (พ.ศ.)", "เดือน", "สาย", "ประเภท", "จำนวน"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    StackedBar,
    Doughnut,
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
/// Data of one chart: category labels and one or more series of the same length.
pub struct Chart {
    /// Stable name, also the file stem of the rendered chart.
    pub id: &'static str,
    pub title: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// All aggregations of the displayed rows and the charts built from them.
pub struct Dashboard {
    pub type_counts: Vec<(MeasurementType, usize)>,
    pub line_counts: Vec<(Line, usize)>,
    pub monthly_by_type: Vec<(MeasurementType, [usize; 12])>,
    pub periods: Vec<PeriodBucket>,
    pub year_counts: Vec<(i32, usize)>,
    pub summary: Summary,
    pub period_mean: f64,
    pub charts: Vec<Chart>,
}

impl Dashboard {
    pub fn build(rows: &[Record]) -> Self {
        let type_counts = aggregate::count_by_type(rows);
        let line_counts = aggregate::count_by_line(rows);
        let monthly_by_type = aggregate::monthly_counts_by_type(rows);
        let periods = aggregate::sum_by_period(rows);
        let year_counts = aggregate::count_by_year(rows);
        let summary = aggregate::summarize(rows);
        let period_mean = aggregate::period_mean(&periods);

        let charts = vec![
            Chart {
                id: "chart_type",
                title: String::from("จำนวนตามประเภท"),
                kind: ChartKind::Bar,
                labels: type_counts.iter().map(|(t, _)| t.as_str().to_string()).collect(),
                series: vec![ChartSeries {
                    label: String::from("จำนวน"),
                    values: type_counts.iter().map(|(_, n)| *n as f64).collect(),
                }],
            },
            Chart {
                id: "chart_line",
                title: String::from("จำนวนตามสาย"),
                kind: ChartKind::Doughnut,
                labels: line_counts.iter().map(|(l, _)| l.label().to_string()).collect(),
                series: vec![ChartSeries {
                    label: String::from("จำนวน"),
                    values: line_counts.iter().map(|(_, n)| *n as f64).collect(),
                }],
            },
            Chart {
                id: "chart_monthly",
                title: String::from("จำนวนรายเดือนตามประเภท"),
                kind: ChartKind::StackedBar,
                labels: MONTH_NAMES.iter().map(|m| m.to_string()).collect(),
                series: monthly_by_type
                    .iter()
                    .map(|(t, counts)| ChartSeries {
                        label: t.as_str().to_string(),
                        values: counts.iter().map(|n| *n as f64).collect(),
                    })
                    .collect(),
            },
            Chart {
                id: "chart_year",
                title: String::from("แนวโน้มรายปี"),
                kind: ChartKind::Line,
                labels: year_counts.iter().map(|(y, _)| y.to_string()).collect(),
                series: vec![ChartSeries {
                    label: String::from("จำนวน/ปี"),
                    values: year_counts.iter().map(|(_, n)| *n as f64).collect(),
                }],
            },
            Chart {
                id: "chart_period",
                title: String::from("ค่ารวมรายเดือน"),
                kind: ChartKind::Line,
                labels: periods.iter().map(PeriodBucket::label).collect(),
                series: vec![
                    ChartSeries {
                        label: String::from("จำนวน"),
                        values: periods.iter().map(|b| b.total).collect(),
                    },
                    ChartSeries {
                        label: String::from("ค่าเฉลี่ย"),
                        values: vec![period_mean; periods.len()],
                    },
                ],
            },
        ];

        Dashboard {
            type_counts,
            line_counts,
            monthly_by_type,
            periods,
            year_counts,
            summary,
            period_mean,
            charts,
        }
    }

    pub fn chart(&self, id: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }

    /// The record average as displayed, two decimals.
    pub fn average_label(&self) -> String {
        aggregate::format_average(self.summary.average)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An edit in progress, owned by whoever opened it.
///
/// The draft carries the id of the record it edits, so saving does not depend on what the
/// table shows by the time the user is done.
pub struct EditDraft {
    pub id: RecordId,
    pub form: RecordForm,
}

impl EditDraft {
    pub fn finish(&self) -> Result<Record, ValidationError> {
        self.form.validate(self.id)
    }
}

pub struct ViewSynchronizer {
    cache: Vec<Record>,
    filter: FilterSpec,
    rows: Vec<Record>,
    dashboard: Dashboard,
    generation: u64,
}

impl ViewSynchronizer {
    pub fn new(records: Vec<Record>) -> Self {
        let mut view = ViewSynchronizer {
            cache: records,
            filter: FilterSpec::default(),
            rows: Vec::new(),
            dashboard: Dashboard::default(),
            generation: 0,
        };
        view.rebuild();
        view
    }

    /// Replaces the cached collection, keeping the current filter.
    pub fn refresh(&mut self, records: Vec<Record>) {
        self.cache = records;
        self.rebuild();
    }

    pub fn apply_filter(&mut self, filter: FilterSpec) {
        self.filter = filter;
        self.rebuild();
    }

    pub fn reset(&mut self) {
        self.apply_filter(FilterSpec::default());
    }

    fn rebuild(&mut self) {
        let mut rows = query::filter(&self.cache, &self.filter);
        query::sort_records(&mut rows);
        self.dashboard = Dashboard::build(&rows);
        self.rows = rows;
        self.generation += 1;
    }

    /// Displayed rows: filtered and in display order.
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Incremented by every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Id of the record shown at `position` of the displayed rows.
    pub fn resolve(&self, position: usize) -> Result<RecordId, StoreError> {
        self.rows
            .get(position)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::NotFound(format!("no row at position {}", position)))
    }

    pub fn begin_edit(&self, position: usize) -> Result<EditDraft, StoreError> {
        let record = self
            .rows
            .get(position)
            .ok_or_else(|| StoreError::NotFound(format!("no row at position {}", position)))?;
        Ok(EditDraft {
            id: record.id,
            form: RecordForm::from_record(record),
        })
    }

    /// Text rendition of the displayed rows with positions and the average line.
    pub fn render_table(&self) -> String {
        let mut out = format!(
            "{:>4}  {:<10} {:<12} {:<8} {:<8} {:>10}\n",
            "#", COLUMN_LABELS[0], COLUMN_LABELS[1], COLUMN_LABELS[2], COLUMN_LABELS[3], COLUMN_LABELS[4]
        );
        for (position, record) in self.rows.iter().enumerate() {
            out.push_str(&format!(
                "{:>4}  {:<10} {:<12} {:<8} {:<8} {:>10}",
                position,
                record.year,
                record.month.thai_name(),
                record.line.as_str(),
                record.measurement_type.as_str(),
                record.value
            ));
            if let Some(note) = &record.note {
                out.push_str("  ");
                out.push_str(note);
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} รายการ, ค่าเฉลี่ย {}\n",
            self.dashboard.summary.count,
            self.dashboard.average_label()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Month;
    use crate::store::tests::local_backend;
    use crate::store::{RecordBackend, RecordStore};

    fn record(year: i32, month: Month, line: Line, value: f64) -> Record {
        Record::new(year, month, line, MeasurementType::Tsp, value)
    }

    #[test]
    fn rows_are_sorted_whatever_the_store_order() {
        let view = ViewSynchronizer::new(vec![
            record(2566, Month::January, Line::Red, 1.0),
            record(2565, Month::November, Line::Red, 2.0),
            record(2565, Month::February, Line::Red, 3.0),
        ]);
        let values: Vec<f64> = view.rows().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn filter_and_reset_replace_rows_and_charts() {
        let mut view = ViewSynchronizer::new(vec![
            record(2565, Month::January, Line::North, 4.0),
            record(2565, Month::January, Line::West, 6.0),
        ]);
        let start = view.generation();

        view.apply_filter(FilterSpec::default().with_line(Line::West));
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.dashboard().summary.count, 1);
        let line_chart = view.dashboard().chart("chart_line").unwrap();
        assert_eq!(line_chart.series[0].values, vec![0.0, 1.0, 0.0]);
        assert_eq!(view.dashboard().average_label(), "6.00");

        view.reset();
        assert!(view.filter().is_empty());
        assert_eq!(view.rows().len(), 2);
        assert_eq!(view.dashboard().average_label(), "5.00");
        assert_eq!(view.generation(), start + 2);
    }

    #[test]
    fn refresh_keeps_the_filter_and_rebuilds_everything() {
        let mut view = ViewSynchronizer::new(vec![record(2565, Month::May, Line::Red, 1.0)]);
        view.apply_filter(FilterSpec::default().with_year(2566));
        assert!(view.rows().is_empty());
        assert_eq!(view.dashboard().average_label(), "0.00");

        view.refresh(vec![
            record(2565, Month::May, Line::Red, 1.0),
            record(2566, Month::May, Line::Red, 9.0),
        ]);
        assert_eq!(view.rows().len(), 1);
        let period_chart = view.dashboard().chart("chart_period").unwrap();
        assert_eq!(period_chart.labels, vec!["พฤษภาคม 2566".to_string()]);
        assert_eq!(period_chart.series[1].values, vec![9.0]);
    }

    #[test]
    fn charts_have_stable_axes() {
        let view = ViewSynchronizer::new(Vec::new());
        let dashboard = view.dashboard();
        assert_eq!(dashboard.chart("chart_type").unwrap().labels, vec!["TSP", "TSA", "TA"]);
        assert_eq!(
            dashboard.chart("chart_line").unwrap().labels,
            vec!["North", "West", "Red Line"]
        );
        let monthly = dashboard.chart("chart_monthly").unwrap();
        assert_eq!(monthly.labels.len(), 12);
        assert_eq!(monthly.series.len(), 3);
        assert!(dashboard.chart("chart_year").unwrap().labels.is_empty());
    }

    #[test]
    fn resolve_out_of_range_is_not_found() {
        let view = ViewSynchronizer::new(vec![record(2565, Month::May, Line::Red, 1.0)]);
        assert!(view.resolve(0).is_ok());
        assert!(matches!(view.resolve(1), Err(StoreError::NotFound(_))));
        assert!(view.begin_edit(3).is_err());
    }

    #[test]
    fn delete_by_display_position_removes_the_displayed_record() {
        let dir = tempfile::tempdir().unwrap();
        let local = local_backend(&dir);
        // natural order: West 2566, North 2565-Mar, North 2565-Jan, Red 2565-Jan
        let west = record(2566, Month::January, Line::West, 1.0);
        let north_march = record(2565, Month::March, Line::North, 2.0);
        let north_january = record(2565, Month::January, Line::North, 3.0);
        let red_january = record(2565, Month::January, Line::Red, 4.0);
        for r in &[&west, &north_march, &north_january, &red_january] {
            local.create(r).unwrap();
        }
        let mut store = RecordStore::new(Box::new(local), None);

        let spec = FilterSpec::default().with_line(Line::North);
        let mut view = ViewSynchronizer::new(store.list(&FilterSpec::default()).unwrap().value);
        view.apply_filter(spec);
        // position 0 is West in the store but North January on display
        let target = view.resolve(0).unwrap();
        assert_eq!(target, north_january.id);

        store.delete(target).unwrap();
        let remaining = store.list(&FilterSpec::default()).unwrap().value;
        let ids: Vec<RecordId> = remaining.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![west.id, north_march.id, red_january.id]);
    }

    #[test]
    fn refresh_does_not_touch_an_open_draft() {
        let mut view = ViewSynchronizer::new(vec![record(2565, Month::May, Line::Red, 1.0)]);
        let mut draft = view.begin_edit(0).unwrap();
        draft.form.value = String::from("42");

        view.refresh(vec![
            record(2564, Month::May, Line::Red, 7.0),
            record(2565, Month::May, Line::Red, 1.0),
        ]);

        assert_eq!(draft.form.value, "42");
        let saved = draft.finish().unwrap();
        assert_eq!(saved.value, 42.0);
        assert_ne!(view.resolve(0).unwrap(), draft.id);
    }

    #[test]
    fn table_lists_positions_and_average() {
        let view = ViewSynchronizer::new(vec![
            record(2565, Month::May, Line::Red, 1.0),
            record(2565, Month::June, Line::Red, 2.0),
        ]);
        let table = view.render_table();
        assert!(table.starts_with("   #"));
        assert!(table.contains("พฤษภาคม"));
        assert!(table.contains("2 รายการ, ค่าเฉลี่ย 1.50"));
    }
}
