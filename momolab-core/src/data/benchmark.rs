//! Benchmark close series, aligned to the trading calendar for display only.

use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct BenchmarkSeries {
    points: Vec<(NaiveDate, f64)>,
}

impl BenchmarkSeries {
    /// Sorts by date and drops non-finite closes. A repeated date keeps the last value.
    pub fn from_points(mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.retain(|(_, close)| close.is_finite());
        points.sort_by_key(|(date, _)| *date);
        points.reverse();
        points.dedup_by_key(|(date, _)| *date);
        points.reverse();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// As-of alignment: the last close on or before each calendar date.
    pub fn align(&self, calendar: &[NaiveDate]) -> Vec<Option<f64>> {
        calendar
            .iter()
            .map(|date| {
                let idx = self.points.partition_point(|(d, _)| d <= date);
                idx.checked_sub(1).map(|i| self.points[i].1)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn aligns_as_of_with_forward_fill() {
        let series = BenchmarkSeries::from_points(vec![
            (d("2024-01-03"), 210.0),
            (d("2024-01-02"), 200.0),
            (d("2024-01-05"), f64::NAN),
        ]);
        let calendar = [d("2024-01-01"), d("2024-01-02"), d("2024-01-04"), d("2024-01-05")];
        assert_eq!(
            series.align(&calendar),
            vec![None, Some(200.0), Some(210.0), Some(210.0)]
        );
    }

    #[test]
    fn duplicate_dates_keep_last_value() {
        let series = BenchmarkSeries::from_points(vec![
            (d("2024-01-02"), 200.0),
            (d("2024-01-02"), 205.0),
        ]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.align(&[d("2024-01-02")]), vec![Some(205.0)]);
    }
}
