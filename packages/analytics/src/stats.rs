//! Descriptive statistics over optional values.
//!
//! Missing values are skipped rather than treated as zero, matching how a
//! survey with suppressed estimates has to be summarized.

use coffee_map_analytics_models::RegionSummary;

/// Arithmetic mean of the present values, or `None` if there are none.
#[must_use]
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));

    #[allow(clippy::cast_precision_loss)]
    let count_f = count as f64;
    (count > 0).then(|| sum / count_f)
}

/// Quantile `q` (0..=1) using linear interpolation between closest ranks.
///
/// For `n` sorted values the quantile sits at position `q * (n - 1)`; a
/// fractional position interpolates between its neighbours. Returns
/// `None` for an empty input or `q` outside `0..=1`.
#[must_use]
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_precision_loss)]
    let position = q * (sorted.len() - 1) as f64;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = position - position.floor();

    Some((sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower]))
}

/// Pearson correlation over the pairs where both values are present.
///
/// Returns `None` with fewer than two complete pairs or when either side
/// has zero variance.
#[must_use]
pub fn pearson(pairs: impl IntoIterator<Item = (Option<f64>, Option<f64>)>) -> Option<f64> {
    let complete: Vec<(f64, f64)> = pairs
        .into_iter()
        .filter_map(|(x, y)| Some((x?, y?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    if complete.len() < 2 {
        return None;
    }

    let mean_x = mean(complete.iter().map(|(x, _)| *x))?;
    let mean_y = mean(complete.iter().map(|(_, y)| *y))?;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &complete {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Square matrix of pairwise [`pearson`] correlations.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    /// Column labels, in row/column order.
    pub labels: Vec<&'static str>,
    /// `values[i][j]` is the correlation between columns `i` and `j`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Computes the matrix for named columns of equal length.
    #[must_use]
    pub fn from_columns(columns: &[(&'static str, Vec<Option<f64>>)]) -> Self {
        let values = columns
            .iter()
            .map(|(_, a)| {
                columns
                    .iter()
                    .map(|(_, b)| pearson(a.iter().copied().zip(b.iter().copied())))
                    .collect()
            })
            .collect();

        Self {
            labels: columns.iter().map(|(label, _)| *label).collect(),
            values,
        }
    }

    /// Looks up the correlation between two labelled columns.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| *l == a)?;
        let j = self.labels.iter().position(|l| *l == b)?;
        self.values[i][j]
    }

    /// Renders the matrix as a fixed-width text table.
    #[must_use]
    pub fn render(&self) -> String {
        use std::fmt::Write as _;

        let width = self.labels.iter().map(|l| l.len()).max().unwrap_or(0).max(6);
        let mut out = format!("{:width$}", "");
        for label in &self.labels {
            let _ = write!(out, " {label:>width$}");
        }
        for (label, row) in self.labels.iter().zip(&self.values) {
            let _ = write!(out, "\n{label:width$}");
            for value in row {
                match value {
                    Some(v) => {
                        let _ = write!(out, " {v:>width$.2}");
                    }
                    None => {
                        let _ = write!(out, " {:>width$}", "-");
                    }
                }
            }
        }
        out
    }
}

/// Correlations between tract demographics and shop statistics.
#[must_use]
pub fn correlation_matrix(summaries: &[RegionSummary]) -> CorrelationMatrix {
    let column = |f: &dyn Fn(&RegionSummary) -> Option<f64>| -> Vec<Option<f64>> {
        summaries.iter().map(f).collect()
    };

    #[allow(clippy::cast_precision_loss)]
    let columns = [
        ("population", column(&|s| s.demographics.population)),
        ("income", column(&|s| s.demographics.median_income)),
        ("age", column(&|s| s.demographics.median_age)),
        ("shops", column(&|s| Some(s.aggregate.shop_count as f64))),
        ("rating", column(&|s| Some(s.aggregate.avg_rating))),
        ("reviews", column(&|s| Some(s.aggregate.total_reviews as f64))),
    ];

    CorrelationMatrix::from_columns(&columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_skips_nothing_but_non_finite() {
        assert_eq!(mean([]), None);
        assert!(close(mean([4.0, 5.0]).unwrap(), 4.5));
        assert!(close(mean([4.0, f64::NAN, 5.0]).unwrap(), 4.5));
    }

    #[test]
    fn quantile_interpolates_linearly() {
        assert!(close(quantile([1.0, 2.0, 3.0, 4.0], 0.75).unwrap(), 3.25));
        assert!(close(quantile([10.0, 5.0], 0.75).unwrap(), 8.75));
        assert!(close(quantile([4.0, 1.0, 3.0, 2.0], 0.5).unwrap(), 2.5));
        assert!(close(quantile([7.0], 0.75).unwrap(), 7.0));
        assert!(close(quantile([1.0, 9.0], 0.0).unwrap(), 1.0));
        assert!(close(quantile([1.0, 9.0], 1.0).unwrap(), 9.0));
    }

    #[test]
    fn quantile_rejects_empty_and_out_of_range() {
        assert_eq!(quantile([], 0.5), None);
        assert_eq!(quantile([1.0], 1.5), None);
        assert_eq!(quantile([f64::NAN], 0.5), None);
    }

    #[test]
    fn pearson_uses_complete_pairs_only() {
        let pairs = [
            (Some(1.0), Some(2.0)),
            (Some(2.0), Some(4.0)),
            (None, Some(100.0)),
            (Some(3.0), Some(6.0)),
        ];
        assert!(close(pearson(pairs).unwrap(), 1.0));

        let inverse = [(Some(1.0), Some(3.0)), (Some(2.0), Some(2.0)), (Some(3.0), Some(1.0))];
        assert!(close(pearson(inverse).unwrap(), -1.0));
    }

    #[test]
    fn pearson_undefined_without_variance() {
        assert_eq!(pearson([(Some(1.0), Some(2.0)), (Some(1.0), Some(3.0))]), None);
        assert_eq!(pearson([(Some(1.0), Some(2.0))]), None);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let matrix = CorrelationMatrix::from_columns(&[
            ("a", vec![Some(1.0), Some(2.0), Some(3.0)]),
            ("b", vec![Some(2.0), Some(1.0), Some(5.0)]),
        ]);

        assert!(close(matrix.get("a", "a").unwrap(), 1.0));
        assert!(close(
            matrix.get("a", "b").unwrap(),
            matrix.get("b", "a").unwrap()
        ));
        assert_eq!(matrix.get("a", "zzz"), None);
        assert_eq!(matrix.render().lines().count(), 3);
    }

    #[test]
    fn region_matrix_covers_every_column() {
        use coffee_map_analytics_models::RegionAggregate;
        use coffee_map_geography_models::Demographics;

        let summaries: Vec<RegionSummary> = [(1000.0, 0), (2000.0, 1), (4000.0, 3)]
            .into_iter()
            .enumerate()
            .map(|(i, (population, shops))| RegionSummary {
                aggregate: RegionAggregate {
                    shop_count: shops,
                    ..RegionAggregate::empty(&i.to_string())
                },
                demographics: Demographics {
                    population: Some(population),
                    ..Demographics::default()
                },
            })
            .collect();

        let matrix = correlation_matrix(&summaries);

        assert_eq!(matrix.labels.len(), 6);
        assert!(matrix.get("population", "shops").unwrap() > 0.9);
        assert_eq!(matrix.get("population", "income"), None);
        assert_eq!(matrix.get("rating", "rating"), None);
    }
}
