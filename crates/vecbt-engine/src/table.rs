use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use vecbt_core::ParamSet;

use crate::metrics::{Metric, Metrics};

/// One row of a comparison or grid-search table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub strategy: String,
    pub params: ParamSet,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub hodl_return: f64,
}

impl SummaryRow {
    pub fn metric(&self, metric: Metric) -> f64 {
        metric.get(&self.metrics)
    }
}

/// Ordered collection of summary rows. Serialized as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<SummaryRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<SummaryRow>) -> Self {
        Self { rows }
    }

    /// Stable sort, descending on `metric`. `NaN` values sink to the bottom.
    pub fn sort_by(&mut self, metric: Metric) {
        self.rows
            .sort_by(|a, b| descending_nan_last(a.metric(metric), b.metric(metric)));
    }

    pub fn sorted_by(mut self, metric: Metric) -> Self {
        self.sort_by(metric);
        self
    }

    /// First row; the best one once the table is sorted.
    pub fn best(&self) -> Option<&SummaryRow> {
        self.rows.first()
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SummaryRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one metric column, in row order.
    pub fn column(&self, metric: Metric) -> Vec<f64> {
        self.rows.iter().map(|r| r.metric(metric)).collect()
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a SummaryRow;
    type IntoIter = std::slice::Iter<'a, SummaryRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<SummaryRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = SummaryRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<24} {:>10} {:>10} {:>8} {:>9} {:>8} {:>7} {:>8} {:>10}  params",
            "strategy", "return%", "annual%", "sharpe", "mdd%", "win%", "trades", "pf", "hodl%"
        )?;
        for row in &self.rows {
            let m = &row.metrics;
            writeln!(
                f,
                "{:<24} {:>10.2} {:>10.2} {:>8.2} {:>9.2} {:>8.2} {:>7} {:>8.2} {:>10.2}  {}",
                row.strategy,
                m.total_return * 100.0,
                m.annual_return * 100.0,
                m.sharpe_ratio,
                m.max_drawdown * 100.0,
                m.win_rate * 100.0,
                m.total_trades,
                m.profit_factor,
                row.hodl_return * 100.0,
                row.params
            )?;
        }
        Ok(())
    }
}
