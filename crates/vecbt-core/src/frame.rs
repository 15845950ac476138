use crate::bar::BarSeries;
use crate::error::DataError;
use crate::signal::Signal;

/// Name under which the signal column is reported when it is missing.
pub const SIGNAL_COLUMN: &str = "signal";

/// A bar series augmented with derived indicator columns and a signal column.
///
/// Built fresh on every strategy evaluation; the underlying bars are borrowed
/// and never mutated, so one series can feed any number of evaluations.
#[derive(Debug, Clone)]
pub struct SignalFrame<'a> {
    bars: &'a BarSeries,
    columns: Vec<(String, Vec<f64>)>,
    signals: Option<Vec<Signal>>,
}

impl<'a> SignalFrame<'a> {
    pub fn new(bars: &'a BarSeries) -> Self {
        Self {
            bars,
            columns: Vec::new(),
            signals: None,
        }
    }

    /// Attach a derived column. A column with the same name is replaced.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, DataError> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        match self.columns.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = values,
            None => self.columns.push((name, values)),
        }
        Ok(self)
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Result<Self, DataError> {
        self.check_len(SIGNAL_COLUMN, signals.len())?;
        self.signals = Some(signals);
        Ok(self)
    }

    fn check_len(&self, name: &str, actual: usize) -> Result<(), DataError> {
        if actual != self.bars.len() {
            return Err(DataError::LengthMismatch {
                name: name.to_string(),
                expected: self.bars.len(),
                actual,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn bars(&self) -> &'a BarSeries {
        self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[f64], DataError> {
        self.column(name)
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    /// The signal column, or a precondition failure if no strategy produced one.
    pub fn signals(&self) -> Result<&[Signal], DataError> {
        self.signals
            .as_deref()
            .ok_or_else(|| DataError::MissingColumn(SIGNAL_COLUMN.to_string()))
    }

    pub fn into_signals(self) -> Result<Vec<Signal>, DataError> {
        self.signals
            .ok_or_else(|| DataError::MissingColumn(SIGNAL_COLUMN.to_string()))
    }

    /// Number of leading bars on which at least one derived column is undefined.
    ///
    /// This is the insufficient-data prefix: signals there are neutral by
    /// construction. Equals `len()` when no bar has every column defined.
    pub fn undefined_prefix(&self) -> usize {
        (0..self.len())
            .find(|&i| self.columns.iter().all(|(_, v)| !v[i].is_nan()))
            .unwrap_or(self.len())
    }
}
