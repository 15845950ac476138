use std::path::Path;

use crate::error::DataError;

/// Struct-of-Arrays OHLCV storage.
///
/// All vectors are parallel: index `i` across every field is one bar. A series
/// handed to the engine must satisfy [`BarSeries::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(cap),
            open: Vec::with_capacity(cap),
            high: Vec::with_capacity(cap),
            low: Vec::with_capacity(cap),
            close: Vec::with_capacity(cap),
            volume: Vec::with_capacity(cap),
        }
    }

    /// Build a series from closes only, one bar per second starting at `start_ts`.
    ///
    /// Open/high/low are set to the close and volume to 1.0. Mostly useful for
    /// tests and benchmarks where only close-driven indicators matter.
    pub fn from_closes(start_ts: i64, closes: &[f64]) -> Self {
        let mut bars = Self::with_capacity(closes.len());
        for (i, &c) in closes.iter().enumerate() {
            bars.push(start_ts + i as i64, c, c, c, c, 1.0);
        }
        bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) {
        self.timestamps.push(ts);
        self.open.push(o);
        self.high.push(h);
        self.low.push(l);
        self.close.push(c);
        self.volume.push(v);
    }

    /// First and last timestamp, if any.
    pub fn span(&self) -> Option<(i64, i64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Check the input-boundary contract: non-empty, strictly increasing
    /// timestamps, finite positive prices and finite non-negative volume.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.is_empty() {
            return Err(DataError::Empty);
        }

        let n = self.len();
        for (name, column) in [
            ("open", &self.open),
            ("high", &self.high),
            ("low", &self.low),
            ("close", &self.close),
            ("volume", &self.volume),
        ] {
            if column.len() != n {
                return Err(DataError::LengthMismatch {
                    name: name.to_string(),
                    expected: n,
                    actual: column.len(),
                });
            }
        }

        for i in 1..n {
            if self.timestamps[i] <= self.timestamps[i - 1] {
                return Err(DataError::NonMonotonic {
                    index: i,
                    previous: self.timestamps[i - 1],
                    current: self.timestamps[i],
                });
            }
        }

        for i in 0..n {
            for (field, value) in [
                ("open", self.open[i]),
                ("high", self.high[i]),
                ("low", self.low[i]),
                ("close", self.close[i]),
            ] {
                if !value.is_finite() || value <= 0.0 {
                    return Err(DataError::InvalidValue { index: i, field, value });
                }
            }
            let v = self.volume[i];
            if !v.is_finite() || v < 0.0 {
                return Err(DataError::InvalidValue {
                    index: i,
                    field: "volume",
                    value: v,
                });
            }
        }

        Ok(())
    }

    /// Load bars from a CSV file using memory-mapped I/O.
    ///
    /// Expected CSV format: timestamp,open,high,low,close,volume
    /// Handles ISO8601 timestamps such as `2025-11-08T00:00:00Z` or `2024-02-08T09:00:00+09:00`;
    /// offsets are applied, so every timestamp is UTC epoch seconds.
    pub fn from_csv(path: &Path) -> Result<Self, DataError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before this function returns.
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;
        Self::parse_csv_bytes(&mmap[..])
    }

    /// Parse CSV from raw bytes (testable without files).
    ///
    /// The header row is skipped and rows are returned sorted by timestamp.
    /// Duplicated timestamps are kept so that [`BarSeries::validate`] can
    /// report them.
    pub fn parse_csv_bytes(data: &[u8]) -> Result<Self, DataError> {
        // ~50 bytes per row
        let mut store = Self::with_capacity(data.len() / 50);

        let mut pos = match memchr::memchr(b'\n', data) {
            Some(nl) => nl + 1,
            None => return Ok(store),
        };
        let mut line_no = 1;

        while pos < data.len() {
            line_no += 1;
            let line_end = memchr::memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(data.len());

            let line = &data[pos..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if !line.is_empty() {
                Self::parse_row(line, line_no, &mut store)?;
            }

            pos = line_end + 1;
        }

        if store.timestamps.windows(2).any(|w| w[1] < w[0]) {
            let mut indices: Vec<usize> = (0..store.len()).collect();
            indices.sort_by_key(|&i| store.timestamps[i]);
            return Ok(store.reorder(&indices));
        }

        Ok(store)
    }

    fn parse_row(line: &[u8], line_no: usize, store: &mut BarSeries) -> Result<(), DataError> {
        let columns = memchr::memchr_iter(b',', line).count() + 1;
        if columns != 6 {
            return Err(DataError::Parse {
                line: line_no,
                reason: format!("expected 6 columns, got {}", columns),
            });
        }

        let mut fields: [&[u8]; 6] = [&[]; 6];
        let mut start = 0;
        for (slot, end) in memchr::memchr_iter(b',', line)
            .chain(std::iter::once(line.len()))
            .enumerate()
        {
            fields[slot] = line[start..end].trim_ascii();
            start = end + 1;
        }

        let number = |idx: usize, name: &str| -> Result<f64, DataError> {
            fast_float::parse(fields[idx]).map_err(|_| DataError::Parse {
                line: line_no,
                reason: format!("bad {}: {}", name, String::from_utf8_lossy(fields[idx])),
            })
        };

        let ts = parse_timestamp(fields[0]).map_err(|reason| DataError::Parse {
            line: line_no,
            reason,
        })?;

        store.push(
            ts,
            number(1, "open")?,
            number(2, "high")?,
            number(3, "low")?,
            number(4, "close")?,
            number(5, "volume")?,
        );
        Ok(())
    }

    fn reorder(&self, indices: &[usize]) -> BarSeries {
        let mut result = BarSeries::with_capacity(indices.len());
        for &i in indices {
            result.push(
                self.timestamps[i],
                self.open[i],
                self.high[i],
                self.low[i],
                self.close[i],
                self.volume[i],
            );
        }
        result
    }

    /// Copy `[start, end)` into a new series. Out-of-range bounds are clamped.
    pub fn slice(&self, start: usize, end: usize) -> BarSeries {
        let end = end.min(self.len());
        let start = start.min(end);
        BarSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }
}

/// Parse an ISO8601 timestamp (or a plain unix epoch integer) to epoch seconds.
fn parse_timestamp(bytes: &[u8]) -> Result<i64, String> {
    if !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit) {
        return std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| format!("bad epoch timestamp: {}", String::from_utf8_lossy(bytes)));
    }

    // YYYY-MM-DDTHH:MM:SS[.fff][Z|+HH:MM|-HH:MM]
    if bytes.len() < 19 {
        return Err(format!(
            "timestamp too short: {}",
            String::from_utf8_lossy(bytes)
        ));
    }

    let s = std::str::from_utf8(bytes).map_err(|_| "non-UTF8 timestamp".to_string())?;
    let field = |range: std::ops::Range<usize>, name: &str| -> Result<u32, String> {
        s.get(range)
            .and_then(|part| part.parse().ok())
            .ok_or_else(|| format!("bad {} in {}", name, s))
    };

    let year = field(0..4, "year")? as i32;
    let month = field(5..7, "month")?;
    let day = field(8..10, "day")?;
    let hour = field(11..13, "hour")?;
    let minute = field(14..16, "minute")?;
    let second = field(17..19, "second")?;

    let days = days_from_civil(year, month, day);
    let local = days * 86400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64;
    Ok(local - utc_offset(&s[19..]).ok_or_else(|| format!("bad UTC offset in {}", s))?)
}

/// Seconds east of UTC for the text after `HH:MM:SS`.
///
/// Accepts optional fractional seconds (dropped), then nothing, `Z`, or
/// `+HH:MM` / `-HH:MM`.
fn utc_offset(rest: &str) -> Option<i64> {
    let rest = match rest.strip_prefix('.') {
        Some(frac) => frac.trim_start_matches(|c: char| c.is_ascii_digit()),
        None => rest,
    };
    if rest.is_empty() || rest == "Z" {
        return Some(0);
    }

    let (sign, hhmm) = if let Some(hhmm) = rest.strip_prefix('+') {
        (1, hhmm)
    } else {
        (-1, rest.strip_prefix('-')?)
    };
    let (hh, mm) = hhmm.split_once(':')?;
    if hh.len() != 2 || mm.len() != 2 {
        return None;
    }
    let hours: i64 = hh.parse().ok()?;
    let minutes: i64 = mm.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

/// Convert civil date to days since Unix epoch (Howard Hinnant algorithm).
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 {
        month as i64 + 9
    } else {
        month as i64 - 3
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let doy = (153 * m as u64 + 2) / 5 + day as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}
