//! CSV loading for price panels, signal files and benchmark series.
//!
//! Price files follow the `<SYMBOL>_day.csv` convention: one file per
//! symbol with a `date` and `close` column and optional `open`, `high`,
//! `low`. Files without a usable `close` column are skipped with a warning.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use momolab_core::data::{BenchmarkSeries, PanelError, PricePanel, PriceRow, SignalRow};
use thiserror::Error;
use tracing::{debug, info, warn};

const PRICE_SUFFIX: &str = "_day.csv";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("no price rows found in {0}")]
    NoPriceData(PathBuf),

    #[error("price panel: {0}")]
    Panel(#[from] PanelError),
}

/// Column positions resolved from a header row.
struct Columns {
    indices: Vec<(String, usize)>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let indices = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();
        Self { indices }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.indices.iter().find(|(h, _)| h == name).map(|(_, i)| *i)
    }

    fn require(&self, name: &'static str, path: &Path) -> Result<usize, LoadError> {
        self.find(name).ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Empty or non-finite cells are missing values.
fn parse_price(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_error(path: &Path, record: &csv::StringRecord, message: String) -> LoadError {
    LoadError::Parse {
        path: path.to_path_buf(),
        line: record.position().map_or(0, |p| p.line()),
        message,
    }
}

/// Symbol name for a price file, or `None` if it does not follow the
/// `<SYMBOL>_day.csv` convention.
pub fn symbol_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let symbol = name.strip_suffix(PRICE_SUFFIX)?;
    (!symbol.is_empty()).then(|| symbol.to_string())
}

/// Load every `*_day.csv` file in `dir` into a forward-filled panel.
pub fn load_price_dir(dir: &Path) -> Result<PricePanel, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| symbol_from_path(&p).map(|s| (s, p)))
        .collect();
    files.sort();

    let mut rows = Vec::new();
    for (symbol, path) in &files {
        let loaded = load_price_file(path, symbol)?;
        if loaded.is_empty() {
            warn!(path = %path.display(), "skipping price file without close data");
            continue;
        }
        debug!(%symbol, rows = loaded.len(), "loaded price file");
        rows.extend(loaded);
    }

    if rows.is_empty() {
        return Err(LoadError::NoPriceData(dir.to_path_buf()));
    }
    let panel = PricePanel::from_rows(rows)?;
    info!(
        files = files.len(),
        symbols = panel.symbols().len(),
        days = panel.len(),
        "price panel loaded"
    );
    Ok(panel)
}

/// Rows of one price file. A file with no `close` column yields no rows.
pub fn load_price_file(path: &Path, symbol: &str) -> Result<Vec<PriceRow>, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let cols = Columns::from_headers(&headers);
    let Some(close_idx) = cols.find("close") else {
        return Ok(Vec::new());
    };
    let date_idx = cols.require("date", path)?;
    let open_idx = cols.find("open");
    let high_idx = cols.find("high");
    let low_idx = cols.find("low");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| parse_error(path, &record, format!("invalid date '{raw_date}'")))?;
        let field = |idx: Option<usize>| parse_price(idx.and_then(|i| record.get(i)));
        rows.push(PriceRow {
            date,
            symbol: symbol.to_string(),
            open: field(open_idx),
            high: field(high_idx),
            low: field(low_idx),
            close: field(Some(close_idx)),
        });
    }
    Ok(rows)
}

/// Load a `date, symbol, rank` signals file. Extra columns are ignored.
pub fn load_signals(path: &Path) -> Result<Vec<SignalRow>, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let cols = Columns::from_headers(&headers);
    let date_idx = cols.require("date", path)?;
    let symbol_idx = cols.require("symbol", path)?;
    let rank_idx = cols.require("rank", path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| parse_error(path, &record, format!("invalid date '{raw_date}'")))?;
        let symbol = record.get(symbol_idx).unwrap_or("").trim();
        if symbol.is_empty() {
            return Err(parse_error(path, &record, "empty symbol".into()));
        }
        let raw_rank = record.get(rank_idx).unwrap_or("");
        let rank = parse_rank(raw_rank)
            .ok_or_else(|| parse_error(path, &record, format!("invalid rank '{raw_rank}'")))?;
        rows.push(SignalRow::new(date, symbol, rank));
    }
    info!(path = %path.display(), rows = rows.len(), "signals loaded");
    Ok(rows)
}

/// Ranks may be written as integers or integral floats (`3` or `3.0`).
fn parse_rank(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(rank) = raw.parse::<u32>() {
        return Some(rank);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then_some(value as u32)
}

/// Load a `date, close` benchmark file.
pub fn load_benchmark(path: &Path) -> Result<BenchmarkSeries, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let cols = Columns::from_headers(&headers);
    let date_idx = cols.require("date", path)?;
    let close_idx = cols.require("close", path)?;

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| parse_error(path, &record, format!("invalid date '{raw_date}'")))?;
        if let Some(close) = parse_price(record.get(close_idx)) {
            points.push((date, close));
        }
    }
    Ok(BenchmarkSeries::from_points(points))
}
