//! Exchange instrument lookup, loaded once from an instruments dump.
//!
//! The directory is an explicit value handed to whoever needs symbol
//! resolution; the simulator never touches it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const REQUIRED_COLUMNS: [&str; 4] = ["tradingsymbol", "instrument_token", "exchange", "name"];
pub const DEFAULT_EXCHANGE_PRIORITY: [&str; 2] = ["NSE", "BSE"];

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: instruments CSV missing columns: {missing:?}")]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{symbol} not found in exchanges: {exchanges:?}")]
    NotFound {
        symbol: String,
        exchanges: Vec<String>,
    },
}

/// One tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(rename = "tradingsymbol")]
    pub symbol: String,
    pub instrument_token: u64,
    pub exchange: String,
    pub name: Option<String>,
}

/// Instruments indexed by upper-cased trading symbol.
#[derive(Debug, Clone, Default)]
pub struct InstrumentDirectory {
    by_symbol: HashMap<String, Vec<Instrument>>,
    count: usize,
}

impl InstrumentDirectory {
    pub fn load(path: &Path) -> Result<Self, InstrumentError> {
        let csv_err = |source| InstrumentError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == **c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(InstrumentError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            });
        }

        let mut instruments = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let instrument: Instrument = record.deserialize(Some(&headers)).map_err(csv_err)?;
            instruments.push(instrument);
        }
        let directory = Self::from_instruments(instruments);
        info!(path = %path.display(), instruments = directory.len(), "instrument directory loaded");
        Ok(directory)
    }

    pub fn from_instruments(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut by_symbol: HashMap<String, Vec<Instrument>> = HashMap::new();
        let mut count = 0;
        for instrument in instruments {
            by_symbol
                .entry(instrument.symbol.to_ascii_uppercase())
                .or_default()
                .push(instrument);
            count += 1;
        }
        Self { by_symbol, count }
    }

    /// First match for `symbol` (case-insensitive) walking `exchange_priority`
    /// in order. An empty priority list means NSE then BSE.
    pub fn find(&self, symbol: &str, exchange_priority: &[&str]) -> Result<&Instrument, InstrumentError> {
        let exchanges: &[&str] = if exchange_priority.is_empty() {
            &DEFAULT_EXCHANGE_PRIORITY
        } else {
            exchange_priority
        };
        let candidates = self.by_symbol.get(&symbol.to_ascii_uppercase());
        exchanges
            .iter()
            .find_map(|exchange| {
                candidates?.iter().find(|i| i.exchange == *exchange)
            })
            .ok_or_else(|| InstrumentError::NotFound {
                symbol: symbol.to_string(),
                exchanges: exchanges.iter().map(|e| e.to_string()).collect(),
            })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
