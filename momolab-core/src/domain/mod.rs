//! Domain types for momolab

pub mod equity;
pub mod exit;
pub mod position;
pub mod trade;

pub use equity::EquitySnapshot;
pub use exit::ExitRecord;
pub use position::Position;
pub use trade::{Side, TradeRecord, TurnoverRecord};

/// Symbol type alias
pub type Symbol = String;
