//! Input data: the price panel, the benchmark series and the signal schedule.
//!
//! Everything here is built once before a run and then only read. File
//! parsing lives in the runner; these types take already-parsed rows.

pub mod benchmark;
pub mod panel;
pub mod schedule;

pub use benchmark::BenchmarkSeries;
pub use panel::{PanelError, PricePanel, PriceRow};
pub use schedule::{
    map_signal_to_trade, validate_signals, RebalanceSlate, ScheduleEntry, SignalRow,
    SignalSchedule, ValidationReport,
};
