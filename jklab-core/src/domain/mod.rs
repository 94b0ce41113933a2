//! Domain types for JKLab

pub mod benchmark;
pub mod generation;
pub mod panel;
pub mod returns;
pub mod series;

pub use benchmark::{BenchmarkError, BenchmarkPoint, BenchmarkSeries};
pub use generation::{Generation, WindowBounds};
pub use panel::{PanelError, ReturnPanel};
pub use returns::{mean_percent, DecimalReturn, PercentReturn};
pub use series::{AggregatedReturns, ReturnSeries};

/// Symbol type alias
pub type Symbol = String;
