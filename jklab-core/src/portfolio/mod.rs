//! J/K momentum engine: generator, aggregator and spread math.

pub mod aggregator;
pub mod generator;
pub mod ranking;
pub mod spread;

pub use aggregator::aggregate;
pub use generator::{
    generate, generate_portfolios, GeneratorConfig, GeneratorError, DEFAULT_MIN_UNIVERSE_SIZE,
    DEFAULT_PORTFOLIO_COUNT,
};
pub use ranking::{cumulative_return, partition_into_groups, FormationScore};
pub use spread::{cumulative_comparison, inner_join, ComparisonPoint, LegRow, SpreadSummary};
