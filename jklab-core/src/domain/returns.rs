//! Tagged return units.
//!
//! Stock panels are quoted in percent (2.5 means +2.5%), benchmark series in
//! decimals (0.025 means +2.5%). Keeping them as distinct types means a
//! percent value can never be compounded as if it were a decimal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// A monthly return expressed in percent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PercentReturn(pub f64);

/// A monthly return expressed as a decimal fraction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecimalReturn(pub f64);

impl PercentReturn {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    pub fn to_decimal(self) -> DecimalReturn {
        DecimalReturn(self.0 / 100.0)
    }

    /// Growth factor for one period: `1 + r/100`.
    pub fn growth(self) -> f64 {
        1.0 + self.0 / 100.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl DecimalReturn {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    pub fn to_percent(self) -> PercentReturn {
        PercentReturn(self.0 * 100.0)
    }

    /// Growth factor for one period: `1 + r`.
    pub fn growth(self) -> f64 {
        1.0 + self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl fmt::Display for PercentReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}%", self.0)
    }
}

impl fmt::Display for DecimalReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

impl Sum for PercentReturn {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|r| r.0).sum())
    }
}

/// Arithmetic mean of percent returns. `None` for an empty input.
pub fn mean_percent<I>(values: I) -> Option<PercentReturn>
where
    I: IntoIterator<Item = PercentReturn>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v.0;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(PercentReturn(sum / count as f64))
    }
}
