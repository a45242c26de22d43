//! Window function coefficient tables
//!
//! Precomputes the weighting coefficients applied to a block of samples
//! before spectral analysis. Tables are immutable once built; changing the
//! window size or type means building a new table and swapping it in.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classic analysis windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowFunction {
    #[default]
    Rectangular,
    VonHann,
    Hamming,
    Blackman,
    BlackmanHarris,
    BlackmanNuttall,
    FlatTop,
}

impl WindowFunction {
    /// All window functions in declaration order
    pub const ALL: [WindowFunction; 7] = [
        WindowFunction::Rectangular,
        WindowFunction::VonHann,
        WindowFunction::Hamming,
        WindowFunction::Blackman,
        WindowFunction::BlackmanHarris,
        WindowFunction::BlackmanNuttall,
        WindowFunction::FlatTop,
    ];

    /// Canonical name used by the options surface
    pub fn name(&self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "Rectangular",
            WindowFunction::VonHann => "VonHann",
            WindowFunction::Hamming => "Hamming",
            WindowFunction::Blackman => "Blackman",
            WindowFunction::BlackmanHarris => "BlackmanHarris",
            WindowFunction::BlackmanNuttall => "BlackmanNuttall",
            WindowFunction::FlatTop => "FlatTop",
        }
    }

    /// Coefficient at index `i` of an `m`-point window
    pub fn coefficient(&self, i: usize, m: usize) -> f64 {
        if m < 2 {
            return 1.0;
        }
        let x = i as f64 / (m - 1) as f64;
        let c = |k: f64| (k * PI * x).cos();

        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::VonHann => 0.5 * (1.0 - c(2.0)),
            WindowFunction::Hamming => {
                let alpha = 25.0 / 46.0;
                alpha - (1.0 - alpha) * c(2.0)
            }
            WindowFunction::Blackman => {
                let alpha = 0.16;
                let a0 = (1.0 - alpha) / 2.0;
                let a1 = 0.5;
                let a2 = alpha / 2.0;
                a0 - a1 * c(2.0) + a2 * c(4.0)
            }
            WindowFunction::BlackmanHarris => {
                0.35875 - 0.48829 * c(2.0) + 0.14128 * c(4.0) - 0.01168 * c(6.0)
            }
            WindowFunction::BlackmanNuttall => {
                0.3635819 - 0.4891775 * c(2.0) + 0.1365995 * c(4.0) - 0.0106411 * c(6.0)
            }
            WindowFunction::FlatTop => {
                1.0 - 1.93 * c(2.0) + 1.29 * c(4.0) - 0.388 * c(6.0) + 0.028 * c(8.0)
            }
        }
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown window function name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown window function '{0}'")]
pub struct UnknownWindowFunction(pub String);

impl FromStr for WindowFunction {
    type Err = UnknownWindowFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "Square" is the legacy spelling of the rectangular window
            "Rectangular" | "Square" => Ok(WindowFunction::Rectangular),
            "VonHann" => Ok(WindowFunction::VonHann),
            "Hamming" => Ok(WindowFunction::Hamming),
            "Blackman" => Ok(WindowFunction::Blackman),
            "BlackmanHarris" => Ok(WindowFunction::BlackmanHarris),
            "BlackmanNuttall" => Ok(WindowFunction::BlackmanNuttall),
            "FlatTop" => Ok(WindowFunction::FlatTop),
            other => Err(UnknownWindowFunction(other.to_string())),
        }
    }
}

/// Precomputed coefficients for one window function and size
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTable {
    function: WindowFunction,
    coefficients: Box<[f64]>,
}

impl WindowTable {
    /// Build the coefficient table for an `size`-point window
    pub fn build(function: WindowFunction, size: usize) -> Self {
        let coefficients = (0..size)
            .map(|i| function.coefficient(i, size))
            .collect();
        Self {
            function,
            coefficients,
        }
    }

    pub fn function(&self) -> WindowFunction {
        self.function
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Coefficient at index `i`, `None` past the end of the window
    pub fn at(&self, i: usize) -> Option<f64> {
        self.coefficients.get(i).copied()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_every_table_has_requested_length() {
        for function in WindowFunction::ALL {
            for size in [0, 1, 2, 64, 1024] {
                let table = WindowTable::build(function, size);
                assert_eq!(table.len(), size, "{} with size {}", function, size);
                assert!(table.coefficients().iter().all(|c| c.is_finite()));
            }
        }
    }

    #[test]
    fn test_rectangular_is_flat() {
        let table = WindowTable::build(WindowFunction::Rectangular, 512);
        assert!(table.coefficients().iter().all(|&c| c == 1.0));
    }

    #[test]
    fn test_von_hann_tapers_to_zero() {
        let n = 1024;
        let table = WindowTable::build(WindowFunction::VonHann, n);
        assert_abs_diff_eq!(table.at(0).unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table.at(n - 1).unwrap(), 0.0, epsilon = 1e-12);
        // Odd-length window peaks at exactly 1.0 in the middle
        let odd = WindowTable::build(WindowFunction::VonHann, 101);
        assert_abs_diff_eq!(odd.at(50).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hamming_endpoints() {
        let table = WindowTable::build(WindowFunction::Hamming, 256);
        let expected = 25.0 / 46.0 - 21.0 / 46.0;
        assert_abs_diff_eq!(table.at(0).unwrap(), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(table.at(255).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_blackman_family_symmetry() {
        for function in [
            WindowFunction::Blackman,
            WindowFunction::BlackmanHarris,
            WindowFunction::BlackmanNuttall,
            WindowFunction::FlatTop,
        ] {
            let table = WindowTable::build(function, 129);
            for i in 0..64 {
                assert_abs_diff_eq!(
                    table.at(i).unwrap(),
                    table.at(128 - i).unwrap(),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_out_of_range_lookup() {
        let table = WindowTable::build(WindowFunction::VonHann, 8);
        assert!(table.at(8).is_none());
    }

    #[test]
    fn test_parse_names() {
        for function in WindowFunction::ALL {
            assert_eq!(function.name().parse::<WindowFunction>(), Ok(function));
        }
        assert_eq!("Square".parse(), Ok(WindowFunction::Rectangular));
        assert!("Triangle".parse::<WindowFunction>().is_err());
    }

    #[test]
    fn test_unknown_name_error() {
        let err = "Triangle".parse::<WindowFunction>().unwrap_err();
        assert_eq!(err, UnknownWindowFunction("Triangle".into()));
        assert_eq!(err.to_string(), "unknown window function 'Triangle'");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
