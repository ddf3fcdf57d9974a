//! Request size limits for the providers.

use cube_common::{CubeError, CubeResult, GridSpec};
use tracing::warn;

/// Default cap on cells per coverage response, summed over measurements.
pub const DEFAULT_MAX_COVERAGE_CELLS: u64 = 25_000_000;

/// Default cap on the records page size.
pub const DEFAULT_MAX_RECORDS_LIMIT: usize = 1000;

/// Page size used when a records query carries no `limit`.
pub const DEFAULT_RECORDS_LIMIT: usize = 10;

/// Limits applied by the coverage and records providers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLimits {
    /// Maximum `width * height * measurements` of one time slice.
    pub max_coverage_cells: u64,

    /// Upper bound a records `limit` is clamped to.
    pub max_records_limit: usize,

    pub default_records_limit: usize,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            max_coverage_cells: DEFAULT_MAX_COVERAGE_CELLS,
            max_records_limit: DEFAULT_MAX_RECORDS_LIMIT,
            default_records_limit: DEFAULT_RECORDS_LIMIT,
        }
    }
}

impl ProviderLimits {
    /// Read limits from `OGC_MAX_COVERAGE_CELLS`, `OGC_MAX_RECORDS_LIMIT` and
    /// `OGC_DEFAULT_RECORDS_LIMIT`, keeping defaults for unset or invalid values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_records_limit =
            env_or("OGC_MAX_RECORDS_LIMIT", defaults.max_records_limit).max(1);
        Self {
            max_coverage_cells: env_or("OGC_MAX_COVERAGE_CELLS", defaults.max_coverage_cells),
            max_records_limit,
            default_records_limit: env_or("OGC_DEFAULT_RECORDS_LIMIT", defaults.default_records_limit)
                .clamp(1, max_records_limit),
        }
    }
}

fn env_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default = %default, "Invalid limit, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Estimated size of a coverage response, per time slice.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSizeEstimate {
    pub width: usize,
    pub height: usize,
    pub num_measurements: usize,
    pub cells: u64,
}

impl CoverageSizeEstimate {
    pub fn for_grid(grid: &GridSpec, num_measurements: usize) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            num_measurements,
            cells: grid.cell_count().saturating_mul(num_measurements as u64),
        }
    }

    /// Fail with `ResponseTooLarge` when the estimate exceeds the limits.
    pub fn check(&self, limits: &ProviderLimits) -> CubeResult<()> {
        if self.cells > limits.max_coverage_cells {
            return Err(CubeError::ResponseTooLarge {
                requested: self.cells,
                limit: limits.max_coverage_cells,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::{CrsCode, GeoTransform};

    fn grid(width: usize, height: usize) -> GridSpec {
        GridSpec::new(CrsCode::Crs84, GeoTransform::new(0.0, 0.0, 1.0, -1.0), width, height)
    }

    #[test]
    fn test_estimate_counts_measurements() {
        let estimate = CoverageSizeEstimate::for_grid(&grid(100, 50), 3);
        assert_eq!(estimate.cells, 15_000);
        assert!(estimate.check(&ProviderLimits::default()).is_ok());
    }

    #[test]
    fn test_check_too_large() {
        let limits = ProviderLimits {
            max_coverage_cells: 1000,
            ..ProviderLimits::default()
        };
        let err = CoverageSizeEstimate::for_grid(&grid(40, 30), 1)
            .check(&limits)
            .unwrap_err();
        assert!(matches!(
            err,
            CubeError::ResponseTooLarge {
                requested: 1200,
                limit: 1000
            }
        ));
        assert_eq!(err.http_status_code(), 413);
    }

    #[test]
    fn test_empty_grid_passes() {
        let limits = ProviderLimits {
            max_coverage_cells: 0,
            ..ProviderLimits::default()
        };
        assert!(CoverageSizeEstimate::for_grid(&grid(0, 0), 4).check(&limits).is_ok());
    }
}
