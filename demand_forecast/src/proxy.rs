//! Proxy mode for flat dose series
//!
//! When enabled, a dose series whose history never varies is replaced by an
//! incidence-driven synthetic series:
//!
//! `alpha * incidence_ma2_lag1 * age_weight * season(month) * (1 + noise)`
//!
//! where `incidence_ma2_lag1` is the mean incidence of the two previous months
//! and `season(m) = 1 + 0.2 sin(2 pi (m - 2) / 12)`. Only history rows are
//! rewritten and every replaced series is logged.

use crate::aggregate::{per_100k, Panel};
use crate::config::{ProxyConfig, ProxyMode};
use crate::error::{ForecastError, Result};
use crate::region::{AgeBand, SeriesKey};
use chrono::Datelike;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use series_math::moving_averages::{lag, rolling_mean};
use series_math::stats::sample_std_dev;
use std::f64::consts::PI;
use tracing::{info, warn};

/// Relative demand of each age band
pub fn age_weight(age_band: AgeBand) -> f64 {
    match age_band {
        AgeBand::Young => 0.5,
        AgeBand::Adult => 1.0,
        AgeBand::Senior => 1.6,
    }
}

/// Seasonal multiplier, between 0.8 and 1.2
pub fn season(month: u32) -> f64 {
    1.0 + 0.2 * (2.0 * PI * (month as f64 - 2.0) / 12.0).sin()
}

/// Applies the configured proxy strategy to a panel
#[derive(Debug, Clone)]
pub struct ProxyGenerator {
    config: ProxyConfig,
}

impl ProxyGenerator {
    /// Create a new generator
    pub fn new(config: ProxyConfig) -> Result<Self> {
        if config.noise_sd < 0.0 || !config.noise_sd.is_finite() {
            return Err(ForecastError::InvalidParameter(format!(
                "Proxy noise must be non-negative, got {}",
                config.noise_sd
            )));
        }
        Ok(Self { config })
    }

    /// Rewrite flat dose series in place, returning the replaced keys
    pub fn apply(&self, panel: &mut Panel) -> Result<Vec<SeriesKey>> {
        if self.config.mode == ProxyMode::Disabled {
            return Ok(Vec::new());
        }

        let forecast_start = panel.forecast_start();
        let flat: Vec<(SeriesKey, usize, usize)> = {
            let mut begin = 0;
            let mut out = Vec::new();
            for (key, rows) in panel.series() {
                let history: Vec<f64> = rows
                    .iter()
                    .filter(|r| r.date < forecast_start)
                    .map(|r| r.doses)
                    .collect();
                if sample_std_dev(&history).map_or(true, |sd| sd == 0.0) {
                    out.push((key, begin, rows.len()));
                }
                begin += rows.len();
            }
            out
        };

        let noise = Normal::new(0.0, self.config.noise_sd)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let rows = panel.rows_mut();
        for (key, begin, len) in &flat {
            let series = &mut rows[*begin..*begin + *len];
            let incidence: Vec<Option<f64>> = series.iter().map(|r| r.incidence_per_100k).collect();
            let driver = lag(&rolling_mean(&incidence, 2)?, 1);

            for (row, lagged) in series.iter_mut().zip(driver) {
                if row.date >= forecast_start {
                    continue;
                }
                let base = self.config.alpha
                    * lagged.unwrap_or(0.0)
                    * age_weight(row.age_band)
                    * season(row.date.month());
                let synthetic = (base * (1.0 + noise.sample(&mut rng))).max(0.0);

                row.doses = synthetic;
                row.doses_per_100k = per_100k(synthetic, row.population);
            }
            warn!(series = %key, "flat dose series replaced by incidence proxy");
        }

        let replaced: Vec<SeriesKey> = flat.into_iter().map(|(key, _, _)| key).collect();
        if !replaced.is_empty() {
            info!(count = replaced.len(), "proxy mode active");
        }
        Ok(replaced)
    }
}
