//! Forecaster - projeção de curto prazo por tendência linear.

use chrono::Duration;

use super::stats::{std_dev, DataPoint, LinearFit};
use crate::types::config::AnalysisConfig;
use crate::types::responses::{ForecastPoint, ForecastResult, Trend, TrendDirection};

/// Abaixo desta força (|inclinação por intervalo| / σ) a tendência é `stable`.
const STABLE_STRENGTH: f64 = 0.01;

/// Forecaster.
#[derive(Debug, Clone)]
pub struct Forecaster {
    min_samples: usize,
    interval_hours: u32,
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl Forecaster {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            min_samples: config.min_samples.max(2),
            interval_hours: config.interval_hours.max(1),
        }
    }

    /// Intervalo entre projeções, em horas.
    pub fn interval_hours(&self) -> u32 {
        self.interval_hours
    }

    /// Número de projeções para o horizonte (ao menos uma).
    pub fn steps_for(&self, horizon_hours: u32) -> u32 {
        (horizon_hours / self.interval_hours).max(1)
    }

    /// Projeta a série `horizon_hours` à frente, uma projeção por intervalo.
    ///
    /// `series` deve estar em ordem cronológica crescente.
    pub fn forecast(&self, series: &[DataPoint], horizon_hours: u32) -> ForecastResult {
        if series.len() < self.min_samples {
            return ForecastResult {
                forecasts: Vec::new(),
                trend: Trend::insufficient_data(),
            };
        }

        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let std = std_dev(&values);
        let first = series[0];
        let last = series[series.len() - 1];
        let steps = self.steps_for(horizon_hours);
        let interval = f64::from(self.interval_hours);

        // Janela constante: projeta o próprio valor.
        if values.iter().all(|v| *v == first.value) {
            let flat = first.value;
            let forecasts = (1..=steps)
                .map(|i| self.point(last, i, flat, 0.0))
                .collect();
            return ForecastResult {
                forecasts,
                trend: Trend {
                    direction: TrendDirection::Stable,
                    slope: 0.0,
                    strength: 0.0,
                    r_squared: 1.0,
                    confidence: 1.0,
                },
            };
        }

        // x em horas desde o primeiro ponto; índice × intervalo se os instantes coincidem.
        let hours: Vec<f64> = series
            .iter()
            .map(|p| (p.timestamp - first.timestamp).num_milliseconds() as f64 / 3_600_000.0)
            .collect();
        let fit = LinearFit::fit(&hours, &values).map(|fit| (fit, hours)).or_else(|| {
            let index: Vec<f64> = (0..series.len()).map(|i| i as f64 * interval).collect();
            LinearFit::fit(&index, &values).map(|fit| (fit, index))
        });

        let Some((fit, xs)) = fit else {
            return ForecastResult {
                forecasts: Vec::new(),
                trend: Trend::insufficient_data(),
            };
        };

        let level = fit.predict(xs[xs.len() - 1]);
        let strength = (fit.slope * interval).abs() / std;
        let direction = if strength < STABLE_STRENGTH {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        let r_squared = fit.r_squared.clamp(0.0, 1.0);

        let forecasts = (1..=steps)
            .map(|i| {
                let value = level + fit.slope * f64::from(i) * interval;
                let uncertainty = std * f64::from(i).sqrt() * 0.5;
                self.point(last, i, value, uncertainty)
            })
            .collect();

        ForecastResult {
            forecasts,
            trend: Trend {
                direction,
                slope: fit.slope,
                strength,
                r_squared,
                confidence: r_squared,
            },
        }
    }

    fn point(&self, last: DataPoint, step: u32, value: f64, uncertainty: f64) -> ForecastPoint {
        ForecastPoint {
            timestamp: last.timestamp + Duration::hours(i64::from(step * self.interval_hours)),
            value,
            lower_bound: value - uncertainty,
            upper_bound: value + uncertainty,
            confidence: (0.9 - 0.02 * f64::from(step)).max(0.3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn hourly(values: &[f64]) -> Vec<DataPoint> {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DataPoint::new(base + Duration::hours(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_flat_series() {
        let forecaster = Forecaster::default();
        let series = hourly(&[42.0; 12]);
        let result = forecaster.forecast(&series, 24);

        assert_eq!(result.trend.direction, TrendDirection::Stable);
        assert_eq!(result.trend.confidence, 1.0);
        assert_eq!(result.forecasts.len(), 24);
        assert!(result.forecasts.iter().all(|f| f.value == 42.0));
        assert_eq!(
            result.forecasts[0].timestamp,
            series[11].timestamp + Duration::hours(1)
        );
    }

    #[test]
    fn test_flat_series_with_inexact_floats() {
        let forecaster = Forecaster::default();
        for value in [0.1, 0.3, 1.1, 640.7] {
            let result = forecaster.forecast(&hourly(&[value; 12]), 24);

            assert_eq!(result.trend.direction, TrendDirection::Stable);
            assert_eq!(result.trend.confidence, 1.0);
            assert_eq!(result.trend.slope, 0.0);
            assert!(result.forecasts.iter().all(|f| f.value == value), "{}", value);
            assert!(result
                .forecasts
                .iter()
                .all(|f| f.lower_bound == value && f.upper_bound == value));
        }
    }

    #[test]
    fn test_insufficient_data() {
        let forecaster = Forecaster::default();
        let result = forecaster.forecast(&hourly(&[1.0, 2.0, 3.0]), 24);

        assert!(result.forecasts.is_empty());
        assert_eq!(result.trend.direction, TrendDirection::InsufficientData);
        assert_eq!(result.trend.confidence, 0.0);
    }

    #[test]
    fn test_linear_growth() {
        let forecaster = Forecaster::default();
        let values: Vec<f64> = (0..10).map(|i| 100.0 + 2.0 * i as f64).collect();
        let result = forecaster.forecast(&hourly(&values), 72);

        assert_eq!(result.forecasts.len(), 72);
        assert_eq!(result.trend.direction, TrendDirection::Increasing);
        assert!((result.trend.slope - 2.0).abs() < 1e-9);
        assert!((result.trend.confidence - 1.0).abs() < 1e-9);
        assert!((result.forecasts[0].value - 120.0).abs() < 1e-9);
        assert!((result.forecasts[71].value - 262.0).abs() < 1e-9);
        assert!(result.forecasts[5].lower_bound < result.forecasts[5].value);
        assert_eq!(result.forecasts[71].confidence, 0.3);
    }

    #[test]
    fn test_decreasing_trend() {
        let forecaster = Forecaster::default();
        let values = [50.0, 48.0, 47.0, 45.0, 44.0, 41.0, 40.0, 38.0, 37.0, 35.0];
        let result = forecaster.forecast(&hourly(&values), 24);

        assert_eq!(result.trend.direction, TrendDirection::Decreasing);
        assert!(result.trend.confidence > 0.9 && result.trend.confidence <= 1.0);
    }

    #[test]
    fn test_interval_controls_steps() {
        let config = AnalysisConfig {
            interval_hours: 6,
            ..AnalysisConfig::default()
        };
        let forecaster = Forecaster::from_config(&config);
        assert_eq!(forecaster.steps_for(24), 4);
        assert_eq!(forecaster.steps_for(72), 12);
        assert_eq!(forecaster.steps_for(3), 1);
    }

    #[test]
    fn test_same_timestamp_falls_back_to_index() {
        let forecaster = Forecaster::default();
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let series: Vec<DataPoint> = (0..10).map(|i| DataPoint::new(ts, i as f64)).collect();
        let result = forecaster.forecast(&series, 24);

        assert_eq!(result.forecasts.len(), 24);
        assert_eq!(result.trend.direction, TrendDirection::Increasing);
    }
}
