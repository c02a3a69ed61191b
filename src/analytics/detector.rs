//! Anomaly Detector.
//!
//! Dois métodos, ambos determinísticos:
//!
//! - **robust_z**: z-score modificado `0.6745·(x − mediana) / MAD`. Com
//!   MAD nulo usa o desvio absoluto médio (`(x − mediana) / (1.253314·MeanAD)`).
//!   Mediana e MAD não são arrastadas pelo próprio outlier, ao contrário da
//!   média e do desvio padrão.
//! - **iqr**: cercas de Tukey `[Q1 − k·IQR, Q3 + k·IQR]`. Com IQR nulo, a
//!   distância até a mediana é medida em desvios absolutos médios.

use serde_json::json;

use super::stats::{median, percentile_sorted, DataPoint};
use crate::types::config::{AnalysisConfig, DetectionMethod};
use crate::types::records::Severity;
use crate::types::responses::{AnomalyData, AnomalyRecord, DEFAULT_ANOMALY_CONFIDENCE};

const MAD_SCALE: f64 = 0.6745;
const MEAN_AD_SCALE: f64 = 1.253314;

/// Anomaly Detector.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    method: DetectionMethod,
    min_samples: usize,
    warning_threshold: f64,
    critical_threshold: f64,
    iqr_multiplier: f64,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl AnomalyDetector {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            method: config.method,
            min_samples: config.min_samples.max(1),
            warning_threshold: config.warning_threshold,
            critical_threshold: config.critical_threshold.max(config.warning_threshold),
            iqr_multiplier: config.iqr_multiplier,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Pontos incomuns da série, em ordem cronológica.
    ///
    /// Janelas menores que `min_samples` resultam em sequência vazia.
    pub fn detect(&self, source: &str, series: &[DataPoint]) -> Vec<AnomalyRecord> {
        if series.len() < self.min_samples {
            tracing::debug!(
                data_source = %source,
                size = series.len(),
                min_samples = self.min_samples,
                "Window too small for anomaly detection"
            );
            return Vec::new();
        }

        match self.method {
            DetectionMethod::RobustZ => self.detect_robust_z(source, series),
            DetectionMethod::Iqr => self.detect_iqr(source, series),
        }
    }

    fn detect_robust_z(&self, source: &str, series: &[DataPoint]) -> Vec<AnomalyRecord> {
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let center = median(&values);
        let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
        let mad = median(&deviations);
        let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;

        let score = |v: f64| -> Option<f64> {
            if mad > 0.0 {
                Some(MAD_SCALE * (v - center) / mad)
            } else if mean_ad > 0.0 {
                Some((v - center) / (MEAN_AD_SCALE * mean_ad))
            } else {
                None
            }
        };

        series
            .iter()
            .filter_map(|point| {
                let z = score(point.value)?;
                if z.abs() <= self.warning_threshold {
                    return None;
                }

                let data = AnomalyData::default()
                    .with_confidence(self.confidence(z.abs(), self.warning_threshold))
                    .with_detail("method", "robust_z")
                    .with_detail("value", point.value)
                    .with_detail("timestamp", point.timestamp.to_rfc3339())
                    .with_detail("score", z)
                    .with_detail("median", center)
                    .with_detail("mad", mad)
                    .with_detail("deviation_percent", deviation_percent(point.value, center));

                Some(
                    AnomalyRecord::new(
                        anomaly_type(source, z),
                        self.severity(z.abs(), self.critical_threshold),
                        format!(
                            "Unusual {} value {:.2} at {} (robust z {:.1}, median {:.2})",
                            source,
                            point.value,
                            point.timestamp.format("%Y-%m-%d %H:%M"),
                            z,
                            center
                        ),
                    )
                    .with_data(data),
                )
            })
            .collect()
    }

    fn detect_iqr(&self, source: &str, series: &[DataPoint]) -> Vec<AnomalyRecord> {
        let mut sorted: Vec<f64> = series.iter().map(|p| p.value).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let q1 = percentile_sorted(&sorted, 25.0);
        let q3 = percentile_sorted(&sorted, 75.0);
        let iqr = q3 - q1;
        if !(iqr > 0.0 && iqr.is_finite()) {
            return self.detect_iqr_degenerate(source, series, &sorted);
        }

        let k = self.iqr_multiplier;
        let lower = q1 - k * iqr;
        let upper = q3 + k * iqr;

        series
            .iter()
            .filter_map(|point| {
                // Distância até a caixa, em unidades de IQR (com sinal).
                let distance = if point.value > upper {
                    (point.value - q3) / iqr
                } else if point.value < lower {
                    -(q1 - point.value) / iqr
                } else {
                    return None;
                };

                let data = AnomalyData::default()
                    .with_confidence(self.confidence(distance.abs(), k))
                    .with_detail("method", "iqr")
                    .with_detail("value", point.value)
                    .with_detail("timestamp", point.timestamp.to_rfc3339())
                    .with_detail("q1", q1)
                    .with_detail("q3", q3)
                    .with_detail("iqr", iqr)
                    .with_detail("lower_bound", lower)
                    .with_detail("upper_bound", upper);

                Some(
                    AnomalyRecord::new(
                        anomaly_type(source, distance),
                        self.severity(distance.abs(), 2.0 * k),
                        format!(
                            "Unusual {} value {:.2} at {} (outside [{:.2}, {:.2}])",
                            source,
                            point.value,
                            point.timestamp.format("%Y-%m-%d %H:%M"),
                            lower,
                            upper
                        ),
                    )
                    .with_data(data),
                )
            })
            .collect()
    }

    /// IQR nulo: a maioria dos valores é idêntica. A distância até a mediana
    /// é medida em desvios absolutos médios e comparada às mesmas cercas.
    fn detect_iqr_degenerate(
        &self,
        source: &str,
        series: &[DataPoint],
        sorted: &[f64],
    ) -> Vec<AnomalyRecord> {
        let center = percentile_sorted(sorted, 50.0);
        let mean_ad = sorted.iter().map(|v| (v - center).abs()).sum::<f64>() / sorted.len() as f64;
        if mean_ad <= 0.0 {
            return Vec::new();
        }

        let unit = MEAN_AD_SCALE * mean_ad;
        let k = self.iqr_multiplier;

        series
            .iter()
            .filter_map(|point| {
                let distance = (point.value - center) / unit;
                if distance.abs() <= k {
                    return None;
                }

                let data = AnomalyData::default()
                    .with_confidence(self.confidence(distance.abs(), k))
                    .with_detail("method", "iqr")
                    .with_detail("value", point.value)
                    .with_detail("timestamp", point.timestamp.to_rfc3339())
                    .with_detail("median", center)
                    .with_detail("iqr", 0.0)
                    .with_detail("mean_ad", mean_ad)
                    .with_detail("deviation_percent", deviation_percent(point.value, center));

                Some(
                    AnomalyRecord::new(
                        anomaly_type(source, distance),
                        self.severity(distance.abs(), 2.0 * k),
                        format!(
                            "Unusual {} value {:.2} at {} (constant baseline {:.2})",
                            source,
                            point.value,
                            point.timestamp.format("%Y-%m-%d %H:%M"),
                            center
                        ),
                    )
                    .with_data(data),
                )
            })
            .collect()
    }

    fn severity(&self, magnitude: f64, critical_from: f64) -> Severity {
        if magnitude >= critical_from {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    /// Cresce de 0.7 (no limiar) até 1.0 conforme o desvio.
    fn confidence(&self, magnitude: f64, threshold: f64) -> f64 {
        if magnitude <= 0.0 || threshold <= 0.0 {
            return DEFAULT_ANOMALY_CONFIDENCE;
        }
        (DEFAULT_ANOMALY_CONFIDENCE + 0.3 * (1.0 - threshold / magnitude)).clamp(0.0, 1.0)
    }
}

fn anomaly_type(source: &str, signed_score: f64) -> String {
    if signed_score >= 0.0 {
        format!("{}_spike", source)
    } else {
        format!("{}_drop", source)
    }
}

fn deviation_percent(value: f64, center: f64) -> serde_json::Value {
    if center == 0.0 {
        json!(null)
    } else {
        json!(((value - center) / center * 100.0).abs())
    }
}
