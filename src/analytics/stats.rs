//! Estatística descritiva e regressão linear sobre séries temporais.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::records::Observation;

/// Campo usado como valor quando a fonte não define `metric`.
pub const DEFAULT_VALUE_FIELD: &str = "value";

/// Um ponto da série.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Extrai a série numérica da janela, em ordem cronológica crescente.
///
/// Observações sem o campo (ou com valor não numérico) são ignoradas.
pub fn extract_series(window: &[Observation], metric: Option<&str>) -> Vec<DataPoint> {
    let field = metric.unwrap_or(DEFAULT_VALUE_FIELD);
    let mut series: Vec<DataPoint> = window
        .iter()
        .filter_map(|obs| obs.value(field).map(|v| DataPoint::new(obs.created_at, v)))
        .collect();
    // Estável: empates mantêm a ordem de chegada.
    series.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    series
}

/// Estatísticas básicas de uma amostra.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    /// Desvio padrão populacional.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

impl SeriesStats {
    /// `None` para amostra vazia.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let sorted = sorted_copy(values);
        let mean = mean(values);

        Some(Self {
            count: values.len(),
            mean,
            std: std_dev(values),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: percentile_sorted(&sorted, 50.0),
            q1: percentile_sorted(&sorted, 25.0),
            q3: percentile_sorted(&sorted, 75.0),
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Desvio padrão populacional.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    percentile_sorted(&sorted_copy(values), 50.0)
}

/// Percentil com interpolação linear entre ordens (`p` em 0..=100).
///
/// `sorted` precisa estar em ordem crescente e não vazio.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Ajuste linear por mínimos quadrados.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// `None` quando há menos de dois pontos ou `xs` não varia.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return None;
        }
        let (xs, ys) = (&xs[..n], &ys[..n]);

        let mx = mean(xs);
        let my = mean(ys);
        let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
        if sxx <= f64::EPSILON {
            return None;
        }
        let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();

        let slope = sxy / sxx;
        let intercept = my - slope * mx;

        let ss_tot: f64 = ys.iter().map(|y| (y - my).powi(2)).sum();
        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Some(Self {
            slope,
            intercept,
            r_squared,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_percentile_matches_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&sorted, 50.0), 2.5);
        assert_eq!(percentile_sorted(&sorted, 25.0), 1.75);
        assert_eq!(percentile_sorted(&sorted, 100.0), 4.0);
        assert_eq!(percentile_sorted(&[7.0], 75.0), 7.0);
    }

    #[test]
    fn test_stats() {
        let stats = SeriesStats::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std, 2.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!(SeriesStats::compute(&[]).is_none());
    }

    #[test]
    fn test_linear_fit_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = LinearFit::fit(&xs, &ys).unwrap();

        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(4.0) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fit_degenerate() {
        assert!(LinearFit::fit(&[1.0], &[1.0]).is_none());
        assert!(LinearFit::fit(&[2.0, 2.0], &[1.0, 5.0]).is_none());
    }

    #[test]
    fn test_extract_series_sorted_and_filtered() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let window = vec![
            Observation::new("mining", base + Duration::hours(2)).with_field("hashrate", 3.0),
            Observation::new("mining", base + Duration::hours(1)).with_field("other", 1.0),
            Observation::new("mining", base).with_field("hashrate", "1.5"),
        ];

        let series = extract_series(&window, Some("hashrate"));
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value, 1.5);
        assert_eq!(series[1].timestamp, base + Duration::hours(2));

        assert!(extract_series(&window, None).is_empty());
    }
}
