//! Política de reforço de confiança.

use crate::types::config::LearningConfig;

/// Reforço de passo fixo: `min(anterior + passo, teto)`.
///
/// O resultado é arredondado a seis casas para que a soma repetida de
/// `0.05` não acumule erro de ponto flutuante (0.5 → 0.55 → 0.6, e não
/// 0.6000000000000001).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReinforcementPolicy {
    step: f64,
    ceiling: f64,
}

impl Default for ReinforcementPolicy {
    fn default() -> Self {
        Self {
            step: 0.05,
            ceiling: 1.0,
        }
    }
}

impl ReinforcementPolicy {
    pub fn new(step: f64, ceiling: f64) -> Self {
        Self {
            step: step.max(0.0),
            ceiling: ceiling.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &LearningConfig) -> Self {
        Self::new(config.reinforcement_step, config.max_confidence)
    }

    /// Confiança após mais uma observação do mesmo tipo.
    ///
    /// Um valor já acima do teto é mantido, nunca reduzido.
    pub fn next(&self, previous: f64) -> f64 {
        if !previous.is_finite() {
            return self.initial(previous);
        }
        if previous >= self.ceiling {
            return previous;
        }
        round6((previous + self.step).min(self.ceiling))
    }

    /// Confiança inicial ajustada ao intervalo `[0, teto]`.
    pub fn initial(&self, requested: f64) -> f64 {
        if requested.is_finite() {
            round6(requested.clamp(0.0, self.ceiling))
        } else {
            0.0
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step() {
        let policy = ReinforcementPolicy::default();
        assert_eq!(policy.next(0.5), 0.55);
        assert_eq!(policy.next(0.55), 0.6);
    }

    #[test]
    fn test_reaches_ceiling_in_ten_steps() {
        let policy = ReinforcementPolicy::default();
        let mut confidence = 0.5;
        for _ in 0..10 {
            confidence = policy.next(confidence);
        }
        assert_eq!(confidence, 1.0);
        assert_eq!(policy.next(confidence), 1.0);
    }

    #[test]
    fn test_never_decreases() {
        let policy = ReinforcementPolicy::new(0.05, 0.8);
        assert_eq!(policy.next(0.95), 0.95);
        assert_eq!(policy.next(0.79), 0.8);
        for start in [0.0, 0.3, 0.79, 0.8] {
            assert!(policy.next(start) >= start);
        }
    }

    #[test]
    fn test_initial_clamped() {
        let policy = ReinforcementPolicy::default();
        assert_eq!(policy.initial(1.7), 1.0);
        assert_eq!(policy.initial(-0.2), 0.0);
        assert_eq!(policy.initial(f64::NAN), 0.0);
    }
}
