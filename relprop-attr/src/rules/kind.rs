use crate::stabilize::STABILITY_FACTOR;
use std::fmt;

/// The relevance redistribution policies.
///
/// Each variant decides how a layer's weights are transformed before the
/// relevance pass and, for `Identity`, how relevance reaches the inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleKind {
    /// No weight change. `epsilon` replaces the default stability factor.
    /// Suited to middle layers.
    Epsilon { epsilon: f32 },
    /// `w' = w + gamma * max(w, 0)`. Favors positive contributions, for
    /// lower layers.
    Gamma { gamma: f32, set_bias_to_zero: bool },
    /// `w' = max(w, 0)`. Not meaningful on normalization layers.
    Alpha1Beta0 { set_bias_to_zero: bool },
    /// Input relevance equals output relevance; for shape-preserving layers
    /// such as normalization.
    Identity,
}

impl RuleKind {
    pub const DEFAULT_GAMMA: f32 = 0.25;

    pub fn epsilon_default() -> Self {
        RuleKind::Epsilon {
            epsilon: STABILITY_FACTOR,
        }
    }

    pub fn gamma_default() -> Self {
        RuleKind::Gamma {
            gamma: Self::DEFAULT_GAMMA,
            set_bias_to_zero: false,
        }
    }

    pub fn stability_factor(&self) -> f32 {
        match self {
            RuleKind::Epsilon { epsilon } => *epsilon,
            _ => STABILITY_FACTOR,
        }
    }

    pub fn transform_weight(&self, w: f32) -> f32 {
        match self {
            RuleKind::Gamma { gamma, .. } => w + gamma * w.max(0.0),
            RuleKind::Alpha1Beta0 { .. } => w.max(0.0),
            RuleKind::Epsilon { .. } | RuleKind::Identity => w,
        }
    }

    /// Whether the weight transform is a no-op.
    pub fn keeps_weights(&self) -> bool {
        matches!(self, RuleKind::Epsilon { .. } | RuleKind::Identity)
    }

    pub fn zeroes_bias(&self) -> bool {
        match self {
            RuleKind::Gamma { set_bias_to_zero, .. } | RuleKind::Alpha1Beta0 { set_bias_to_zero } => {
                *set_bias_to_zero
            }
            RuleKind::Epsilon { .. } | RuleKind::Identity => false,
        }
    }
}

impl Default for RuleKind {
    fn default() -> Self {
        Self::epsilon_default()
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Epsilon { epsilon } => write!(f, "EpsilonRule(epsilon={:e})", epsilon),
            RuleKind::Gamma {
                gamma,
                set_bias_to_zero,
            } => write!(f, "GammaRule(gamma={}, set_bias_to_zero={})", gamma, set_bias_to_zero),
            RuleKind::Alpha1Beta0 { set_bias_to_zero } => {
                write!(f, "Alpha1_Beta0_Rule(set_bias_to_zero={})", set_bias_to_zero)
            }
            RuleKind::Identity => f.write_str("IdentityRule"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gamma_only_grows_positive_weights() {
        let kind = RuleKind::gamma_default();
        for w in [-2.0f32, -0.1, 0.0, 0.1, 3.0] {
            let transformed = kind.transform_weight(w);
            assert!(transformed >= w);
            assert_eq!(transformed == w, w <= 0.0);
        }
        assert_eq!(kind.transform_weight(4.0), 5.0);
    }

    #[test]
    fn test_alpha1_beta0_is_idempotent_clamp() {
        let kind = RuleKind::Alpha1Beta0 {
            set_bias_to_zero: true,
        };
        for w in [-2.0f32, 0.0, 0.5] {
            let once = kind.transform_weight(w);
            assert_eq!(once, w.max(0.0));
            assert_eq!(kind.transform_weight(once), once);
        }
        assert!(kind.zeroes_bias());
    }

    #[test]
    fn test_stability_factor_and_defaults() {
        assert_eq!(RuleKind::Epsilon { epsilon: 0.5 }.stability_factor(), 0.5);
        assert_eq!(RuleKind::Identity.stability_factor(), STABILITY_FACTOR);
        assert_eq!(RuleKind::default(), RuleKind::Epsilon { epsilon: 1e-9 });
        assert!(RuleKind::Identity.keeps_weights());
        assert!(!RuleKind::gamma_default().zeroes_bias());
        assert_eq!(RuleKind::Identity.to_string(), "IdentityRule");
    }
}
