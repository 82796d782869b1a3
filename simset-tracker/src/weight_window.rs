//! Weight-window variance reduction: keeps a photon's running weight
//! within a band around its starting weight via Russian roulette
//! (below the band) and splitting (above the band).

use simset_core::math::Rng;

use crate::step::PhotonState;

/// The `[minWWRatio, maxWWRatio]` band, expressed as multiples of a
/// photon's starting weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightWindow {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl WeightWindow {
    /// A window wide enough that no photon's weight ever falls outside
    /// it, effectively disabling the variance-reduction step.
    pub fn disabled() -> Self {
        Self {
            min_ratio: 0.0,
            max_ratio: f64::INFINITY,
        }
    }
}

/// Applies Russian roulette or splitting to bring `state.weight` back
/// within `[min_ratio, max_ratio] * start_weight`. Splitting is modeled
/// by scaling the tracked photon's weight down to its post-split share;
/// the caller is responsible for spawning the `n - 1` sibling copies if
/// it needs them delivered downstream (the tracker here follows only
/// the original, reweighted copy).
pub fn apply(state: &mut PhotonState, start_weight: f64, window: &WeightWindow, rng: &mut impl Rng) {
    if start_weight <= 0.0 {
        return;
    }
    let ratio = state.weight / start_weight;

    if ratio < window.min_ratio && window.min_ratio > 0.0 {
        let survival_prob = (ratio / window.min_ratio).clamp(0.0, 1.0);
        if rng.uniform() > survival_prob {
            state.weight = 0.0;
        } else {
            state.weight /= survival_prob;
        }
    } else if ratio > window.max_ratio && window.max_ratio.is_finite() {
        let n = (ratio / window.max_ratio).ceil().max(1.0);
        state.weight /= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simset_core::geometry::{Direction, Position};
    use simset_core::math::{PcgRng, StreamKind};

    fn state_with_weight(weight: f64) -> PhotonState {
        PhotonState {
            position: Position::new(0.0, 0.0, 0.0),
            direction: Direction::new(0.0, 0.0, 1.0).unwrap(),
            energy_kev: 511.0,
            weight,
            scatter_count: 0,
        }
    }

    #[test]
    fn disabled_window_never_changes_weight() {
        let mut state = state_with_weight(0.0001);
        let mut rng = PcgRng::for_stream(1, StreamKind::Scatter);
        apply(&mut state, 1.0, &WeightWindow::disabled(), &mut rng);
        assert_eq!(state.weight, 0.0001);
    }

    #[test]
    fn splitting_reduces_weight_above_max_ratio() {
        let mut state = state_with_weight(10.0);
        let mut rng = PcgRng::for_stream(1, StreamKind::Scatter);
        let window = WeightWindow { min_ratio: 0.1, max_ratio: 2.0 };
        apply(&mut state, 1.0, &window, &mut rng);
        assert!(state.weight < 10.0);
    }

    #[test]
    fn roulette_either_kills_or_boosts_weight() {
        let window = WeightWindow { min_ratio: 0.5, max_ratio: 2.0 };
        for seed in 0..20 {
            let mut state = state_with_weight(0.1);
            let mut rng = PcgRng::for_stream(seed, StreamKind::Scatter);
            apply(&mut state, 1.0, &window, &mut rng);
            assert!(state.weight == 0.0 || state.weight >= 0.1);
        }
    }
}
