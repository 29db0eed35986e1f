//! Statistics aggregation.
//!
//! Raw counters from one collection call become reportable rates and
//! averages here. Reward scalarization is pluggable for multi-agent or
//! multi-objective rewards; without a metric, a non-scalar aggregate is a
//! hard error rather than a silently wrong number.

use crate::core::{CollectError, Result};
use crate::record::Value;

/// Scalarizes a multi-dimensional aggregate reward (e.g., pick one agent's
/// component, or average across agents).
pub type RewardMetric = Box<dyn Fn(&[f32]) -> f32 + Send>;

/// What one collection call produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectStats {
    /// Completed (counted) episodes.
    pub episodes: u64,
    /// Transitions belonging to those episodes.
    pub steps: u64,
    pub steps_per_sec: f64,
    pub episodes_per_sec: f64,
    /// Mean reward per completed episode, scalarized if needed.
    pub mean_reward: f32,
    /// Mean episode length.
    pub mean_length: f64,
}

/// Smallest duration accounted for, to avoid division by zero.
pub(crate) const MIN_DURATION: f64 = 1e-9;

pub(crate) fn finalize(
    steps: u64,
    episodes: u64,
    reward_total: Option<&Value>,
    duration: f64,
    metric: Option<&RewardMetric>,
) -> Result<CollectStats> {
    let duration = duration.max(MIN_DURATION);
    let mean_reward = match reward_total {
        Some(total) if episodes > 0 => {
            let mean: Vec<f32> =
                total.to_f32s().iter().map(|x| x / episodes as f32).collect();
            match mean.as_slice() {
                [scalar] => *scalar,
                many => match metric {
                    Some(metric) => metric(many),
                    None => return Err(CollectError::NonScalarReward { dims: many.len() }),
                },
            }
        }
        _ => 0.0,
    };
    let mean_length = if episodes > 0 { steps as f64 / episodes as f64 } else { 0.0 };
    Ok(CollectStats {
        episodes,
        steps,
        steps_per_sec: steps as f64 / duration,
        episodes_per_sec: episodes as f64 / duration,
        mean_reward,
        mean_length,
    })
}
