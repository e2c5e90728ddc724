//! Interim analysis: test statistics, conditional power, effect estimation
//! and subgroup heterogeneity.

mod conditional_power;
mod estimator;
mod heterogeneity;
mod test_statistic;

pub use conditional_power::{conditional_power, drift_for_effect, ConditionalPowerTrend};
pub use estimator::{estimate, naive, stagewise_tail, EffectEstimate, EffectEstimator};
pub use heterogeneity::{cochran_q, Heterogeneity, SubgroupEffect};
pub use test_statistic::TestStatistic;
