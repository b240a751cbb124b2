pub mod diversification;
pub mod exits;
pub mod kelly;
pub mod robustness;
pub mod seed;

pub use diversification::{correlation, Diversification, DiversificationConfig, DiversificationFilter};
pub use exits::{ExitBasis, ExitConfig, ExitPolicy, ExitPolicyKind, Exits};
pub use kelly::{fractional_kelly, kelly, PayoffStats, SizingConfig};
pub use robustness::{
    stress_series, ReturnModel, RobustnessConfig, RobustnessFailure, RobustnessReport,
    RobustnessTester, SyntheticModel,
};
pub use seed::SeedHierarchy;

/// Round to `places` decimal places (half away from zero).
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
