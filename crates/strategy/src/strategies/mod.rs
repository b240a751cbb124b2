mod breakout;
mod mean_reversion;
mod momentum;

pub use breakout::Breakout;
pub use mean_reversion::MeanReversion;
pub use momentum::Momentum;

use common::{PriceSeries, Signal};

use crate::{SignalGenerator, StrategyKind};

/// Tagged union over the concrete strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    Momentum(Momentum),
    MeanReversion(MeanReversion),
    Breakout(Breakout),
}

impl Strategy {
    /// The strategy with its default parameters.
    pub fn default_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Momentum => Strategy::Momentum(Momentum::default()),
            StrategyKind::MeanReversion => Strategy::MeanReversion(MeanReversion::default()),
            StrategyKind::Breakout => Strategy::Breakout(Breakout::default()),
        }
    }

    fn inner(&self) -> &dyn SignalGenerator {
        match self {
            Strategy::Momentum(s) => s,
            Strategy::MeanReversion(s) => s,
            Strategy::Breakout(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn kind(&self) -> StrategyKind {
        self.inner().kind()
    }

    fn min_bars(&self) -> usize {
        self.inner().min_bars()
    }

    fn generate_signal(&self, series: &PriceSeries) -> Signal {
        self.inner().generate_signal(series)
    }
}

/// Last `n` values of a slice (fewer if the slice is shorter).
pub(crate) fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}
