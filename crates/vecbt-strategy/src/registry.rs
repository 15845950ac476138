use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vecbt_core::ParamSet;

use crate::ema_cross::{EmaCross, SimpleEmaCross};
use crate::error::StrategyError;
use crate::traits::{Strategy, StrategyFactory};
use crate::vwap_reversal::VwapReversal;

/// Every strategy the crate can build by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SimpleEmaCross,
    EmaCross,
    VwapReversal,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::SimpleEmaCross,
        StrategyKind::EmaCross,
        StrategyKind::VwapReversal,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StrategyKind::SimpleEmaCross => SimpleEmaCross::ID,
            StrategyKind::EmaCross => EmaCross::ID,
            StrategyKind::VwapReversal => VwapReversal::ID,
        }
    }

    /// Registered strategy names, in registration order.
    pub fn list() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.id()).collect()
    }

    pub fn build(self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        debug!(strategy = self.id(), params = %params, "building strategy");
        Ok(match self {
            StrategyKind::SimpleEmaCross => Box::new(SimpleEmaCross::from_params(params)?),
            StrategyKind::EmaCross => Box::new(EmaCross::from_params(params)?),
            StrategyKind::VwapReversal => Box::new(VwapReversal::from_params(params)?),
        })
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.id() == name)
            .ok_or_else(|| StrategyError::UnknownStrategy {
                name: name.to_string(),
                available: Self::list().join(", "),
            })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl StrategyFactory for StrategyKind {
    fn name(&self) -> &str {
        self.id()
    }

    fn create(&self, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
        self.build(params)
    }
}

/// Build a strategy by registered name.
pub fn create(name: &str, params: &ParamSet) -> Result<Box<dyn Strategy>, StrategyError> {
    name.parse::<StrategyKind>()?.build(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_and_parse() {
        assert_eq!(StrategyKind::list(), ["simple_ema_cross", "ema_cross", "vwap_reversal"]);
        for kind in StrategyKind::ALL {
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!(" ema_cross ".parse::<StrategyKind>().unwrap(), StrategyKind::EmaCross);

        let toml_value = toml_kind("vwap_reversal");
        assert_eq!(toml_value, StrategyKind::VwapReversal);
    }

    fn toml_kind(name: &str) -> StrategyKind {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: StrategyKind,
        }
        let parsed: Wrapper = toml::from_str(&format!("kind = \"{}\"", name)).unwrap();
        parsed.kind
    }

    #[test]
    fn test_unknown_strategy() {
        match create("macd", &ParamSet::new()) {
            Err(StrategyError::UnknownStrategy { name, available }) => {
                assert_eq!(name, "macd");
                assert!(available.contains("vwap_reversal"));
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("macd should not resolve"),
        }
    }

    #[test]
    fn test_factory_builds_fresh_instances() {
        let factory: &dyn StrategyFactory = &StrategyKind::SimpleEmaCross;
        let params = ParamSet::new().with("short_period", 3).with("long_period", 9);
        let strategy = factory.create(&params).unwrap();
        assert_eq!(strategy.name(), "simple_ema_3_9");
        assert_eq!(strategy.params(), params);
        assert_eq!(factory.name(), "simple_ema_cross");

        let defaults = create("vwap_reversal", &ParamSet::new()).unwrap();
        assert_eq!(defaults.name(), "vwap_reversal_70_20");
    }
}
