//! Model tier selector (spec §4.10 step 4, grounded on
//! `original_source/src/thought/router.py`'s `ModelRouter`).
//!
//! Maps a coarse complexity tier (`fast | balanced | powerful`) to the model
//! name, base URL, and API key configured for that tier in `Config.llm`. An
//! unknown tier string falls back to `balanced`, matching the original's
//! `route()` behavior.

use scrybe_core::config::LlmConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Fast,
    Balanced,
    Powerful,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Balanced => write!(f, "balanced"),
            ModelTier::Powerful => write!(f, "powerful"),
        }
    }
}

impl std::str::FromStr for ModelTier {
    type Err = std::convert::Infallible;

    /// Unknown complexity strings fall back to `Balanced`, same as the
    /// original Python router.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "fast" => ModelTier::Fast,
            "powerful" => ModelTier::Powerful,
            _ => ModelTier::Balanced,
        })
    }
}

/// A resolved route: which model name to ask for, which base URL to call,
/// and which API key to send (if any).
#[derive(Debug, Clone)]
pub struct Route {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Thin wrapper over `LlmConfig` that resolves a tier to a concrete
/// `Route`. Holds no state beyond the config it was built from, so
/// constructing one per request is cheap.
pub struct ModelRouter<'a> {
    config: &'a LlmConfig,
}

impl<'a> ModelRouter<'a> {
    pub fn new(config: &'a LlmConfig) -> Self {
        Self { config }
    }

    pub fn route(&self, tier: ModelTier) -> Route {
        match tier {
            ModelTier::Fast => Route {
                model: self.config.fast_model.clone(),
                base_url: self.config.fast_url.clone(),
                api_key: self.config.fast_api_key.clone(),
            },
            ModelTier::Balanced => Route {
                model: self.config.balanced_model.clone(),
                base_url: self.config.balanced_url.clone(),
                api_key: self.config.balanced_api_key.clone(),
            },
            ModelTier::Powerful => Route {
                model: self.config.powerful_model.clone(),
                base_url: self.config.powerful_url.clone(),
                api_key: self.config.powerful_api_key.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_string_falls_back_to_balanced() {
        assert_eq!("nonsense".parse::<ModelTier>().unwrap(), ModelTier::Balanced);
    }

    #[test]
    fn route_resolves_balanced_model_by_default() {
        let config = LlmConfig::default();
        let router = ModelRouter::new(&config);
        let route = router.route(ModelTier::Balanced);
        assert_eq!(route.model, config.balanced_model);
    }
}
