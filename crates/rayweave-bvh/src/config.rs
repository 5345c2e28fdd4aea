//! Kernel configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stack::STACK_CAPACITY;

/// Traversal parameters fixed for the lifetime of a [`Kernel`](crate::Kernel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Number of stack entries a query may use. The scene's worst-case
    /// demand must fit, otherwise kernel creation fails.
    pub stack_capacity: usize,
    /// Relative slack for node tests. `None` uses the exact slab test.
    pub robust_epsilon: Option<f32>,
    /// Transparent hits a shadow-all query tolerates before the ray counts
    /// as occluded. `None` means unlimited.
    pub transparent_max_bounce: Option<u32>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            stack_capacity: STACK_CAPACITY,
            robust_epsilon: None,
            transparent_max_bounce: None,
        }
    }
}

impl TraversalConfig {
    /// Validate settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_capacity == 0 || self.stack_capacity > STACK_CAPACITY {
            return Err(ConfigError::StackCapacity {
                value: self.stack_capacity,
                max: STACK_CAPACITY,
            });
        }
        if let Some(eps) = self.robust_epsilon {
            if !(eps > 0.0 && eps < 0.1) {
                return Err(ConfigError::RobustEpsilon(eps));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    ///
    /// ```
    /// use rayweave_bvh::TraversalConfig;
    ///
    /// let config = TraversalConfig::from_toml_str("robust_epsilon = 0.001").unwrap();
    /// assert_eq!(config.robust_epsilon, Some(0.001));
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TraversalConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = TraversalConfig {
            stack_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StackCapacity { value: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_capacity() {
        let config = TraversalConfig {
            stack_capacity: STACK_CAPACITY + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_epsilon() {
        let config = TraversalConfig {
            robust_epsilon: Some(0.5),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::RobustEpsilon(_))));
    }

    #[test]
    fn test_toml_partial() {
        let config =
            TraversalConfig::from_toml_str("stack_capacity = 64\ntransparent_max_bounce = 4").unwrap();
        assert_eq!(config.stack_capacity, 64);
        assert_eq!(config.transparent_max_bounce, Some(4));
        assert_eq!(config.robust_epsilon, None);
    }

    #[test]
    fn test_toml_parse_error() {
        assert!(matches!(
            TraversalConfig::from_toml_str("stack_capacity = \"deep\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
