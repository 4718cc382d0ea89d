//! Protocol constants supplied by the caller.
//!
//! Values come from code ([`ProtocolConfig::default`]) or from `PERP_MATH_*`
//! environment variables via [`ProtocolConfig::from_env`]. Every field has a
//! default, so the environment only needs to carry overrides.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::math::numbers::{BASIS_POINTS_DIVISOR, DUST_USD, PRECISION, expand_decimals};
use crate::types::{Bps, Factor, Usd};

pub const ENV_PREFIX: &str = "PERP_MATH_";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Absolute minimum collateral a position may keep, in USD.
    #[serde(deserialize_with = "fixed_point")]
    pub min_collateral_usd: Usd,

    /// Remaining sizes below this are closed in full.
    #[serde(deserialize_with = "fixed_point")]
    pub min_position_size_usd: Usd,

    /// Remaining sizes below this are always dust.
    #[serde(deserialize_with = "fixed_point")]
    pub dust_usd: Usd,

    /// Front-end fee charged on top of protocol fees.
    #[serde(deserialize_with = "fixed_point")]
    pub ui_fee_factor: Factor,

    /// Max markets a swap path may cross.
    pub max_swap_path_length: usize,

    /// Slippage buffer added to the acceptable price of market orders.
    #[serde(deserialize_with = "fixed_point")]
    pub acceptable_price_impact_buffer_bps: Bps,

    /// Price impact above this is flagged as high.
    #[serde(deserialize_with = "fixed_point")]
    pub high_price_impact_bps: Bps,

    /// Cap used when a market has no usable min collateral factor.
    #[serde(deserialize_with = "fixed_point")]
    pub max_allowed_leverage_bps: Bps,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_collateral_usd: expand_decimals(1, 18),
            min_position_size_usd: expand_decimals(1, 18),
            dust_usd: DUST_USD,
            ui_fee_factor: 0,
            max_swap_path_length: 3,
            acceptable_price_impact_buffer_bps: 30,
            high_price_impact_bps: 80,
            max_allowed_leverage_bps: 100 * BASIS_POINTS_DIVISOR,
        }
    }
}

impl ProtocolConfig {
    /// Load overrides from `PERP_MATH_*` environment variables.
    pub fn from_env() -> crate::Result<Self> {
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    /// UI fee factor as a fraction of `PRECISION`, clamped to `[0, 1]`.
    pub fn ui_fee_factor(&self) -> Factor {
        self.ui_fee_factor.clamp(0, PRECISION)
    }
}

/// Environment values arrive as strings; JSON may carry plain numbers.
fn fixed_point<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
    struct FixedPoint;

    impl Visitor<'_> for FixedPoint {
        type Value = i128;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or an integer string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<i128, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i128, E> {
            v.trim().parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(FixedPoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_variables() {
        let vars = vec![(
            "PERP_MATH_MAX_SWAP_PATH_LENGTH".to_string(),
            "2".to_string(),
        )];
        let cfg: ProtocolConfig = envy::prefixed(ENV_PREFIX).from_iter(vars).unwrap();

        assert_eq!(cfg.max_swap_path_length, 2);
        assert_eq!(cfg.acceptable_price_impact_buffer_bps, 30);
        assert_eq!(cfg.dust_usd, DUST_USD);
    }

    #[test]
    fn wide_values_parse_from_strings() {
        let vars = vec![(
            "PERP_MATH_MIN_COLLATERAL_USD".to_string(),
            "5000000000000000000".to_string(),
        )];
        let cfg: ProtocolConfig = envy::prefixed(ENV_PREFIX).from_iter(vars).unwrap();
        assert_eq!(cfg.min_collateral_usd, 5 * PRECISION);
    }

    #[test]
    fn invalid_number_is_reported() {
        let vars = vec![(
            "PERP_MATH_HIGH_PRICE_IMPACT_BPS".to_string(),
            "lots".to_string(),
        )];
        let res = envy::prefixed(ENV_PREFIX).from_iter::<_, ProtocolConfig>(vars);
        assert!(res.is_err(), "non-numeric override must not parse");
    }

    #[test]
    fn ui_fee_factor_is_clamped() {
        let cfg = ProtocolConfig {
            ui_fee_factor: 2 * PRECISION,
            ..Default::default()
        };
        assert_eq!(cfg.ui_fee_factor(), PRECISION);
    }
}
