//! Utility functions and helpers

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Format amount with proper decimals
pub fn format_amount(amount: &BigUint, decimals: u8) -> String {
    let scale = BigUint::from(10u32).pow(decimals as u32);
    let whole = amount / &scale;
    let frac = amount % &scale;
    if decimals == 0 {
        return whole.to_string();
    }
    format!("{}.{:0>width$}", whole, frac.to_string(), width = decimals as usize)
}

/// `value * bps / 10_000`, rounded down
pub fn apply_bps(value: &BigUint, bps: u32) -> BigUint {
    value * BigUint::from(bps) / BigUint::from(10_000u32)
}

/// Ratio of two integers as a float, scaled by 1e18 before conversion so
/// large amounts keep their precision. Zero denominator yields 0.
pub fn ratio(numerator: &BigUint, denominator: &BigUint) -> f64 {
    const SCALE: u64 = 1_000_000_000_000_000_000;
    if denominator.is_zero() {
        return 0.0;
    }
    let scaled = numerator * BigUint::from(SCALE) / denominator;
    scaled.to_f64().unwrap_or(f64::MAX) / SCALE as f64
}

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Serde adapter writing a `BigUint` as a decimal string
pub mod biguint_string {
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::from_str(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter writing a `Pubkey` as base58
pub mod pubkey_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(D::Error::custom)
    }
}
