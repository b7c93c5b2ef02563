//! Reserve-implied price and relative drop between observations

use num_traits::Zero;

use crate::domain::chain::PoolReserves;
use crate::shared::errors::PriceError;
use crate::shared::types::PairKey;
use crate::shared::utils::ratio;

/// One pool's price compared against its own previous observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftObservation {
    pub pair: PairKey,
    pub previous: f64,
    pub current: f64,
    pub drop: f64,
}

impl DriftObservation {
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.drop > threshold
    }
}

/// Quote per base, both normalized by their decimals
pub fn reserve_price(reserves: &PoolReserves) -> Result<f64, PriceError> {
    if reserves.base_reserve.is_zero() {
        return Err(PriceError::EmptyReserve);
    }
    let raw = ratio(&reserves.quote_reserve, &reserves.base_reserve);
    let shift = reserves.base_decimals as i32 - reserves.quote_decimals as i32;
    let price = raw * 10f64.powi(shift);
    if !price.is_finite() {
        return Err(PriceError::CalculationFailed);
    }
    Ok(price)
}

/// `(previous - current) / previous`; negative when the price rose
pub fn price_drop(previous: f64, current: f64) -> f64 {
    if previous <= 0.0 {
        return 0.0;
    }
    (previous - current) / previous
}
