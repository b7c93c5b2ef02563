//! Price domain - reserve-implied prices and tick-to-tick drift

mod price_cache;
mod price_drift;

pub use price_cache::{PriceCache, PriceKey, PricePoint};
pub use price_drift::{price_drop, reserve_price, DriftObservation};
