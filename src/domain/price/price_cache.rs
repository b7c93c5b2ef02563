//! Last observed price per pool

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;

use crate::shared::types::PairKey;

/// A pool's slot in the cache. Pools quoting the same pair keep separate
/// baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub pair: PairKey,
    pub strategy: Pubkey,
}

impl PriceKey {
    pub fn new(pair: PairKey, strategy: Pubkey) -> Self {
        Self { pair, strategy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

/// Baseline prices owned by a single rebalancer. Entries are created on
/// first observation and overwritten on every later one.
#[derive(Debug, Default, Clone)]
pub struct PriceCache {
    points: HashMap<PriceKey, PricePoint>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PriceKey) -> Option<&PricePoint> {
        self.points.get(key)
    }

    /// Store `price` as the new baseline and return the previous one
    pub fn record(&mut self, key: PriceKey, price: f64, observed_at: DateTime<Utc>) -> Option<PricePoint> {
        self.points.insert(key, PricePoint { price, observed_at })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
