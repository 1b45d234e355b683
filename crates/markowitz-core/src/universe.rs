//! Asset universe: tickers tagged with an allocation category.
//!
//! Categories compare by exact tag equality. `"stock"` and `"crypto"` are the
//! built-in tags; anything else is carried verbatim as [`AssetCategory::Other`],
//! so `"Stock"` is *not* a stock. Callers normalize casing before building a
//! universe.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::MarkowitzError;
use crate::MarkowitzResult;

/// Allocation category of an asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetCategory {
    Stock,
    Crypto,
    Other(String),
}

impl AssetCategory {
    /// Category for `tag`, mapping the built-in tags to their variants.
    pub fn new(tag: impl Into<String>) -> Self {
        AssetCategory::from(tag.into())
    }

    /// Same tag, whichever variant carries it.
    pub fn same_tag(&self, other: &AssetCategory) -> bool {
        self.as_str() == other.as_str()
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetCategory::Stock => "stock",
            AssetCategory::Crypto => "crypto",
            AssetCategory::Other(tag) => tag.as_str(),
        }
    }
}

impl From<String> for AssetCategory {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "stock" => AssetCategory::Stock,
            "crypto" => AssetCategory::Crypto,
            _ => AssetCategory::Other(tag),
        }
    }
}

impl From<&str> for AssetCategory {
    fn from(tag: &str) -> Self {
        AssetCategory::from(tag.to_string())
    }
}

impl From<AssetCategory> for String {
    fn from(category: AssetCategory) -> Self {
        match category {
            AssetCategory::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tradable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Ticker symbol, unique within a universe.
    pub ticker: String,
    pub category: AssetCategory,
}

impl Asset {
    pub fn new(ticker: impl Into<String>, category: AssetCategory) -> Self {
        Asset {
            ticker: ticker.into(),
            category,
        }
    }

    pub fn stock(ticker: impl Into<String>) -> Self {
        Asset::new(ticker, AssetCategory::Stock)
    }

    pub fn crypto(ticker: impl Into<String>) -> Self {
        Asset::new(ticker, AssetCategory::Crypto)
    }
}

/// Ordered, non-empty set of assets with unique tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    assets: Vec<Asset>,
}

impl Universe {
    pub fn new(assets: Vec<Asset>) -> MarkowitzResult<Self> {
        if assets.is_empty() {
            return Err(MarkowitzError::EmptyUniverse);
        }

        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if asset.ticker.is_empty() {
                return Err(MarkowitzError::InvalidInput {
                    field: "assets".into(),
                    reason: "Ticker must not be empty".into(),
                });
            }
            if !seen.insert(asset.ticker.as_str()) {
                return Err(MarkowitzError::InvalidInput {
                    field: "assets".into(),
                    reason: format!("Duplicate ticker '{}'", asset.ticker),
                });
            }
        }

        Ok(Universe { assets })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Always false for a constructed universe; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.ticker.as_str()).collect()
    }

    pub fn contains_category(&self, category: &AssetCategory) -> bool {
        self.assets.iter().any(|a| a.category.same_tag(category))
    }

    /// Keep only assets whose ticker appears in `available`, preserving order.
    pub fn retain_available(self, available: &[String]) -> MarkowitzResult<Universe> {
        let keep: HashSet<&str> = available.iter().map(|t| t.as_str()).collect();
        let assets: Vec<Asset> = self
            .assets
            .into_iter()
            .filter(|a| keep.contains(a.ticker.as_str()))
            .collect();
        Universe::new(assets)
    }
}
