use serde::{Deserialize, Serialize};

/// Named subset selector for the coin list
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    #[default]
    All,
    Trending,
    Gainers,
    Losers,
    Favorites,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Price,
    Change24h,
    Volume,
    #[default]
    MarketCap,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Transient list state. Never persisted; defaults on every start.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterState {
    pub segment: Segment,
    pub search: String,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
}

impl FilterState {
    /// Search text with surrounding whitespace removed, lower-cased.
    pub fn normalized_search(&self) -> String {
        self.search.trim().to_lowercase()
    }

    /// No search, all coins, market cap descending.
    pub fn is_default_view(&self) -> bool {
        self.segment == Segment::All
            && self.normalized_search().is_empty()
            && self.sort_key == SortKey::MarketCap
            && self.sort_direction == SortDirection::Descending
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::All => write!(f, "all"),
            Segment::Trending => write!(f, "trending"),
            Segment::Gainers => write!(f, "gainers"),
            Segment::Losers => write!(f, "losers"),
            Segment::Favorites => write!(f, "favorites"),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::Price => write!(f, "price"),
            SortKey::Change24h => write!(f, "change_24h"),
            SortKey::Volume => write!(f, "volume"),
            SortKey::MarketCap => write!(f, "market_cap"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_default_view() {
        let state = FilterState::default();
        assert!(state.is_default_view());

        let searching = FilterState {
            search: "  ".into(),
            ..FilterState::default()
        };
        assert!(searching.is_default_view());

        let by_price = FilterState {
            sort_key: SortKey::Price,
            ..FilterState::default()
        };
        assert!(!by_price.is_default_view());

        let ascending = FilterState {
            sort_direction: SortDirection::Ascending,
            ..FilterState::default()
        };
        assert!(!ascending.is_default_view());
    }
}
