use serde::{Deserialize, Serialize};

use super::ItemKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    DateCreated,
    DatePlayed,
    PremiereDate,
    ProductionYear,
    CommunityRating,
    Runtime,
    PlayCount,
    Random,
    /// Passed to the server unchanged.
    Other(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Listing constraints. `None` means "no constraint", never "match nothing".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub include_item_kinds: Option<Vec<ItemKind>>,
    pub sort_by: Option<Vec<SortKey>>,
    pub sort_order: Option<SortOrder>,
    pub unplayed_only: Option<bool>,
    pub year: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
}

impl Filters {
    pub fn kinds(kinds: impl IntoIterator<Item = ItemKind>) -> Self {
        Self {
            include_item_kinds: Some(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn sorted(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort_by = Some(vec![key]);
        self.sort_order = Some(order);
        self
    }

    pub(crate) fn item_kinds(&self) -> Option<&[ItemKind]> {
        self.include_item_kinds.as_deref().filter(|k| !k.is_empty())
    }

    pub(crate) fn sort_keys(&self) -> Option<&[SortKey]> {
        self.sort_by.as_deref().filter(|k| !k.is_empty())
    }

    pub(crate) fn tag_list(&self) -> Option<&[String]> {
        self.tags.as_deref().filter(|t| !t.is_empty())
    }

    pub(crate) fn genre_list(&self) -> Option<&[String]> {
        self.genres.as_deref().filter(|g| !g.is_empty())
    }

    pub(crate) fn wants_unplayed(&self) -> bool {
        self.unplayed_only.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub start_index: u32,
    pub limit: u32,
    pub filters: Filters,
}

impl PageRequest {
    pub fn new(start_index: u32, limit: u32) -> Self {
        Self {
            start_index,
            limit,
            filters: Filters::default(),
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Server-reported total across all pages, when the server knows it.
    pub total_count: Option<u32>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: None,
        }
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: Option<u32>) -> Self {
        Self { items, total_count }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }

    /// Total to use for "more pages" decisions: the reported one, else what we got.
    pub fn effective_total(&self) -> u32 {
        self.total_count
            .unwrap_or_else(|| u32::try_from(self.items.len()).unwrap_or(u32::MAX))
    }
}

/// Values a library can be filtered by.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterValues {
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub years: Vec<i32>,
    pub official_ratings: Vec<String>,
}
