//! Item listing filters and pagination.

use serde::Serialize;

use assetkeep_core::{CategoryId, DomainError, DomainResult, LocationId};

use crate::item::{Item, ItemStatus};

/// Independently optional item filters. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub category_id: Option<CategoryId>,
    /// One id, or a set (any member matches).
    pub location_ids: Option<Vec<LocationId>>,
    /// Case-insensitive substring over name, description and serial number.
    pub search: Option<String>,
}

impl ItemFilter {
    /// Parse a `location_id` query value: a single id or a comma-separated set.
    pub fn parse_location_ids(raw: &str) -> DomainResult<Vec<LocationId>> {
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<DomainResult<Vec<LocationId>>>()?;
        if ids.is_empty() {
            return Err(DomainError::validation("location_id must name at least one location"));
        }
        Ok(ids)
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, item: &Item) -> bool {
        if self.status.is_some_and(|s| s != item.status) {
            return false;
        }
        if self.category_id.is_some() && self.category_id != item.category_id {
            return false;
        }
        if let Some(ids) = &self.location_ids {
            if !item.location_id.is_some_and(|loc| ids.contains(&loc)) {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            let needle = term.to_lowercase();
            let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
            if !(hit(Some(&item.name)) || hit(item.description.as_deref()) || hit(item.serial_number.as_deref())) {
                return false;
            }
        }
        true
    }
}

/// Page selection. Pages are 1-based.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(u64::from(request.limit)),
        }
    }

    /// Slice an already filtered and ordered sequence.
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .collect();
        Self::new(items, total, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::NewItem;
    use assetkeep_core::ProfileId;
    use chrono::Utc;

    fn item(name: &str, description: Option<&str>, serial: Option<&str>) -> Item {
        Item::create(
            ProfileId::new(),
            NewItem {
                name: name.into(),
                description: description.map(Into::into),
                serial_number: serial.map(Into::into),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let filter = ItemFilter { search: Some("BOSCH".into()), ..Default::default() };
        assert!(filter.matches(&item("Bosch drill", None, None)));
        assert!(filter.matches(&item("Drill", Some("a bosch tool"), None)));
        assert!(filter.matches(&item("Drill", None, Some("bosch-123"))));
        assert!(!filter.matches(&item("Makita", None, None)));
    }

    #[test]
    fn location_set_matches_any_member() {
        let a = LocationId::new();
        let b = LocationId::new();
        let raw = format!("{a}, {b}");
        let ids = ItemFilter::parse_location_ids(&raw).unwrap();
        let filter = ItemFilter { location_ids: Some(ids), ..Default::default() };

        let mut at_b = item("x", None, None);
        at_b.location_id = Some(b);
        assert!(filter.matches(&at_b));
        assert!(!filter.matches(&item("nowhere", None, None)));
    }

    #[test]
    fn malformed_location_ids_are_rejected() {
        assert!(ItemFilter::parse_location_ids("abc").is_err());
        assert!(ItemFilter::parse_location_ids(" , ").is_err());
    }

    #[test]
    fn status_filter_is_exact() {
        let filter = ItemFilter { status: Some(ItemStatus::Lost), ..Default::default() };
        assert!(!filter.matches(&item("x", None, None)));
    }

    #[test]
    fn page_request_defaults_and_clamps() {
        let req = PageRequest::new(None, None);
        assert_eq!((req.page, req.limit), (1, 50));
        let req = PageRequest::new(Some(0), Some(10_000));
        assert_eq!((req.page, req.limit), (1, PageRequest::MAX_LIMIT));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::slice((0..101).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(50)));
        assert_eq!(page.total, 101);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, vec![100]);

        let empty = Page::slice(Vec::<u8>::new(), PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }
}
