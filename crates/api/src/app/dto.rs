use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_auth::{IssuedToken, Profile, SubscriptionToggle};
use assetkeep_core::{DomainError, DomainResult, ItemId, LocationId, time::parse_timestamp};
use assetkeep_infra::services::{ItemDetail, LendingLogEntry, LocationNode, ParentFilter};
use assetkeep_inventory::{
    AdminStats, DashboardStats, Item, ItemFilter, ItemStatus, LendingLog, LendingLogFilter, Location, Page,
    PageRequest,
};

// ─────────────────────────────────────────────────────────────────────────────
// Request DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchCategoryRequest {
    #[serde(default, alias = "oldCategoryName")]
    pub old_category_name: Option<String>,
    #[serde(default, alias = "newCategoryName")]
    pub new_category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearCategoryRequest {
    #[serde(default, alias = "categoryName")]
    pub category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    #[serde(default, alias = "orderID", alias = "orderId")]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub status: SubscriptionToggle,
}

// ─────────────────────────────────────────────────────────────────────────────
// Query strings
//
// Every field is read as a string so malformed values surface as `400` in the
// envelope instead of a bare extractor rejection.
// ─────────────────────────────────────────────────────────────────────────────

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_number(name: &str, raw: Option<&str>) -> DomainResult<Option<u32>> {
    present(raw)
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| DomainError::validation(format!("{name} must be a positive integer")))
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationListQuery {
    pub parent_id: Option<String>,
}

impl LocationListQuery {
    /// `parent_id=null` selects roots; an id selects direct children.
    pub fn parent_filter(&self) -> DomainResult<ParentFilter> {
        match self.parent_id.as_deref().map(str::trim) {
            None => Ok(ParentFilter::Any),
            Some("null") | Some("") => Ok(ParentFilter::Roots),
            Some(raw) => Ok(ParentFilter::ChildrenOf(raw.parse::<LocationId>()?)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub location_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ItemListQuery {
    pub fn into_filter(self) -> DomainResult<(ItemFilter, PageRequest)> {
        let filter = ItemFilter {
            status: present(self.status.as_deref()).map(str::parse::<ItemStatus>).transpose()?,
            category_id: present(self.category_id.as_deref()).map(str::parse).transpose()?,
            location_ids: present(self.location_id.as_deref())
                .map(ItemFilter::parse_location_ids)
                .transpose()?,
            search: present(self.search.as_deref()).map(str::to_string),
        };
        let page = PageRequest::new(
            parse_number("page", self.page.as_deref())?,
            parse_number("limit", self.limit.as_deref())?,
        );
        Ok((filter, page))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LendingLogQuery {
    pub item_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl LendingLogQuery {
    pub fn into_filter(self) -> DomainResult<LendingLogFilter> {
        Ok(LendingLogFilter {
            item_id: present(self.item_id.as_deref()).map(str::parse::<ItemId>).transpose()?,
            start: present(self.start_date.as_deref()).map(parse_timestamp).transpose()?,
            end: present(self.end_date.as_deref()).map(parse_timestamp).transpose()?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response views
// ─────────────────────────────────────────────────────────────────────────────

/// Public shape of a profile. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_pro: bool,
    pub has_password: bool,
    pub pro_start_date: Option<DateTime<Utc>>,
    pub pro_expiry: Option<DateTime<Utc>>,
    pub linked_providers: Vec<&'static str>,
    pub created_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn from_profile(profile: &Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: profile.id.to_string(),
            email: profile.email.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            is_admin: profile.is_admin,
            is_pro: profile.is_pro(now),
            has_password: profile.has_password(),
            pro_start_date: profile.pro_start_date,
            pro_expiry: profile.pro_expiry,
            linked_providers: profile.identities.iter().map(|i| i.provider.as_str()).collect(),
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: ProfileView,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(profile: &Profile, token: IssuedToken, now: DateTime<Utc>) -> Self {
        Self {
            user: ProfileView::from_profile(profile, now),
            token: token.token,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LocationRef {
    pub id: LocationId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub parent: Option<LocationRef>,
    pub children: Vec<Location>,
}

impl From<LocationNode> for LocationView {
    fn from(node: LocationNode) -> Self {
        Self {
            location: node.location,
            parent: node.parent.map(|p| LocationRef { id: p.id, name: p.name }),
            children: node.children,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub photo_url: Option<String>,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            photo_url: item.photo_url.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub is_overdue: bool,
}

impl ItemView {
    pub fn new(item: Item, now: DateTime<Utc>) -> Self {
        let is_overdue = item.is_overdue(now);
        Self { item, is_overdue }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemDetailView {
    #[serde(flatten)]
    pub item: ItemView,
    pub lending_logs: Vec<LendingLog>,
}

impl ItemDetailView {
    pub fn new(detail: ItemDetail, now: DateTime<Utc>) -> Self {
        Self {
            item: ItemView::new(detail.item, now),
            lending_logs: detail.lending_logs,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ItemListView {
    pub items: Vec<ItemView>,
    pub pagination: Pagination,
}

impl ItemListView {
    pub fn new(page: Page<Item>, now: DateTime<Utc>) -> Self {
        Self {
            pagination: Pagination {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
            },
            items: page.items.into_iter().map(|i| ItemView::new(i, now)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LendingLogView {
    #[serde(flatten)]
    pub log: LendingLog,
    pub item: Option<ItemSummary>,
    pub is_overdue: bool,
}

impl From<LendingLogEntry> for LendingLogView {
    fn from(entry: LendingLogEntry) -> Self {
        Self {
            item: entry.item.as_ref().map(ItemSummary::from),
            log: entry.log,
            is_overdue: entry.overdue,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusBreakdownView {
    pub available: u64,
    pub lent: u64,
    pub lost: u64,
    pub damaged: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatsView {
    pub total_items: u64,
    pub total_value: f64,
    pub current_value: f64,
    pub financial_loss: f64,
    pub overdue_count: u64,
    pub status_breakdown: StatusBreakdownView,
}

impl From<DashboardStats> for DashboardStatsView {
    fn from(stats: DashboardStats) -> Self {
        let b = stats.status_breakdown;
        Self {
            total_items: stats.total_items,
            total_value: stats.total_value.as_f64(),
            current_value: stats.current_value.as_f64(),
            financial_loss: stats.financial_loss.as_f64(),
            overdue_count: stats.overdue_count,
            status_breakdown: StatusBreakdownView {
                available: b.available,
                lent: b.lent,
                lost: b.lost,
                damaged: b.damaged,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsView {
    pub total_users: u64,
    pub total_pro_users: u64,
    pub total_money: f64,
}

impl From<AdminStats> for AdminStatsView {
    fn from(stats: AdminStats) -> Self {
        Self {
            total_users: stats.total_users,
            total_pro_users: stats.total_pro_users,
            total_money: stats.total_money.as_f64(),
        }
    }
}
