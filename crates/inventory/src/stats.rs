//! Derived aggregates. Nothing here is persisted; everything is recomputed
//! on read.

use chrono::{DateTime, Utc};

use assetkeep_core::Price;

use crate::item::{Item, ItemStatus};

/// Price of one month of the pro subscription, used for the revenue estimate.
pub const PRO_MONTHLY_PRICE: Price = Price::clamped(999);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub available: u64,
    pub lent: u64,
    pub lost: u64,
    pub damaged: u64,
}

impl StatusBreakdown {
    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Available => self.available += 1,
            ItemStatus::Lent => self.lent += 1,
            ItemStatus::Lost => self.lost += 1,
            ItemStatus::Damaged => self.damaged += 1,
        }
    }

    pub fn get(&self, status: ItemStatus) -> u64 {
        match status {
            ItemStatus::Available => self.available,
            ItemStatus::Lent => self.lent,
            ItemStatus::Lost => self.lost,
            ItemStatus::Damaged => self.damaged,
        }
    }
}

/// Per-owner dashboard figures.
///
/// `total_value` sums every item's price, lost and damaged ones included
/// ("everything ever owned"). `current_value` excludes the loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_items: u64,
    pub total_value: Price,
    pub current_value: Price,
    pub financial_loss: Price,
    pub overdue_count: u64,
    pub status_breakdown: StatusBreakdown,
}

impl DashboardStats {
    pub fn compute(items: &[Item], now: DateTime<Utc>) -> Self {
        let mut breakdown = StatusBreakdown::default();
        let mut total_value = Price::ZERO;
        let mut financial_loss = Price::ZERO;
        let mut overdue_count = 0;

        for item in items {
            breakdown.record(item.status);
            let price = item.price.unwrap_or_default();
            total_value = total_value.saturating_add(price);
            if item.status.is_loss() {
                financial_loss = financial_loss.saturating_add(price);
            }
            if item.is_overdue(now) {
                overdue_count += 1;
            }
        }

        Self {
            total_items: items.len() as u64,
            total_value,
            current_value: total_value.saturating_sub(financial_loss),
            financial_loss,
            overdue_count,
            status_breakdown: breakdown,
        }
    }
}

/// Cross-owner account figures for administrators. The revenue number is a
/// rough estimate, not a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_pro_users: u64,
    pub total_money: Price,
}

impl AdminStats {
    pub fn estimate(total_users: u64, total_pro_users: u64) -> Self {
        let cents = PRO_MONTHLY_PRICE
            .cents()
            .saturating_mul(i64::try_from(total_pro_users).unwrap_or(i64::MAX));
        Self {
            total_users,
            total_pro_users,
            total_money: Price::clamped(cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{LendRequest, NewItem};
    use assetkeep_core::ProfileId;
    use chrono::Duration;

    fn priced(owner: ProfileId, price: Option<&str>, status: ItemStatus) -> Item {
        let mut item = Item::create(
            owner,
            NewItem {
                name: "thing".into(),
                price: price.map(|p| p.parse().unwrap()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        item.status = status;
        item
    }

    #[test]
    fn totals_and_loss() {
        let owner = ProfileId::new();
        let items = vec![
            priced(owner, Some("100.00"), ItemStatus::Available),
            priced(owner, Some("20.50"), ItemStatus::Lost),
            priced(owner, Some("4.50"), ItemStatus::Damaged),
            priced(owner, None, ItemStatus::Available),
        ];
        let stats = DashboardStats::compute(&items, Utc::now());

        assert_eq!(stats.total_items, 4);
        assert_eq!(stats.total_value.to_string(), "125.00");
        assert_eq!(stats.financial_loss.to_string(), "25.00");
        assert_eq!(stats.current_value.to_string(), "100.00");
        assert_eq!(stats.status_breakdown.get(ItemStatus::Available), 2);
        assert_eq!(stats.status_breakdown.lost, 1);
    }

    #[test]
    fn overdue_follows_lend_and_return() {
        let now = Utc::now();
        let owner = ProfileId::new();
        let mut drill = priced(owner, Some("120.00"), ItemStatus::Available);
        drill
            .lend(
                LendRequest {
                    borrower: "Alice".into(),
                    borrower_note: None,
                    due_date: Some(now - Duration::days(1)),
                },
                now - Duration::days(8),
            )
            .unwrap();

        let stats = DashboardStats::compute(std::slice::from_ref(&drill), now);
        assert_eq!(stats.overdue_count, 1);

        drill.release(now).unwrap();
        let stats = DashboardStats::compute(&[drill], now);
        assert_eq!(stats.overdue_count, 0);
    }

    #[test]
    fn admin_revenue_estimate() {
        let stats = AdminStats::estimate(10, 3);
        assert_eq!(stats.total_money.to_string(), "29.97");
        assert_eq!(AdminStats::estimate(0, 0).total_money, Price::ZERO);
    }
}
