use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_core::{Entity, ItemId, LendingLogId, OwnedEntity, ProfileId};

use crate::item::{Item, is_overdue};

/// One lend event. Append-only; `returned_at` is set once when the item
/// comes back. A log with `returned_at == None` is *open*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingLog {
    pub id: LendingLogId,
    pub item_id: ItemId,
    pub user_id: ProfileId,
    pub borrower: String,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LendingLog {
    /// Open a log for an item that has just been lent.
    pub(crate) fn open(item: &Item, now: DateTime<Utc>) -> Self {
        Self {
            id: LendingLogId::new(),
            item_id: item.id,
            user_id: item.user_id,
            borrower: item.borrower.clone().unwrap_or_default(),
            due_date: item.due_date,
            returned_at: None,
            created_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        if self.is_open() {
            self.returned_at = Some(now);
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        is_overdue(self.is_open(), self.due_date, now)
    }

    /// The log a return should close: the newest open one for `item_id`.
    pub fn most_recent_open<'a, I>(logs: I, item_id: ItemId) -> Option<&'a LendingLog>
    where
        I: IntoIterator<Item = &'a LendingLog>,
    {
        logs.into_iter()
            .filter(|l| l.item_id == item_id && l.is_open())
            .max_by_key(|l| (l.created_at, l.id))
    }
}

impl Entity for LendingLog {
    type Id = LendingLogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl OwnedEntity for LendingLog {
    fn owner(&self) -> ProfileId {
        self.user_id
    }
}

/// Filters for the lending history view. Date bounds are inclusive and
/// apply to `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LendingLogFilter {
    pub item_id: Option<ItemId>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl LendingLogFilter {
    pub fn matches(&self, log: &LendingLog) -> bool {
        self.item_id.is_none_or(|id| log.item_id == id)
            && self.start.is_none_or(|s| log.created_at >= s)
            && self.end.is_none_or(|e| log.created_at <= e)
    }
}
