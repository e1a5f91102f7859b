use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_core::patch::{non_blank, nullable};
use assetkeep_core::{
    CategoryId, DomainError, DomainResult, Entity, ItemId, LocationId, OwnedEntity, Price, ProfileId,
    time,
};

use crate::lending::LendingLog;

/// Lifecycle state of an item.
///
/// `available` → `lent` only via lend; `lent` → `available` via return.
/// `lost` and `damaged` are reachable from any state by direct edit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Available,
    Lent,
    Lost,
    Damaged,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Available,
        ItemStatus::Lent,
        ItemStatus::Lost,
        ItemStatus::Damaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Lent => "lent",
            ItemStatus::Lost => "lost",
            ItemStatus::Damaged => "damaged",
        }
    }

    /// Statuses whose price counts toward financial loss.
    pub fn is_loss(&self) -> bool {
        matches!(self, ItemStatus::Lost | ItemStatus::Damaged)
    }
}

impl core::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ItemStatus::Available),
            "lent" => Ok(ItemStatus::Lent),
            "lost" => Ok(ItemStatus::Lost),
            "damaged" => Ok(ItemStatus::Damaged),
            other => Err(DomainError::validation(format!(
                "invalid status '{other}': expected one of available, lent, lost, damaged"
            ))),
        }
    }
}

/// The overdue predicate.
///
/// Something on loan is overdue once its due date has passed. Shared by item
/// listings, the dashboard and lending-log views.
pub fn is_overdue(on_loan: bool, due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    on_loan && due_date.is_some_and(|due| due < now)
}

/// A tracked possession.
///
/// Lending fields (`borrower`, `borrower_note`, `lent_at`, `due_date`) are
/// populated if and only if `status == Lent`; only `lend` and `release`
/// write them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub user_id: ProfileId,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub quantity: i32,
    pub serial_number: Option<String>,
    pub warranty_expires: Option<DateTime<Utc>>,
    pub photo_url: Option<String>,
    pub status: ItemStatus,
    pub category: Option<String>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub ai_tags: Vec<String>,
    pub borrower: Option<String>,
    pub borrower_note: Option<String>,
    pub lent_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default, deserialize_with = "time::deserialize_optional")]
    pub warranty_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub ai_tags: Option<Vec<String>>,
}

/// Partial update of an item. Absent fields are left alone; `null` clears a
/// nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub price: Option<Option<Price>>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "time::deserialize_patch")]
    pub warranty_expires: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub photo_url: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location_id: Option<Option<LocationId>>,
    #[serde(default)]
    pub ai_tags: Option<Vec<String>>,
}

/// Request to lend an item out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LendRequest {
    #[serde(default)]
    pub borrower: String,
    #[serde(default)]
    pub borrower_note: Option<String>,
    #[serde(default, deserialize_with = "time::deserialize_optional")]
    pub due_date: Option<DateTime<Utc>>,
}

/// Side effect of a patch on the loan bookkeeping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub enum LoanEffect {
    None,
    /// The item left `lent`; its open lending log must be closed.
    Released,
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Item name is required"));
    }
    Ok(name.to_string())
}

fn validate_quantity(quantity: i32) -> DomainResult<i32> {
    if quantity < 0 {
        return Err(DomainError::validation("quantity must be a non-negative integer"));
    }
    Ok(quantity)
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

impl Item {
    /// Build a new item owned by `owner`.
    ///
    /// Ownership of `category_id` / `location_id` is checked by the caller,
    /// which has access to the store.
    pub fn create(owner: ProfileId, fields: NewItem, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = validate_name(&fields.name)?;
        let quantity = validate_quantity(fields.quantity.unwrap_or(1))?;
        let status = fields.status.unwrap_or_default();
        if status == ItemStatus::Lent {
            return Err(DomainError::validation(
                "items cannot be created as lent; create the item then lend it",
            ));
        }

        Ok(Self {
            id: ItemId::new(),
            user_id: owner,
            name,
            description: non_blank(fields.description),
            price: fields.price,
            quantity,
            serial_number: non_blank(fields.serial_number),
            warranty_expires: fields.warranty_expires,
            photo_url: non_blank(fields.photo_url),
            status,
            category: non_blank(fields.category),
            category_id: fields.category_id,
            location_id: fields.location_id,
            ai_tags: clean_tags(fields.ai_tags.unwrap_or_default()),
            borrower: None,
            borrower_note: None,
            lent_at: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_lent(&self) -> bool {
        self.status == ItemStatus::Lent
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        is_overdue(self.is_lent(), self.due_date, now)
    }

    /// Lending fields are set if and only if the item is lent.
    pub fn lending_fields_consistent(&self) -> bool {
        let populated = self.borrower.is_some() && self.lent_at.is_some();
        let cleared = self.borrower.is_none()
            && self.borrower_note.is_none()
            && self.lent_at.is_none()
            && self.due_date.is_none();
        if self.is_lent() { populated } else { cleared }
    }

    /// Apply a partial update.
    ///
    /// Editing the status *to* `lent` is refused. Editing it away from `lent`
    /// clears the lending fields and reports [`LoanEffect::Released`] so the
    /// open log can be closed in the same write.
    pub fn apply_patch(&mut self, patch: ItemPatch, now: DateTime<Utc>) -> DomainResult<LoanEffect> {
        let mut effect = LoanEffect::None;

        if let Some(status) = patch.status {
            if status == ItemStatus::Lent && !self.is_lent() {
                return Err(DomainError::validation(
                    "status cannot be set to lent directly; use the lend operation",
                ));
            }
            if self.is_lent() && status != ItemStatus::Lent {
                effect = LoanEffect::Released;
            }
        }

        // Validate everything before mutating so a failed patch changes nothing.
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let quantity = patch.quantity.map(validate_quantity).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = non_blank(description);
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(quantity) = quantity {
            self.quantity = quantity;
        }
        if let Some(serial) = patch.serial_number {
            self.serial_number = non_blank(serial);
        }
        if let Some(warranty) = patch.warranty_expires {
            self.warranty_expires = warranty;
        }
        if let Some(photo) = patch.photo_url {
            self.photo_url = non_blank(photo);
        }
        if let Some(category) = patch.category {
            self.category = non_blank(category);
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(location_id) = patch.location_id {
            self.location_id = location_id;
        }
        if let Some(tags) = patch.ai_tags {
            self.ai_tags = clean_tags(tags);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if effect == LoanEffect::Released {
            self.clear_loan();
        }

        self.updated_at = now;
        Ok(effect)
    }

    /// Lend the item out, returning the lending log row to append.
    pub fn lend(&mut self, request: LendRequest, now: DateTime<Utc>) -> DomainResult<LendingLog> {
        if self.is_lent() {
            return Err(DomainError::validation("Item is already lent out"));
        }
        let borrower = request.borrower.trim();
        if borrower.is_empty() {
            return Err(DomainError::validation("Borrower name is required"));
        }

        self.status = ItemStatus::Lent;
        self.borrower = Some(borrower.to_string());
        self.borrower_note = non_blank(request.borrower_note);
        self.lent_at = Some(now);
        self.due_date = request.due_date;
        self.updated_at = now;

        Ok(LendingLog::open(self, now))
    }

    /// Return a lent item: back to `available` with the lending fields cleared.
    pub fn release(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_lent() {
            return Err(DomainError::validation("Item is not currently lent out"));
        }
        self.status = ItemStatus::Available;
        self.clear_loan();
        self.updated_at = now;
        Ok(())
    }

    fn clear_loan(&mut self) {
        self.borrower = None;
        self.borrower_note = None;
        self.lent_at = None;
        self.due_date = None;
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl OwnedEntity for Item {
    fn owner(&self) -> ProfileId {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn drill(owner: ProfileId) -> Item {
        Item::create(
            owner,
            NewItem {
                name: "Drill".to_string(),
                price: Some("120.00".parse().unwrap()),
                ..Default::default()
            },
            now(),
        )
        .unwrap()
    }

    fn lend_to(item: &mut Item, borrower: &str, due: Option<DateTime<Utc>>) -> DomainResult<LendingLog> {
        item.lend(
            LendRequest {
                borrower: borrower.to_string(),
                borrower_note: None,
                due_date: due,
            },
            now(),
        )
    }

    #[test]
    fn create_applies_defaults() {
        let item = drill(ProfileId::new());
        assert_eq!(item.status, ItemStatus::Available);
        assert_eq!(item.quantity, 1);
        assert!(item.ai_tags.is_empty());
        assert!(item.lending_fields_consistent());
    }

    #[test]
    fn create_rejects_blank_name_negative_quantity_and_lent_status() {
        let owner = ProfileId::new();
        let blank = Item::create(owner, NewItem { name: "  ".into(), ..Default::default() }, now());
        assert!(matches!(blank, Err(DomainError::BadRequest(_))));

        let negative = Item::create(
            owner,
            NewItem { name: "x".into(), quantity: Some(-1), ..Default::default() },
            now(),
        );
        assert!(negative.is_err());

        let lent = Item::create(
            owner,
            NewItem { name: "x".into(), status: Some(ItemStatus::Lent), ..Default::default() },
            now(),
        );
        assert!(lent.is_err());
    }

    #[test]
    fn lend_then_release_roundtrip() {
        let mut item = drill(ProfileId::new());
        let log = lend_to(&mut item, "Alice", Some(now() + Duration::days(7))).unwrap();

        assert_eq!(item.status, ItemStatus::Lent);
        assert_eq!(item.borrower.as_deref(), Some("Alice"));
        assert_eq!(log.item_id, item.id);
        assert!(log.is_open());
        assert!(item.lending_fields_consistent());

        item.release(now()).unwrap();
        assert_eq!(item.status, ItemStatus::Available);
        assert!(item.borrower.is_none() && item.lent_at.is_none() && item.due_date.is_none());
        assert!(item.lending_fields_consistent());
    }

    #[test]
    fn lend_twice_fails_without_change() {
        let mut item = drill(ProfileId::new());
        lend_to(&mut item, "Alice", None).unwrap();
        let before = item.clone();

        let err = lend_to(&mut item, "Bob", None).unwrap_err();
        assert_eq!(err, DomainError::validation("Item is already lent out"));
        assert_eq!(item, before);
    }

    #[test]
    fn lend_requires_borrower() {
        let mut item = drill(ProfileId::new());
        let err = lend_to(&mut item, "   ", None).unwrap_err();
        assert_eq!(err, DomainError::validation("Borrower name is required"));
        assert_eq!(item.status, ItemStatus::Available);
    }

    #[test]
    fn release_when_not_lent_fails() {
        let mut item = drill(ProfileId::new());
        let before = item.clone();
        assert!(item.release(now()).is_err());
        assert_eq!(item, before);
    }

    #[test]
    fn overdue_needs_lent_status_and_past_due_date() {
        let t = now();
        let mut item = drill(ProfileId::new());
        assert!(!item.is_overdue(t));

        lend_to(&mut item, "Alice", None).unwrap();
        assert!(!item.is_overdue(t), "no due date means never overdue");

        item.due_date = Some(t - Duration::days(1));
        assert!(item.is_overdue(t));

        item.due_date = Some(t + Duration::days(1));
        assert!(!item.is_overdue(t));
    }

    #[test]
    fn patch_to_lent_is_refused() {
        let mut item = drill(ProfileId::new());
        let patch = ItemPatch { status: Some(ItemStatus::Lent), ..Default::default() };
        assert!(item.apply_patch(patch, now()).is_err());
        assert_eq!(item.status, ItemStatus::Available);
    }

    #[test]
    fn patch_from_lent_to_lost_releases_loan() {
        let mut item = drill(ProfileId::new());
        lend_to(&mut item, "Alice", Some(now())).unwrap();

        let patch = ItemPatch { status: Some(ItemStatus::Lost), ..Default::default() };
        let effect = item.apply_patch(patch, now()).unwrap();

        assert_eq!(effect, LoanEffect::Released);
        assert_eq!(item.status, ItemStatus::Lost);
        assert!(item.lending_fields_consistent());
    }

    #[test]
    fn patch_keeping_lent_status_keeps_loan() {
        let mut item = drill(ProfileId::new());
        lend_to(&mut item, "Alice", None).unwrap();

        let patch = ItemPatch {
            status: Some(ItemStatus::Lent),
            name: Some("Cordless drill".into()),
            ..Default::default()
        };
        assert_eq!(item.apply_patch(patch, now()).unwrap(), LoanEffect::None);
        assert_eq!(item.borrower.as_deref(), Some("Alice"));
        assert_eq!(item.name, "Cordless drill");
    }

    #[test]
    fn failed_patch_changes_nothing() {
        let mut item = drill(ProfileId::new());
        let before = item.clone();
        let patch = ItemPatch {
            description: Some(Some("new".into())),
            quantity: Some(-3),
            ..Default::default()
        };
        assert!(item.apply_patch(patch, now()).is_err());
        assert_eq!(item, before);
    }

    #[test]
    fn patch_deserializes_null_as_clear() {
        let patch: ItemPatch =
            serde_json::from_str(r#"{"location_id": null, "price": "9.5"}"#).unwrap();
        assert_eq!(patch.location_id, Some(None));
        assert_eq!(patch.price, Some(Some("9.50".parse().unwrap())));
        assert_eq!(patch.category_id, None);
    }

    #[test]
    fn status_parse_is_case_insensitive_and_strict() {
        assert_eq!("Lost".parse::<ItemStatus>().unwrap(), ItemStatus::Lost);
        assert!("missing".parse::<ItemStatus>().is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Lend,
        Return,
        MarkLost,
        MarkAvailable,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Lend),
            Just(Op::Return),
            Just(Op::MarkLost),
            Just(Op::MarkAvailable),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        /// After any sequence of operations the item is lent iff exactly one
        /// open log exists, and the lending fields agree with the status.
        #[test]
        fn lent_iff_single_open_log(ops in proptest::collection::vec(op_strategy(), 0..40)) {
            let mut item = drill(ProfileId::new());
            let mut logs: Vec<LendingLog> = Vec::new();

            for op in ops {
                let t = now();
                match op {
                    Op::Lend => {
                        if let Ok(log) = lend_to(&mut item, "Alice", None) {
                            logs.push(log);
                        }
                    }
                    Op::Return => {
                        if item.release(t).is_ok() {
                            if let Some(open) = logs.iter_mut().rev().find(|l| l.is_open()) {
                                open.close(t);
                            }
                        }
                    }
                    Op::MarkLost | Op::MarkAvailable => {
                        let status = if matches!(op, Op::MarkLost) { ItemStatus::Lost } else { ItemStatus::Available };
                        let patch = ItemPatch { status: Some(status), ..Default::default() };
                        if let Ok(LoanEffect::Released) = item.apply_patch(patch, t) {
                            if let Some(open) = logs.iter_mut().rev().find(|l| l.is_open()) {
                                open.close(t);
                            }
                        }
                    }
                }

                let open = logs.iter().filter(|l| l.is_open()).count();
                prop_assert!(open <= 1);
                prop_assert_eq!(item.is_lent(), open == 1);
                prop_assert!(item.lending_fields_consistent());
            }
        }
    }
}
