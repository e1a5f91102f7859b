//! Categories.
//!
//! Two representations coexist: the owned [`Category`] entity referenced by
//! `Item::category_id`, and the free-text `Item::category` tag. Batch
//! recategorization works on the free-text tag only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assetkeep_core::patch::{non_blank, nullable};
use assetkeep_core::{CategoryId, DomainError, DomainResult, Entity, OwnedEntity, ProfileId};

/// Placeholder tag shown for items without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: ProfileId,
    pub name: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
}

fn validate_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("Category name is required"));
    }
    Ok(name.to_string())
}

impl Category {
    pub fn create(owner: ProfileId, fields: NewCategory, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: CategoryId::new(),
            user_id: owner,
            name: validate_name(&fields.name)?,
            icon: non_blank(fields.icon),
            created_at: now,
        })
    }

    pub fn apply_patch(&mut self, patch: CategoryPatch) -> DomainResult<()> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(icon) = patch.icon {
            self.icon = non_blank(icon);
        }
        Ok(())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl OwnedEntity for Category {
    fn owner(&self) -> ProfileId {
        self.user_id
    }
}

/// Which free-text category tags a batch operation selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryMatch {
    /// Items with no tag, or tagged with the literal placeholder.
    Unassigned,
    /// Items tagged with exactly this name.
    Named(String),
}

impl CategoryMatch {
    /// Selector for a recategorize request.
    ///
    /// A missing, blank or `"Uncategorized"` old name selects both untagged
    /// items and items carrying the placeholder tag.
    pub fn for_old_name(old: Option<&str>) -> Self {
        match old.map(str::trim) {
            None | Some("") => CategoryMatch::Unassigned,
            Some(name) if name == UNCATEGORIZED => CategoryMatch::Unassigned,
            Some(name) => CategoryMatch::Named(name.to_string()),
        }
    }

    /// Exact selector used to clear a tag.
    pub fn exact(name: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Category name is required"));
        }
        Ok(CategoryMatch::Named(name.to_string()))
    }

    pub fn matches(&self, category: Option<&str>) -> bool {
        match self {
            CategoryMatch::Unassigned => category.is_none_or(|c| c == UNCATEGORIZED),
            CategoryMatch::Named(name) => category == Some(name.as_str()),
        }
    }
}

/// Validate the replacement name of a recategorize request.
pub fn validate_new_tag(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("New category name is required"));
    }
    Ok(name.to_string())
}
