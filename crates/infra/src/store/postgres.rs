//! Postgres-backed store.
//!
//! Every query on owned tables carries `user_id` in its WHERE clause. Writes
//! that touch more than one row (lend, return, reconciling updates, subtree
//! deletes, profile rewrites) run in one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use assetkeep_auth::{ExternalIdentity, IdentityProvider, Profile};
use assetkeep_core::{CategoryId, ItemId, LendingLogId, LocationId, Price, ProfileId};
use assetkeep_inventory::{
    Category, CategoryMatch, Item, ItemFilter, ItemStatus, LendingLog, LendingLogFilter, Location, Page,
    PageRequest, UNCATEGORIZED,
};

use super::{InventoryStore, ProfileCounts, StoreError, StoreResult, SubtreeDeletion, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn identities_of(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<ExternalIdentity>>> {
        let rows = sqlx::query(
            "SELECT profile_id, provider, external_id FROM profile_identities WHERE profile_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("identities_of", e))?;

        let mut out: HashMap<Uuid, Vec<ExternalIdentity>> = HashMap::new();
        for row in rows {
            let profile_id: Uuid = row.try_get("profile_id").map_err(|e| map_sqlx_error("identities_of", e))?;
            let provider: String = row.try_get("provider").map_err(|e| map_sqlx_error("identities_of", e))?;
            let external_id: String = row.try_get("external_id").map_err(|e| map_sqlx_error("identities_of", e))?;
            let provider: IdentityProvider = provider
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("unknown identity provider '{provider}'")))?;
            out.entry(profile_id)
                .or_default()
                .push(ExternalIdentity { provider, external_id });
        }
        Ok(out)
    }

    async fn hydrate_profiles(&self, rows: Vec<PgRow>) -> StoreResult<Vec<Profile>> {
        let mut profiles = rows.iter().map(profile_from_row).collect::<StoreResult<Vec<_>>>()?;
        let ids: Vec<Uuid> = profiles.iter().map(|p| *p.id.as_uuid()).collect();
        let mut identities = self.identities_of(&ids).await?;
        for profile in &mut profiles {
            profile.identities = identities.remove(profile.id.as_uuid()).unwrap_or_default();
        }
        Ok(profiles)
    }

    async fn first_profile(&self, row: Option<PgRow>) -> StoreResult<Option<Profile>> {
        match row {
            Some(row) => Ok(self.hydrate_profiles(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode", e))
}

fn profile_from_row(row: &PgRow) -> StoreResult<Profile> {
    Ok(Profile {
        id: ProfileId::from_uuid(col(row, "id")?),
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        full_name: col(row, "full_name")?,
        avatar_url: col(row, "avatar_url")?,
        is_admin: col(row, "is_admin")?,
        pro_start_date: col(row, "pro_start_date")?,
        pro_expiry: col(row, "pro_expiry")?,
        identities: Vec::new(),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn location_from_row(row: &PgRow) -> StoreResult<Location> {
    Ok(Location {
        id: LocationId::from_uuid(col(row, "id")?),
        user_id: ProfileId::from_uuid(col(row, "user_id")?),
        name: col(row, "name")?,
        parent_id: col::<Option<Uuid>>(row, "parent_id")?.map(LocationId::from_uuid),
        created_at: col(row, "created_at")?,
    })
}

fn category_from_row(row: &PgRow) -> StoreResult<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(col(row, "id")?),
        user_id: ProfileId::from_uuid(col(row, "user_id")?),
        name: col(row, "name")?,
        icon: col(row, "icon")?,
        created_at: col(row, "created_at")?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<Item> {
    let status: String = col(row, "status")?;
    let status: ItemStatus = status
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown item status '{status}'")))?;
    let price = col::<Option<i64>>(row, "price_cents")?
        .map(Price::from_cents)
        .transpose()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let Json(ai_tags): Json<Vec<String>> = col(row, "ai_tags")?;

    Ok(Item {
        id: ItemId::from_uuid(col(row, "id")?),
        user_id: ProfileId::from_uuid(col(row, "user_id")?),
        name: col(row, "name")?,
        description: col(row, "description")?,
        price,
        quantity: col(row, "quantity")?,
        serial_number: col(row, "serial_number")?,
        warranty_expires: col(row, "warranty_expires")?,
        photo_url: col(row, "photo_url")?,
        status,
        category: col(row, "category")?,
        category_id: col::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        location_id: col::<Option<Uuid>>(row, "location_id")?.map(LocationId::from_uuid),
        ai_tags,
        borrower: col(row, "borrower")?,
        borrower_note: col(row, "borrower_note")?,
        lent_at: col(row, "lent_at")?,
        due_date: col(row, "due_date")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn log_from_row(row: &PgRow) -> StoreResult<LendingLog> {
    Ok(LendingLog {
        id: LendingLogId::from_uuid(col(row, "id")?),
        item_id: ItemId::from_uuid(col(row, "item_id")?),
        user_id: ProfileId::from_uuid(col(row, "user_id")?),
        borrower: col(row, "borrower")?,
        due_date: col(row, "due_date")?,
        returned_at: col(row, "returned_at")?,
        created_at: col(row, "created_at")?,
    })
}

const PROFILE_COLUMNS: &str =
    "id, email, password_hash, full_name, avatar_url, is_admin, pro_start_date, pro_expiry, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, user_id, name, description, price_cents, quantity, serial_number, \
     warranty_expires, photo_url, status, category, category_id, location_id, ai_tags, borrower, \
     borrower_note, lent_at, due_date, created_at, updated_at";

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_item_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, owner: ProfileId, filter: &'a ItemFilter) {
    qb.push(" WHERE user_id = ").push_bind(*owner.as_uuid());
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(*category_id.as_uuid());
    }
    if let Some(ids) = &filter.location_ids {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        qb.push(" AND location_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR serial_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

async fn write_identities(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    profile: &Profile,
    operation: &str,
) -> StoreResult<()> {
    for identity in &profile.identities {
        sqlx::query("INSERT INTO profile_identities (profile_id, provider, external_id) VALUES ($1, $2, $3)")
            .bind(profile.id.as_uuid())
            .bind(identity.provider.as_str())
            .bind(&identity.external_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
    }
    Ok(())
}

/// Full-row item write, conditional on the status the caller read.
async fn write_item_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    item: &Item,
    read_status: ItemStatus,
    operation: &str,
) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE items SET
            name = $3, description = $4, price_cents = $5, quantity = $6, serial_number = $7,
            warranty_expires = $8, photo_url = $9, status = $10, category = $11, category_id = $12,
            location_id = $13, ai_tags = $14, borrower = $15, borrower_note = $16, lent_at = $17,
            due_date = $18, updated_at = $19
        WHERE id = $1 AND user_id = $2 AND status = $20
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(item.user_id.as_uuid())
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price.map(|p| p.cents()))
    .bind(item.quantity)
    .bind(&item.serial_number)
    .bind(item.warranty_expires)
    .bind(&item.photo_url)
    .bind(item.status.as_str())
    .bind(&item.category)
    .bind(item.category_id.map(Uuid::from))
    .bind(item.location_id.map(Uuid::from))
    .bind(Json(&item.ai_tags))
    .bind(&item.borrower)
    .bind(&item.borrower_note)
    .bind(item.lent_at)
    .bind(item.due_date)
    .bind(item.updated_at)
    .bind(read_status.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error(operation, e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "item {} is no longer {read_status}",
            item.id
        )));
    }
    Ok(())
}

fn ensure_written(rows: u64, what: &str) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::Database(format!("{what} vanished before it could be written")));
    }
    Ok(())
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        crate::db::health_check(&self.pool).await
    }

    // ── profiles ────────────────────────────────────────────────────────────

    #[instrument(skip(self, profile), fields(profile_id = %profile.id), err)]
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("insert_profile", e))?;
        sqlx::query(
            r#"
            INSERT INTO profiles
                (id, email, password_hash, full_name, avatar_url, is_admin, pro_start_date, pro_expiry, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.email)
        .bind(&profile.password_hash)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.is_admin)
        .bind(profile.pro_start_date)
        .bind(profile.pro_expiry)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_profile", e))?;
        write_identities(&mut tx, profile, "insert_profile").await?;
        tx.commit().await.map_err(|e| map_sqlx_error("insert_profile", e))?;
        Ok(())
    }

    #[instrument(skip(self, profile), fields(profile_id = %profile.id), err)]
    async fn update_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("update_profile", e))?;
        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                email = $2, password_hash = $3, full_name = $4, avatar_url = $5, is_admin = $6,
                pro_start_date = $7, pro_expiry = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.email)
        .bind(&profile.password_hash)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(profile.is_admin)
        .bind(profile.pro_start_date)
        .bind(profile.pro_expiry)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;
        ensure_written(result.rows_affected(), "profile")?;

        sqlx::query("DELETE FROM profile_identities WHERE profile_id = $1")
            .bind(profile.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_profile", e))?;
        write_identities(&mut tx, profile, "update_profile").await?;
        tx.commit().await.map_err(|e| map_sqlx_error("update_profile", e))?;
        Ok(())
    }

    async fn find_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_profile", e))?;
        self.first_profile(row).await
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_profile_by_email", e))?;
        self.first_profile(row).await
    }

    async fn find_profile_by_identity(
        &self,
        provider: IdentityProvider,
        external_id: &str,
    ) -> StoreResult<Option<Profile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = \
             (SELECT profile_id FROM profile_identities WHERE provider = $1 AND external_id = $2)"
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_profile_by_identity", e))?;
        self.first_profile(row).await
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_profiles", e))?;
        self.hydrate_profiles(rows).await
    }

    #[instrument(skip(self), fields(profile_id = %id), err)]
    async fn delete_profile(&self, id: ProfileId) -> StoreResult<bool> {
        // Owned rows go with the profile through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_profile", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_profiles(&self, now: DateTime<Utc>) -> StoreResult<ProfileCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE pro_expiry > $1) AS pro FROM profiles",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_profiles", e))?;
        let total: i64 = col(&row, "total")?;
        let pro: i64 = col(&row, "pro")?;
        Ok(ProfileCounts {
            total: total.max(0) as u64,
            pro: pro.max(0) as u64,
        })
    }

    // ── locations ───────────────────────────────────────────────────────────

    #[instrument(skip(self, location), fields(location_id = %location.id, owner = %location.user_id), err)]
    async fn insert_location(&self, location: &Location) -> StoreResult<()> {
        sqlx::query("INSERT INTO locations (id, user_id, name, parent_id, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(location.id.as_uuid())
            .bind(location.user_id.as_uuid())
            .bind(&location.name)
            .bind(location.parent_id.map(Uuid::from))
            .bind(location.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    #[instrument(skip(self, location), fields(location_id = %location.id, owner = %location.user_id), err)]
    async fn update_location(&self, location: &Location) -> StoreResult<()> {
        let result = sqlx::query("UPDATE locations SET name = $3, parent_id = $4 WHERE id = $1 AND user_id = $2")
            .bind(location.id.as_uuid())
            .bind(location.user_id.as_uuid())
            .bind(&location.name)
            .bind(location.parent_id.map(Uuid::from))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_location", e))?;
        ensure_written(result.rows_affected(), "location")
    }

    async fn find_location(&self, owner: ProfileId, id: LocationId) -> StoreResult<Option<Location>> {
        let row = sqlx::query("SELECT id, user_id, name, parent_id, created_at FROM locations WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_location", e))?;
        row.as_ref().map(location_from_row).transpose()
    }

    async fn list_locations(&self, owner: ProfileId) -> StoreResult<Vec<Location>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, parent_id, created_at FROM locations WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_locations", e))?;
        rows.iter().map(location_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(owner = %owner, count = ids.len()), err)]
    async fn delete_locations(&self, owner: ProfileId, ids: &[LocationId]) -> StoreResult<SubtreeDeletion> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("delete_locations", e))?;

        let items = sqlx::query("DELETE FROM items WHERE user_id = $1 AND location_id = ANY($2)")
            .bind(owner.as_uuid())
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_locations", e))?
            .rows_affected();

        let locations = sqlx::query("DELETE FROM locations WHERE user_id = $1 AND id = ANY($2)")
            .bind(owner.as_uuid())
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_locations", e))?
            .rows_affected();

        tx.commit().await.map_err(|e| map_sqlx_error("delete_locations", e))?;
        Ok(SubtreeDeletion { locations, items })
    }

    // ── categories ──────────────────────────────────────────────────────────

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, user_id, name, icon, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(category.id.as_uuid())
            .bind(category.user_id.as_uuid())
            .bind(&category.name)
            .bind(&category.icon)
            .bind(category.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        let result = sqlx::query("UPDATE categories SET name = $3, icon = $4 WHERE id = $1 AND user_id = $2")
            .bind(category.id.as_uuid())
            .bind(category.user_id.as_uuid())
            .bind(&category.name)
            .bind(&category.icon)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_category", e))?;
        ensure_written(result.rows_affected(), "category")
    }

    async fn find_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<Option<Category>> {
        let row = sqlx::query("SELECT id, user_id, name, icon, created_at FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_categories(&self, owner: ProfileId) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, icon, created_at FROM categories WHERE user_id = $1 ORDER BY name, id",
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    async fn delete_category(&self, owner: ProfileId, id: CategoryId) -> StoreResult<bool> {
        // items.category_id is cleared by ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(result.rows_affected() > 0)
    }

    // ── items ───────────────────────────────────────────────────────────────

    #[instrument(skip(self, item), fields(item_id = %item.id, owner = %item.user_id), err)]
    async fn insert_item(&self, item: &Item) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO items ({ITEM_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"
        ))
        .bind(item.id.as_uuid())
        .bind(item.user_id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price.map(|p| p.cents()))
        .bind(item.quantity)
        .bind(&item.serial_number)
        .bind(item.warranty_expires)
        .bind(&item.photo_url)
        .bind(item.status.as_str())
        .bind(&item.category)
        .bind(item.category_id.map(Uuid::from))
        .bind(item.location_id.map(Uuid::from))
        .bind(Json(&item.ai_tags))
        .bind(&item.borrower)
        .bind(&item.borrower_note)
        .bind(item.lent_at)
        .bind(item.due_date)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    async fn find_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND user_id = $2"))
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn find_items(&self, owner: ProfileId, ids: &[ItemId]) -> StoreResult<Vec<Item>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE user_id = $1 AND id = ANY($2)"))
            .bind(owner.as_uuid())
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, filter), fields(owner = %owner, page = page.page, limit = page.limit), err)]
    async fn list_items(&self, owner: ProfileId, filter: &ItemFilter, page: PageRequest) -> StoreResult<Page<Item>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM items");
        push_item_filters(&mut count, owner, filter);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))
            .and_then(|row| col(&row, "total"))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ITEM_COLUMNS} FROM items"));
        push_item_filters(&mut select, owner, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        let items = rows.iter().map(item_from_row).collect::<StoreResult<Vec<_>>>()?;

        Ok(Page::new(items, total.max(0) as u64, page))
    }

    async fn all_items(&self, owner: ProfileId) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("all_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, owner = %item.user_id), err)]
    async fn update_item(
        &self,
        item: &Item,
        read_status: ItemStatus,
        close_open_log_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("update_item", e))?;
        write_item_row(&mut tx, item, read_status, "update_item").await?;
        if let Some(at) = close_open_log_at {
            sqlx::query("UPDATE lending_logs SET returned_at = $1 WHERE item_id = $2 AND returned_at IS NULL")
                .bind(at)
                .bind(item.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_item", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("update_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item, log), fields(item_id = %item.id, log_id = %log.id), err)]
    async fn lend_item(&self, item: &Item, log: &LendingLog) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("lend_item", e))?;

        // Conditional write: a concurrent lend that committed first makes this a no-op.
        let result = sqlx::query(
            r#"
            UPDATE items SET
                status = $3, borrower = $4, borrower_note = $5, lent_at = $6, due_date = $7, updated_at = $8
            WHERE id = $1 AND user_id = $2 AND status <> 'lent'
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.user_id.as_uuid())
        .bind(item.status.as_str())
        .bind(&item.borrower)
        .bind(&item.borrower_note)
        .bind(item.lent_at)
        .bind(item.due_date)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lend_item", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("item {} is already lent", item.id)));
        }

        sqlx::query(
            "INSERT INTO lending_logs (id, item_id, user_id, borrower, due_date, returned_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(log.id.as_uuid())
        .bind(log.item_id.as_uuid())
        .bind(log.user_id.as_uuid())
        .bind(&log.borrower)
        .bind(log.due_date)
        .bind(log.returned_at)
        .bind(log.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lend_item", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("lend_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn return_item(&self, item: &Item, returned_at: DateTime<Utc>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("return_item", e))?;
        write_item_row(&mut tx, item, ItemStatus::Lent, "return_item").await?;
        sqlx::query(
            r#"
            UPDATE lending_logs SET returned_at = $1
            WHERE id = (
                SELECT id FROM lending_logs
                WHERE item_id = $2 AND returned_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(returned_at)
        .bind(item.id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("return_item", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("return_item", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner = %owner, item_id = %id), err)]
    async fn delete_item(&self, owner: ProfileId, id: ItemId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, selector), fields(owner = %owner), err)]
    async fn retag_items(
        &self,
        owner: ProfileId,
        selector: &CategoryMatch,
        new_tag: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE items SET category = ");
        qb.push_bind(new_tag.map(str::to_string))
            .push(", updated_at = ")
            .push_bind(now)
            .push(" WHERE user_id = ")
            .push_bind(*owner.as_uuid());
        match selector {
            CategoryMatch::Unassigned => {
                qb.push(" AND (category IS NULL OR category = ")
                    .push_bind(UNCATEGORIZED)
                    .push(")");
            }
            CategoryMatch::Named(name) => {
                qb.push(" AND category = ").push_bind(name.clone());
            }
        }
        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("retag_items", e))?;
        Ok(result.rows_affected())
    }

    // ── lending logs ────────────────────────────────────────────────────────

    async fn list_lending_logs(
        &self,
        owner: ProfileId,
        filter: &LendingLogFilter,
        limit: Option<u32>,
    ) -> StoreResult<Vec<LendingLog>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, item_id, user_id, borrower, due_date, returned_at, created_at FROM lending_logs WHERE user_id = ",
        );
        qb.push_bind(*owner.as_uuid());
        if let Some(item_id) = filter.item_id {
            qb.push(" AND item_id = ").push_bind(*item_id.as_uuid());
        }
        if let Some(start) = filter.start {
            qb.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND created_at <= ").push_bind(end);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_lending_logs", e))?;
        rows.iter().map(log_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("drill"), "%drill%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn item_filters_are_always_owner_scoped() {
        let owner = ProfileId::new();
        let filter = ItemFilter {
            status: Some(ItemStatus::Lent),
            search: Some("saw".into()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM items");
        push_item_filters(&mut qb, owner, &filter);
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT 1 FROM items WHERE user_id = $1"));
        assert!(sql.contains("status = $2"));
        assert!(sql.contains("name ILIKE $3"));
    }
}
