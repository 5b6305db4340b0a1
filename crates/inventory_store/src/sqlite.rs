//! SQLite inventory store.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds,
//! `Z` suffix) so they order correctly as text. Prices are stored as decimal
//! strings.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use entities::{
    Activity, ApiToken, Category, Product, Role, SignupCode, Transaction, TransactionKind, User,
    UserStatus, normalize_email,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::ledger::{self, StockAdjustment};
use crate::{
    ActivityFilter, InventoryStore, LedgerReceipt, ProductFilter, ProductSort, StoreError,
    StoreResult, TransactionAmendment, TransactionFilter, UserChanges,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    status TEXT NOT NULL,
    name TEXT,
    two_factor_enabled INTEGER NOT NULL DEFAULT 0,
    two_factor_secret TEXT,
    last_login_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    price TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    category_id TEXT REFERENCES categories(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category_id ON products(category_id);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY NOT NULL,
    product_id TEXT NOT NULL REFERENCES products(id),
    type TEXT NOT NULL CHECK (type IN ('in', 'out')),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_product_id ON transactions(product_id);

CREATE TABLE IF NOT EXISTS signup_codes (
    id TEXT PRIMARY KEY NOT NULL,
    code TEXT NOT NULL UNIQUE,
    role TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_tokens (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY NOT NULL,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    details TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_timestamp ON activities(timestamp);

-- Every ledger operation bumps this row first, taking the write lock before
-- it reads any stock level.
CREATE TABLE IF NOT EXISTS ledger_state (
    id INTEGER PRIMARY KEY NOT NULL,
    generation INTEGER NOT NULL
);

INSERT OR IGNORE INTO ledger_state (id, generation) VALUES (1, 0);
"#;

const USER_COLUMNS: &str = "id, email, password_hash, role, status, name, two_factor_enabled, \
                            two_factor_secret, last_login_at, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, description, price, quantity, category_id, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, product_id, type, quantity, date";
const API_TOKEN_COLUMNS: &str = "id, name, token, user_id, created_at, expires_at, last_used_at";

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {value:?}: {e}")))
}

fn parse_optional_time(value: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

fn parse_id(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("invalid id {value:?}: {e}")))
}

fn parse_field<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::Corrupt)
}

/// Maps unique and foreign key violations to store errors.
fn map_constraint(err: sqlx::Error, entity_type: &'static str, id: impl ToString) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::already_exists(entity_type, id);
        }
        if db.is_foreign_key_violation() {
            return StoreError::conflict(format!(
                "{entity_type} {} is referenced by other records",
                id.to_string()
            ));
        }
    }
    StoreError::Database(err)
}

/// Database row for User
#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    name: Option<String>,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            email: row.email,
            password_hash: row.password_hash,
            role: parse_field::<Role>(&row.role)?,
            status: parse_field::<UserStatus>(&row.status)?,
            name: row.name,
            two_factor_enabled: row.two_factor_enabled,
            two_factor_secret: row.two_factor_secret,
            last_login_at: parse_optional_time(row.last_login_at)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for Category
#[derive(Debug, FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> StoreResult<Self> {
        Ok(Category {
            id: parse_id(&row.id)?,
            name: row.name,
            description: row.description,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for Product
#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: Option<String>,
    price: String,
    quantity: i64,
    category_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        Ok(Product {
            id: parse_id(&row.id)?,
            name: row.name,
            description: row.description,
            price: Decimal::from_str(&row.price)
                .map_err(|e| StoreError::Corrupt(format!("invalid price {:?}: {e}", row.price)))?,
            quantity: row.quantity,
            category_id: row.category_id.as_deref().map(parse_id).transpose()?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for Transaction
#[derive(Debug, FromRow)]
struct TransactionRow {
    id: String,
    product_id: String,
    #[sqlx(rename = "type")]
    kind: String,
    quantity: i64,
    date: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> StoreResult<Self> {
        Ok(Transaction {
            id: parse_id(&row.id)?,
            product_id: parse_id(&row.product_id)?,
            kind: parse_field::<TransactionKind>(&row.kind)?,
            quantity: row.quantity,
            date: parse_time(&row.date)?,
        })
    }
}

/// Database row for SignupCode
#[derive(Debug, FromRow)]
struct SignupCodeRow {
    id: String,
    code: String,
    role: Option<String>,
    created_at: String,
    expires_at: String,
}

impl TryFrom<SignupCodeRow> for SignupCode {
    type Error = StoreError;

    fn try_from(row: SignupCodeRow) -> StoreResult<Self> {
        Ok(SignupCode {
            id: parse_id(&row.id)?,
            code: row.code,
            role: row.role.as_deref().map(parse_field::<Role>).transpose()?,
            created_at: parse_time(&row.created_at)?,
            expires_at: parse_time(&row.expires_at)?,
        })
    }
}

/// Database row for ApiToken
#[derive(Debug, FromRow)]
struct ApiTokenRow {
    id: String,
    name: String,
    token: String,
    user_id: String,
    created_at: String,
    expires_at: Option<String>,
    last_used_at: Option<String>,
}

impl TryFrom<ApiTokenRow> for ApiToken {
    type Error = StoreError;

    fn try_from(row: ApiTokenRow) -> StoreResult<Self> {
        Ok(ApiToken {
            id: parse_id(&row.id)?,
            name: row.name,
            token: row.token,
            user_id: parse_id(&row.user_id)?,
            created_at: parse_time(&row.created_at)?,
            expires_at: parse_optional_time(row.expires_at)?,
            last_used_at: parse_optional_time(row.last_used_at)?,
        })
    }
}

/// Database row for Activity
#[derive(Debug, FromRow)]
struct ActivityRow {
    id: String,
    actor: String,
    action: String,
    details: String,
    timestamp: String,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = StoreError;

    fn try_from(row: ActivityRow) -> StoreResult<Self> {
        Ok(Activity {
            id: parse_id(&row.id)?,
            actor: row.actor,
            action: row.action,
            details: serde_json::from_str(&row.details)?,
            timestamp: parse_time(&row.timestamp)?,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// SQLite-backed inventory store.
#[derive(Debug, Clone)]
pub struct SqliteInventoryStore {
    pool: Pool<Sqlite>,
}

impl SqliteInventoryStore {
    /// Connects to `url` (e.g. `sqlite:inventory.db`) and creates the schema.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        // Each connection to `:memory:` is its own database, so keep exactly one.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Opens a fresh in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        tracing::debug!("Inventory schema ready");
        Ok(())
    }

    async fn fetch_product(conn: &mut SqliteConnection, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?;
        row.map(Product::try_from).transpose()
    }

    async fn fetch_transaction(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
        row.map(Transaction::try_from).transpose()
    }

    /// Takes the ledger write lock for the current transaction.
    ///
    /// Must be the first statement of the transaction: a write that opens the
    /// transaction waits out other writers instead of failing as busy.
    async fn lock_ledger(conn: &mut SqliteConnection) -> StoreResult<()> {
        sqlx::query("UPDATE ledger_state SET generation = generation + 1 WHERE id = 1")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Settles `adjustments` against stored quantities and writes the result.
    ///
    /// Must run inside a transaction that already holds the ledger lock.
    async fn apply_adjustments(
        conn: &mut SqliteConnection,
        adjustments: &[StockAdjustment],
        now: &str,
    ) -> StoreResult<Vec<Product>> {
        let mut stored: HashMap<Uuid, Option<i64>> = HashMap::new();
        for adjustment in adjustments {
            if stored.contains_key(&adjustment.product_id) {
                continue;
            }
            let quantity: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM products WHERE id = ?")
                    .bind(adjustment.product_id.to_string())
                    .fetch_optional(&mut *conn)
                    .await?;
            stored.insert(adjustment.product_id, quantity);
        }

        let settled = ledger::settle(adjustments, |id| stored.get(&id).copied().flatten())?;

        let mut touched = Vec::with_capacity(settled.len());
        for (product_id, quantity) in settled {
            let before = stored.get(&product_id).copied().flatten().unwrap_or(quantity);
            let delta = quantity - before;
            if delta != 0 {
                let result = sqlx::query(
                    "UPDATE products SET quantity = quantity + ?1, updated_at = ?2 \
                     WHERE id = ?3 AND quantity + ?1 >= 0",
                )
                .bind(delta)
                .bind(now)
                .bind(product_id.to_string())
                .execute(&mut *conn)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::conflict(format!(
                        "Stock for product {product_id} changed during the update"
                    )));
                }
            }
            let product = Self::fetch_product(conn, product_id)
                .await?
                .ok_or_else(|| StoreError::not_found("Product", product_id))?;
            touched.push(product);
        }
        Ok(touched)
    }

    async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO transactions (id, product_id, type, quantity, date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tx.id.to_string())
        .bind(tx.product_id.to_string())
        .bind(tx.kind.as_str())
        .bind(tx.quantity)
        .bind(format_time(&tx.date))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_constraint(e, "Transaction", tx.id))?;
        Ok(())
    }

    async fn category_exists(&self, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn product_exists(&self, id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&user.name)
        .bind(user.two_factor_enabled)
        .bind(&user.two_factor_secret)
        .bind(user.last_login_at.as_ref().map(format_time))
        .bind(format_time(&user.created_at))
        .bind(format_time(&user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "User", &user.email))?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email"))
                .fetch_all(&self.pool)
                .await?;
        convert_all(rows)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let email = changes.email.as_deref().map(normalize_email);
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        query.push_bind(format_time(&Utc::now()));
        if let Some(email) = &email {
            query.push(", email = ").push_bind(email.clone());
        }
        if let Some(password_hash) = changes.password_hash {
            query.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(role) = changes.role {
            query.push(", role = ").push_bind(role.as_str());
        }
        if let Some(status) = changes.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(name) = changes.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(enabled) = changes.two_factor_enabled {
            query.push(", two_factor_enabled = ").push_bind(enabled);
        }
        if let Some(secret) = changes.two_factor_secret {
            query.push(", two_factor_secret = ").push_bind(secret);
        }
        if let Some(at) = changes.last_login_at {
            query.push(", last_login_at = ").push_bind(format_time(&at));
        }
        query.push(" WHERE id = ").push_bind(id.to_string());
        query.push(format!(" RETURNING {USER_COLUMNS}"));
        let row: Option<UserRow> = query
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "User", email.as_deref().unwrap_or_default()))?;

        row.ok_or_else(|| StoreError::not_found("User", id))?
            .try_into()
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM users WHERE id = ? AND (SELECT COUNT(*) FROM users) > 1")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            if self.get_user(id).await?.is_none() {
                return Err(StoreError::not_found("User", id));
            }
            return Err(StoreError::conflict("Cannot delete the last user"));
        }
        Ok(())
    }

    // =========================================================================
    // Category operations
    // =========================================================================

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(format_time(&category.created_at))
        .bind(format_time(&category.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Category", category.id))?;
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Category::try_from).transpose()
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ? \
             RETURNING id, name, description, created_at, updated_at",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(format_time(&Utc::now()))
        .bind(category.id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Category::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("Category", category.id))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM categories WHERE id = ?1 \
             AND NOT EXISTS (SELECT 1 FROM products WHERE category_id = ?1)",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Category", id))?;
        if result.rows_affected() == 0 {
            if !self.category_exists(id).await? {
                return Err(StoreError::not_found("Category", id));
            }
            return Err(StoreError::conflict(format!("Category {id} still has products")));
        }
        Ok(())
    }

    // =========================================================================
    // Product operations
    // =========================================================================

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        if let Some(category_id) = product.category_id {
            if !self.category_exists(category_id).await? {
                return Err(StoreError::not_found("Category", category_id));
            }
        }
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(product.quantity)
        .bind(product.category_id.map(|id| id.to_string()))
        .bind(format_time(&product.created_at))
        .bind(format_time(&product.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Product", product.id))?;
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_product(&mut conn, id).await
    }

    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>> {
        let sort = match filter.sort {
            ProductSort::Price => "CAST(price AS REAL)",
            other => other.column(),
        };
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE (?1 IS NULL OR category_id = ?1) \
             ORDER BY {sort} {}, id",
            filter.order.as_sql()
        ))
        .bind(filter.category_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        if let Some(category_id) = product.category_id {
            if !self.category_exists(category_id).await? {
                return Err(StoreError::not_found("Category", category_id));
            }
        }
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET name = ?, description = ?, price = ?, category_id = ?, \
             updated_at = ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(product.category_id.map(|id| id.to_string()))
        .bind(format_time(&Utc::now()))
        .bind(product.id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Product", product.id))?;
        row.map(Product::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("Product", product.id))
    }

    async fn attach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product> {
        if !self.category_exists(category_id).await? {
            return Err(StoreError::not_found("Category", category_id));
        }
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET category_id = ?1, \
             updated_at = CASE WHEN category_id IS ?1 THEN updated_at ELSE ?2 END \
             WHERE id = ?3 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(category_id.to_string())
        .bind(format_time(&Utc::now()))
        .bind(product_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Category", category_id))?;
        row.map(Product::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("Product", product_id))
    }

    async fn detach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product> {
        sqlx::query("UPDATE products SET category_id = NULL, updated_at = ? WHERE id = ? AND category_id = ?")
            .bind(format_time(&Utc::now()))
            .bind(product_id.to_string())
            .bind(category_id.to_string())
            .execute(&self.pool)
            .await?;
        self.get_product(product_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Product", product_id))
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM products WHERE id = ?1 \
             AND NOT EXISTS (SELECT 1 FROM transactions WHERE product_id = ?1)",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "Product", id))?;
        if result.rows_affected() == 0 {
            if !self.product_exists(id).await? {
                return Err(StoreError::not_found("Product", id));
            }
            return Err(StoreError::conflict(format!("Product {id} still has transactions")));
        }
        Ok(())
    }

    // =========================================================================
    // Transaction (ledger) operations
    // =========================================================================

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_transaction(&mut conn, id).await
    }

    async fn list_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE (?1 IS NULL OR product_id = ?1) \
             ORDER BY {} {}, id",
            filter.sort.column(),
            filter.order.as_sql()
        ))
        .bind(filter.product_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn record_transaction(&self, transaction: Transaction) -> StoreResult<LedgerReceipt> {
        let now = format_time(&Utc::now());
        let mut tx = self.pool.begin().await?;
        Self::lock_ledger(&mut tx).await?;

        let products =
            Self::apply_adjustments(&mut tx, &ledger::plan_record(&transaction), &now).await?;
        Self::insert_transaction(&mut tx, &transaction).await?;

        tx.commit().await?;
        Ok(LedgerReceipt {
            transaction,
            products,
        })
    }

    async fn amend_transaction(&self, amendment: TransactionAmendment) -> StoreResult<LedgerReceipt> {
        let now = format_time(&Utc::now());
        let mut tx = self.pool.begin().await?;
        Self::lock_ledger(&mut tx).await?;

        let current = Self::fetch_transaction(&mut tx, amendment.transaction_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Transaction", amendment.transaction_id))?;
        let amended = amendment.applied_to(&current);
        let target = Self::fetch_product(&mut tx, amended.product_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Product", amended.product_id))?;

        let mut products =
            Self::apply_adjustments(&mut tx, &ledger::plan_amend(&current, &amended), &now).await?;
        if products.is_empty() {
            products.push(target);
        }

        sqlx::query("UPDATE transactions SET product_id = ?, type = ?, quantity = ?, date = ? WHERE id = ?")
            .bind(amended.product_id.to_string())
            .bind(amended.kind.as_str())
            .bind(amended.quantity)
            .bind(format_time(&amended.date))
            .bind(amended.id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(LedgerReceipt {
            transaction: amended,
            products,
        })
    }

    async fn reverse_transaction(&self, id: Uuid) -> StoreResult<LedgerReceipt> {
        let now = format_time(&Utc::now());
        let mut tx = self.pool.begin().await?;
        Self::lock_ledger(&mut tx).await?;

        let transaction = Self::fetch_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("Transaction", id))?;
        let products =
            Self::apply_adjustments(&mut tx, &ledger::plan_reverse(&transaction), &now).await?;

        sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(LedgerReceipt {
            transaction,
            products,
        })
    }

    // =========================================================================
    // Signup code operations
    // =========================================================================

    async fn create_signup_code(&self, code: SignupCode) -> StoreResult<SignupCode> {
        sqlx::query(
            "INSERT INTO signup_codes (id, code, role, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(code.id.to_string())
        .bind(&code.code)
        .bind(code.role.map(|r| r.as_str()))
        .bind(format_time(&code.created_at))
        .bind(format_time(&code.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "SignupCode", &code.code))?;
        Ok(code)
    }

    async fn take_signup_code(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<SignupCode>> {
        let row: Option<SignupCodeRow> = sqlx::query_as(
            "DELETE FROM signup_codes WHERE code = ? \
             RETURNING id, code, role, created_at, expires_at",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        let taken = row.map(SignupCode::try_from).transpose()?;
        Ok(taken.filter(|c| !c.is_expired_at(now)))
    }

    async fn purge_expired_signup_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM signup_codes WHERE expires_at <= ?")
            .bind(format_time(&now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // API token operations
    // =========================================================================

    async fn create_api_token(&self, token: ApiToken) -> StoreResult<ApiToken> {
        sqlx::query(&format!(
            "INSERT INTO api_tokens ({API_TOKEN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(token.id.to_string())
        .bind(&token.name)
        .bind(&token.token)
        .bind(token.user_id.to_string())
        .bind(format_time(&token.created_at))
        .bind(token.expires_at.as_ref().map(format_time))
        .bind(token.last_used_at.as_ref().map(format_time))
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "ApiToken", token.id))?;
        Ok(token)
    }

    async fn get_api_token(&self, id: Uuid) -> StoreResult<Option<ApiToken>> {
        let row: Option<ApiTokenRow> =
            sqlx::query_as(&format!("SELECT {API_TOKEN_COLUMNS} FROM api_tokens WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(ApiToken::try_from).transpose()
    }

    async fn list_api_tokens(&self) -> StoreResult<Vec<ApiToken>> {
        let rows: Vec<ApiTokenRow> = sqlx::query_as(&format!(
            "SELECT {API_TOKEN_COLUMNS} FROM api_tokens ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_api_token(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("ApiToken", id));
        }
        Ok(())
    }

    async fn authenticate_api_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<ApiToken>> {
        let now = format_time(&now);
        let row: Option<ApiTokenRow> = sqlx::query_as(&format!(
            "UPDATE api_tokens SET last_used_at = ?1 \
             WHERE token = ?2 AND (expires_at IS NULL OR expires_at >= ?1) \
             RETURNING {API_TOKEN_COLUMNS}"
        ))
        .bind(&now)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApiToken::try_from).transpose()
    }

    // =========================================================================
    // Activity operations
    // =========================================================================

    async fn append_activity(&self, activity: Activity) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO activities (id, actor, action, details, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(activity.id.to_string())
        .bind(&activity.actor)
        .bind(&activity.action)
        .bind(serde_json::to_string(&activity.details)?)
        .bind(format_time(&activity.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activities(&self, filter: ActivityFilter) -> StoreResult<(Vec<Activity>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(&self.pool)
            .await?;
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let offset = i64::from(filter.offset.unwrap_or(0));
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT id, actor, action, details, timestamp FROM activities \
             ORDER BY timestamp DESC, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((convert_all(rows)?, total as u64))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{SortOrder, ViolationKind};

    async fn store() -> SqliteInventoryStore {
        SqliteInventoryStore::in_memory().await.unwrap()
    }

    async fn product_with(store: &SqliteInventoryStore, quantity: i64) -> Product {
        store
            .create_product(Product::new("Bolt", Decimal::new(15, 2)).with_quantity(quantity))
            .await
            .unwrap()
    }

    async fn quantity_of(store: &SqliteInventoryStore, id: Uuid) -> i64 {
        store.get_product(id).await.unwrap().unwrap().quantity
    }

    #[tokio::test]
    async fn test_product_round_trip() {
        let store = store().await;
        let category = store.create_category(Category::new("Hardware")).await.unwrap();
        let product = store
            .create_product(
                Product::new("Hinge", Decimal::new(1999, 2))
                    .with_description("Brass")
                    .with_quantity(4)
                    .with_category(category.id),
            )
            .await
            .unwrap();

        let loaded = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Hinge");
        assert_eq!(loaded.price, Decimal::new(1999, 2));
        assert_eq!(loaded.quantity, 4);
        assert_eq!(loaded.category_id, Some(category.id));
    }

    #[tokio::test]
    async fn test_ledger_scenario() {
        let store = store().await;
        let product = product_with(&store, 0).await;

        store
            .record_transaction(Transaction::new(product.id, TransactionKind::In, 10))
            .await
            .unwrap();
        let err = store
            .record_transaction(Transaction::new(product.id, TransactionKind::Out, 15))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Stock(v) if v.kind == ViolationKind::InsufficientStock
        ));
        assert_eq!(quantity_of(&store, product.id).await, 10);
        let all = store.list_transactions(TransactionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_amend_and_reverse() {
        let store = store().await;
        let first = product_with(&store, 10).await;
        let second = product_with(&store, 1).await;

        let receipt = store
            .record_transaction(Transaction::new(first.id, TransactionKind::Out, 4))
            .await
            .unwrap();
        assert_eq!(receipt.product(first.id).unwrap().quantity, 6);

        let amended = store
            .amend_transaction(TransactionAmendment {
                transaction_id: receipt.transaction.id,
                product_id: second.id,
                kind: TransactionKind::In,
                quantity: 2,
                date: None,
            })
            .await
            .unwrap();
        assert_eq!(amended.products.len(), 2);
        assert_eq!(quantity_of(&store, first.id).await, 10);
        assert_eq!(quantity_of(&store, second.id).await, 3);

        store.reverse_transaction(receipt.transaction.id).await.unwrap();
        assert_eq!(quantity_of(&store, second.id).await, 1);
        assert!(store.get_transaction(receipt.transaction.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_amend_rolls_back() {
        let store = store().await;
        let product = product_with(&store, 5).await;
        let receipt = store
            .record_transaction(Transaction::new(product.id, TransactionKind::Out, 5))
            .await
            .unwrap();

        let err = store
            .amend_transaction(TransactionAmendment {
                transaction_id: receipt.transaction.id,
                product_id: product.id,
                kind: TransactionKind::Out,
                quantity: 6,
                date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stock(_)));
        assert_eq!(quantity_of(&store, product.id).await, 0);
        let stored = store.get_transaction(receipt.transaction.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_outs_never_overdraw() {
        let store = store().await;
        let product = product_with(&store, 10).await;

        let (a, b) = tokio::join!(
            store.record_transaction(Transaction::new(product.id, TransactionKind::Out, 8)),
            store.record_transaction(Transaction::new(product.id, TransactionKind::Out, 8)),
        );
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!([a, b].into_iter().any(|r| matches!(r, Err(StoreError::Stock(_)))));
        assert_eq!(quantity_of(&store, product.id).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_outs_on_file_database_never_overdraw() {
        let path = std::env::temp_dir().join(format!("inventory-{}.db", Uuid::new_v4()));
        let store = SqliteInventoryStore::connect(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        let product = product_with(&store, 10).await;

        let mut racers = tokio::task::JoinSet::new();
        for _ in 0..5 {
            let store = store.clone();
            racers.spawn(async move {
                store
                    .record_transaction(Transaction::new(product.id, TransactionKind::Out, 8))
                    .await
            });
        }
        let results = racers.join_all().await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "{results:?}");
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StoreError::Stock(_)))));
        assert_eq!(quantity_of(&store, product.id).await, 2);

        store.pool().close().await;
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_category_and_product_deletion_guards() {
        let store = store().await;
        let category = store.create_category(Category::new("Fasteners")).await.unwrap();
        let product = product_with(&store, 0).await;
        store.attach_product(category.id, product.id).await.unwrap();

        assert!(matches!(
            store.delete_category(category.id).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        store.detach_product(category.id, product.id).await.unwrap();
        store.detach_product(category.id, product.id).await.unwrap();
        store.delete_category(category.id).await.unwrap();

        let receipt = store
            .record_transaction(Transaction::new(product.id, TransactionKind::In, 2))
            .await
            .unwrap();
        assert!(matches!(
            store.delete_product(product.id).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        store.reverse_transaction(receipt.transaction.id).await.unwrap();
        store.delete_product(product.id).await.unwrap();
        assert!(matches!(
            store.delete_product(product.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_products_sorting() {
        let store = store().await;
        for (name, cents) in [("b", 900), ("a", 1000), ("c", 50)] {
            store
                .create_product(Product::new(name, Decimal::new(cents, 2)))
                .await
                .unwrap();
        }
        let by_price: Vec<_> = store
            .list_products(ProductFilter {
                sort: ProductSort::Price,
                order: SortOrder::Asc,
                ..Default::default()
            })
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(by_price, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_users_and_last_user_guard() {
        let store = store().await;
        let admin = store
            .create_user(User::new("Admin@Example.com", "hash").with_role(Role::Admin))
            .await
            .unwrap();
        assert!(matches!(
            store.create_user(User::new("admin@example.com", "x")).await.unwrap_err(),
            StoreError::AlreadyExists { .. }
        ));

        let loaded = store.get_user_by_email("ADMIN@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.id, admin.id);
        assert_eq!(loaded.role, Role::Admin);

        assert!(matches!(
            store.delete_user(admin.id).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_changes_leave_other_columns_alone() {
        let store = store().await;
        let user = store
            .create_user(User::new("ada@example.com", "hash").with_role(Role::Admin))
            .await
            .unwrap();
        store
            .create_user(User::new("bob@example.com", "hash"))
            .await
            .unwrap();

        let demoted = store
            .update_user(
                user.id,
                UserChanges {
                    role: Some(Role::User),
                    status: Some(UserStatus::Disabled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(demoted.role, Role::User);

        let renamed = store
            .update_user(
                user.id,
                UserChanges {
                    name: Some(Some("Ada".to_string())),
                    email: Some("ADA@Example.org".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.email, "ada@example.org");
        assert_eq!(renamed.name.as_deref(), Some("Ada"));
        assert_eq!(renamed.role, Role::User);
        assert_eq!(renamed.status, UserStatus::Disabled);
        assert_eq!(renamed.created_at.timestamp_micros(), user.created_at.timestamp_micros());

        let enrolled = store
            .update_user(user.id, UserChanges::second_factor(true, Some("SECRET".to_string())))
            .await
            .unwrap();
        assert!(enrolled.two_factor_enabled);
        assert_eq!(enrolled.name.as_deref(), Some("Ada"));

        let cleared = store
            .update_user(user.id, UserChanges { name: Some(None), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(cleared.name, None);
        assert_eq!(cleared.two_factor_secret.as_deref(), Some("SECRET"));

        assert!(matches!(
            store
                .update_user(
                    user.id,
                    UserChanges { email: Some("Bob@example.com".to_string()), ..Default::default() },
                )
                .await
                .unwrap_err(),
            StoreError::AlreadyExists { .. }
        ));
        assert!(matches!(
            store
                .update_user(Uuid::new_v4(), UserChanges::last_login(Utc::now()))
                .await
                .unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_signup_code_single_use() {
        let store = store().await;
        store
            .create_signup_code(SignupCode::new("abc", Duration::hours(1)))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.take_signup_code("abc", now).await.unwrap().is_some());
        assert!(store.take_signup_code("abc", now).await.unwrap().is_none());

        store
            .create_signup_code(SignupCode::new("late", Duration::hours(1)))
            .await
            .unwrap();
        let later = now + Duration::hours(3);
        assert_eq!(store.purge_expired_signup_codes(later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_api_token_lookup_updates_last_used() {
        let store = store().await;
        let token = store
            .create_api_token(ApiToken::new("ci", "s3cret", Uuid::new_v4()))
            .await
            .unwrap();

        let found = store.authenticate_api_token("s3cret", Utc::now()).await.unwrap().unwrap();
        assert_eq!(found.id, token.id);
        assert!(found.last_used_at.is_some());

        store.delete_api_token(token.id).await.unwrap();
        assert!(store.authenticate_api_token("s3cret", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activity_paging() {
        let store = store().await;
        for i in 0..5 {
            let mut activity = Activity::new(
                "editor@example.com",
                "POST /api/product/create",
                serde_json::json!({ "i": i }),
            );
            activity.timestamp = Utc::now() + Duration::seconds(i);
            store.append_activity(activity).await.unwrap();
        }
        let (page, total) = store
            .list_activities(ActivityFilter {
                limit: Some(2),
                offset: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].details["i"], 3);
    }
}
