//! Inventory store trait definitions.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    Activity, ApiToken, Category, Product, Role, SignupCode, Transaction, User, UserStatus,
};
use uuid::Uuid;

use crate::{LedgerReceipt, StoreResult, TransactionAmendment};

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("invalid sort order: {other}")),
        }
    }
}

/// Sortable product columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    Name,
    Price,
    Quantity,
    CreatedAt,
    UpdatedAt,
}

impl ProductSort {
    /// Returns the column name for this sort key.
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::Name => "name",
            ProductSort::Price => "price",
            ProductSort::Quantity => "quantity",
            ProductSort::CreatedAt => "created_at",
            ProductSort::UpdatedAt => "updated_at",
        }
    }
}

impl fmt::Display for ProductSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ProductSort::Name),
            "price" => Ok(ProductSort::Price),
            "quantity" => Ok(ProductSort::Quantity),
            "created_at" => Ok(ProductSort::CreatedAt),
            "updated_at" => Ok(ProductSort::UpdatedAt),
            other => Err(format!("invalid product sort field: {other}")),
        }
    }
}

/// Sortable transaction columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionSort {
    #[default]
    Date,
    Quantity,
    Kind,
}

impl TransactionSort {
    /// Returns the column name for this sort key.
    pub fn column(&self) -> &'static str {
        match self {
            TransactionSort::Date => "date",
            TransactionSort::Quantity => "quantity",
            TransactionSort::Kind => "type",
        }
    }
}

impl FromStr for TransactionSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(TransactionSort::Date),
            "quantity" => Ok(TransactionSort::Quantity),
            "type" => Ok(TransactionSort::Kind),
            other => Err(format!("invalid transaction sort field: {other}")),
        }
    }
}

/// Filter options for listing products.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Only products in this category.
    pub category_id: Option<Uuid>,
    /// Sort key.
    pub sort: ProductSort,
    /// Sort direction.
    pub order: SortOrder,
}

/// Filter options for listing transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Only transactions against this product.
    pub product_id: Option<Uuid>,
    /// Sort key.
    pub sort: TransactionSort,
    /// Sort direction.
    pub order: SortOrder,
}

/// Filter options for listing activity entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Column-level changes to a stored user. Fields left as `None` keep their
/// stored value, so writers touching different columns never undo each other.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// `Some(None)` clears the name.
    pub name: Option<Option<String>>,
    pub two_factor_enabled: Option<bool>,
    /// `Some(None)` clears the secret.
    pub two_factor_secret: Option<Option<String>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    /// Changes that record a sign-in at `at`.
    pub fn last_login(at: DateTime<Utc>) -> Self {
        Self {
            last_login_at: Some(at),
            ..Self::default()
        }
    }

    /// Changes that set both second-factor columns.
    pub fn second_factor(enabled: bool, secret: Option<String>) -> Self {
        Self {
            two_factor_enabled: Some(enabled),
            two_factor_secret: Some(secret),
            ..Self::default()
        }
    }

    /// Returns true when no column would change.
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.status.is_none()
            && self.name.is_none()
            && self.two_factor_enabled.is_none()
            && self.two_factor_secret.is_none()
            && self.last_login_at.is_none()
    }

    /// Writes the changes onto `user`.
    pub fn apply_to(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password_hash) = self.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(status) = self.status {
            user.status = status;
        }
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(enabled) = self.two_factor_enabled {
            user.two_factor_enabled = enabled;
        }
        if let Some(secret) = self.two_factor_secret {
            user.two_factor_secret = secret;
        }
        if let Some(at) = self.last_login_at {
            user.last_login_at = Some(at);
        }
    }
}

/// Trait for inventory storage operations.
///
/// Ledger operations (`record_transaction`, `amend_transaction`,
/// `reverse_transaction`) settle their stock adjustments and the transaction
/// write as one atomic unit. Implementations must serialize concurrent ledger
/// operations so that no interleaving can drive a product's quantity below
/// zero.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Creates a new user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    /// Gets a user by ID.
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Gets a user by email (case-insensitive).
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Lists all users ordered by email.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Applies `changes` to the stored user in one step and returns the
    /// result. Columns not named in `changes` are left as stored. Fails with
    /// `AlreadyExists` if the new email is taken.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    /// Counts users.
    async fn count_users(&self) -> StoreResult<u64>;

    /// Deletes a user. Fails with `Conflict` if it is the last one.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    // =========================================================================
    // Category operations
    // =========================================================================

    /// Creates a new category.
    async fn create_category(&self, category: Category) -> StoreResult<Category>;

    /// Gets a category by ID.
    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>>;

    /// Lists all categories ordered by name.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Updates a category's name and description.
    async fn update_category(&self, category: Category) -> StoreResult<Category>;

    /// Deletes a category. Fails with `Conflict` while products reference it.
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;

    // =========================================================================
    // Product operations
    // =========================================================================

    /// Creates a new product. Its category, if set, must exist.
    async fn create_product(&self, product: Product) -> StoreResult<Product>;

    /// Gets a product by ID.
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Lists products with optional filters.
    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>>;

    /// Updates a product's descriptive fields and category.
    ///
    /// The stored quantity is kept; stock only moves through the ledger.
    async fn update_product(&self, product: Product) -> StoreResult<Product>;

    /// Points a product at a category.
    async fn attach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product>;

    /// Clears a product's category if it is `category_id`; otherwise a no-op.
    async fn detach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product>;

    /// Deletes a product. Fails with `Conflict` while transactions reference it.
    async fn delete_product(&self, id: Uuid) -> StoreResult<()>;

    // =========================================================================
    // Transaction (ledger) operations
    // =========================================================================

    /// Gets a transaction by ID.
    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;

    /// Lists transactions with optional filters.
    async fn list_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>>;

    /// Records a new transaction and applies its stock effect.
    async fn record_transaction(&self, transaction: Transaction) -> StoreResult<LedgerReceipt>;

    /// Amends a transaction, undoing its old effect and applying the new one.
    async fn amend_transaction(&self, amendment: TransactionAmendment) -> StoreResult<LedgerReceipt>;

    /// Deletes a transaction and undoes its stock effect.
    async fn reverse_transaction(&self, id: Uuid) -> StoreResult<LedgerReceipt>;

    // =========================================================================
    // Signup code operations
    // =========================================================================

    /// Stores a new signup code.
    async fn create_signup_code(&self, code: SignupCode) -> StoreResult<SignupCode>;

    /// Atomically finds and deletes a signup code.
    ///
    /// Returns `None` if the code does not exist or expired before `now`.
    /// At most one caller can take a given code.
    async fn take_signup_code(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<SignupCode>>;

    /// Deletes signup codes that expired before `now`. Returns how many.
    async fn purge_expired_signup_codes(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // =========================================================================
    // API token operations
    // =========================================================================

    /// Stores a new API token.
    async fn create_api_token(&self, token: ApiToken) -> StoreResult<ApiToken>;

    /// Gets an API token by ID.
    async fn get_api_token(&self, id: Uuid) -> StoreResult<Option<ApiToken>>;

    /// Lists API tokens, newest first.
    async fn list_api_tokens(&self) -> StoreResult<Vec<ApiToken>>;

    /// Deletes an API token.
    async fn delete_api_token(&self, id: Uuid) -> StoreResult<()>;

    /// Looks up an unexpired token by exact match and stamps `last_used_at`.
    async fn authenticate_api_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<ApiToken>>;

    // =========================================================================
    // Activity operations
    // =========================================================================

    /// Appends an activity entry.
    async fn append_activity(&self, activity: Activity) -> StoreResult<()>;

    /// Lists activity entries newest first, with the total count.
    async fn list_activities(&self, filter: ActivityFilter) -> StoreResult<(Vec<Activity>, u64)>;
}
