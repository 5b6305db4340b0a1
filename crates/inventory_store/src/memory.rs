//! In-memory inventory store.
//!
//! All tables live behind one lock so ledger operations read and write
//! product quantities and transactions as a single unit.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    Activity, ApiToken, Category, Product, SignupCode, Transaction, User, normalize_email,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ledger::{self, StockAdjustment};
use crate::{
    ActivityFilter, InventoryStore, LedgerReceipt, ProductFilter, ProductSort, SortOrder,
    StoreError, StoreResult, TransactionAmendment, TransactionFilter, TransactionSort, UserChanges,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    transactions: HashMap<Uuid, Transaction>,
    signup_codes: HashMap<String, SignupCode>,
    api_tokens: HashMap<Uuid, ApiToken>,
    activities: Vec<Activity>,
}

impl MemoryState {
    /// Settles `adjustments` and writes the new quantities.
    fn apply_adjustments(
        &mut self,
        adjustments: &[StockAdjustment],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Product>> {
        let settled = ledger::settle(adjustments, |id| {
            self.products.get(&id).map(|p| p.quantity)
        })?;

        let mut touched = Vec::with_capacity(settled.len());
        for (product_id, quantity) in settled {
            let product = self
                .products
                .get_mut(&product_id)
                .ok_or_else(|| StoreError::not_found("Product", product_id))?;
            product.quantity = quantity;
            product.updated_at = now;
            touched.push(product.clone());
        }
        Ok(touched)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// In-memory inventory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryInventoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    match sort {
        ProductSort::Name => a.name.cmp(&b.name),
        ProductSort::Price => a.price.cmp(&b.price),
        ProductSort::Quantity => a.quantity.cmp(&b.quantity),
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

fn compare_transactions(a: &Transaction, b: &Transaction, sort: TransactionSort) -> Ordering {
    match sort {
        TransactionSort::Date => a.date.cmp(&b.date),
        TransactionSort::Quantity => a.quantity.cmp(&b.quantity),
        TransactionSort::Kind => a.kind.as_str().cmp(b.kind.as_str()),
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        let mut state = self.state.write().await;
        user.email = normalize_email(&user.email);
        if state.users.contains_key(&user.id) || state.email_taken(&user.email, None) {
            return Err(StoreError::already_exists("User", &user.email));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, mut changes: UserChanges) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(StoreError::not_found("User", id));
        }
        if let Some(email) = changes.email.as_mut() {
            *email = normalize_email(email);
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::already_exists("User", email.as_str()));
            }
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("User", id))?;
        changes.apply_to(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state.users.len() as u64)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(StoreError::not_found("User", id));
        }
        if state.users.len() <= 1 {
            return Err(StoreError::conflict("Cannot delete the last user"));
        }
        state.users.remove(&id);
        Ok(())
    }

    // =========================================================================
    // Category operations
    // =========================================================================

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.contains_key(&category.id) {
            return Err(StoreError::already_exists("Category", category.id));
        }
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<_> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn update_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.state.write().await;
        let existing = state
            .categories
            .get_mut(&category.id)
            .ok_or_else(|| StoreError::not_found("Category", category.id))?;
        existing.name = category.name;
        existing.description = category.description;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&id) {
            return Err(StoreError::not_found("Category", id));
        }
        let referenced = state
            .products
            .values()
            .filter(|p| p.category_id == Some(id))
            .count();
        if referenced > 0 {
            return Err(StoreError::conflict(format!(
                "Category {id} still has {referenced} product(s)"
            )));
        }
        state.categories.remove(&id);
        Ok(())
    }

    // =========================================================================
    // Product operations
    // =========================================================================

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::already_exists("Product", product.id));
        }
        if let Some(category_id) = product.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(StoreError::not_found("Category", category_id));
            }
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state
            .products
            .values()
            .filter(|p| filter.category_id.is_none() || p.category_id == filter.category_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            directed(compare_products(a, b, filter.sort), filter.order).then(a.id.cmp(&b.id))
        });
        Ok(products)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        if let Some(category_id) = product.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(StoreError::not_found("Category", category_id));
            }
        }
        let existing = state
            .products
            .get_mut(&product.id)
            .ok_or_else(|| StoreError::not_found("Product", product.id))?;
        existing.name = product.name;
        existing.description = product.description;
        existing.price = product.price;
        existing.category_id = product.category_id;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn attach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&category_id) {
            return Err(StoreError::not_found("Category", category_id));
        }
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        if product.category_id != Some(category_id) {
            product.category_id = Some(category_id);
            product.updated_at = Utc::now();
        }
        Ok(product.clone())
    }

    async fn detach_product(&self, category_id: Uuid, product_id: Uuid) -> StoreResult<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        if product.category_id == Some(category_id) {
            product.category_id = None;
            product.updated_at = Utc::now();
        }
        Ok(product.clone())
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&id) {
            return Err(StoreError::not_found("Product", id));
        }
        let referenced = state
            .transactions
            .values()
            .filter(|t| t.product_id == id)
            .count();
        if referenced > 0 {
            return Err(StoreError::conflict(format!(
                "Product {id} still has {referenced} transaction(s)"
            )));
        }
        state.products.remove(&id);
        Ok(())
    }

    // =========================================================================
    // Transaction (ledger) operations
    // =========================================================================

    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn list_transactions(&self, filter: TransactionFilter) -> StoreResult<Vec<Transaction>> {
        let state = self.state.read().await;
        let mut transactions: Vec<_> = state
            .transactions
            .values()
            .filter(|t| filter.product_id.is_none() || Some(t.product_id) == filter.product_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| {
            directed(compare_transactions(a, b, filter.sort), filter.order).then(a.id.cmp(&b.id))
        });
        Ok(transactions)
    }

    async fn record_transaction(&self, transaction: Transaction) -> StoreResult<LedgerReceipt> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&transaction.id) {
            return Err(StoreError::already_exists("Transaction", transaction.id));
        }
        let products = state.apply_adjustments(&ledger::plan_record(&transaction), Utc::now())?;
        state.transactions.insert(transaction.id, transaction.clone());
        Ok(LedgerReceipt {
            transaction,
            products,
        })
    }

    async fn amend_transaction(&self, amendment: TransactionAmendment) -> StoreResult<LedgerReceipt> {
        let mut state = self.state.write().await;
        let current = state
            .transactions
            .get(&amendment.transaction_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Transaction", amendment.transaction_id))?;
        let amended = amendment.applied_to(&current);
        if !state.products.contains_key(&amended.product_id) {
            return Err(StoreError::not_found("Product", amended.product_id));
        }

        let mut products =
            state.apply_adjustments(&ledger::plan_amend(&current, &amended), Utc::now())?;
        if products.is_empty() {
            if let Some(product) = state.products.get(&amended.product_id) {
                products.push(product.clone());
            }
        }
        state.transactions.insert(amended.id, amended.clone());
        Ok(LedgerReceipt {
            transaction: amended,
            products,
        })
    }

    async fn reverse_transaction(&self, id: Uuid) -> StoreResult<LedgerReceipt> {
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Transaction", id))?;
        let products = state.apply_adjustments(&ledger::plan_reverse(&transaction), Utc::now())?;
        state.transactions.remove(&id);
        Ok(LedgerReceipt {
            transaction,
            products,
        })
    }

    // =========================================================================
    // Signup code operations
    // =========================================================================

    async fn create_signup_code(&self, code: SignupCode) -> StoreResult<SignupCode> {
        let mut state = self.state.write().await;
        if state.signup_codes.contains_key(&code.code) {
            return Err(StoreError::already_exists("SignupCode", &code.code));
        }
        state.signup_codes.insert(code.code.clone(), code.clone());
        Ok(code)
    }

    async fn take_signup_code(&self, code: &str, now: DateTime<Utc>) -> StoreResult<Option<SignupCode>> {
        let mut state = self.state.write().await;
        Ok(state
            .signup_codes
            .remove(code)
            .filter(|c| !c.is_expired_at(now)))
    }

    async fn purge_expired_signup_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.signup_codes.len();
        state.signup_codes.retain(|_, c| !c.is_expired_at(now));
        Ok((before - state.signup_codes.len()) as u64)
    }

    // =========================================================================
    // API token operations
    // =========================================================================

    async fn create_api_token(&self, token: ApiToken) -> StoreResult<ApiToken> {
        let mut state = self.state.write().await;
        if state.api_tokens.values().any(|t| t.token == token.token) {
            return Err(StoreError::already_exists("ApiToken", token.id));
        }
        state.api_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn get_api_token(&self, id: Uuid) -> StoreResult<Option<ApiToken>> {
        let state = self.state.read().await;
        Ok(state.api_tokens.get(&id).cloned())
    }

    async fn list_api_tokens(&self) -> StoreResult<Vec<ApiToken>> {
        let state = self.state.read().await;
        let mut tokens: Vec<_> = state.api_tokens.values().cloned().collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn delete_api_token(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.api_tokens.remove(&id).is_none() {
            return Err(StoreError::not_found("ApiToken", id));
        }
        Ok(())
    }

    async fn authenticate_api_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<ApiToken>> {
        let mut state = self.state.write().await;
        let Some(found) = state.api_tokens.values_mut().find(|t| t.token == token) else {
            return Ok(None);
        };
        if found.is_expired_at(now) {
            return Ok(None);
        }
        found.last_used_at = Some(now);
        Ok(Some(found.clone()))
    }

    // =========================================================================
    // Activity operations
    // =========================================================================

    async fn append_activity(&self, activity: Activity) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.activities.push(activity);
        Ok(())
    }

    async fn list_activities(&self, filter: ActivityFilter) -> StoreResult<(Vec<Activity>, u64)> {
        let state = self.state.read().await;
        let total = state.activities.len() as u64;
        let mut activities: Vec<_> = state.activities.clone();
        activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok((
            activities.into_iter().skip(offset).take(limit).collect(),
            total,
        ))
    }
}
