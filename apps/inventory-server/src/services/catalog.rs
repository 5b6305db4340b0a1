//! Catalog service: products, categories and the references between them.
//!
//! The store keeps only the authoritative foreign keys (product → category,
//! transaction → product). The inverse views, a category's products and a
//! product's transactions, are computed here on every read, so they cannot
//! drift from the keys.

use std::collections::HashMap;

use api_protocol::{CategoryInfo, ProductInfo};
use entities::{Category, Product};
use inventory_store::{InventoryStore, ProductFilter, TransactionFilter};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};
use crate::services::validation::{MAX_QUANTITY, optional_text, required_name};

/// Editable product fields.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: Option<Uuid>,
}

impl ProductDraft {
    fn validate(self) -> ServerResult<Self> {
        if self.price < Decimal::ZERO {
            return Err(ServerError::InvalidRequest(
                "Price must not be negative".to_string(),
            ));
        }
        Ok(Self {
            name: required_name("Product name", &self.name)?,
            description: optional_text(self.description),
            price: self.price,
            category_id: self.category_id,
        })
    }
}

/// Catalog operations with computed back-references.
pub struct CatalogGraph<'a, S> {
    store: &'a S,
}

impl<'a, S: InventoryStore> CatalogGraph<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product with optional opening stock.
    pub async fn create_product(
        &self,
        draft: ProductDraft,
        opening_quantity: Option<i64>,
    ) -> ServerResult<ProductInfo> {
        let draft = draft.validate()?;
        let quantity = opening_quantity.unwrap_or(0);
        if !(0..=MAX_QUANTITY).contains(&quantity) {
            return Err(ServerError::InvalidRequest(format!(
                "Opening quantity must be between 0 and {MAX_QUANTITY}"
            )));
        }

        let mut product = Product::new(draft.name, draft.price).with_quantity(quantity);
        product.description = draft.description;
        product.category_id = draft.category_id;

        let product = self.store.create_product(product).await?;
        tracing::info!(product_id = %product.id, quantity, "Product created");

        self.product_info(&product).await
    }

    /// Replaces a product's editable fields. Stock is left alone.
    pub async fn update_product(
        &self,
        product_id: Uuid,
        draft: ProductDraft,
    ) -> ServerResult<ProductInfo> {
        let draft = draft.validate()?;
        let mut product = self.find_product(product_id).await?;

        let previous_category = product.category_id;
        product.name = draft.name;
        product.description = draft.description;
        product.price = draft.price;
        product.category_id = draft.category_id;

        let product = self.store.update_product(product).await?;
        if previous_category != product.category_id {
            tracing::info!(
                product_id = %product_id,
                from = ?previous_category,
                to = ?product.category_id,
                "Product moved between categories"
            );
        }
        tracing::info!(product_id = %product_id, "Product updated");

        self.product_info(&product).await
    }

    /// Returns one product with its category and transaction ids.
    pub async fn product(&self, product_id: Uuid) -> ServerResult<ProductInfo> {
        let product = self.find_product(product_id).await?;
        self.product_info(&product).await
    }

    /// Lists products with their back-references.
    pub async fn products(&self, filter: ProductFilter) -> ServerResult<Vec<ProductInfo>> {
        if let Some(category_id) = filter.category_id {
            self.find_category(category_id).await?;
        }
        let products = self.store.list_products(filter).await?;

        let categories: HashMap<Uuid, Category> = self
            .store
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut history: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for transaction in self.store.list_transactions(TransactionFilter::default()).await? {
            history
                .entry(transaction.product_id)
                .or_default()
                .push(transaction.id);
        }

        Ok(products
            .iter()
            .map(|product| {
                let category = product.category_id.and_then(|id| categories.get(&id));
                let transaction_ids = history.remove(&product.id).unwrap_or_default();
                ProductInfo::new(product, category, transaction_ids)
            })
            .collect())
    }

    /// Deletes a product that no transaction references.
    pub async fn delete_product(&self, product_id: Uuid) -> ServerResult<()> {
        self.store.delete_product(product_id).await.inspect_err(|e| {
            tracing::info!(product_id = %product_id, error = %e, "Product deletion refused");
        })?;
        tracing::info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(
        &self,
        name: &str,
        description: Option<String>,
    ) -> ServerResult<CategoryInfo> {
        let mut category = Category::new(required_name("Category name", name)?);
        category.description = optional_text(description);

        let category = self.store.create_category(category).await?;
        tracing::info!(category_id = %category.id, "Category created");

        Ok(CategoryInfo::new(&category, Vec::new()))
    }

    pub async fn update_category(
        &self,
        category_id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> ServerResult<CategoryInfo> {
        let mut category = self.find_category(category_id).await?;
        category.name = required_name("Category name", name)?;
        category.description = optional_text(description);

        let category = self.store.update_category(category).await?;
        tracing::info!(category_id = %category_id, "Category updated");

        self.category_info(&category).await
    }

    /// Returns one category with its product ids.
    pub async fn category(&self, category_id: Uuid) -> ServerResult<CategoryInfo> {
        let category = self.find_category(category_id).await?;
        self.category_info(&category).await
    }

    /// Lists categories with their product ids.
    pub async fn categories(&self) -> ServerResult<Vec<CategoryInfo>> {
        let categories = self.store.list_categories().await?;

        let mut members: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for product in self.store.list_products(ProductFilter::default()).await? {
            if let Some(category_id) = product.category_id {
                members.entry(category_id).or_default().push(product.id);
            }
        }

        Ok(categories
            .iter()
            .map(|category| {
                CategoryInfo::new(category, members.remove(&category.id).unwrap_or_default())
            })
            .collect())
    }

    /// Deletes a category that no product references.
    pub async fn delete_category(&self, category_id: Uuid) -> ServerResult<()> {
        self.store.delete_category(category_id).await.inspect_err(|e| {
            tracing::info!(category_id = %category_id, error = %e, "Category deletion refused");
        })?;
        tracing::info!(category_id = %category_id, "Category deleted");
        Ok(())
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Points a product at a category. Repeating the call changes nothing.
    pub async fn attach_product(
        &self,
        category_id: Uuid,
        product_id: Uuid,
    ) -> ServerResult<ProductInfo> {
        let product = self.store.attach_product(category_id, product_id).await?;
        tracing::info!(category_id = %category_id, product_id = %product_id, "Product attached");
        self.product_info(&product).await
    }

    /// Clears a product's category if it is `category_id`. Repeating the call
    /// changes nothing.
    pub async fn detach_product(
        &self,
        category_id: Uuid,
        product_id: Uuid,
    ) -> ServerResult<ProductInfo> {
        self.find_category(category_id).await?;
        let product = self.store.detach_product(category_id, product_id).await?;
        tracing::info!(category_id = %category_id, product_id = %product_id, "Product detached");
        self.product_info(&product).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn find_product(&self, product_id: Uuid) -> ServerResult<Product> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ServerError::NotFound("Product not found".to_string()))
    }

    async fn find_category(&self, category_id: Uuid) -> ServerResult<Category> {
        self.store
            .get_category(category_id)
            .await?
            .ok_or_else(|| ServerError::NotFound("Category not found".to_string()))
    }

    async fn product_info(&self, product: &Product) -> ServerResult<ProductInfo> {
        let category = match product.category_id {
            Some(category_id) => self.store.get_category(category_id).await?,
            None => None,
        };
        let transaction_ids = self
            .store
            .list_transactions(TransactionFilter {
                product_id: Some(product.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        Ok(ProductInfo::new(product, category.as_ref(), transaction_ids))
    }

    async fn category_info(&self, category: &Category) -> ServerResult<CategoryInfo> {
        let product_ids = self
            .store
            .list_products(ProductFilter {
                category_id: Some(category.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        Ok(CategoryInfo::new(category, product_ids))
    }
}
