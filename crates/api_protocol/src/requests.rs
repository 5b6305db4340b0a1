//! API request types.

use chrono::{DateTime, Utc};
use entities::{Role, TransactionKind, UserStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Auth Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub signup_code: String,
    pub name: String,
}

/// Sent with the pending token from login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySecondFactorRequest {
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {}

// ============================================================================
// Profile Requests
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetProfileRequest {}

/// Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnableSecondFactorRequest {}

/// Confirms the secret handed out by enable with a first code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmSecondFactorRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableSecondFactorRequest {
    pub code: String,
}

// ============================================================================
// Product Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    /// Opening stock; defaults to zero.
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetProductRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListProductsRequest {
    pub category_id: Option<Uuid>,
    /// One of `name`, `price`, `quantity`, `created_at`, `updated_at`.
    pub sort_by: Option<String>,
    /// `asc` or `desc`.
    pub order: Option<String>,
}

/// Replaces a product's editable fields. Stock is not editable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProductRequest {
    pub product_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProductRequest {
    pub product_id: Uuid,
}

// ============================================================================
// Category Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCategoryRequest {
    pub category_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCategoriesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCategoryRequest {
    pub category_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCategoryRequest {
    pub category_id: Uuid,
}

/// Used by both attach-product and detach-product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryProductRequest {
    pub category_id: Uuid,
    pub product_id: Uuid,
}

// ============================================================================
// Transaction Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordTransactionRequest {
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub quantity: i64,
    /// Defaults to now.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendTransactionRequest {
    pub transaction_id: Uuid,
    /// Defaults to the transaction's current product.
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub quantity: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseTransactionRequest {
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionRequest {
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListTransactionsRequest {
    pub product_id: Option<Uuid>,
    /// One of `date`, `quantity`, `type`.
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

// ============================================================================
// User Administration Requests
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListUsersRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Omitted fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: Uuid,
}

// ============================================================================
// Signup Code, API Token and Activity Requests
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateSignupCodeRequest {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateApiTokenRequest {
    pub name: String,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListApiTokensRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeApiTokenRequest {
    pub token_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListActivitiesRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
