//! API response types.

use chrono::{DateTime, Utc};
use entities::{Activity, Role, Transaction};
use serde::{Deserialize, Serialize};

use crate::types::*;

// ============================================================================
// Auth and Profile Responses
// ============================================================================

/// Returned by login and by second-factor verification.
///
/// When `second_factor_required` is set, `token` is a short-lived pending
/// token accepted only by `/api/auth/second-factor/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub second_factor_required: bool,
    pub expires_in: u64,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub credential: CredentialKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableSecondFactorResponse {
    /// Base32 secret for manual entry.
    pub secret: String,
    /// `otpauth://` URL for QR enrolment.
    pub provisioning_url: String,
}

// ============================================================================
// Catalog Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub product: ProductInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProductsResponse {
    pub products: Vec<ProductInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: CategoryInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCategoriesResponse {
    pub categories: Vec<CategoryInfo>,
}

/// Returned by delete endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

// ============================================================================
// Ledger Responses
// ============================================================================

/// Outcome of record, amend and reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub transaction: Transaction,
    pub stock: Vec<StockLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTransactionsResponse {
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// Administration Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupCodeResponse {
    pub code: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// The secret `token` is only ever returned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateApiTokenResponse {
    pub token: String,
    pub api_token: ApiTokenInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListApiTokensResponse {
    pub api_tokens: Vec<ApiTokenInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListActivitiesResponse {
    pub activities: Vec<Activity>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
