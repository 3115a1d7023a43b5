//! Request and response types for the Printful REST API.

use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use prism_core::{StoreId, SyncProductId, SyncVariantId};

use super::PrintfulError;

// =============================================================================
// Proxy requests
// =============================================================================

/// Wire shape of a proxy call: `{ "action": "...", "data": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEnvelope {
    pub action: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A proxy call the storefront is willing to forward.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyRequest {
    GetProducts,
    GetProduct { id: SyncProductId },
    GetSyncProduct { id: SyncProductId },
    GetStoreInfo,
    EstimateCosts { order: OrderDraft },
    CreateOrder { order: OrderDraft },
}

#[derive(Deserialize)]
struct ProductRef {
    id: SyncProductId,
}

#[derive(Deserialize)]
struct OrderPayload {
    order: OrderDraft,
}

fn payload<T: serde::de::DeserializeOwned>(
    action: &str,
    data: Option<Value>,
) -> Result<T, PrintfulError> {
    let data = data.ok_or_else(|| {
        PrintfulError::InvalidRequest(format!("Missing data for action: {action}"))
    })?;
    serde_json::from_value(data)
        .map_err(|e| PrintfulError::InvalidRequest(format!("Invalid data for {action}: {e}")))
}

impl TryFrom<ProxyEnvelope> for ProxyRequest {
    type Error = PrintfulError;

    fn try_from(envelope: ProxyEnvelope) -> Result<Self, Self::Error> {
        let ProxyEnvelope { action, data } = envelope;
        let request = match action.as_str() {
            "get-products" => Self::GetProducts,
            "get-product" => Self::GetProduct {
                id: payload::<ProductRef>(&action, data)?.id,
            },
            "get-sync-product" => Self::GetSyncProduct {
                id: payload::<ProductRef>(&action, data)?.id,
            },
            "get-store-info" => Self::GetStoreInfo,
            "estimate-costs" => Self::EstimateCosts {
                order: payload::<OrderPayload>(&action, data)?.order,
            },
            "create-order" => Self::CreateOrder {
                order: payload::<OrderPayload>(&action, data)?.order,
            },
            other => {
                return Err(PrintfulError::InvalidRequest(format!(
                    "Unknown action: {other}"
                )));
            }
        };
        Ok(request)
    }
}

impl ProxyRequest {
    /// Action name as sent by clients.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::GetProducts => "get-products",
            Self::GetProduct { .. } => "get-product",
            Self::GetSyncProduct { .. } => "get-sync-product",
            Self::GetStoreInfo => "get-store-info",
            Self::EstimateCosts { .. } => "estimate-costs",
            Self::CreateOrder { .. } => "create-order",
        }
    }

    /// Provider method and path for this action.
    #[must_use]
    pub fn endpoint(&self) -> (Method, String) {
        match self {
            Self::GetProducts => (Method::GET, "/sync/products".to_string()),
            Self::GetProduct { id } | Self::GetSyncProduct { id } => {
                (Method::GET, format!("/sync/products/{id}"))
            }
            Self::GetStoreInfo => (Method::GET, "/stores".to_string()),
            Self::EstimateCosts { .. } => (Method::POST, "/orders/estimate-costs".to_string()),
            Self::CreateOrder { .. } => (Method::POST, "/orders".to_string()),
        }
    }

    /// Request body forwarded to the provider, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&OrderDraft> {
        match self {
            Self::EstimateCosts { order } | Self::CreateOrder { order } => Some(order),
            _ => None,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order body for cost estimates and order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    /// Other provider fields (shipping method, retail costs, ...) passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub address1: String,
    pub city: String,
    pub state_code: String,
    pub country_code: String,
    pub zip: String,
    /// Required by the provider for order creation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sync_variant_id: SyncVariantId,
    pub quantity: u32,
}

// =============================================================================
// Responses
// =============================================================================

/// Standard provider envelope: `{ "code": 200, "result": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Entry of `GET /sync/products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProductSummary {
    pub id: SyncProductId,
    #[serde(default)]
    pub external_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub variants: u32,
    #[serde(default)]
    pub synced: u32,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Catalog product a sync variant is printed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantProduct {
    pub variant_id: i64,
    pub product_id: i64,
    #[serde(default)]
    pub image: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncVariant {
    pub id: SyncVariantId,
    #[serde(default)]
    pub external_id: Option<String>,
    pub sync_product_id: SyncProductId,
    pub name: String,
    #[serde(default)]
    pub synced: bool,
    pub variant_id: i64,
    pub retail_price: Decimal,
    pub currency: String,
    pub product: VariantProduct,
}

/// Result of `GET /sync/products/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProductDetail {
    pub sync_product: SyncProductSummary,
    #[serde(default)]
    pub sync_variants: Vec<SyncVariant>,
}
