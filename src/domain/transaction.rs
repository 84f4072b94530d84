use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Verified,
    Unverified,
}

/// A purchase or renewal record handed in by the storefront.
///
/// The storefront verifies the record before it reaches the engine, so the
/// engine only reads `id`, `subscription_group_id` and `purchase_date`. The
/// remaining fields are carried through to listeners untouched.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transaction {
    /// Storefront-assigned identifier, stable across redelivery.
    pub id: String,
    pub product_id: String,
    /// Present only for auto-renewable subscription products.
    pub subscription_group_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub purchase_date: i64,
    #[serde(default)]
    pub verification: VerificationStatus,
    #[serde(default)]
    pub original_transaction_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl Transaction {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>, purchase_date: i64) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            subscription_group_id: None,
            purchase_date,
            verification: VerificationStatus::Verified,
            original_transaction_id: None,
            quantity: default_quantity(),
            price: None,
            currency: None,
        }
    }

    /// Marks the transaction as belonging to an auto-renewable subscription group.
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.subscription_group_id = Some(group_id.into());
        self
    }

    pub fn with_price(mut self, price: Decimal, currency: impl Into<String>) -> Self {
        self.price = Some(price);
        self.currency = Some(currency.into());
        self
    }

    pub fn is_subscription(&self) -> bool {
        self.subscription_group_id.is_some()
    }
}

/// Payload of a purchase-failed event.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PurchaseFailure {
    pub product_id: Option<String>,
    pub code: String,
    pub message: String,
}

/// One item of the storefront's update stream.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StoreUpdate {
    Transaction(Transaction),
    PurchaseFailed(PurchaseFailure),
    /// A product promoted from the store front page was tapped.
    PromotedProduct(String),
}

impl From<Transaction> for StoreUpdate {
    fn from(tx: Transaction) -> Self {
        Self::Transaction(tx)
    }
}

impl From<PurchaseFailure> for StoreUpdate {
    fn from(failure: PurchaseFailure) -> Self {
        Self::PurchaseFailed(failure)
    }
}
