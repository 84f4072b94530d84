use crate::domain::transaction::{PurchaseFailure, StoreUpdate, Transaction};
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum UpdateType {
    Purchase,
    Failed,
    Promoted,
}

/// One CSV row. Which columns matter depends on `type`.
#[derive(Debug, Deserialize)]
struct UpdateRecord {
    r#type: UpdateType,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    subscription_group_id: Option<String>,
    #[serde(default)]
    purchase_date: Option<i64>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl TryFrom<UpdateRecord> for StoreUpdate {
    type Error = ReconcileError;

    fn try_from(record: UpdateRecord) -> Result<Self> {
        match record.r#type {
            UpdateType::Purchase => {
                let product_id = record.product_id.ok_or_else(|| {
                    ReconcileError::InvalidRecord("purchase without product_id".to_string())
                })?;
                let purchase_date = record.purchase_date.ok_or_else(|| {
                    ReconcileError::InvalidRecord("purchase without purchase_date".to_string())
                })?;
                // A missing id is left for the engine to reject.
                let mut tx = Transaction::new(record.id.unwrap_or_default(), product_id, purchase_date);
                tx.subscription_group_id = record.subscription_group_id;
                tx.price = record.price;
                tx.currency = record.currency;
                Ok(Self::Transaction(tx))
            }
            UpdateType::Failed => {
                let code = record.code.ok_or_else(|| {
                    ReconcileError::InvalidRecord("failure without code".to_string())
                })?;
                Ok(Self::PurchaseFailed(PurchaseFailure {
                    product_id: record.product_id,
                    code,
                    message: record.message.unwrap_or_default(),
                }))
            }
            UpdateType::Promoted => {
                let product_id = record.product_id.ok_or_else(|| {
                    ReconcileError::InvalidRecord("promotion without product_id".to_string())
                })?;
                Ok(Self::PromotedProduct(product_id))
            }
        }
    }
}

/// Reads store updates from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing columns a row does not use may be left out.
pub struct StoreUpdateReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> StoreUpdateReader<R> {
    /// Creates a new `StoreUpdateReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts rows. A bad row yields an error and reading
    /// continues with the next one.
    pub fn updates(self) -> impl Iterator<Item = Result<StoreUpdate>> {
        self.reader
            .into_deserialize::<UpdateRecord>()
            .map(|result| result.map_err(ReconcileError::from).and_then(StoreUpdate::try_from))
    }
}
