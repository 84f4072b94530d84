use crate::domain::transaction::{PurchaseFailure, Transaction};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryEvent {
    Purchase,
    Failed,
    Promoted,
    /// Still unfinished when the run ended.
    Pending,
}

/// One line of replay output.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct DeliveryRecord {
    pub event: DeliveryEvent,
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub subscription_group_id: Option<String>,
    pub purchase_date: Option<i64>,
    pub detail: Option<String>,
}

impl DeliveryRecord {
    pub fn purchase(tx: &Transaction) -> Self {
        Self::from_transaction(DeliveryEvent::Purchase, tx)
    }

    pub fn pending(tx: &Transaction) -> Self {
        Self::from_transaction(DeliveryEvent::Pending, tx)
    }

    fn from_transaction(event: DeliveryEvent, tx: &Transaction) -> Self {
        Self {
            event,
            id: Some(tx.id.clone()),
            product_id: Some(tx.product_id.clone()),
            subscription_group_id: tx.subscription_group_id.clone(),
            purchase_date: Some(tx.purchase_date),
            detail: None,
        }
    }

    pub fn failed(failure: &PurchaseFailure) -> Self {
        Self {
            event: DeliveryEvent::Failed,
            id: None,
            product_id: failure.product_id.clone(),
            subscription_group_id: None,
            purchase_date: None,
            detail: Some(format!("{}: {}", failure.code, failure.message)),
        }
    }

    pub fn promoted(product_id: &str) -> Self {
        Self {
            event: DeliveryEvent::Promoted,
            id: None,
            product_id: Some(product_id.to_owned()),
            subscription_group_id: None,
            purchase_date: None,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    /// One JSON object per line.
    Json,
}

enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    Json(W),
}

/// Writes delivery records as CSV (with a header row) or JSON lines.
pub struct DeliveryWriter<W: Write> {
    sink: Sink<W>,
}

impl<W: Write> DeliveryWriter<W> {
    pub fn new(destination: W, format: OutputFormat) -> Self {
        let sink = match format {
            OutputFormat::Csv => Sink::Csv(csv::Writer::from_writer(destination)),
            OutputFormat::Json => Sink::Json(destination),
        };
        Self { sink }
    }

    pub fn write(&mut self, record: &DeliveryRecord) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.serialize(record)?,
            Sink::Json(writer) => {
                serde_json::to_writer(&mut *writer, record)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn write_all<'a>(&mut self, records: impl IntoIterator<Item = &'a DeliveryRecord>) -> Result<()> {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.flush()?,
            Sink::Json(writer) => writer.flush()?,
        }
        Ok(())
    }
}
