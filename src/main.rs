use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use storefront_reconcile::application::connection::StoreConnection;
use storefront_reconcile::infrastructure::in_memory::InMemoryStorefront;
use storefront_reconcile::interfaces::csv::delivery_writer::{
    DeliveryRecord, DeliveryWriter, OutputFormat,
};
use storefront_reconcile::interfaces::csv::update_reader::StoreUpdateReader;

const FEED_CAPACITY: usize = 1024;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Replays a CSV of storefront updates through the reconciliation engine and
/// prints what listeners would have received.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input store updates CSV file
    input: PathBuf,

    /// Finish every delivered transaction once the feed is drained
    #[arg(long)]
    finish: bool,

    /// Make the simulated platform refuse to finish this transaction (repeatable)
    #[arg(long = "reject-finish", value_name = "ID")]
    reject_finish: Vec<String>,

    /// Output format for deliveries
    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// Also print transactions still pending at the end of the run
    #[arg(long)]
    show_pending: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let (storefront, sender) = InMemoryStorefront::new(FEED_CAPACITY);
    for id in &cli.reject_finish {
        storefront.reject_finish(id.clone()).await;
    }
    let connection = StoreConnection::new(Arc::new(storefront));

    // Listeners run on the ingestion task; collect and print afterwards.
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&deliveries);
    connection.on_purchase_updated(move |tx| record(&sink, DeliveryRecord::purchase(tx)));
    let sink = Arc::clone(&deliveries);
    connection.on_purchase_error(move |failure| record(&sink, DeliveryRecord::failed(failure)));
    let sink = Arc::clone(&deliveries);
    connection.on_promoted_product(move |product_id| record(&sink, DeliveryRecord::promoted(product_id)));

    connection.init_connection().await.into_diagnostic()?;

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = StoreUpdateReader::new(file);
    for update in reader.updates() {
        match update {
            Ok(update) => {
                if sender.send(update).await.is_err() {
                    eprintln!("Feed closed before input was exhausted");
                    break;
                }
            }
            Err(e) => {
                eprintln!("Error reading update: {}", e);
            }
        }
    }
    drop(sender);
    connection.wait_for_feed_end().await;

    if cli.finish {
        let summary = connection.finish_pending_transactions().await;
        for id in &summary.failed {
            eprintln!("Failed to finish transaction {}", id);
        }
    }

    let stats = connection.stats();
    let pending = connection.get_pending_transactions();

    let stdout = io::stdout();
    let mut writer = DeliveryWriter::new(stdout.lock(), cli.format.into());
    {
        let delivered = deliveries.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(delivered.iter()).into_diagnostic()?;
    }
    if cli.show_pending {
        for tx in &pending {
            writer.write(&DeliveryRecord::pending(tx)).into_diagnostic()?;
        }
    }
    writer.flush().into_diagnostic()?;

    eprintln!(
        "accepted={} duplicates={} superseded={} pending={}",
        stats.accepted, stats.duplicates, stats.superseded, stats.pending
    );

    connection.end_connection().await;
    Ok(())
}

fn record(sink: &Mutex<Vec<DeliveryRecord>>, record: DeliveryRecord) {
    sink.lock().unwrap_or_else(|e| e.into_inner()).push(record);
}
