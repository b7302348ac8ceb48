use bursar::application::cache::CacheView;
use bursar::application::coordinator::FeeCoordinator;
use bursar::application::gateway::PaymentGateway;
use bursar::config::EngineConfig;
use bursar::domain::billing::BillingItem;
use bursar::domain::payment::{PaymentInput, PaymentMethod, PaymentRecord};
use bursar::domain::residence::{Advisory, ResidenceFilter};
use bursar::domain::student::{ResidenceType, Student};
use bursar::infrastructure::in_memory::{InMemoryCatalog, InMemoryLedger, InMemoryStudentDirectory};
use bursar::interfaces::csv::record_reader::load_records;
use bursar::interfaces::csv::report_writer::ReportWriter;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Billing catalog CSV file
    #[arg(long)]
    catalog: PathBuf,

    /// Student directory CSV file
    #[arg(long)]
    students: PathBuf,

    /// Payment ledger CSV file (optional, empty ledger when omitted)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the residence-filtered fee structure of a class
    Fees {
        #[arg(long = "class")]
        class_id: String,
        #[arg(long)]
        residence: Option<ResidenceType>,
    },
    /// Print a student's payment summary
    Summary {
        #[arg(long = "student")]
        student_id: String,
        /// Emit JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Record a payment and print the updated summary
    Pay {
        #[arg(long = "student")]
        student_id: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        billing_type: String,
        #[arg(long, default_value = "cash")]
        method: PaymentMethod,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };

    let items: Vec<BillingItem> = load_records(&cli.catalog).into_diagnostic()?;
    let students: Vec<Student> = load_records(&cli.students).into_diagnostic()?;
    let payments: Vec<PaymentRecord> = match &cli.ledger {
        Some(path) => load_records(path).into_diagnostic()?,
        None => Vec::new(),
    };

    let ledger = Arc::new(InMemoryLedger::from_records(payments));
    let coordinator = Arc::new(FeeCoordinator::new(
        Arc::new(InMemoryCatalog::from_items(items)),
        Arc::new(InMemoryStudentDirectory::from_students(students)),
        ledger.clone(),
        &config,
    ));

    match cli.command {
        Command::Fees {
            class_id,
            residence,
        } => {
            let view = coordinator
                .fee_structure(&class_id, residence)
                .await
                .into_diagnostic()?;
            let (_, advisory) = ResidenceFilter::resolve(residence);
            print_notices(&view, advisory.as_slice());
            ReportWriter::new(io::stdout().lock())
                .write_fee_structure(&view.value)
                .into_diagnostic()?;
        }
        Command::Summary { student_id, json } => {
            let view = coordinator
                .payment_summary(&student_id)
                .await
                .into_diagnostic()?;
            print_notices(&view, &view.value.advisories);
            if json {
                let rendered = serde_json::to_string_pretty(&view.value).into_diagnostic()?;
                println!("{rendered}");
            } else {
                ReportWriter::new(io::stdout().lock())
                    .write_summary(&view.value)
                    .into_diagnostic()?;
            }
        }
        Command::Pay {
            student_id,
            amount,
            billing_type,
            method,
            reference,
            description,
        } => {
            let gateway = PaymentGateway::new(ledger, coordinator.clone(), config.idempotency_window);
            let record = gateway
                .submit(PaymentInput {
                    student_id: student_id.clone(),
                    amount,
                    billing_type,
                    method,
                    reference,
                    description,
                    idempotency_key: None,
                })
                .await
                .into_diagnostic()?;
            eprintln!("Recorded payment {} ({})", record.id, record.reference);

            let view = coordinator
                .payment_summary(&student_id)
                .await
                .into_diagnostic()?;
            print_notices(&view, &view.value.advisories);
            ReportWriter::new(io::stdout().lock())
                .write_summary(&view.value)
                .into_diagnostic()?;
        }
    }

    Ok(())
}

/// Staleness and advisories go to stderr so stdout stays a clean table.
fn print_notices<V>(view: &CacheView<V>, advisories: &[Advisory]) {
    if view.stale {
        eprintln!("Warning: showing last known values, a refresh did not complete");
    }
    for advisory in advisories {
        eprintln!("Note: {advisory}");
    }
}
