use api_shared::{AttendanceStatsRes, ComplianceReportRes, ScanSummaryRes};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ledger_core::{compute_review_dates, CoreConfig, LedgerServices, PatientId};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Treatment lifecycle and attendance ledger CLI")]
struct Cli {
    /// Directory holding the ledger snapshot files (defaults to LEDGER_DATA_DIR, then ledger_data)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print MTPR due dates for an admission
    ReviewDates {
        /// Admission date (YYYY-MM-DD)
        admission: NaiveDate,
        /// Discharge date (YYYY-MM-DD)
        #[arg(long)]
        discharge: Option<NaiveDate>,
    },
    /// Run one lifecycle scan against the data directory
    Scan {
        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Attendance totals for a patient
    Stats {
        /// Patient id (32 lowercase hex characters)
        patient_id: String,
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Goal compliance report for a patient, as JSON
    Compliance {
        /// Patient id (32 lowercase hex characters)
        patient_id: String,
    },
}

fn open_services(data_dir: Option<String>) -> Result<LedgerServices, Box<dyn std::error::Error>> {
    let cfg = CoreConfig::from_env_values(
        data_dir.or_else(|| std::env::var("LEDGER_DATA_DIR").ok()),
        None,
        std::env::var("COMPLIANCE_RECENCY_DAYS").ok(),
    )?;
    Ok(LedgerServices::open(Arc::new(cfg))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ReviewDates {
            admission,
            discharge,
        }) => {
            let dates = compute_review_dates(admission, discharge);
            if dates.is_empty() {
                println!("No reviews fall before the cutoff.");
            }
            for due in dates {
                println!(
                    "#{} {} ({})",
                    due.sequence_number,
                    due.due_date,
                    due.due_date.format("%A")
                );
            }
        }
        Some(Commands::Scan { at }) => {
            let services = open_services(cli.data_dir)?;
            match services.monitor.run_once(at.unwrap_or_else(Utc::now)) {
                Ok(summary) => println!(
                    "{}",
                    serde_json::to_string_pretty(&ScanSummaryRes::from(&summary))?
                ),
                Err(e) => eprintln!("Error running lifecycle scan: {}", e),
            }
        }
        Some(Commands::Stats {
            patient_id,
            from,
            to,
        }) => {
            let services = open_services(cli.data_dir)?;
            let patient = PatientId::parse(&patient_id)?;
            match services.ledger.patient_stats(&patient, from, to) {
                Ok(stats) => println!(
                    "{}",
                    serde_json::to_string_pretty(&AttendanceStatsRes::from(&stats))?
                ),
                Err(e) => eprintln!("Error computing attendance stats: {}", e),
            }
        }
        Some(Commands::Compliance { patient_id }) => {
            let services = open_services(cli.data_dir)?;
            let patient = PatientId::parse(&patient_id)?;
            match services
                .compliance
                .build_report(&patient, Utc::now().date_naive())
            {
                Ok(report) => println!(
                    "{}",
                    serde_json::to_string_pretty(&ComplianceReportRes::from(&report))?
                ),
                Err(e) => eprintln!("Error building compliance report: {}", e),
            }
        }
        None => {
            println!("Use 'ledger --help' for commands");
        }
    }

    Ok(())
}
