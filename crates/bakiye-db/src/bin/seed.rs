//! # Seed Data Generator
//!
//! Populates a development database with dealers, commission rates and an
//! opening ledger history.
//!
//! ## Usage
//! ```bash
//! # 50 dealers across 5 companies (default)
//! cargo run -p bakiye-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p bakiye-db --bin seed -- --count 200 --db ./data/bakiye.db
//! ```
//!
//! Every balance is built through the ledger writer, so a seeded database
//! passes the consistency audit.

use bakiye_core::Money;
use bakiye_db::{Database, DbConfig, Mutation, RateScope};
use std::env;

/// Company codes dealers are spread across.
const COMPANIES: &[&str] = &["FIRMA-ANKARA", "FIRMA-IZMIR", "FIRMA-BURSA", "FIRMA-ADANA", "FIRMA-KONYA"];

/// Company default commission rates in basis points.
const COMPANY_RATES: &[i64] = &[1000, 750, 1250, 500, 900];

/// Opening top-ups in major units, cycled per dealer.
const OPENING_TOPUPS: &[i64] = &[250, 500, 1000, 1500, 5000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 50;
    let mut db_path = String::from("./bakiye_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--count" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Bakiye Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of dealers to create (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./bakiye_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Bakiye Seed Data Generator");
    println!("==========================");
    println!("Database: {}", db_path);
    println!("Dealers:  {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.accounts().list_accounts(None).await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} dealers", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let commissions = db.commissions();
    for (company, bps) in COMPANIES.iter().zip(COMPANY_RATES) {
        commissions.set_rate(RateScope::Company, company, *bps).await?;
    }
    println!("✓ {} company commission rates", COMPANIES.len());

    let start = std::time::Instant::now();
    let accounts = db.accounts();
    let ledger = db.ledger();

    for n in 0..count {
        let dealer_id = format!("BAYI-{:04}", n + 1);
        let company = COMPANIES[n % COMPANIES.len()];
        accounts
            .create_account(&dealer_id, company, &format!("Bayi {}", n + 1))
            .await?;

        let opening = Money::from_major(OPENING_TOPUPS[n % OPENING_TOPUPS.len()]);
        ledger
            .apply_mutation(&Mutation::manual_topup(&dealer_id, opening).description("Opening balance"))
            .await?;

        // Every seventh dealer negotiated its own rate.
        if n % 7 == 0 {
            commissions.set_rate(RateScope::Dealer, &dealer_id, 600).await?;
        }
    }

    println!("✓ Created {} dealers in {:?}", count, start.elapsed());

    let report = db.audit().audit().await?;
    println!(
        "✓ Audit: {} accounts, {} entries, {} findings",
        report.accounts_checked,
        report.entries_checked,
        report.findings.len()
    );

    db.close().await;
    Ok(())
}
