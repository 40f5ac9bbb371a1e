//! Schema tool for the billsplit ledger.
//!
//! `DATABASE_URL` picks the database, the first argument the action and an
//! optional second argument the number of steps for `up`/`down`.
use sea_orm::Database;
use sea_orm_migration::prelude::*;

const DEFAULT_LEDGER_URL: &str = "sqlite:./billsplit.db?mode=rwc";

const USAGE: &str = "\
usage: migration [ACTION] [STEPS]

actions:
  up [STEPS]     apply pending ledger migrations (default)
  down [STEPS]   roll back the last STEPS migrations (default 1)
  fresh          drop every table and rebuild the ledger schema
  refresh        roll back all migrations, then apply them again
  status         list applied and pending migrations

DATABASE_URL overrides the ledger location (default ./billsplit.db).";

fn usage_error(msg: &str) -> ! {
    eprintln!("{msg}\n\n{USAGE}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let action = args.next().unwrap_or_else(|| "up".to_string());
    let steps = match args.next() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(steps) => Some(steps),
            Err(_) => usage_error(&format!("STEPS must be a positive number, got {raw:?}")),
        },
        None => None,
    };

    let db_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_LEDGER_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match (action.as_str(), steps) {
        ("up", steps) => migration::Migrator::up(&db, steps).await?,
        ("down", steps) => migration::Migrator::down(&db, steps.or(Some(1))).await?,
        ("fresh", None) => migration::Migrator::fresh(&db).await?,
        ("refresh", None) => migration::Migrator::refresh(&db).await?,
        ("status", None) => migration::Migrator::status(&db).await?,
        ("fresh" | "refresh" | "status", Some(_)) => {
            usage_error(&format!("{action} does not take a step count"))
        }
        ("-h" | "--help" | "help", _) => println!("{USAGE}"),
        (other, _) => usage_error(&format!("unknown action {other:?}")),
    }

    Ok(())
}
