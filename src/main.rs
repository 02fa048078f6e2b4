use std::sync::Arc;

use tracing::info;
use ulid::Ulid;

use slotwise::booking::{BookingDesk, SlotPick};
use slotwise::config::Config;
use slotwise::model::CommitmentStatus;
use slotwise::planner::SlotPlanner;
use slotwise::store::Store;
use slotwise::store::seed::{self, Seed};

const USAGE: &str = "\
usage:
  slotwise slots <business> <date|today> <service>
  slotwise book <business> <date|today> <service> <HH:MM> [label]
  slotwise cancel <commitment>
  slotwise businesses
  slotwise services
  slotwise compact";

fn parse_id(what: &str, s: &str) -> Result<Ulid, Box<dyn std::error::Error>> {
    s.parse::<Ulid>()
        .map_err(|e| format!("invalid {what} id {s:?}: {e}").into())
}

fn usage() -> ! {
    eprintln!("{USAGE}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else { usage() };

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(Store::open(&config.wal_path(), config.compact_threshold).await?);
    info!("data_dir: {}", config.data_dir.display());
    info!("timezone: {}", config.calendar.tz());

    if let Some(path) = &config.seed_file {
        seed::import(&store, Seed::from_file(path)?).await?;
    }

    let rest = &args[1..];
    match (command.as_str(), rest) {
        ("slots", [business, date, service]) => {
            let business = parse_id("business", business)?;
            let service = parse_id("service", service)?;
            let date = config.calendar.parse_date(date)?;
            let report = SlotPlanner::from_store(store)
                .plan(business, date, service)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ("book", [business, date, service, start, label @ ..]) if label.len() <= 1 => {
            let pick = SlotPick {
                business_id: parse_id("business", business)?,
                date: config.calendar.parse_date(date)?,
                service_id: parse_id("service", service)?,
                start_time: start.parse()?,
                status: CommitmentStatus::Pending,
                label: label.first().cloned(),
            };
            let receipt = BookingDesk::from_store(store).pick_slot(pick).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        ("cancel", [id]) => {
            let id = parse_id("commitment", id)?;
            let business = store.cancel(id).await?;
            println!("{}", serde_json::json!({ "cancelled": id, "business_id": business }));
        }
        ("businesses", []) => {
            println!("{}", serde_json::to_string_pretty(&store.list_businesses().await)?);
        }
        ("services", []) => {
            println!("{}", serde_json::to_string_pretty(&store.list_services())?);
        }
        ("compact", []) => {
            store.compact().await?;
        }
        _ => usage(),
    }
    Ok(())
}
