use std::{env, sync::Arc};

use anyhow::{Result, anyhow, bail};
use backend::{config::config_loader, usecases::order_recovery::OrderRecoveryUseCase};
use chrono::Duration;
use crates::infra::db::{
    postgres::postgres_connection,
    repositories::{
        orders::OrderPostgres, payment_inconsistencies::InconsistencyPostgres,
        payments::PaymentPostgres,
    },
};
use serde_json::json;
use tracing::{error, info};

const USAGE: &str = "usage: order_recovery reconstruct <external_id> | sweep [grace_minutes] | open [limit]";
const SWEEP_LIMIT: i64 = 500;
const DEFAULT_OPEN_LIMIT: i64 = 100;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("order_recovery exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("order_recovery")?;

    let args: Vec<String> = env::args().skip(1).collect();
    let database = config_loader::load_database()?;
    let recovery = config_loader::load_recovery()?;

    let db_pool = Arc::new(postgres_connection::establish_connection(&database.url)?);
    let usecase = OrderRecoveryUseCase::new(
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(OrderPostgres::new(Arc::clone(&db_pool))),
        Arc::new(InconsistencyPostgres::new(db_pool)),
    );

    match args.first().map(String::as_str) {
        Some("reconstruct") => {
            let external_id = args.get(1).ok_or_else(|| anyhow!(USAGE))?;
            let result = usecase.reconstruct_order(external_id).await?;
            println!(
                "{}",
                json!({
                    "external_id": external_id,
                    "order_id": result.order.id,
                    "order_status": result.order.status,
                    "created": result.created,
                    "resolved_inconsistencies": result.resolved_inconsistencies,
                })
            );
        }
        Some("sweep") => {
            let grace_minutes = match args.get(1) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|err| anyhow!("grace_minutes is invalid: {err}"))?,
                None => recovery.grace_minutes,
            };
            info!(grace_minutes, "order_recovery: sweeping orphaned payments");
            let flagged = usecase
                .sweep_orphans(Duration::minutes(grace_minutes), SWEEP_LIMIT)
                .await?;
            for external_id in flagged {
                println!("{external_id}");
            }
        }
        Some("open") => {
            let limit = match args.get(1) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|err| anyhow!("limit is invalid: {err}"))?,
                None => DEFAULT_OPEN_LIMIT,
            };
            for inconsistency in usecase.list_open_inconsistencies(limit).await? {
                println!("{}", serde_json::to_string(&inconsistency)?);
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
