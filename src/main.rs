//! bank_ledger - command line front end for the ledger
//!
//! ```text
//! bank_ledger [--env dev] init-db
//! bank_ledger [--env dev] create-account <owner> <balance> <currency>
//! bank_ledger [--env dev] get-account <id>
//! bank_ledger [--env dev] entries <account_id>
//! bank_ledger [--env dev] transfer <from> <to> <amount>
//! ```
//!
//! Every command prints one JSON document on stdout.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::json;

use bank_ledger::config::AppConfig;
use bank_ledger::db::Database;
use bank_ledger::models::NewAccount;
use bank_ledger::store::{AccountStore, EntryStore, PgLedgerStore, TransferStore, TxManager};
use bank_ledger::transfer::{TransferEngine, TransferError};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env(args: &[String]) -> String {
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Positional arguments with `--env <name>` removed
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args.iter().skip(1) {
        if skip {
            skip = false;
            continue;
        }
        if arg == "--env" || arg == "-e" {
            skip = true;
            continue;
        }
        out.push(arg.clone());
    }
    out
}

fn parse_arg<T: std::str::FromStr>(cmd: &[String], idx: usize, name: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = cmd
        .get(idx)
        .with_context(|| format!("missing argument <{name}>"))?;
    raw.parse()
        .with_context(|| format!("invalid <{name}>: {raw}"))
}

const USAGE: &str = "usage: bank_ledger [--env <env>] \
    <init-db | create-account <owner> <balance> <currency> | get-account <id> | \
    entries <account_id> | transfer <from> <to> <amount>>";

// ============================================================
// COMMANDS
// ============================================================

async fn run(store: Arc<PgLedgerStore>, cmd: &[String]) -> anyhow::Result<serde_json::Value> {
    let Some(name) = cmd.first() else {
        bail!(USAGE);
    };

    match name.as_str() {
        "create-account" => {
            let owner: String = parse_arg(cmd, 1, "owner")?;
            let balance: i64 = parse_arg(cmd, 2, "balance")?;
            let currency: String = parse_arg(cmd, 3, "currency")?;

            let mut tx = store.begin().await?;
            let account = store
                .create_account(&mut tx, &NewAccount::new(owner, balance, currency))
                .await?;
            store.commit(tx).await?;

            tracing::info!(account_id = account.id, "Account created");
            Ok(serde_json::to_value(account)?)
        }
        "get-account" => {
            let id: i64 = parse_arg(cmd, 1, "id")?;

            let mut tx = store.begin().await?;
            let account = store.get_account(&mut tx, id).await?;
            store.rollback(tx).await?;

            match account {
                Some(account) => Ok(serde_json::to_value(account)?),
                None => Ok(error_json(&TransferError::AccountNotFound(id))),
            }
        }
        "entries" => {
            let id: i64 = parse_arg(cmd, 1, "account_id")?;

            let mut tx = store.begin().await?;
            let entries = store.list_entries(&mut tx, id).await?;
            let transfers = store.list_transfers(&mut tx, id).await?;
            store.rollback(tx).await?;

            Ok(json!({ "entries": entries, "transfers": transfers }))
        }
        "transfer" => {
            let from: i64 = parse_arg(cmd, 1, "from")?;
            let to: i64 = parse_arg(cmd, 2, "to")?;
            let amount: i64 = parse_arg(cmd, 3, "amount")?;

            let engine = TransferEngine::from_store(store);
            match engine.transfer(from, to, amount).await {
                Ok(result) => Ok(serde_json::to_value(result)?),
                Err(e) => Ok(error_json(&e)),
            }
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
}

async fn execute(app_config: &AppConfig, cmd: &[String]) -> anyhow::Result<serde_json::Value> {
    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if cmd.first().map(String::as_str) == Some("init-db") {
        db.ensure_schema().await?;
        return Ok(json!({ "status": "ok" }));
    }

    let store = Arc::new(
        PgLedgerStore::new(db.pool().clone()).with_lock_timeout(app_config.database.lock_timeout()),
    );
    run(store, cmd).await
}

fn error_json(e: &TransferError) -> serde_json::Value {
    json!({
        "error": {
            "code": e.code(),
            "status": e.http_status(),
            "retryable": e.is_retryable(),
            "message": e.to_string(),
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let env = get_env(&args);
    let cmd = positional(&args);

    let app_config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = bank_ledger::logging::init_logging(&app_config);

    tracing::info!(
        build = env!("LEDGER_BUILD_ID"),
        "Starting bank_ledger in {} mode",
        env
    );

    let result = execute(&app_config, &cmd).await;

    match result {
        Ok(value) => {
            let failed = value.get("error").is_some();
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!("Command failed: {e:#}");
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_env_flag() {
        assert_eq!(get_env(&args("bank_ledger --env prod get-account 1")), "prod");
        assert_eq!(get_env(&args("bank_ledger get-account 1")), "dev");
    }

    #[test]
    fn test_positional_strips_env() {
        let cmd = positional(&args("bank_ledger -e ci transfer 1 2 30"));
        assert_eq!(cmd, vec!["transfer", "1", "2", "30"]);
    }

    #[test]
    fn test_parse_arg_errors() {
        let cmd = args("transfer 1 x");
        assert_eq!(parse_arg::<i64>(&cmd, 1, "from").unwrap(), 1);
        assert!(parse_arg::<i64>(&cmd, 2, "to").is_err());
        assert!(parse_arg::<i64>(&cmd, 3, "amount").is_err());
    }
}
