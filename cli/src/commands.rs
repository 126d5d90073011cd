//! Command handlers for the sublink CLI.

use std::time::Duration;

use serde_json::Value;
use sublink::{
    ConnectionOptions, EventHandlers, StorageKind, SublinkClient, SublinkTimeouts,
};

use crate::args::{Cli, Command};
use crate::error::{CliError, Result};

/// How long the demo watches the first account for balance changes,
/// mirroring the pause the original example script took.
const DEMO_WATCH_WINDOW: Duration = Duration::from_secs(6);

/// Connect, run the requested command, and tear the connection down.
pub async fn run(cli: Cli) -> Result<()> {
    let client = connect(&cli).await?;
    let outcome = dispatch(&client, cli.command).await;
    client.close().await;
    outcome
}

async fn connect(cli: &Cli) -> Result<SublinkClient> {
    let timeouts = SublinkTimeouts::builder()
        .connect_timeout_secs(cli.connect_timeout_secs)
        .build();
    let options = ConnectionOptions::new()
        .with_auto_reconnect(!cli.no_reconnect)
        .with_reconnect_delay_ms(cli.reconnect_delay_ms)
        .with_max_reconnect_attempts(cli.max_reconnect_attempts);
    let handlers = EventHandlers::new()
        .on_connect(|| log::info!("node connection established"))
        .on_disconnect(|reason| log::warn!("node connection closed: {}", reason))
        .on_error(|err| log::warn!("connection error: {}", err));

    let client = SublinkClient::builder()
        .endpoint(cli.url.as_str())
        .timeouts(timeouts)
        .connection_options(options)
        .event_handlers(handlers)
        .connect()
        .await?;
    Ok(client)
}

async fn dispatch(client: &SublinkClient, command: Command) -> Result<()> {
    match command {
        Command::Constant { pallet, name } => {
            let value = client.get_constant(&pallet, &name).await?;
            println!("{}", value);
            Ok(())
        }

        Command::Storage { key } => {
            validate_hex(&key, "storage key")?;
            match client.get_storage(&key).await? {
                Some(value) => println!("{}", value),
                None => println!("<no value>"),
            }
            Ok(())
        }

        Command::Metadata => {
            let metadata = client.get_metadata().await?;
            println!("{}", metadata);
            Ok(())
        }

        Command::OffchainGet { kind, key } => {
            validate_hex(&key, "off-chain key")?;
            match client.offchain_local_storage_get(kind.into(), &key).await? {
                Some(value) => println!("{}", value),
                None => println!("<no value>"),
            }
            Ok(())
        }

        Command::Submit { extrinsic, watch } => {
            validate_hex(&extrinsic, "extrinsic")?;
            if watch {
                watch_submission(client, &extrinsic).await
            } else {
                let hash = client.submit_extrinsic(&extrinsic).await?;
                println!("{}", hash);
                Ok(())
            }
        }

        Command::WatchStorage { keys, count } => {
            for key in &keys {
                validate_hex(key, "storage key")?;
            }
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let mut sub = client.subscribe_storage(&refs).await?;
            log::info!("subscribed as {}", sub.id());

            let mut seen = 0u64;
            while count.map_or(true, |limit| seen < limit) {
                match sub.next().await {
                    Some(update) => {
                        println!("{}", update?);
                        seen += 1;
                    }
                    None => break,
                }
            }
            sub.unsubscribe().await?;
            Ok(())
        }

        Command::Demo {
            account_keys,
            extrinsic,
            offchain_key,
        } => demo(client, account_keys, extrinsic, offchain_key).await,
    }
}

/// The original example sequence: read a constant, inspect accounts,
/// optionally submit a transfer and watch it, briefly subscribe to the
/// first account's storage, and read an off-chain worker value.
async fn demo(
    client: &SublinkClient,
    account_keys: Vec<String>,
    extrinsic: Option<String>,
    offchain_key: Option<String>,
) -> Result<()> {
    for key in &account_keys {
        validate_hex(key, "account key")?;
    }
    if let Some(extrinsic) = &extrinsic {
        validate_hex(extrinsic, "extrinsic")?;
    }
    if let Some(key) = &offchain_key {
        validate_hex(key, "off-chain key")?;
    }

    println!("connection to node is OK.");

    let deposit = client.get_constant("balances", "existentialDeposit").await?;
    println!("constant balances.existentialDeposit: {}", deposit);

    for key in &account_keys {
        match client.get_storage(key).await? {
            Some(value) => println!("account {}: {}", key, value),
            None => println!("account {}: <no value>", key),
        }
    }

    if let Some(extrinsic) = &extrinsic {
        watch_submission(client, extrinsic).await?;
    }

    if let Some(key) = account_keys.first() {
        watch_briefly(client, key).await?;
    }

    if let Some(key) = &offchain_key {
        match client
            .offchain_local_storage_get(StorageKind::Persistent, key)
            .await?
        {
            Some(value) => println!("offchain {}: {}", key, value),
            None => println!("offchain {}: <no value>", key),
        }
    }

    println!("demo complete.");
    Ok(())
}

/// Submit and stream status transitions until a terminal one.
async fn watch_submission(client: &SublinkClient, extrinsic: &str) -> Result<()> {
    let mut watch = client.submit_and_watch_extrinsic(extrinsic).await?;
    while let Some(status) = watch.next().await {
        let status = status?;
        println!("tx status: {}", status);
        if is_success_status(&status) {
            return Ok(());
        }
        if is_failure_status(&status) {
            return Err(CliError::Transaction(status.to_string()));
        }
    }
    Err(CliError::Transaction(
        "status stream ended before a terminal status".into(),
    ))
}

/// Watch one storage key for a fixed window, printing whatever arrives.
async fn watch_briefly(client: &SublinkClient, key: &str) -> Result<()> {
    let mut sub = client.subscribe_storage(&[key]).await?;
    println!("watching {} for {:?}...", key, DEMO_WATCH_WINDOW);
    let deadline = tokio::time::Instant::now() + DEMO_WATCH_WINDOW;
    loop {
        match tokio::time::timeout_at(deadline, sub.next()).await {
            Ok(Some(update)) => println!("storage changed: {}", update?),
            Ok(None) => break,
            // Window elapsed without further updates.
            Err(_) => break,
        }
    }
    sub.unsubscribe().await?;
    Ok(())
}

/// A finalized extrinsic is the one successful terminal status.
fn is_success_status(status: &Value) -> bool {
    status
        .as_object()
        .map_or(false, |map| map.contains_key("finalized"))
}

/// Terminal statuses that mean the extrinsic will never finalize.
fn is_failure_status(status: &Value) -> bool {
    match status {
        Value::String(s) => matches!(s.as_str(), "dropped" | "invalid"),
        Value::Object(map) => {
            map.contains_key("usurped") || map.contains_key("finalityTimeout")
        }
        _ => false,
    }
}

fn validate_hex(value: &str, what: &str) -> Result<()> {
    let stripped = value.strip_prefix("0x").ok_or_else(|| {
        CliError::InvalidArgument(format!("{} must be 0x-prefixed hex: {}", what, value))
    })?;
    hex::decode(stripped)
        .map_err(|e| CliError::InvalidArgument(format!("{} is not valid hex: {}", what, e)))?;
    Ok(())
}
