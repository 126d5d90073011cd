use clap::{Parser, Subcommand, ValueEnum};

/// Sublink CLI - Terminal driver for a Substrate-style node
#[derive(Parser, Debug)]
#[command(name = "sublink")]
#[command(version)]
#[command(about = "Talk to a blockchain node over its WebSocket RPC endpoint", long_about = None)]
pub struct Cli {
    /// Node WebSocket endpoint (e.g., ws://localhost:9944)
    #[arg(short = 'u', long = "url", default_value = sublink::DEFAULT_ENDPOINT)]
    pub url: String,

    /// WebSocket handshake timeout in seconds
    #[arg(long = "connect-timeout-secs", default_value = "10")]
    pub connect_timeout_secs: u64,

    /// Disable automatic reconnection after a dropped connection
    #[arg(long = "no-reconnect")]
    pub no_reconnect: bool,

    /// Initial delay between reconnection attempts in milliseconds
    #[arg(long = "reconnect-delay-ms", default_value = "1000")]
    pub reconnect_delay_ms: u64,

    /// Give up after this many reconnection attempts (default: retry forever)
    #[arg(long = "max-reconnect-attempts")]
    pub max_reconnect_attempts: Option<u32>,

    /// Enable verbose logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a chain constant by pallet and name
    Constant {
        /// Pallet the constant lives in (e.g., balances)
        pallet: String,
        /// Constant name (e.g., existentialDeposit)
        name: String,
    },

    /// Print a storage value by its 0x-prefixed hex key
    Storage {
        /// Full storage key as 0x-prefixed hex
        key: String,
    },

    /// Print the node's metadata blob
    Metadata,

    /// Read a value from the node-local off-chain key/value store
    OffchainGet {
        /// Storage namespace
        #[arg(value_enum)]
        kind: OffchainKind,
        /// Key as 0x-prefixed hex
        key: String,
    },

    /// Submit a pre-signed extrinsic
    Submit {
        /// The signed extrinsic as 0x-prefixed hex
        extrinsic: String,
        /// Stream status updates until the extrinsic is finalized or rejected
        #[arg(long)]
        watch: bool,
    },

    /// Subscribe to storage changes and print updates as they arrive
    WatchStorage {
        /// Full storage keys as 0x-prefixed hex
        #[arg(required = true)]
        keys: Vec<String>,
        /// Stop after this many updates (default: run until interrupted)
        #[arg(long)]
        count: Option<u64>,
    },

    /// Run the demonstration sequence against a development node
    Demo {
        /// Account storage keys to inspect, 0x-prefixed hex (repeatable)
        #[arg(long = "account-key")]
        account_keys: Vec<String>,
        /// Pre-signed transfer extrinsic to submit and watch, 0x-prefixed hex
        #[arg(long)]
        extrinsic: Option<String>,
        /// Off-chain worker storage key to read, 0x-prefixed hex
        #[arg(long)]
        offchain_key: Option<String>,
    },
}

/// CLI-facing spelling of the off-chain storage namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OffchainKind {
    Persistent,
    Local,
}

impl From<OffchainKind> for sublink::StorageKind {
    fn from(kind: OffchainKind) -> Self {
        match kind {
            OffchainKind::Persistent => sublink::StorageKind::Persistent,
            OffchainKind::Local => sublink::StorageKind::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sublink", "metadata"]);
        assert_eq!(cli.url, sublink::DEFAULT_ENDPOINT);
        assert_eq!(cli.connect_timeout_secs, 10);
        assert!(!cli.no_reconnect);
        assert!(matches!(cli.command, Command::Metadata));
    }

    #[test]
    fn test_demo_flags() {
        let cli = Cli::parse_from([
            "sublink",
            "--url",
            "ws://node.example:9944",
            "demo",
            "--account-key",
            "0x01",
            "--account-key",
            "0x02",
            "--offchain-key",
            "0x03",
        ]);
        assert_eq!(cli.url, "ws://node.example:9944");
        match cli.command {
            Command::Demo {
                account_keys,
                extrinsic,
                offchain_key,
            } => {
                assert_eq!(account_keys, vec!["0x01", "0x02"]);
                assert_eq!(extrinsic, None);
                assert_eq!(offchain_key, Some("0x03".to_string()));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_watch_storage_requires_a_key() {
        assert!(Cli::try_parse_from(["sublink", "watch-storage"]).is_err());
    }
}
