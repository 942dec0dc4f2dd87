//! CLI argument definitions for delroute.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `providers` | Look up providers of a CID, one JSON record per line |
//! | `provide` | Sign and announce bitswap provider records |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--endpoint` | `https://delegated-ipfs.dev` | Delegated routing base URL |
//! | `--timeout-ms` | `30000` | Cancels the call after this long |
//! | `-v` | off | Raise log verbosity (repeatable) |
//!
//! # Examples
//!
//! ```bash
//! delroute providers bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi
//! delroute providers bafkqaaa --batch-only --endpoint http://127.0.0.1:8080
//! DELROUTE_IDENTITY_SEED=... delroute provide bafkqaaa --ttl 12h --addr /ip4/1.2.3.4/tcp/4001
//! ```

use clap::{ArgAction, Args, Parser, Subcommand};

pub const DEFAULT_ENDPOINT: &str = "https://delegated-ipfs.dev";

/// Delegated content routing client.
#[derive(Debug, Parser)]
#[command(name = "delroute", author, version, about = "Delegated content routing client")]
pub struct Cli {
    /// Base URL of the delegated routing service.
    #[arg(long, global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Cancel the request (and any open stream) after this many milliseconds.
    #[arg(long, global = true, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Log verbosity; RUST_LOG applies when not given.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up providers of a CID.
    ///
    /// Prints one JSON provider record per line as they arrive.
    ///
    /// # Examples
    ///
    ///   delroute providers bafkqaaa
    ///   delroute providers bafkqaaa --batch-only
    Providers(ProvidersArgs),

    /// Announce this peer as a bitswap provider.
    ///
    /// The signing key is read from DELROUTE_IDENTITY_SEED (base64 of a
    /// 32-byte ed25519 seed).
    ///
    /// # Examples
    ///
    ///   delroute provide bafkqaaa
    ///   delroute provide bafkqaaa --ttl 12h --addr /ip4/1.2.3.4/tcp/4001
    Provide(ProvideArgs),
}

#[derive(Debug, Args)]
pub struct ProvidersArgs {
    /// Content identifier to look up.
    pub cid: String,

    /// Ask for a single JSON document instead of a stream.
    #[arg(long, default_value_t = false)]
    pub batch_only: bool,
}

#[derive(Debug, Args)]
pub struct ProvideArgs {
    /// Content identifiers to announce.
    #[arg(required = true)]
    pub cids: Vec<String>,

    /// Requested advisory TTL, e.g. 24h, 90m, 1h30m.
    #[arg(long, default_value = "24h")]
    pub ttl: String,

    /// Multiaddress to advertise; repeat for several.
    #[arg(long = "addr")]
    pub addrs: Vec<String>,
}
