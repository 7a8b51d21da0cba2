use std::path::PathBuf;

use bytesize::ByteSize;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use clap::Subcommand;

use super::network::Network;
use crate::models::state::swap::SwapStatus;

/// Command-line arguments of the `glyph-engine` binary
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Specify network, `main`, `testnet`, or `regtest`
    #[clap(long, short, default_value = "main")]
    pub network: Network,

    /// The data directory that contains swap records and ledger snapshots.
    ///
    /// Defaults to the platform data directory, scoped by network.
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Fee rate in photons per byte of serialized transaction.
    #[clap(long, default_value = "10000", value_parser(RangedU64ValueParser::<u64>::new().range(1..)))]
    pub fee_rate: u64,

    /// Outputs below this value are not created; the remainder goes to fee.
    #[clap(long, default_value = "546")]
    pub dust_threshold: u64,

    /// Reject mint content larger than this.
    ///
    /// Units: B (bytes), K (kilobytes), M (megabytes), G (gigabytes)
    #[clap(long, default_value = "10240000B")]
    pub max_content_size: ByteSize,

    /// Reject encoded mint payloads larger than this.
    #[clap(long, default_value = "10250000B")]
    pub max_payload_size: ByteSize,

    /// Mint content above this many bytes is stored remotely and referenced
    /// by address and hash.
    #[clap(long, default_value = "2000")]
    pub inline_content_limit: usize,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode a raw transaction and classify its inputs and outputs.
    Inspect {
        /// transaction hex
        hex: String,
    },

    /// Compute fees and size of a mint without signing or broadcasting.
    PreviewMint {
        /// JSON encoded glyph payload
        #[clap(long)]
        payload: PathBuf,

        /// JSON ledger snapshot; defaults to the data directory snapshot
        #[clap(long)]
        ledger: Option<PathBuf>,

        /// minting address
        #[clap(long)]
        address: String,

        /// swap address; defaults to the minting address
        #[clap(long)]
        swap_address: Option<String>,
    },

    /// List persisted swap records.
    Swaps {
        /// only list records with this status
        #[clap(long)]
        status: Option<SwapStatus>,
    },
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

#[cfg(test)]
mod cli_args_tests {
    use super::*;

    #[test]
    fn default_args_test() {
        let default_args = Args::default();

        assert_eq!(Network::Main, default_args.network);
        assert_eq!(546, default_args.dust_threshold);
        assert_eq!(2000, default_args.inline_content_limit);
        assert_eq!(10_240_000, default_args.max_content_size.as_u64());
        assert!(default_args.command.is_none());
    }

    #[test]
    fn swaps_subcommand_parses_status() {
        let args = Args::parse_from(["glyph-engine", "--network", "testnet", "swaps", "--status", "pending"]);
        assert_eq!(Network::Testnet, args.network);
        assert!(matches!(
            args.command,
            Some(Command::Swaps {
                status: Some(SwapStatus::Pending)
            })
        ));
    }

    #[test]
    fn zero_fee_rate_is_rejected() {
        assert!(Args::try_parse_from(["glyph-engine", "--fee-rate", "0"]).is_err());
    }
}
