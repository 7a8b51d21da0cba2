use serde::Deserialize;
use serde::Serialize;

use super::cli_args::Args;
use super::network::Network;
use crate::models::blockchain::fee::FeeRate;

/// Engine knobs, passed explicitly to every builder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub network: Network,

    /// smallest output value worth creating
    pub dust_threshold: u64,

    /// ceiling on mint content bytes, before any remote storage
    pub max_content_size: usize,

    /// ceiling on the CBOR encoded mint payload
    pub max_payload_size: usize,

    /// content above this size is moved to the remote content store
    pub inline_content_limit: usize,

    /// fee rate used by the command line tool
    pub default_fee_rate: FeeRate,
}

impl EngineConfig {
    pub const DEFAULT_DUST_THRESHOLD: u64 = 546;
    pub const DEFAULT_MAX_CONTENT_SIZE: usize = 10_240_000;
    pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 10_250_000;
    pub const DEFAULT_INLINE_CONTENT_LIMIT: usize = 2_000;

    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Default::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            dust_threshold: Self::DEFAULT_DUST_THRESHOLD,
            max_content_size: Self::DEFAULT_MAX_CONTENT_SIZE,
            max_payload_size: Self::DEFAULT_MAX_PAYLOAD_SIZE,
            inline_content_limit: Self::DEFAULT_INLINE_CONTENT_LIMIT,
            default_fee_rate: FeeRate::default(),
        }
    }
}

impl From<&Args> for EngineConfig {
    fn from(args: &Args) -> Self {
        Self {
            network: args.network,
            dust_threshold: args.dust_threshold,
            max_content_size: usize::try_from(args.max_content_size.as_u64()).unwrap_or(usize::MAX),
            max_payload_size: usize::try_from(args.max_payload_size.as_u64()).unwrap_or(usize::MAX),
            inline_content_limit: args.inline_content_limit,
            default_fee_rate: FeeRate::new(args.fee_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_match_default_config() {
        let config = EngineConfig::from(&Args::default());
        assert_eq!(EngineConfig::default(), config);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"network":"testnet","dust_threshold":1000}"#).unwrap();
        assert_eq!(Network::Testnet, config.network);
        assert_eq!(1000, config.dust_threshold);
        assert_eq!(
            EngineConfig::DEFAULT_INLINE_CONTENT_LIMIT,
            config.inline_content_limit
        );
    }
}
