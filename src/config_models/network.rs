use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;

#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    strum::EnumIs,
)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Network {
    /// Main net.
    #[default]
    Main,

    /// Public test network. Shares the address version with regtest.
    Testnet,

    /// Local network for unit and integration tests.
    RegTest,
}

impl Network {
    /// base58check version byte of pay-to-pubkey-hash addresses
    pub fn address_version(&self) -> u8 {
        match *self {
            Self::Main => 0x00,
            Self::Testnet | Self::RegTest => 0x6f,
        }
    }

    /// Network of an address version byte.
    ///
    /// Test networks share a version byte, so `0x6f` resolves to
    /// [Network::Testnet].
    pub fn from_address_version(version: u8) -> Option<Self> {
        match version {
            0x00 => Some(Self::Main),
            0x6f => Some(Self::Testnet),
            _ => None,
        }
    }

    /// version byte of WIF encoded private keys
    pub fn wif_version(&self) -> u8 {
        match *self {
            Self::Main => 0x80,
            Self::Testnet | Self::RegTest => 0xef,
        }
    }

    /// indicates if two networks accept each other's addresses
    pub fn shares_addresses_with(&self, other: Network) -> bool {
        self.address_version() == other.address_version()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Network::Testnet => "testnet",
            Network::RegTest => "regtest",
            Network::Main => "main",
        };
        write!(f, "{}", string)
    }
}

impl FromStr for Network {
    type Err = String;
    fn from_str(input: &str) -> Result<Network, Self::Err> {
        match input {
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::RegTest),
            "main" => Ok(Network::Main),
            _ => Err(format!("Failed to parse {} as network", input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn main_variant_is_zero() {
        assert_eq!(0, Network::Main as u32);
    }

    #[test]
    fn display_parses_back() {
        for network in Network::iter() {
            assert_eq!(network, network.to_string().parse().unwrap());
        }
    }

    #[test]
    fn test_networks_share_address_version() {
        assert!(Network::RegTest.shares_addresses_with(Network::Testnet));
        assert!(!Network::Main.shares_addresses_with(Network::Testnet));
        assert_eq!(
            Some(Network::Testnet),
            Network::from_address_version(Network::RegTest.address_version())
        );
    }
}
