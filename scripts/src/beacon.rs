//! Resolution of the beacon governing a beacon proxy

use alloy::primitives::{Address, B256};

use crate::{
    chain::Chain,
    constants::{BEACON_STORAGE_SLOT, NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT},
    errors::ScriptError,
};

/// Decode an address stored in a 32-byte storage word
///
/// Addresses are right-aligned in storage, so this takes the low-order 20
/// bytes. The returned address renders checksum-cased.
pub fn decode_beacon_word(word: B256) -> Address {
    Address::from_slice(&word[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT])
}

/// Get the beacon address of a proxy
///
/// This is the recommended way to get the beacon address:
/// https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L146-L148
///
/// Returns the zero address, not an error, if the slot is unset; callers
/// decide what a missing beacon means to them.
pub async fn resolve_beacon<C: Chain>(chain: &C, proxy: Address) -> Result<Address, ScriptError> {
    let word = chain
        .get_storage_at(proxy, BEACON_STORAGE_SLOT)
        .await
        .map_err(|e| match e {
            ScriptError::StorageReadFailure(_) => e,
            other => ScriptError::StorageReadFailure(other.to_string()),
        })?;

    Ok(decode_beacon_word(word))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy::primitives::b256;

    use super::*;
    use crate::test_utils::{deployer, MockChain};

    #[test]
    fn test_decode_beacon_word() {
        let word = b256!("0x000000000000000000000000a3f0ad74e5423aebfd80d3ef4346578335a9a72a");
        let expected = Address::from_str("0xa3f0ad74e5423aebfd80d3ef4346578335a9a72a").unwrap();

        let decoded = decode_beacon_word(word);
        assert_eq!(decoded, expected);
        // Rendering is checksum-cased rather than the lowercase of the input
        assert_eq!(decoded.to_string(), expected.to_checksum(None));
        assert_ne!(decoded.to_string(), "0xa3f0ad74e5423aebfd80d3ef4346578335a9a72a");
    }

    #[test]
    fn test_decode_ignores_high_bytes() {
        let mut word = B256::repeat_byte(0xff);
        word[12..].copy_from_slice(Address::repeat_byte(0x11).as_slice());
        assert_eq!(decode_beacon_word(word), Address::repeat_byte(0x11));
    }

    #[tokio::test]
    async fn test_resolve_installed_beacon() {
        let chain = MockChain::default();
        let (proxy, beacon, _) = chain.install_beacon_proxy(deployer());

        assert_eq!(resolve_beacon(&chain, proxy).await.unwrap(), beacon);
    }

    #[tokio::test]
    async fn test_unset_slot_resolves_to_zero() {
        let chain = MockChain::default();
        let resolved = resolve_beacon(&chain, Address::repeat_byte(0x42)).await.unwrap();
        assert!(resolved.is_zero());
    }

    #[tokio::test]
    async fn test_read_failure() {
        let mut chain = MockChain::default();
        chain.fail_storage_reads = true;

        let res = resolve_beacon(&chain, Address::repeat_byte(0x42)).await;
        assert!(matches!(res, Err(ScriptError::StorageReadFailure(_))));
    }
}
