//! Definitions of Solidity functions called during deployment

use alloy_primitives::{Address as AlloyAddress, Bytes as AlloyBytes, FixedBytes};
use alloy_sol_types::{sol, SolCall};
use ethers::types::{Address, Bytes, H256};

use crate::errors::ScriptError;

sol! {
    function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
    function upgradeToAndCall(address newImplementation, bytes memory data) external payable;
    function proxiableUUID() external view returns (bytes32);
}

/// Calldata for `ProxyAdmin.upgradeAndCall`, used to repoint a transparent
/// proxy
pub fn upgrade_and_call_calldata(proxy: Address, implementation: Address, data: Vec<u8>) -> Bytes {
    let call = upgradeAndCallCall {
        proxy: to_alloy_address(proxy),
        implementation: to_alloy_address(implementation),
        data: AlloyBytes::from(data),
    };

    Bytes::from(call.abi_encode())
}

/// Calldata for `upgradeToAndCall` on a UUPS proxy
pub fn upgrade_to_and_call_calldata(implementation: Address, data: Vec<u8>) -> Bytes {
    let call = upgradeToAndCallCall {
        newImplementation: to_alloy_address(implementation),
        data: AlloyBytes::from(data),
    };

    Bytes::from(call.abi_encode())
}

/// Calldata for the ERC-1822 `proxiableUUID` accessor
pub fn proxiable_uuid_calldata() -> Bytes {
    Bytes::from(proxiableUUIDCall {}.abi_encode())
}

/// Decode the return value of a `proxiableUUID` call
pub fn decode_proxiable_uuid(data: &[u8]) -> Result<H256, ScriptError> {
    let ret = proxiableUUIDCall::abi_decode_returns(data, true /* validate */)
        .map_err(|e| ScriptError::Serde(e.to_string()))?;

    let FixedBytes(slot) = ret._0;
    Ok(H256(slot))
}

/// Convert an ethers address into the `sol!`-generated address type
fn to_alloy_address(address: Address) -> AlloyAddress {
    AlloyAddress::from_slice(address.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_calldata_selectors() {
        let addr = Address::from_low_u64_be(1);

        // upgradeAndCall(address,address,bytes)
        let calldata = upgrade_and_call_calldata(addr, addr, vec![]);
        assert_eq!(&calldata[..4], upgradeAndCallCall::SELECTOR);

        // upgradeToAndCall(address,bytes)
        let calldata = upgrade_to_and_call_calldata(addr, vec![]);
        assert_eq!(&calldata[..4], upgradeToAndCallCall::SELECTOR);
    }

    #[test]
    fn test_proxiable_uuid_round_trip() {
        let slot = H256::from_low_u64_be(42);
        let encoded = proxiableUUIDCall::abi_encode_returns(&(FixedBytes(slot.0),));

        assert_eq!(decode_proxiable_uuid(&encoded).unwrap(), slot);
    }
}
