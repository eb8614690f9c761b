//! Read-only contract calls made through `EthereumNode::call`.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::error::NetworkError;
use crate::node::EthereumNode;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }

    interface IGnosisSafe {
        function nonce() external view returns (uint256);
    }
}

/// ERC-20 balance of `owner` in the token's smallest unit.
pub async fn erc20_balance_of(
    node: &dyn EthereumNode,
    token: Address,
    owner: Address,
) -> Result<U256, NetworkError> {
    let data = IERC20::balanceOfCall { owner }.abi_encode();
    let output = node.call(token, Bytes::from(data)).await?;
    decode_uint256(&output, "balanceOf")
}

/// Next nonce the safe contract will accept.
pub async fn safe_nonce(node: &dyn EthereumNode, safe: Address) -> Result<U256, NetworkError> {
    let data = IGnosisSafe::nonceCall {}.abi_encode();
    let output = node.call(safe, Bytes::from(data)).await?;
    decode_uint256(&output, "nonce")
}

/// First ABI word of a call result.
fn decode_uint256(output: &[u8], method: &str) -> Result<U256, NetworkError> {
    if output.len() < 32 {
        return Err(NetworkError::Client(format!(
            "{} returned {} bytes, expected a uint256",
            method,
            output.len()
        )));
    }
    Ok(U256::from_be_slice(&output[..32]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::hex;

    #[test]
    fn test_call_encodings() {
        let owner = Address::repeat_byte(0xaa);
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        assert_eq!(&data[..4], hex!("70a08231"));
        assert_eq!(&data[16..36], owner.as_slice());

        let nonce = IGnosisSafe::nonceCall {}.abi_encode();
        assert_eq!(nonce, hex!("affed0e0").to_vec());
    }

    #[test]
    fn test_decode_uint256() {
        let mut word = [0u8; 32];
        word[31] = 5;
        assert_eq!(decode_uint256(&word, "nonce").unwrap(), U256::from(5));
        assert!(matches!(decode_uint256(&[], "nonce"), Err(NetworkError::Client(_))));
    }
}
