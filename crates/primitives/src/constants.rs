//! Account abstraction (ERC-4337)-related constants

/// Entry point smart contracts
pub mod entry_point {
    /// Address of the entry point smart contract v0.6
    pub const ADDRESS_V06: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
    /// Address of the entry point smart contract v0.7
    pub const ADDRESS_V07: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";
    /// Address of the entry point smart contract v0.8
    pub const ADDRESS_V08: &str = "0x4337084D9E255Ff0702461CF8895CE9E3b5Ff108";

    /// EIP-712 domain of the entry point v0.8
    pub const EIP712_NAME: &str = "ERC4337";
    pub const EIP712_VERSION: &str = "1";
    pub const PACKED_USER_OPERATION_TYPE: &str = "PackedUserOperation(address sender,uint256 nonce,bytes initCode,bytes callData,bytes32 accountGasLimits,uint256 preVerificationGas,bytes32 gasFees,bytes paymasterAndData)";
}

/// EIP-7702 (set code for EOAs)
pub mod eip7702 {
    /// Prefix of the authorization signing payload
    pub const MAGIC: u8 = 0x05;
    /// Code of a delegated EOA is `0xef0100 ‖ delegate`
    pub const DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];
    /// Factory marker signalling that the sender needs an EIP-7702 authorization
    pub const FACTORY_MARKER: &str = "0x7702000000000000000000000000000000000000";
    /// Short JSON form of the factory marker
    pub const FACTORY_MARKER_SHORT: &str = "0x7702";
}

/// Signatures
pub mod signature {
    /// Length of an ECDSA signature (r ‖ s ‖ v)
    pub const ECDSA_LENGTH: usize = 65;
    /// Well-formed ECDSA signature used during gas estimation (low `s`, recoverable)
    pub const STUB_ECDSA: &str = "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";
}

/// Receipt polling
pub mod receipt {
    /// Interval between two `eth_getUserOperationReceipt` requests (in milliseconds)
    pub const POLLING_INTERVAL_MS: u64 = 1_000;
    /// Default time to wait for a receipt (in milliseconds)
    pub const TIMEOUT_MS: u64 = 60_000;
}

/// Paymasters
pub mod paymaster {
    /// Exchange rates returned by token quotes are scaled by 10^18
    pub const EXCHANGE_RATE_DECIMALS: usize = 18;
}

/// ERC-20 tokens
pub mod erc20 {
    /// USDT on mainnet, requires allowance to be reset to zero before a new approval
    pub const USDT_MAINNET: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
}

/// Bundler RPC error codes
pub mod rpc_error_codes {
    pub const VALIDATION: i32 = -32500;
    pub const PAYMASTER: i32 = -32501;
    pub const OPCODE: i32 = -32502;
    pub const EXPIRATION: i32 = -32503;
    pub const ENTITY_BANNED_OR_THROTTLED: i32 = -32504;
    pub const STAKE_TOO_LOW: i32 = -32505;
    pub const SIGNATURE_AGGREGATOR: i32 = -32506;
    pub const SIGNATURE: i32 = -32507;
    pub const EXECUTION: i32 = -32521;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
}
