//! ERC-7579 modular account encoding: execution modes, `execute` and module management

use crate::{
    client::PublicClient,
    error::{AccountError, AccountResult},
};
use ethers::{
    abi::Token,
    types::{Address, Bytes, H256, U256},
};
use keel_primitives::{
    codec::{abi, Packed},
    Call,
};

pub const EXECUTE: &str = "execute(bytes32,bytes)";
pub const INSTALL_MODULE: &str = "installModule(uint256,address,bytes)";
pub const UNINSTALL_MODULE: &str = "uninstallModule(uint256,address,bytes)";
pub const IS_MODULE_INSTALLED: &str = "isModuleInstalled(uint256,address,bytes)";
pub const SUPPORTS_MODULE: &str = "supportsModule(uint256)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CallType {
    Single = 0x00,
    Batch = 0x01,
    DelegateCall = 0xff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecType {
    /// Reverts when a call reverts
    Default = 0x00,
    /// Emits an event when a call reverts
    Try = 0x01,
}

/// `callType(1) ‖ execType(1) ‖ unused(4) ‖ selector(4) ‖ payload(22)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionMode {
    pub call_type: CallType,
    pub exec_type: ExecType,
    pub selector: [u8; 4],
    pub payload: [u8; 22],
}

impl ExecutionMode {
    pub fn new(call_type: CallType) -> Self {
        Self { call_type, exec_type: ExecType::Default, selector: [0; 4], payload: [0; 22] }
    }

    pub fn single() -> Self {
        Self::new(CallType::Single)
    }

    pub fn batch() -> Self {
        Self::new(CallType::Batch)
    }

    pub fn exec_type(mut self, exec_type: ExecType) -> Self {
        self.exec_type = exec_type;
        self
    }

    pub fn encode(&self) -> H256 {
        let mut word = [0u8; 32];
        word[0] = self.call_type as u8;
        word[1] = self.exec_type as u8;
        word[6..10].copy_from_slice(&self.selector);
        word[10..].copy_from_slice(&self.payload);
        H256::from(word)
    }
}

/// Single execution data: `target ‖ value ‖ callData` packed
pub fn encode_single_execution(call: &Call) -> Bytes {
    Packed::new().address(call.to).uint(call.value, 256).bytes(&call.data).finish()
}

/// Batch execution data: `abi.encode((address,uint256,bytes)[])`
pub fn encode_batch_execution(calls: &[Call]) -> Bytes {
    abi::encode(&[Token::Array(calls.iter().map(Call::to_token).collect())]).into()
}

/// `execute(mode, executionCalldata)`, single call mode for one call
pub fn encode_execute(calls: &[Call]) -> AccountResult<Bytes> {
    let (mode, execution) = match calls {
        [] => return Err(AccountError::EmptyBatch),
        [call] => (ExecutionMode::single(), encode_single_execution(call)),
        calls => (ExecutionMode::batch(), encode_batch_execution(calls)),
    };
    Ok(abi::encode_function_call(
        EXECUTE,
        &[Token::FixedBytes(mode.encode().as_bytes().to_vec()), Token::Bytes(execution.to_vec())],
    ))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ModuleType {
    Validator = 1,
    Executor = 2,
    Fallback = 3,
    Hook = 4,
}

impl ModuleType {
    fn token(self) -> Token {
        Token::Uint(U256::from(self as u8))
    }
}

/// Module with the data passed to its `onInstall`/`onUninstall`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Module {
    pub module_type: ModuleType,
    pub address: Address,
    pub data: Bytes,
}

impl Module {
    pub fn new(module_type: ModuleType, address: Address) -> Self {
        Self { module_type, address, data: Bytes::default() }
    }

    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    fn tokens(&self) -> [Token; 3] {
        [self.module_type.token(), Token::Address(self.address), Token::Bytes(self.data.to_vec())]
    }
}

pub fn encode_install_module(module: &Module) -> Bytes {
    abi::encode_function_call(INSTALL_MODULE, &module.tokens())
}

pub fn encode_uninstall_module(module: &Module) -> Bytes {
    abi::encode_function_call(UNINSTALL_MODULE, &module.tokens())
}

/// `isModuleInstalled(type, module, additionalContext)`, `module.data` is the context
pub fn encode_is_module_installed(module: &Module) -> Bytes {
    abi::encode_function_call(IS_MODULE_INSTALLED, &module.tokens())
}

pub fn encode_supports_module(module_type: ModuleType) -> Bytes {
    abi::encode_function_call(SUPPORTS_MODULE, &[module_type.token()])
}

/// Decodes the `bool` returned by `isModuleInstalled` and `supportsModule`
pub fn decode_module_query(data: &[u8]) -> AccountResult<bool> {
    Ok(abi::decode_bool(data)?)
}

pub async fn is_module_installed(
    client: &dyn PublicClient,
    account: Address,
    module: &Module,
) -> AccountResult<bool> {
    let result = client.call(account, encode_is_module_installed(module), None).await?;
    decode_module_query(&result)
}

pub async fn supports_module(
    client: &dyn PublicClient,
    account: Address,
    module_type: ModuleType,
) -> AccountResult<bool> {
    let result = client.call(account, encode_supports_module(module_type), None).await?;
    decode_module_query(&result)
}
