//! Contract descriptions shared by every stage of a run.

use std::borrow::Cow;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256},
};
use serde::{Deserialize, Serialize};

/// Logical name of a contract within a run (`token`, `airdrop`, ...).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct ContractName(Cow<'static, str>);

impl ContractName {
    pub const TOKEN: Self = Self::from_static("token");
    pub const AIRDROP: Self = Self::from_static("airdrop");
    pub const PRESALE: Self = Self::from_static("presale");
    pub const STAKING: Self = Self::from_static("staking");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContractName {
    fn from(name: &str) -> Self {
        Self(Cow::Owned(name.to_owned()))
    }
}

impl From<String> for ContractName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// A single ABI-typed constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ConstructorArg {
    String(String),
    /// An unsigned integer of the given bit width (`uint8`, `uint256`, ...).
    Uint { value: U256, bits: usize },
    Address(Address),
    /// A fixed-size `address[N]` array, `N` being the length of the vector.
    FixedAddressArray(Vec<Address>),
}

impl ConstructorArg {
    fn to_sol_value(&self) -> DynSolValue {
        match self {
            Self::String(s) => DynSolValue::String(s.clone()),
            Self::Uint { value, bits } => DynSolValue::Uint(*value, *bits),
            Self::Address(address) => DynSolValue::Address(*address),
            Self::FixedAddressArray(addresses) => DynSolValue::FixedArray(
                addresses.iter().copied().map(DynSolValue::Address).collect(),
            ),
        }
    }
}

impl std::fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Uint { value, .. } => write!(f, "{value}"),
            Self::Address(address) => write!(f, "{address}"),
            Self::FixedAddressArray(addresses) => {
                let joined: Vec<String> = addresses.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// ABI-encode constructor arguments the way the EVM expects them after the creation code.
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Bytes {
    if args.is_empty() {
        return Bytes::new();
    }
    let tuple = DynSolValue::Tuple(args.iter().map(ConstructorArg::to_sol_value).collect());
    tuple.abi_encode_params().into()
}

/// Static description of one contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Logical name, unique within a run.
    pub name: ContractName,
    /// Name of the compiled artifact holding the creation bytecode.
    pub artifact: String,
    pub constructor_args: Vec<ConstructorArg>,
}

impl ContractSpec {
    pub fn new(
        name: ContractName,
        artifact: impl Into<String>,
        constructor_args: Vec<ConstructorArg>,
    ) -> Self {
        Self {
            name,
            artifact: artifact.into(),
            constructor_args,
        }
    }

    pub fn encoded_args(&self) -> Bytes {
        encode_constructor_args(&self.constructor_args)
    }
}

/// A contract whose creation transaction has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub name: ContractName,
    pub address: Address,
    pub deployment_tx_hash: B256,
    pub confirmed_block_number: u64,
    /// Artifact the creation code came from.
    pub artifact: String,
    /// Arguments the contract was created with.
    pub constructor_args: Vec<ConstructorArg>,
}

impl DeployedContract {
    /// The spec this contract was deployed from.
    pub fn spec(&self) -> ContractSpec {
        ContractSpec::new(
            self.name.clone(),
            self.artifact.clone(),
            self.constructor_args.clone(),
        )
    }
}
