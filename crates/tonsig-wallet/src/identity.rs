//! Wallet configuration and address derivation
//!
//! A wallet's address is the hash of its `StateInit` (program code plus configuration
//! data), so anyone holding the owner list, quorum and instance id can recompute it
//! without talking to the chain.

use tonsig_cell::{Address, Cell, CellBuilder};
use tracing::{debug, warn};

use crate::code::ProgramCode;
use crate::error::{Result, WalletError};
use crate::registry::OwnerRegistry;

/// Everything that determines a wallet's address besides the program code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    pub workchain: i8,
    pub instance_id: u32,
    pub quorum: u8,
    pub owners: OwnerRegistry,
}

impl WalletConfig {
    pub fn new(
        workchain: i8,
        instance_id: u32,
        quorum: u8,
        owners: OwnerRegistry,
    ) -> Result<Self> {
        if usize::from(quorum) > owners.len() {
            return Err(WalletError::InvalidConfig(format!(
                "quorum {quorum} exceeds {} owners",
                owners.len()
            )));
        }
        Ok(Self {
            workchain,
            instance_id,
            quorum,
            owners,
        })
    }

    /// `instance_id:uint32 n:uint8 k:uint8 reserved:uint64=0 owners:HashmapE 8 ^Cell pending:bit=0`
    pub fn config_data(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_uint(u64::from(self.instance_id), 32)?
            .store_uint(self.owners.len() as u64, 8)?
            .store_uint(u64::from(self.quorum), 8)?
            .store_uint(0, 64)?;
        self.owners.store(&mut builder)?;
        builder.store_bit(false)?;
        Ok(builder.build())
    }

    pub fn state_init(&self, code: &ProgramCode) -> Result<StateInit> {
        Ok(StateInit {
            code: code.cell().clone(),
            data: self.config_data()?,
        })
    }

    pub fn derive_address(&self, code: &ProgramCode) -> Result<Address> {
        derive_address(self.workchain, code, &self.config_data()?)
    }
}

/// Code and data a contract is deployed with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateInit {
    pub code: Cell,
    pub data: Cell,
}

impl StateInit {
    /// `split_depth:0 special:0 code:1^ data:1^ library:0`
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)?
            .store_bit(false)?
            .store_maybe_ref(Some(self.code.clone()))?
            .store_maybe_ref(Some(self.data.clone()))?
            .store_bit(false)?;
        Ok(builder.build())
    }

    pub fn address(&self, workchain: i8) -> Result<Address> {
        Ok(Address::new(workchain, *self.to_cell()?.hash()))
    }
}

/// `(workchain, hash(StateInit { code, data }))`
pub fn derive_address(workchain: i8, code: &ProgramCode, config_data: &Cell) -> Result<Address> {
    let state_init = StateInit {
        code: code.cell().clone(),
        data: config_data.clone(),
    };
    let address = state_init.address(workchain)?;
    debug!(
        code_hash = %code.cell().hash_hex(),
        data_hash = %config_data.hash_hex(),
        %address,
        "derived wallet address"
    );
    Ok(address)
}

/// Address plus the `StateInit` it was derived from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractIdentity {
    pub address: Address,
    pub state_init: StateInit,
}

impl ContractIdentity {
    pub fn derive(config: &WalletConfig, code: &ProgramCode) -> Result<Self> {
        let state_init = config.state_init(code)?;
        let address = state_init.address(config.workchain)?;
        debug!(
            %address,
            owners = config.owners.len(),
            quorum = config.quorum,
            "derived identity"
        );
        Ok(Self {
            address,
            state_init,
        })
    }
}

/// Configuration recovered from a wallet's stored data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainState {
    pub config: WalletConfig,
    /// Owner count as stored, which may disagree with the dictionary
    pub stored_owner_count: u8,
    /// Zero at deployment, later used by the program
    pub reserved: u64,
    /// Trailing flag: set once the program keeps pending orders
    pub deployed: bool,
}

/// Parse raw bag-of-cells bytes of a wallet's data
pub fn load_from_chain_state(workchain: i8, raw: &[u8]) -> Result<ChainState> {
    let data = Cell::from_boc(raw)?;
    parse_config_data(workchain, &data)
}

/// Parse a wallet's data cell, deployed or not.
///
/// The owner count is taken from the dictionary itself; a different stored count is
/// only logged.
pub fn parse_config_data(workchain: i8, data: &Cell) -> Result<ChainState> {
    let mut slice = data.parse();
    let instance_id = slice.load_uint(32)? as u32;
    let stored_owner_count = slice.load_uint(8)? as u8;
    let quorum = slice.load_uint(8)? as u8;
    let reserved = slice.load_uint(64)?;
    let owners = OwnerRegistry::load(&mut slice)?;
    let deployed = slice.load_bit()?;

    if usize::from(stored_owner_count) != owners.len() {
        warn!(
            stored = stored_owner_count,
            actual = owners.len(),
            "stored owner count does not match the owners dictionary"
        );
    }

    let config = WalletConfig::new(workchain, instance_id, quorum, owners)?;
    Ok(ChainState {
        config,
        stored_owner_count,
        reserved,
        deployed,
    })
}
