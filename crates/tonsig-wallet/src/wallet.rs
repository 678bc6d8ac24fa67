//! Wallet facade tying identity, orders and transport together

use tonsig_cell::{Address, Cell};
use tonsig_crypto::{PublicKey, SecretKey};
use tracing::{info, warn};

use crate::code::ProgramCode;
use crate::error::{Result, WalletError};
use crate::identity::{load_from_chain_state, ContractIdentity, StateInit, WalletConfig};
use crate::message::{ExternalMessage, InternalMessage};
use crate::order::Order;
use crate::registry::OwnerRegistry;
use crate::submission::{build_submission, ExternalPayload};
use crate::transport::ChainTransport;

/// A k-of-n wallet: its configuration, program code and address.
///
/// `address` equals `identity.address` unless the wallet was rebuilt from chain state
/// with program code other than the one it was deployed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigWallet {
    config: WalletConfig,
    code: ProgramCode,
    identity: ContractIdentity,
    address: Address,
}

impl MultisigWallet {
    /// Build from an ordered owner key list; owner `i` is `public_keys[i]`
    pub fn new(
        public_keys: Vec<PublicKey>,
        workchain: i8,
        instance_id: u32,
        quorum: u8,
        code: ProgramCode,
    ) -> Result<Self> {
        let owners = OwnerRegistry::from_public_keys(public_keys)?;
        let config = WalletConfig::new(workchain, instance_id, quorum, owners)?;
        Self::from_config(config, code)
    }

    pub fn from_config(config: WalletConfig, code: ProgramCode) -> Result<Self> {
        let identity = ContractIdentity::derive(&config, &code)?;
        Ok(Self {
            address: identity.address,
            config,
            code,
            identity,
        })
    }

    /// Rebuild a wallet from the data stored at `address`.
    ///
    /// The queried address is kept even when the recomputed one differs, which happens
    /// when the program code given here is not the one the wallet was deployed with.
    /// Such a wallet can still submit orders but refuses to build deployment messages.
    pub async fn from_address<T>(
        transport: &T,
        address: Address,
        code: ProgramCode,
    ) -> Result<Self>
    where
        T: ChainTransport + ?Sized,
    {
        let raw = transport.get_contract_data(&address).await?;
        let state = load_from_chain_state(address.workchain, &raw)?;
        let mut wallet = Self::from_config(state.config, code)?;
        if wallet.identity.address != address {
            warn!(
                queried = %address,
                derived = %wallet.identity.address,
                "derived address differs from the queried one"
            );
            wallet.address = address;
        }
        Ok(wallet)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address the program code and configuration hash to
    pub fn derived_address(&self) -> Address {
        self.identity.address
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.config.owners
    }

    pub fn code(&self) -> &ProgramCode {
        &self.code
    }

    pub fn state_init(&self) -> &StateInit {
        &self.identity.state_init
    }

    pub fn owner_index(&self, key: &PublicKey) -> Option<u8> {
        self.config.owners.find_index(key)
    }

    /// `StateInit` cell for deployment, only if it hashes to the wallet's address
    fn deployable_state_init(&self) -> Result<Cell> {
        if self.address != self.identity.address {
            return Err(WalletError::InvalidConfig(format!(
                "state init hashes to {}, not to the wallet address {}",
                self.identity.address, self.address
            )));
        }
        self.identity.state_init.to_cell()
    }

    /// External deployment message: empty body plus the derivation `StateInit`
    pub fn deploy_external_message(&self) -> Result<Cell> {
        ExternalMessage::new(self.address(), Cell::empty())
            .with_state_init(self.deployable_state_init()?)
            .to_cell()
    }

    pub async fn deploy_external<T>(&self, transport: &T) -> Result<()>
    where
        T: ChainTransport + ?Sized,
    {
        let message = self.deploy_external_message()?;
        transport.send_external(&message.to_boc()).await?;
        info!(address = %self.address(), "sent deployment");
        Ok(())
    }

    /// Internal deployment message for another wallet to send, bounceable, carrying `value`
    pub fn deploy_internal_message(&self, value: u128) -> Result<Cell> {
        InternalMessage::new(self.address(), value)
            .with_state_init(self.deployable_state_init()?)
            .to_cell()
    }

    pub fn build_payload(&self, order: &Order, key: &SecretKey) -> Result<ExternalPayload> {
        build_submission(order, &self.config.owners, self.config.instance_id, key)
    }

    /// Complete external message carrying `order`, signed by `key`
    pub fn build_submission(&self, order: &Order, key: &SecretKey) -> Result<Cell> {
        self.build_payload(order, key)?.to_message(self.address())
    }

    pub async fn send_order<T>(&self, transport: &T, order: &Order, key: &SecretKey) -> Result<()>
    where
        T: ChainTransport + ?Sized,
    {
        let message = self.build_submission(order, key)?;
        transport.send_external(&message.to_boc()).await?;
        info!(
            address = %self.address(),
            messages = order.messages().len(),
            signatures = order.signatures().len() + 1,
            "sent order"
        );
        Ok(())
    }
}
