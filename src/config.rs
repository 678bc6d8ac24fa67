//! Wallet description files

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tonsig_crypto::PublicKey;
use tonsig_wallet::{MultisigWallet, ProgramCode, WalletError};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The file parsed but does not describe a valid wallet
    #[error("invalid wallet: {0}")]
    Wallet(#[from] WalletError),
}

/// Everything needed to recompute a wallet, as stored on disk.
///
/// ```toml
/// workchain = 0
/// instance_id = 123
/// quorum = 2
/// owners = ["<hex public key>", "..."]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFile {
    /// Workchain the wallet lives in
    #[serde(default)]
    pub workchain: i8,
    /// Distinguishes wallets with the same owners and quorum
    pub instance_id: u32,
    /// Signatures required to execute an order
    pub quorum: u8,
    /// Owner public keys; position is the owner index
    pub owners: Vec<PublicKey>,
    /// Base64 bag-of-cells of the program code; the bundled program when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl WalletFile {
    /// Describe an existing wallet. The code is only written out when it is not the
    /// bundled program.
    pub fn from_wallet(wallet: &MultisigWallet) -> Result<Self, ConfigError> {
        let bundled = ProgramCode::bundled()?;
        let code = (wallet.code() != &bundled).then(|| wallet.code().cell().to_base64());
        let config = wallet.config();
        Ok(Self {
            workchain: config.workchain,
            instance_id: config.instance_id,
            quorum: config.quorum,
            owners: config.owners.keys().to_vec(),
            code,
        })
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: WalletFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn program_code(&self) -> Result<ProgramCode, ConfigError> {
        let code = match &self.code {
            Some(encoded) => ProgramCode::from_base64(encoded)?,
            None => ProgramCode::bundled()?,
        };
        Ok(code)
    }

    pub fn to_wallet(&self) -> Result<MultisigWallet, ConfigError> {
        let wallet = MultisigWallet::new(
            self.owners.clone(),
            self.workchain,
            self.instance_id,
            self.quorum,
            self.program_code()?,
        )?;
        Ok(wallet)
    }
}
