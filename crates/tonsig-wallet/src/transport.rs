//! Chain access seam
//!
//! The toolkit never talks to a node itself. Anything that can read a contract's data
//! and push an external message implements [`ChainTransport`].

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tonsig_cell::Address;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no contract data at {0}")]
    NotFound(Address),

    /// Passed through verbatim from the remote side
    #[error("remote rejection: {0}")]
    RemoteRejection(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Read contract state and submit external messages
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Raw bag-of-cells bytes of the contract's persistent data
    async fn get_contract_data(&self, address: &Address) -> Result<Vec<u8>, TransportError>;

    /// Submit a serialized external message
    async fn send_external(&self, message: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    contracts: HashMap<Address, Vec<u8>>,
    sent: Vec<Vec<u8>>,
    rejection: Option<String>,
}

/// In-process transport for tests and dry runs.
///
/// Serves whatever contract data it was given and records every message it accepts.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: RwLock<MemoryState>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_contract_data(&self, address: Address, data: Vec<u8>) {
        self.state.write().await.contracts.insert(address, data);
    }

    /// Make every later `send_external` fail with `reason`; `None` accepts again
    pub async fn reject_with(&self, reason: Option<String>) {
        self.state.write().await.rejection = reason;
    }

    /// Messages accepted so far, oldest first
    pub async fn sent(&self) -> Vec<Vec<u8>> {
        self.state.read().await.sent.clone()
    }
}

#[async_trait]
impl ChainTransport for MemoryTransport {
    async fn get_contract_data(&self, address: &Address) -> Result<Vec<u8>, TransportError> {
        self.state
            .read()
            .await
            .contracts
            .get(address)
            .cloned()
            .ok_or(TransportError::NotFound(*address))
    }

    async fn send_external(&self, message: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.write().await;
        if let Some(reason) = &state.rejection {
            return Err(TransportError::RemoteRejection(reason.clone()));
        }
        state.sent.push(message.to_vec());
        info!(bytes = message.len(), "accepted external message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_round_trip() {
        let transport = MemoryTransport::new();
        let address = Address::new(0, [1; 32]);

        assert_eq!(
            transport.get_contract_data(&address).await,
            Err(TransportError::NotFound(address))
        );
        transport.set_contract_data(address, vec![1, 2, 3]).await;
        assert_eq!(
            transport.get_contract_data(&address).await.unwrap(),
            vec![1, 2, 3]
        );

        transport.send_external(b"first").await.unwrap();
        assert_eq!(transport.sent().await, vec![b"first".to_vec()]);
    }

    #[tokio::test]
    async fn test_rejection_is_verbatim() {
        let transport = MemoryTransport::new();
        transport
            .reject_with(Some("exit code 37: not enough signatures".into()))
            .await;
        let err = transport.send_external(b"order").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::RemoteRejection("exit code 37: not enough signatures".into())
        );
        assert!(transport.sent().await.is_empty());

        transport.reject_with(None).await;
        assert!(transport.send_external(b"order").await.is_ok());
    }
}
