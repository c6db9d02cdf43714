//! Write-back hook.
//!
//! The store itself is read-only. Mutations requested through a group or
//! dataset view are handed to an injected `WriteDispatch`, which decides
//! what to do with them (persist, forward to a UI, queue for review).

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::attrs::Attributes;
use crate::error::{Result, StoreError};

/// A mutation requested against the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WriteAction {
    /// Replace the attributes of the node at `path`.
    SetAttrs { path: String, attrs: Attributes },
}

impl WriteAction {
    pub fn path(&self) -> &str {
        match self {
            Self::SetAttrs { path, .. } => path,
        }
    }
}

/// Receiver of write actions.
#[async_trait]
pub trait WriteDispatch: Send + Sync {
    async fn dispatch(&self, action: WriteAction) -> Result<()>;
}

/// Forwards actions into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatch {
    tx: mpsc::UnboundedSender<WriteAction>,
}

impl ChannelDispatch {
    /// Create a dispatcher and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WriteAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl WriteDispatch for ChannelDispatch {
    async fn dispatch(&self, action: WriteAction) -> Result<()> {
        self.tx
            .send(action)
            .map_err(|e| StoreError::Internal(format!("write receiver dropped: {}", e.0.path())))
    }
}
