//! Vault client boundary for `pcloud-sync`.
//!
//! This crate defines the [`VaultClient`] trait: the three entity operations
//! (create, get, delete) the reconciler needs from a Privilege Cloud vault,
//! keyed by entity [`Kind`], together with the wire types exchanged with the
//! vault. It knows nothing about desired state, environment fallback or
//! tracked state; that lives in `pcloud-core`.
//!
//! Two implementations are provided:
//!
//! - [`HttpVault`]: the Privilege Cloud REST API over `reqwest`
//! - [`MemoryVault`]: in-memory, for tests and local dry runs

mod error;
mod http;
mod kind;
mod memory;
mod types;

use std::sync::Arc;

pub use error::ClientError;
pub use http::{AuthConfig, HttpVault, HttpVaultConfig};
pub use kind::{EntityId, Kind};
pub use memory::MemoryVault;
pub use types::{
    AccountProperties, AwsProperties, CredentialPayload, CredentialRecord, DbProperties,
    MemberGrant, MemberPermissions, MsProperties, PermissionLevel, SafeMemberPayload,
    SafeMemberRecord, SafePayload, SafeRecord, SecretManagement, SecretManagementRecord,
    VaultPayload, VaultRecord,
};

/// A handle to the remote vault.
///
/// Every method is exactly one logical round trip. Implementations must be
/// safe to share across async tasks (`Send + Sync`); the only state they may
/// share between calls is the authentication token.
#[async_trait::async_trait]
pub trait VaultClient: Send + Sync + 'static {
    /// Create the entity described by `payload` and return the identifier
    /// the vault assigned.
    ///
    /// An identifier with empty components means the vault accepted the
    /// request but did not report an identifier; callers decide how to
    /// treat that.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request could not be completed or the
    /// vault rejected it.
    async fn create_entity(&self, payload: &VaultPayload) -> Result<EntityId, ClientError>;

    /// Fetch the vault's current record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the vault has no such entity and
    /// [`ClientError::KindMismatch`] if `id` cannot name an entity of `kind`.
    async fn get_entity(&self, id: &EntityId, kind: Kind) -> Result<VaultRecord, ClientError>;

    /// Remove the entity named by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request could not be completed or the
    /// vault rejected it.
    async fn delete_entity(&self, id: &EntityId, kind: Kind) -> Result<(), ClientError>;

    /// The bearer token this client currently authenticates with, if any.
    fn auth_token(&self) -> Option<String>;
}

#[async_trait::async_trait]
impl<T: VaultClient + ?Sized> VaultClient for Arc<T> {
    async fn create_entity(&self, payload: &VaultPayload) -> Result<EntityId, ClientError> {
        (**self).create_entity(payload).await
    }

    async fn get_entity(&self, id: &EntityId, kind: Kind) -> Result<VaultRecord, ClientError> {
        (**self).get_entity(id, kind).await
    }

    async fn delete_entity(&self, id: &EntityId, kind: Kind) -> Result<(), ClientError> {
        (**self).delete_entity(id, kind).await
    }

    fn auth_token(&self) -> Option<String> {
        (**self).auth_token()
    }
}
