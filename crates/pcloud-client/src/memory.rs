//! In-memory vault for testing and local dry runs.
//!
//! Entities live in `BTreeMap`s behind a `RwLock`. Nothing is persisted;
//! all data is lost when the process exits. Behaves like the real vault
//! where the reconciler can observe it: secrets are never returned, only
//! accounts report a modification time, and identifiers are assigned by
//! the vault.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{
    CredentialPayload, CredentialRecord, MemberGrant, SafeMemberRecord,
    SafePayload, SafeRecord, SecretManagementRecord, VaultPayload, VaultRecord,
};
use crate::{ClientError, EntityId, Kind, VaultClient};

const MEMORY_TOKEN: &str = "memory-vault-token";

#[derive(Debug, Default)]
struct Inner {
    accounts: BTreeMap<String, CredentialRecord>,
    safes: BTreeMap<String, StoredSafe>,
    next_account: u64,
    next_safe: i64,
}

#[derive(Debug)]
struct StoredSafe {
    record: SafeRecord,
    members: BTreeMap<String, SafeMemberRecord>,
}

/// An in-memory vault.
///
/// Cloning shares the underlying data, so a clone handed to a reconciler
/// observes the same entities as the original.
///
/// # Examples
///
/// ```
/// # use pcloud_client::{EntityId, Kind, MemoryVault, VaultClient};
/// # #[tokio::main]
/// # async fn main() {
/// let vault = MemoryVault::new();
/// let missing = vault.get_entity(&EntityId::credential("1_1"), Kind::DbCredential).await;
/// assert!(missing.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an out-of-band change to an account, the way a vault
    /// administrator would, and bump its modification time.
    ///
    /// Returns `false` if no account has this id.
    pub async fn modify_credential<F>(&self, id: &str, change: F) -> bool
    where
        F: FnOnce(&mut CredentialRecord),
    {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.accounts.get_mut(id) else {
            return false;
        };
        change(record);
        record
            .secret_management
            .get_or_insert_with(SecretManagementRecord::default)
            .last_modified_time = Some(Utc::now().timestamp());
        true
    }

    /// Number of entities (accounts, safes and memberships) held.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.accounts.len()
            + inner.safes.len()
            + inner.safes.values().map(|s| s.members.len()).sum::<usize>()
    }

    /// Whether the vault holds no entities at all.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn create_account(inner: &mut Inner, payload: &CredentialPayload) -> EntityId {
        inner.next_account += 1;
        let safe_number = inner
            .safes
            .get(&payload.safe_name)
            .and_then(|s| s.record.safe_number)
            .unwrap_or(1);
        let id = format!("{safe_number}_{}", inner.next_account);

        let properties = match serde_json::to_value(&payload.platform_account_properties) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        let now = Utc::now().timestamp();
        let record = CredentialRecord {
            id: Some(id.clone()),
            name: Some(payload.name.clone()),
            address: payload.address.clone(),
            user_name: Some(payload.user_name.clone()),
            platform_id: Some(payload.platform_id.clone()),
            safe_name: Some(payload.safe_name.clone()),
            secret_type: Some(payload.secret_type.clone()),
            platform_account_properties: properties,
            secret_management: Some(SecretManagementRecord {
                automatic_management_enabled: payload
                    .secret_management
                    .automatic_management_enabled,
                manual_management_reason: payload.secret_management.manual_management_reason.clone(),
                last_modified_time: Some(now),
            }),
            created_time: Some(now),
        };
        inner.accounts.insert(id.clone(), record);
        EntityId::Credential { id }
    }

    fn create_safe(inner: &mut Inner, payload: &SafePayload) -> Result<EntityId, ClientError> {
        if inner.safes.contains_key(&payload.safe_name) {
            return Err(ClientError::Api {
                status_code: 409,
                message: format!("safe '{}' already exists", payload.safe_name),
            });
        }
        inner.next_safe += 1;
        let number = inner.next_safe;
        let url_id = payload.safe_name.clone();
        let record = SafeRecord {
            safe_url_id: Some(url_id.clone()),
            safe_number: Some(number),
            safe_name: Some(payload.safe_name.clone()),
            description: payload.description.clone(),
            location: payload.location.clone(),
            managing_cpm: payload.managing_cpm.clone(),
            number_of_days_retention: payload.number_of_days_retention,
            number_of_versions_retention: payload.number_of_versions_retention,
            auto_purge_enabled: payload.auto_purge_enabled,
        };
        let mut members = BTreeMap::new();
        members.insert(
            payload.owner.member_name.clone(),
            member_record(&url_id, &payload.safe_name, &payload.owner),
        );
        inner.safes.insert(url_id.clone(), StoredSafe { record, members });
        Ok(EntityId::Safe { url_id, number })
    }

    fn add_member(
        inner: &mut Inner,
        safe_name: &str,
        grant: &MemberGrant,
    ) -> Result<EntityId, ClientError> {
        let safe = inner
            .safes
            .get_mut(safe_name)
            .ok_or_else(|| ClientError::NotFound {
                kind: Kind::SafeObject,
                id: safe_name.to_owned(),
            })?;
        if safe.members.contains_key(&grant.member_name) {
            return Err(ClientError::Api {
                status_code: 409,
                message: format!(
                    "member '{}' already belongs to safe '{safe_name}'",
                    grant.member_name
                ),
            });
        }
        safe.members.insert(
            grant.member_name.clone(),
            member_record(safe_name, safe_name, grant),
        );
        Ok(EntityId::SafeMember {
            safe_url_id: safe_name.to_owned(),
            member: grant.member_name.clone(),
        })
    }
}

fn member_record(url_id: &str, safe_name: &str, grant: &MemberGrant) -> SafeMemberRecord {
    SafeMemberRecord {
        safe_url_id: Some(url_id.to_owned()),
        safe_name: Some(safe_name.to_owned()),
        member_name: Some(grant.member_name.clone()),
        member_type: Some(grant.member_type.clone()),
        permissions: Some(grant.permission_level.permissions()),
    }
}

fn not_found(kind: Kind, id: &EntityId) -> ClientError {
    ClientError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait::async_trait]
impl VaultClient for MemoryVault {
    async fn create_entity(&self, payload: &VaultPayload) -> Result<EntityId, ClientError> {
        let mut inner = self.inner.write().await;
        match payload {
            VaultPayload::Credential(c) => Ok(Self::create_account(&mut inner, c)),
            VaultPayload::Safe(s) => Self::create_safe(&mut inner, s),
            VaultPayload::SafeMember(m) => Self::add_member(&mut inner, &m.safe_name, &m.grant),
        }
    }

    async fn get_entity(&self, id: &EntityId, kind: Kind) -> Result<VaultRecord, ClientError> {
        if !id.fits(kind) {
            return Err(ClientError::KindMismatch {
                kind,
                id: id.to_string(),
            });
        }
        let inner = self.inner.read().await;
        match id {
            EntityId::Credential { id: account } => inner
                .accounts
                .get(account)
                .cloned()
                .map(VaultRecord::Credential)
                .ok_or_else(|| not_found(kind, id)),
            EntityId::Safe { url_id, .. } => inner
                .safes
                .get(url_id)
                .map(|s| VaultRecord::Safe(s.record.clone()))
                .ok_or_else(|| not_found(kind, id)),
            EntityId::SafeMember {
                safe_url_id,
                member,
            } => inner
                .safes
                .get(safe_url_id)
                .and_then(|s| s.members.get(member))
                .cloned()
                .map(VaultRecord::SafeMember)
                .ok_or_else(|| not_found(kind, id)),
        }
    }

    async fn delete_entity(&self, id: &EntityId, kind: Kind) -> Result<(), ClientError> {
        if !id.fits(kind) {
            return Err(ClientError::KindMismatch {
                kind,
                id: id.to_string(),
            });
        }
        let mut inner = self.inner.write().await;
        let removed = match id {
            EntityId::Credential { id: account } => inner.accounts.remove(account).is_some(),
            EntityId::Safe { url_id, .. } => inner.safes.remove(url_id).is_some(),
            EntityId::SafeMember {
                safe_url_id,
                member,
            } => inner
                .safes
                .get_mut(safe_url_id)
                .and_then(|s| s.members.remove(member))
                .is_some(),
        };
        if removed {
            Ok(())
        } else {
            Err(not_found(kind, id))
        }
    }

    fn auth_token(&self) -> Option<String> {
        Some(MEMORY_TOKEN.to_owned())
    }
}
