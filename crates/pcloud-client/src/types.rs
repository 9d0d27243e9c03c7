//! Wire types exchanged with the vault.
//!
//! Outgoing payloads use `Option<T>` for every optional member and skip
//! `None` when serializing, so "not set" never reaches the vault as an
//! empty string. Incoming records are fully optional: the vault may omit
//! any member and readers must not invent values for missing ones.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::kind::Kind;

// --- Outgoing payloads ---

/// A creation request for one entity.
///
/// The variant fixes the kind: a credential's properties block is itself a
/// closed sum, so properties of one credential kind cannot be attached to
/// another.
#[derive(Debug, Clone, PartialEq)]
pub enum VaultPayload {
    /// A vault account.
    Credential(CredentialPayload),
    /// A safe plus its seed member.
    Safe(SafePayload),
    /// A member added to an existing safe.
    SafeMember(SafeMemberPayload),
}

impl VaultPayload {
    /// The kind of entity this payload creates.
    pub fn kind(&self) -> Kind {
        match self {
            VaultPayload::Credential(c) => c.platform_account_properties.kind(),
            VaultPayload::Safe(_) => Kind::SafeObject,
            VaultPayload::SafeMember(_) => Kind::SafeMember,
        }
    }
}

/// Account creation body (`POST /Accounts`).
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub user_name: String,
    pub platform_id: String,
    pub safe_name: String,
    pub secret_type: String,
    pub secret: String,
    pub platform_account_properties: AccountProperties,
    #[serde(skip_serializing_if = "SecretManagement::is_empty")]
    pub secret_management: SecretManagement,
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPayload")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("user_name", &self.user_name)
            .field("platform_id", &self.platform_id)
            .field("safe_name", &self.safe_name)
            .field("secret_type", &self.secret_type)
            .field("secret", &"<redacted>")
            .field(
                "platform_account_properties",
                &self.platform_account_properties,
            )
            .field("secret_management", &self.secret_management)
            .finish()
    }
}

/// Platform-specific account properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AccountProperties {
    Aws(AwsProperties),
    Db(DbProperties),
    Ms(MsProperties),
}

impl AccountProperties {
    /// The credential kind these properties belong to.
    pub fn kind(&self) -> Kind {
        match self {
            AccountProperties::Aws(_) => Kind::AwsCredential,
            AccountProperties::Db(_) => Kind::DbCredential,
            AccountProperties::Ms(_) => Kind::MsCredential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwsProperties {
    #[serde(rename = "AWSAccessKeyID")]
    pub access_key_id: String,
    #[serde(rename = "AWSAccountID")]
    pub account_id: String,
    #[serde(rename = "Alias", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "Region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DbProperties {
    #[serde(rename = "Port", skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(rename = "Database", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(rename = "DSN", skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MsProperties {
    #[serde(rename = "ApplicationID")]
    pub application_id: String,
    #[serde(rename = "ApplicationObjectID")]
    pub application_object_id: String,
    #[serde(rename = "KeyID")]
    pub key_id: String,
    #[serde(rename = "ActiveDirectoryID", skip_serializing_if = "Option::is_none")]
    pub active_directory_id: Option<String>,
    #[serde(rename = "Duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(rename = "PopulateIfNotExist", skip_serializing_if = "Option::is_none")]
    pub populate_if_not_exist: Option<String>,
    #[serde(rename = "KeyDescription", skip_serializing_if = "Option::is_none")]
    pub key_description: Option<String>,
}

/// Automatic-management settings for an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretManagement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_management_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_management_reason: Option<String>,
}

impl SecretManagement {
    /// Whether neither setting was provided.
    pub fn is_empty(&self) -> bool {
        self.automatic_management_enabled.is_none() && self.manual_management_reason.is_none()
    }
}

/// Safe creation body (`POST /Safes`).
///
/// The seed member is not part of the safe body; it is granted with a
/// separate membership request right after the safe exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafePayload {
    pub safe_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "managingCPM", skip_serializing_if = "Option::is_none")]
    pub managing_cpm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_days_retention: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_versions_retention: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_purge_enabled: Option<bool>,
    #[serde(skip)]
    pub owner: MemberGrant,
}

/// Request to add one member to an existing safe.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeMemberPayload {
    pub safe_name: String,
    pub grant: MemberGrant,
}

/// A member and the permission level granted to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberGrant {
    pub member_name: String,
    pub member_type: String,
    pub permission_level: PermissionLevel,
}

impl MemberGrant {
    /// The membership body (`POST /Safes/{safeUrlId}/Members`).
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "memberName": self.member_name,
            "memberType": self.member_type,
            "permissions": self.permission_level.permissions(),
        })
    }
}

/// The permission levels a safe member may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Full,
    Read,
    Approver,
    Manager,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 4] = [
        PermissionLevel::Full,
        PermissionLevel::Read,
        PermissionLevel::Approver,
        PermissionLevel::Manager,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::Full => "full",
            PermissionLevel::Read => "read",
            PermissionLevel::Approver => "approver",
            PermissionLevel::Manager => "manager",
        }
    }

    /// The vault permission set this level expands to.
    pub fn permissions(self) -> MemberPermissions {
        let read = MemberPermissions {
            use_accounts: true,
            retrieve_accounts: true,
            list_accounts: true,
            view_audit_log: true,
            view_safe_members: true,
            ..MemberPermissions::default()
        };
        match self {
            PermissionLevel::Read => read,
            PermissionLevel::Approver => MemberPermissions {
                list_accounts: true,
                view_safe_members: true,
                manage_safe_members: true,
                requests_authorization_level1: true,
                ..MemberPermissions::default()
            },
            PermissionLevel::Manager => MemberPermissions {
                add_accounts: true,
                update_account_content: true,
                update_account_properties: true,
                initiate_cpm_account_management_operations: true,
                specify_next_account_content: true,
                rename_accounts: true,
                delete_accounts: true,
                unlock_accounts: true,
                manage_safe_members: true,
                access_without_confirmation: true,
                ..read
            },
            PermissionLevel::Full => MemberPermissions {
                add_accounts: true,
                update_account_content: true,
                update_account_properties: true,
                initiate_cpm_account_management_operations: true,
                specify_next_account_content: true,
                rename_accounts: true,
                delete_accounts: true,
                unlock_accounts: true,
                manage_safe: true,
                manage_safe_members: true,
                backup_safe: true,
                access_without_confirmation: true,
                create_folders: true,
                delete_folders: true,
                move_accounts_and_folders: true,
                requests_authorization_level1: true,
                ..read
            },
        }
    }

    /// The level whose permission set is exactly `permissions`, if any.
    pub fn from_permissions(permissions: &MemberPermissions) -> Option<Self> {
        PermissionLevel::ALL
            .into_iter()
            .find(|level| level.permissions() == *permissions)
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| {
                format!("'{s}' is not one of full, read, approver, manager")
            })
    }
}

/// Safe member permissions as the vault reports and accepts them.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberPermissions {
    pub use_accounts: bool,
    pub retrieve_accounts: bool,
    pub list_accounts: bool,
    pub add_accounts: bool,
    pub update_account_content: bool,
    pub update_account_properties: bool,
    #[serde(rename = "initiateCPMAccountManagementOperations")]
    pub initiate_cpm_account_management_operations: bool,
    pub specify_next_account_content: bool,
    pub rename_accounts: bool,
    pub delete_accounts: bool,
    pub unlock_accounts: bool,
    pub manage_safe: bool,
    pub manage_safe_members: bool,
    pub backup_safe: bool,
    pub view_audit_log: bool,
    pub view_safe_members: bool,
    pub access_without_confirmation: bool,
    pub create_folders: bool,
    pub delete_folders: bool,
    pub move_accounts_and_folders: bool,
    pub requests_authorization_level1: bool,
    pub requests_authorization_level2: bool,
}

// --- Incoming records ---

/// The vault's record for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum VaultRecord {
    Credential(CredentialRecord),
    Safe(SafeRecord),
    SafeMember(SafeMemberRecord),
}

/// An account as returned by `GET /Accounts/{id}`. The secret is never
/// returned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub user_name: Option<String>,
    pub platform_id: Option<String>,
    pub safe_name: Option<String>,
    pub secret_type: Option<String>,
    pub platform_account_properties: BTreeMap<String, serde_json::Value>,
    pub secret_management: Option<SecretManagementRecord>,
    pub created_time: Option<i64>,
}

impl CredentialRecord {
    /// A platform property rendered as a string. Numbers and booleans are
    /// rendered in their JSON form; nulls, arrays and objects count as
    /// missing.
    pub fn property(&self, key: &str) -> Option<String> {
        match self.platform_account_properties.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The vault's last modification time (epoch seconds), if reported.
    pub fn last_modified_time(&self) -> Option<i64> {
        self.secret_management
            .as_ref()
            .and_then(|sm| sm.last_modified_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretManagementRecord {
    pub automatic_management_enabled: Option<bool>,
    pub manual_management_reason: Option<String>,
    pub last_modified_time: Option<i64>,
}

/// A safe as returned by `GET /Safes/{safeUrlId}`. Safes carry no
/// modification time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafeRecord {
    pub safe_url_id: Option<String>,
    pub safe_number: Option<i64>,
    pub safe_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "managingCPM")]
    pub managing_cpm: Option<String>,
    pub number_of_days_retention: Option<i64>,
    pub number_of_versions_retention: Option<i64>,
    pub auto_purge_enabled: Option<bool>,
}

/// A membership as returned by `GET /Safes/{safeUrlId}/Members/{member}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafeMemberRecord {
    pub safe_url_id: Option<String>,
    pub safe_name: Option<String>,
    pub member_name: Option<String>,
    pub member_type: Option<String>,
    pub permissions: Option<MemberPermissions>,
}

impl SafeMemberRecord {
    /// The permission level matching the reported permissions exactly.
    pub fn permission_level(&self) -> Option<PermissionLevel> {
        self.permissions
            .as_ref()
            .and_then(PermissionLevel::from_permissions)
    }
}
