//! Entity kinds and vault-assigned identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category of a vault entity.
///
/// A tracked resource never changes kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// AWS access key credential.
    AwsCredential,
    /// Database password credential.
    DbCredential,
    /// Microsoft Azure application key credential.
    MsCredential,
    /// Safe with a seed member.
    SafeObject,
    /// Membership of one member in an existing safe.
    SafeMember,
}

impl Kind {
    /// Every kind, in declaration order.
    pub const ALL: [Kind; 5] = [
        Kind::AwsCredential,
        Kind::DbCredential,
        Kind::MsCredential,
        Kind::SafeObject,
        Kind::SafeMember,
    ];

    /// Stable snake-case name, as used in plan and state files.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::AwsCredential => "aws_credential",
            Kind::DbCredential => "db_credential",
            Kind::MsCredential => "ms_credential",
            Kind::SafeObject => "safe_object",
            Kind::SafeMember => "safe_member",
        }
    }

    /// Whether entities of this kind are vault accounts (credentials).
    pub fn is_credential(self) -> bool {
        matches!(
            self,
            Kind::AwsCredential | Kind::DbCredential | Kind::MsCredential
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// The identifier the vault assigned to an entity.
///
/// Credentials are named by an opaque account id; safes by their URL id plus
/// numeric id; safe memberships by the safe's URL id plus the member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityId {
    /// Account id, e.g. `12_3`.
    Credential { id: String },
    /// Safe URL id and safe number.
    Safe { url_id: String, number: i64 },
    /// Safe URL id and member name.
    SafeMember { safe_url_id: String, member: String },
}

impl EntityId {
    /// Shorthand for a credential identifier.
    pub fn credential(id: impl Into<String>) -> Self {
        EntityId::Credential { id: id.into() }
    }

    /// Whether the vault left the identifying part of this id empty.
    pub fn is_empty(&self) -> bool {
        match self {
            EntityId::Credential { id } => id.trim().is_empty(),
            EntityId::Safe { url_id, .. } => url_id.trim().is_empty(),
            EntityId::SafeMember {
                safe_url_id,
                member,
            } => safe_url_id.trim().is_empty() || member.trim().is_empty(),
        }
    }

    /// Whether this identifier can name an entity of `kind`.
    pub fn fits(&self, kind: Kind) -> bool {
        match self {
            EntityId::Credential { .. } => kind.is_credential(),
            EntityId::Safe { .. } => kind == Kind::SafeObject,
            EntityId::SafeMember { .. } => kind == Kind::SafeMember,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Credential { id } => f.write_str(id),
            EntityId::Safe { url_id, number } => write!(f, "{url_id} (#{number})"),
            EntityId::SafeMember {
                safe_url_id,
                member,
            } => write!(f, "{safe_url_id}/{member}"),
        }
    }
}
