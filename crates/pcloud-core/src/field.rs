//! Declarable fields, their scalar values and the per-kind field tables.
//!
//! Every kind is described by one [`KindSchema`]: which fields it requires,
//! which it accepts optionally, and which of those may fall back to an
//! environment variable. The resolver, mapper and materializer are all
//! driven by these tables instead of per-kind code paths.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use pcloud_client::Kind;
use serde::{Deserialize, Serialize};

/// A declarable attribute of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Address,
    Username,
    Platform,
    Safe,
    Secrettype,
    Secret,
    SmManage,
    SmManageReason,
    AwsKid,
    AwsAccountid,
    AwsAlias,
    AwsAccountregion,
    DbPort,
    Dbname,
    DbDsn,
    MsAppid,
    MsAppobjid,
    MsKeyid,
    MsAdid,
    MsDuration,
    MsPop,
    MsKeydesc,
    SafeName,
    Member,
    MemberType,
    PermissionLevel,
    SafeDesc,
    SafeLoc,
    CpmName,
    Retention,
    RetentionVersions,
    Purge,
}

impl Field {
    pub const ALL: [Field; 33] = [
        Field::Name,
        Field::Address,
        Field::Username,
        Field::Platform,
        Field::Safe,
        Field::Secrettype,
        Field::Secret,
        Field::SmManage,
        Field::SmManageReason,
        Field::AwsKid,
        Field::AwsAccountid,
        Field::AwsAlias,
        Field::AwsAccountregion,
        Field::DbPort,
        Field::Dbname,
        Field::DbDsn,
        Field::MsAppid,
        Field::MsAppobjid,
        Field::MsKeyid,
        Field::MsAdid,
        Field::MsDuration,
        Field::MsPop,
        Field::MsKeydesc,
        Field::SafeName,
        Field::Member,
        Field::MemberType,
        Field::PermissionLevel,
        Field::SafeDesc,
        Field::SafeLoc,
        Field::CpmName,
        Field::Retention,
        Field::RetentionVersions,
        Field::Purge,
    ];

    /// The attribute name used in plan and state files.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::Username => "username",
            Field::Platform => "platform",
            Field::Safe => "safe",
            Field::Secrettype => "secrettype",
            Field::Secret => "secret",
            Field::SmManage => "sm_manage",
            Field::SmManageReason => "sm_manage_reason",
            Field::AwsKid => "aws_kid",
            Field::AwsAccountid => "aws_accountid",
            Field::AwsAlias => "aws_alias",
            Field::AwsAccountregion => "aws_accountregion",
            Field::DbPort => "db_port",
            Field::Dbname => "dbname",
            Field::DbDsn => "db_dsn",
            Field::MsAppid => "ms_appid",
            Field::MsAppobjid => "ms_appobjid",
            Field::MsKeyid => "ms_keyid",
            Field::MsAdid => "ms_adid",
            Field::MsDuration => "ms_duration",
            Field::MsPop => "ms_pop",
            Field::MsKeydesc => "ms_keydesc",
            Field::SafeName => "safe_name",
            Field::Member => "member",
            Field::MemberType => "member_type",
            Field::PermissionLevel => "permission_level",
            Field::SafeDesc => "safe_desc",
            Field::SafeLoc => "safe_loc",
            Field::CpmName => "cpm_name",
            Field::Retention => "retention",
            Field::RetentionVersions => "retention_versions",
            Field::Purge => "purge",
        }
    }

    /// The scalar type values of this field must have.
    pub fn ty(self) -> FieldType {
        match self {
            Field::SmManage | Field::Purge => FieldType::Bool,
            Field::Retention | Field::RetentionVersions => FieldType::Int,
            _ => FieldType::String,
        }
    }

    /// Whether values of this field must never be logged or printed.
    pub fn is_sensitive(self) -> bool {
        self == Field::Secret
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// The type of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    Int,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Int => "integer",
        })
    }
}

/// A declared or tracked field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    String(String),
}

impl Scalar {
    pub fn ty(&self) -> FieldType {
        match self {
            Scalar::Bool(_) => FieldType::Bool,
            Scalar::Int(_) => FieldType::Int,
            Scalar::String(_) => FieldType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

/// Field tables for one kind.
#[derive(Debug)]
pub struct KindSchema {
    /// Fields that must resolve before a payload can be built.
    pub required: &'static [Field],
    /// Fields copied into the payload only when present.
    pub optional: &'static [Field],
    /// Fields that fall back to an environment variable when not declared.
    pub fallback: &'static [(Field, &'static str)],
}

impl KindSchema {
    /// Whether `field` belongs to this kind at all.
    pub fn accepts(&self, field: Field) -> bool {
        self.required.contains(&field) || self.optional.contains(&field)
    }

    /// The environment variable `field` falls back to, if it is eligible.
    pub fn env_var(&self, field: Field) -> Option<&'static str> {
        self.fallback
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, var)| *var)
    }

    /// Required fields followed by optional fields.
    pub fn fields(&self) -> impl Iterator<Item = Field> {
        self.required.iter().chain(self.optional).copied()
    }
}

const ACCOUNT_FALLBACK: &[(Field, &str)] = &[
    (Field::Name, "CYBERARK_ACCOUNT_CUSTOM_NAME"),
    (Field::Username, "CYBERARK_ACCOUNT_USERNAME"),
    (Field::Platform, "CYBERARK_ACCOUNT_PLATFORM"),
    (Field::Safe, "CYBERARK_ACCOUNT_SAFE"),
    (Field::Secrettype, "CYBERARK_ACCOUNT_SECRETTYPE"),
    (Field::Secret, "CYBERARK_ACCOUNT_SECRET"),
];

const DB_FALLBACK: &[(Field, &str)] = &[
    (Field::Name, "CYBERARK_ACCOUNT_CUSTOM_NAME"),
    (Field::Address, "CYBERARK_ACCOUNT_ADDRESS"),
    (Field::Username, "CYBERARK_ACCOUNT_USERNAME"),
    (Field::Platform, "CYBERARK_ACCOUNT_PLATFORM"),
    (Field::Safe, "CYBERARK_ACCOUNT_SAFE"),
    (Field::Secrettype, "CYBERARK_ACCOUNT_SECRETTYPE"),
    (Field::Secret, "CYBERARK_ACCOUNT_SECRET"),
];

const SAFE_FALLBACK: &[(Field, &str)] = &[
    (Field::SafeName, "CYBERARK_SAFE_NAME"),
    (Field::Member, "CYBERARK_SAFE_MEMBER"),
    (Field::PermissionLevel, "CYBERARK_SAFE_PERMISSION_LEVEL"),
];

static AWS: KindSchema = KindSchema {
    required: &[
        Field::Name,
        Field::Username,
        Field::Platform,
        Field::Safe,
        Field::Secrettype,
        Field::Secret,
        Field::AwsKid,
        Field::AwsAccountid,
    ],
    optional: &[
        Field::SmManage,
        Field::SmManageReason,
        Field::AwsAlias,
        Field::AwsAccountregion,
    ],
    fallback: ACCOUNT_FALLBACK,
};

static DB: KindSchema = KindSchema {
    required: &[
        Field::Name,
        Field::Address,
        Field::Username,
        Field::Platform,
        Field::Safe,
        Field::Secrettype,
        Field::Secret,
    ],
    optional: &[
        Field::SmManage,
        Field::SmManageReason,
        Field::DbPort,
        Field::Dbname,
        Field::DbDsn,
    ],
    fallback: DB_FALLBACK,
};

static MS: KindSchema = KindSchema {
    required: &[
        Field::Name,
        Field::Address,
        Field::Username,
        Field::Platform,
        Field::Safe,
        Field::Secrettype,
        Field::Secret,
        Field::MsAppid,
        Field::MsAppobjid,
        Field::MsKeyid,
    ],
    optional: &[
        Field::SmManage,
        Field::SmManageReason,
        Field::MsAdid,
        Field::MsDuration,
        Field::MsPop,
        Field::MsKeydesc,
    ],
    fallback: ACCOUNT_FALLBACK,
};

static SAFE_OBJECT: KindSchema = KindSchema {
    required: &[
        Field::SafeName,
        Field::Member,
        Field::MemberType,
        Field::PermissionLevel,
    ],
    optional: &[
        Field::SafeDesc,
        Field::SafeLoc,
        Field::CpmName,
        Field::Retention,
        Field::RetentionVersions,
        Field::Purge,
    ],
    fallback: SAFE_FALLBACK,
};

static SAFE_MEMBER: KindSchema = KindSchema {
    required: &[
        Field::SafeName,
        Field::Member,
        Field::MemberType,
        Field::PermissionLevel,
    ],
    optional: &[],
    fallback: SAFE_FALLBACK,
};

/// The field tables for `kind`.
pub fn schema(kind: Kind) -> &'static KindSchema {
    match kind {
        Kind::AwsCredential => &AWS,
        Kind::DbCredential => &DB,
        Kind::MsCredential => &MS,
        Kind::SafeObject => &SAFE_OBJECT,
        Kind::SafeMember => &SAFE_MEMBER,
    }
}

/// Debug view of a field map with sensitive values masked.
pub(crate) struct Redacted<'a, V>(pub(crate) &'a BTreeMap<Field, V>);

impl<V: fmt::Debug> fmt::Debug for Redacted<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, value) in self.0 {
            if field.is_sensitive() {
                map.entry(field, &"<redacted>");
            } else {
                map.entry(field, value);
            }
        }
        map.finish()
    }
}
