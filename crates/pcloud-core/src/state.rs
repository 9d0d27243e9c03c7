//! Tracked state: the locally held mirror of one vault entity.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use pcloud_client::{EntityId, Kind};
use serde::{Deserialize, Serialize};

use crate::desired::DesiredResource;
use crate::field::{Field, Redacted, Scalar};

/// Calendar format used for `last_updated`, e.g.
/// `Monday, 02-Jan-06 15:04:05 UTC`.
pub const RFC850: &str = "%A, %d-%b-%y %H:%M:%S UTC";

/// Who supplied a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// The vault's own modification time.
    Vault,
    /// Wall-clock time of the reconciliation that produced the state.
    Local,
}

/// When a tracked state last changed, and according to whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdated {
    #[serde(with = "rfc850")]
    pub at: DateTime<Utc>,
    pub source: TimestampSource,
}

impl LastUpdated {
    /// Now, assigned locally.
    pub fn local_now() -> Self {
        Self {
            at: Utc::now(),
            source: TimestampSource::Local,
        }
    }

    /// A vault-reported modification time in epoch seconds. `None` if the
    /// epoch is out of range.
    pub fn from_vault_epoch(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(|at| Self {
            at,
            source: TimestampSource::Vault,
        })
    }

    pub fn is_vault_reported(&self) -> bool {
        self.source == TimestampSource::Vault
    }
}

impl fmt::Display for LastUpdated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format(RFC850))
    }
}

mod rfc850 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::RFC850;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&at.format(RFC850))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&text, RFC850)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

/// The record the declarative engine keeps for one managed resource.
///
/// Created by a successful create, replaced wholesale by a successful read
/// and dropped after a successful delete.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedState {
    pub kind: Kind,
    pub id: EntityId,
    pub last_updated: LastUpdated,
    #[serde(default)]
    pub fields: BTreeMap<Field, Scalar>,
}

impl TrackedState {
    pub fn field(&self, field: Field) -> Option<&Scalar> {
        self.fields.get(&field)
    }

    /// Declared fields of `desired` whose value differs from this state.
    ///
    /// Undeclared and null fields are not compared.
    pub fn drift(&self, desired: &DesiredResource) -> Vec<Field> {
        desired
            .fields
            .iter()
            .filter_map(|(field, value)| {
                let declared = value.as_ref()?;
                (self.fields.get(field) != Some(declared)).then_some(*field)
            })
            .collect()
    }
}

impl fmt::Debug for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedState")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("last_updated", &self.last_updated)
            .field("fields", &Redacted(&self.fields))
            .finish()
    }
}
