//! Configuration resolution: declared value, else environment, else absent.
//!
//! Only the identity fields listed in a kind's fallback table consult the
//! environment. Every other attribute must be declared explicitly.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use pcloud_client::Kind;

use crate::desired::DesiredResource;
use crate::field::{Field, Redacted, Scalar, schema};

/// Read access to environment variables.
pub trait EnvLookup: Send + Sync {
    /// The value of `name`, or `None` if it is not set.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// The environment of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvLookup for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Where a field's final value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Declared in the desired resource.
    Declared(Scalar),
    /// Taken from the environment.
    Fallback(Scalar),
    /// Neither declared nor available from the environment.
    Absent,
}

impl Resolution {
    /// The resolved value. Declared and fallback values are treated alike.
    pub fn value(&self) -> Option<&Scalar> {
        match self {
            Resolution::Declared(v) | Resolution::Fallback(v) => Some(v),
            Resolution::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Resolution::Absent)
    }

    fn source(&self) -> &'static str {
        match self {
            Resolution::Declared(_) => "declared",
            Resolution::Fallback(_) => "environment",
            Resolution::Absent => "absent",
        }
    }
}

static ABSENT: Resolution = Resolution::Absent;

/// A desired resource after fallback precedence has been applied.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    kind: Kind,
    values: BTreeMap<Field, Resolution>,
    unexpected: Vec<Field>,
}

impl ResolvedConfig {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The resolution of `field`. Fields outside the kind are absent.
    pub fn get(&self, field: Field) -> &Resolution {
        self.values.get(&field).unwrap_or(&ABSENT)
    }

    /// The resolved value of `field`, if any.
    pub fn value(&self, field: Field) -> Option<&Scalar> {
        self.get(field).value()
    }

    /// Declared fields that do not belong to the kind.
    pub fn unexpected(&self) -> &[Field] {
        &self.unexpected
    }

    /// Every present field of the kind with its value.
    pub fn present(&self) -> impl Iterator<Item = (Field, &Scalar)> {
        self.values
            .iter()
            .filter_map(|(f, r)| r.value().map(|v| (*f, v)))
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("kind", &self.kind)
            .field("values", &Redacted(&self.values))
            .field("unexpected", &self.unexpected)
            .finish()
    }
}

/// Resolve every field of `desired`'s kind.
///
/// Declared non-null values win; fallback-eligible fields then consult
/// `env`, where a set-but-empty variable counts as unset. Never fails.
pub fn resolve(desired: &DesiredResource, env: &dyn EnvLookup) -> ResolvedConfig {
    let table = schema(desired.kind);

    let values: BTreeMap<Field, Resolution> = table
        .fields()
        .map(|field| {
            let resolution = if let Some(v) = desired.declared(field) {
                Resolution::Declared(v.clone())
            } else if let Some(v) = table
                .env_var(field)
                .and_then(|var| env.lookup(var))
                .filter(|v| !v.is_empty())
            {
                Resolution::Fallback(Scalar::String(v))
            } else {
                Resolution::Absent
            };
            tracing::debug!(kind = %desired.kind, %field, source = resolution.source(), "resolved field");
            (field, resolution)
        })
        .collect();

    let unexpected = desired
        .fields
        .iter()
        .filter(|(f, v)| v.is_some() && !table.accepts(**f))
        .map(|(f, _)| *f)
        .collect();

    ResolvedConfig {
        kind: desired.kind,
        values,
        unexpected,
    }
}
