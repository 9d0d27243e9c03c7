//! Desired configuration for one resource.

use std::collections::BTreeMap;
use std::fmt;

use pcloud_client::Kind;
use serde::{Deserialize, Serialize};

use crate::field::{Field, Redacted, Scalar};

/// What the declarative engine wants one resource to look like.
///
/// A field mapped to `None` was declared as null and counts as not
/// declared; the resolver may then fill it from the environment.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    pub kind: Kind,
    #[serde(default)]
    pub fields: BTreeMap<Field, Option<Scalar>>,
}

impl DesiredResource {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Declare `field` with a value.
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<Scalar>) -> Self {
        self.fields.insert(field, Some(value.into()));
        self
    }

    /// Declare `field` as null.
    #[must_use]
    pub fn with_null(mut self, field: Field) -> Self {
        self.fields.insert(field, None);
        self
    }

    /// The declared value of `field`, if present and non-null.
    pub fn declared(&self, field: Field) -> Option<&Scalar> {
        self.fields.get(&field).and_then(Option::as_ref)
    }
}

impl fmt::Debug for DesiredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesiredResource")
            .field("kind", &self.kind)
            .field("fields", &Redacted(&self.fields))
            .finish()
    }
}
