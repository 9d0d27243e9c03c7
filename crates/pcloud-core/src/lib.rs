//! Reconciliation core for `pcloud-sync`.
//!
//! Turns declared resources into vault entities and vault records back
//! into tracked state:
//!
//! - [`resolve`]: declared value, else environment fallback, else absent
//! - [`map`]: resolved configuration to a kind-specific [`VaultPayload`],
//!   validating before any vault call
//! - [`Reconciler`]: create, read, update and delete over a
//!   [`VaultClient`], each round trip bounded by a deadline
//! - [`materialize`]: a vault record folded into [`TrackedState`]
//! - [`ManagedResource`]: the engine-side lifecycle of one resource
//!
//! [`VaultPayload`]: pcloud_client::VaultPayload
//! [`VaultClient`]: pcloud_client::VaultClient

pub mod desired;
pub mod error;
pub mod field;
pub mod lifecycle;
pub mod materialize;
pub mod payload;
pub mod reconciler;
pub mod resolver;
pub mod state;

pub use desired::DesiredResource;
pub use error::{Operation, Problem, ReconcileError, ValidationError, VaultFailure};
pub use field::{Field, FieldType, KindSchema, Scalar, schema};
pub use lifecycle::{ManagedResource, Phase};
pub use materialize::materialize;
pub use payload::map;
pub use reconciler::{DEFAULT_DEADLINE, Reconciler};
pub use resolver::{EnvLookup, ProcessEnv, Resolution, ResolvedConfig, resolve};
pub use state::{LastUpdated, TimestampSource, TrackedState};
