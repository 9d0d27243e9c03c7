//! Error types for `pcloud-core`.
//!
//! Each variant carries the entity kind and, once the vault has assigned
//! one, the identifier, so failures can be reconciled by hand. Errors never
//! include secret values.

use std::fmt;
use std::time::Duration;

use pcloud_client::{ClientError, EntityId, Kind};

use crate::field::{Field, FieldType};

/// A lifecycle operation requested by the declarative engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Why a field of a desired resource is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Problem {
    /// The field is not an attribute of this kind.
    #[error("not an attribute of {kind}")]
    UnexpectedField { kind: Kind },

    /// A required field is neither declared nor available from the
    /// environment.
    #[error("required value is missing")]
    Missing,

    /// The declared value has the wrong scalar type.
    #[error("expected {expected}, got {found}")]
    WrongType { expected: FieldType, found: FieldType },

    /// The permission level is not one the vault understands.
    #[error("'{value}' is not one of full, read, approver, manager")]
    InvalidPermissionLevel { value: String },
}

/// A desired resource cannot be turned into a vault payload.
///
/// Always raised before any vault call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid '{field}': {problem}")]
pub struct ValidationError {
    pub field: Field,
    pub problem: Problem,
}

impl ValidationError {
    pub fn new(field: Field, problem: Problem) -> Self {
        Self { field, problem }
    }
}

/// The underlying cause of a failed vault round trip.
#[derive(Debug, thiserror::Error)]
pub enum VaultFailure {
    /// The vault client reported an error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The round trip did not finish before the deadline.
    #[error("no response from the vault within {0:?}")]
    DeadlineExceeded(Duration),

    /// The vault accepted a create request but reported no identifier.
    #[error("vault returned no identifier")]
    NoIdentifier,
}

/// Errors returned by the reconciler and the lifecycle handle.
///
/// None of these terminate the process; every one is fatal at most to the
/// single operation that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The desired resource failed local validation; the vault was not
    /// contacted.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Creation failed; nothing is tracked for the resource.
    #[error("failed to create {kind}: {cause}")]
    CreateFailed {
        kind: Kind,
        #[source]
        cause: VaultFailure,
    },

    /// Refresh failed; the previously tracked state is still valid.
    #[error("failed to read {kind} '{id}': {cause}")]
    ReadFailed {
        kind: Kind,
        id: EntityId,
        #[source]
        cause: VaultFailure,
    },

    /// Deletion failed; the resource is still tracked.
    #[error("failed to delete {kind} '{id}': {cause}")]
    DeleteFailed {
        kind: Kind,
        id: EntityId,
        #[source]
        cause: VaultFailure,
    },

    /// The operation is a policy-level no-op for this kind.
    #[error("{operation} is not supported for {kind}: {guidance}")]
    Unsupported {
        operation: Operation,
        kind: Kind,
        guidance: &'static str,
    },

    /// The resource is not tracked, so there is nothing to operate on.
    #[error("cannot {operation} {kind}: resource is not managed")]
    NotManaged { operation: Operation, kind: Kind },

    /// The resource is already tracked under an identifier.
    #[error("{kind} is already managed as '{id}'")]
    AlreadyManaged { kind: Kind, id: EntityId },

    /// The kind of a tracked resource cannot change.
    #[error("resource kind is {expected}, got {found}")]
    KindMismatch { expected: Kind, found: Kind },
}

impl ReconcileError {
    /// Whether the tracked state survives this error and a retry may
    /// succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReconcileError::ReadFailed { .. }
                | ReconcileError::DeleteFailed { .. }
                | ReconcileError::Unsupported { .. }
        )
    }

    /// Whether this is an informational policy outcome rather than a
    /// failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ReconcileError::Unsupported { .. })
    }
}
