//! Engine-side lifecycle of one resource.
//!
//! ```text
//! Unmanaged -> Creating -> Managed -> Reading -> Managed -> Deleting -> Unmanaged
//! ```
//!
//! Create failures fall back to `Unmanaged`; read and delete failures fall
//! back to `Managed` with the previous state intact. Update never leaves
//! `Managed`.

use pcloud_client::{Kind, VaultClient};

use crate::desired::DesiredResource;
use crate::error::{Operation, ReconcileError};
use crate::reconciler::Reconciler;
use crate::state::TrackedState;

/// Where a resource is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unmanaged,
    Creating,
    Managed,
    Reading,
    Deleting,
}

/// One resource as the declarative engine tracks it.
#[derive(Debug, Clone)]
pub struct ManagedResource {
    kind: Kind,
    phase: Phase,
    state: Option<TrackedState>,
}

impl ManagedResource {
    /// A resource of `kind` that does not exist in the vault yet.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            phase: Phase::Unmanaged,
            state: None,
        }
    }

    /// A resource already tracked under `state`.
    pub fn from_state(state: TrackedState) -> Self {
        Self {
            kind: state.kind,
            phase: Phase::Managed,
            state: Some(state),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> Option<&TrackedState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<TrackedState> {
        self.state
    }

    /// Create the resource in the vault.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::AlreadyManaged`] if the resource is tracked,
    /// [`ReconcileError::KindMismatch`] if `desired` is of another kind,
    /// and any error of [`Reconciler::create`].
    pub async fn create<C: VaultClient>(
        &mut self,
        reconciler: &Reconciler<C>,
        desired: &DesiredResource,
    ) -> Result<&TrackedState, ReconcileError> {
        self.settle();
        if let Some(state) = &self.state {
            return Err(ReconcileError::AlreadyManaged {
                kind: self.kind,
                id: state.id.clone(),
            });
        }
        self.check_kind(desired.kind)?;

        self.phase = Phase::Creating;
        match reconciler.create(desired).await {
            Ok(state) => {
                self.phase = Phase::Managed;
                Ok(&*self.state.insert(state))
            }
            Err(e) => {
                self.phase = Phase::Unmanaged;
                Err(e)
            }
        }
    }

    /// Refresh the tracked state from the vault.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::NotManaged`] if nothing is tracked, and any error
    /// of [`Reconciler::read`]; the previous state is kept on failure.
    pub async fn refresh<C: VaultClient>(
        &mut self,
        reconciler: &Reconciler<C>,
    ) -> Result<&TrackedState, ReconcileError> {
        self.settle();
        let Some(current) = &self.state else {
            return Err(self.not_managed(Operation::Read));
        };

        self.phase = Phase::Reading;
        let result = reconciler.read(current).await;
        self.phase = Phase::Managed;
        let refreshed = result?;
        Ok(&*self.state.insert(refreshed))
    }

    /// Request an in-place update. Always unsupported; the tracked state
    /// is left as it is.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::NotManaged`] if nothing is tracked,
    /// [`ReconcileError::KindMismatch`] if `desired` is of another kind,
    /// otherwise [`ReconcileError::Unsupported`].
    pub async fn update<C: VaultClient>(
        &mut self,
        reconciler: &Reconciler<C>,
        desired: &DesiredResource,
    ) -> Result<&TrackedState, ReconcileError> {
        self.settle();
        let Some(current) = &self.state else {
            return Err(self.not_managed(Operation::Update));
        };
        self.check_kind(desired.kind)?;
        reconciler.update(current, desired).await?;
        Ok(current)
    }

    /// Delete the resource from the vault and stop tracking it.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::NotManaged`] if nothing is tracked, and any error
    /// of [`Reconciler::delete`]; the resource stays tracked on failure.
    pub async fn delete<C: VaultClient>(
        &mut self,
        reconciler: &Reconciler<C>,
    ) -> Result<(), ReconcileError> {
        self.settle();
        let Some(current) = &self.state else {
            return Err(self.not_managed(Operation::Delete));
        };

        self.phase = Phase::Deleting;
        let result = reconciler.delete(current).await;
        match result {
            Ok(()) => {
                self.state = None;
                self.phase = Phase::Unmanaged;
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Managed;
                Err(e)
            }
        }
    }

    /// Resolve a transitional phase left behind by a cancelled operation.
    fn settle(&mut self) {
        self.phase = if self.state.is_some() {
            Phase::Managed
        } else {
            Phase::Unmanaged
        };
    }

    fn check_kind(&self, found: Kind) -> Result<(), ReconcileError> {
        if found == self.kind {
            Ok(())
        } else {
            Err(ReconcileError::KindMismatch {
                expected: self.kind,
                found,
            })
        }
    }

    fn not_managed(&self, operation: Operation) -> ReconcileError {
        ReconcileError::NotManaged {
            operation,
            kind: self.kind,
        }
    }
}
