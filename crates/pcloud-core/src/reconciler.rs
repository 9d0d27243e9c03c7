//! The vault reconciler.
//!
//! Orchestrates resolve, map and one vault round trip per operation. Holds
//! no per-resource state: tracked state is passed in and returned, never
//! cached, so one reconciler can serve any number of concurrent resources.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pcloud_client::{ClientError, Kind, VaultClient, VaultRecord};

use crate::desired::DesiredResource;
use crate::error::{Operation, ReconcileError, VaultFailure};
use crate::materialize::materialize;
use crate::payload::map;
use crate::resolver::{EnvLookup, ProcessEnv, resolve};
use crate::state::{LastUpdated, TrackedState};

/// Default bound on a single vault round trip.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

const UPDATE_GUIDANCE: &str = "vault entities cannot be changed in place; \
     ask the vault administrator to apply the change";
const DELETE_GUIDANCE: &str = "safes and safe memberships are removed by \
     the vault administrator";

/// Reconciles desired resources against a vault.
#[derive(Clone)]
pub struct Reconciler<C> {
    client: C,
    env: Arc<dyn EnvLookup>,
    deadline: Duration,
}

impl<C: VaultClient> Reconciler<C> {
    /// A reconciler reading fallbacks from the process environment, with
    /// the default deadline.
    pub fn new(client: C) -> Self {
        Self {
            client,
            env: Arc::new(ProcessEnv),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Use `env` for environment fallback instead of the process
    /// environment.
    #[must_use]
    pub fn with_env(mut self, env: impl EnvLookup + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Bound every vault round trip by `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Create the vault entity for `desired`.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Validation`] if the resource cannot be mapped (the
    /// vault is not contacted), [`ReconcileError::CreateFailed`] if the
    /// vault call fails, times out or reports no identifier.
    pub async fn create(&self, desired: &DesiredResource) -> Result<TrackedState, ReconcileError> {
        let kind = desired.kind;
        let cfg = resolve(desired, self.env.as_ref());
        let payload = map(&cfg)?;

        let id = self
            .bounded(self.client.create_entity(&payload))
            .await
            .map_err(|cause| {
                tracing::warn!(%kind, error = %cause, "create failed");
                ReconcileError::CreateFailed { kind, cause }
            })?;

        if id.is_empty() {
            tracing::warn!(%kind, "vault accepted create but returned no identifier");
            return Err(ReconcileError::CreateFailed {
                kind,
                cause: VaultFailure::NoIdentifier,
            });
        }

        tracing::info!(%kind, %id, "created vault entity");
        Ok(TrackedState {
            kind,
            id,
            last_updated: LastUpdated::local_now(),
            fields: cfg.present().map(|(f, v)| (f, v.clone())).collect(),
        })
    }

    /// Refresh `state` from the vault.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadFailed`] if the vault call fails or times out;
    /// `state` remains valid.
    pub async fn read(&self, state: &TrackedState) -> Result<TrackedState, ReconcileError> {
        let kind = state.kind;
        let failed = |cause: VaultFailure| {
            tracing::warn!(%kind, id = %state.id, error = %cause, "read failed, keeping tracked state");
            ReconcileError::ReadFailed {
                kind,
                id: state.id.clone(),
                cause,
            }
        };

        let record = self
            .bounded(self.client.get_entity(&state.id, kind))
            .await
            .map_err(&failed)?;

        if !record_fits(&record, kind) {
            return Err(failed(VaultFailure::Client(ClientError::KindMismatch {
                kind,
                id: state.id.to_string(),
            })));
        }

        let refreshed = materialize(&record, kind, state);
        tracing::info!(%kind, id = %refreshed.id, last_updated = %refreshed.last_updated, "refreshed vault entity");
        Ok(refreshed)
    }

    /// Vault entities are never changed in place.
    ///
    /// Never contacts the vault. Always returns
    /// [`ReconcileError::Unsupported`]; `state` remains valid.
    ///
    /// # Errors
    ///
    /// Always.
    pub async fn update(
        &self,
        state: &TrackedState,
        desired: &DesiredResource,
    ) -> Result<TrackedState, ReconcileError> {
        let drift = state.drift(desired);
        tracing::info!(kind = %state.kind, id = %state.id, ?drift, "{UPDATE_GUIDANCE}");
        Err(ReconcileError::Unsupported {
            operation: Operation::Update,
            kind: state.kind,
            guidance: UPDATE_GUIDANCE,
        })
    }

    /// Remove the vault entity behind `state`.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::Unsupported`] for safes and safe memberships,
    /// [`ReconcileError::DeleteFailed`] if the vault call fails or times
    /// out. In both cases `state` remains valid.
    pub async fn delete(&self, state: &TrackedState) -> Result<(), ReconcileError> {
        let kind = state.kind;
        if !kind.is_credential() {
            tracing::info!(%kind, id = %state.id, "{DELETE_GUIDANCE}");
            return Err(ReconcileError::Unsupported {
                operation: Operation::Delete,
                kind,
                guidance: DELETE_GUIDANCE,
            });
        }

        self.bounded(self.client.delete_entity(&state.id, kind))
            .await
            .map_err(|cause| {
                tracing::warn!(%kind, id = %state.id, error = %cause, "delete failed, keeping tracked state");
                ReconcileError::DeleteFailed {
                    kind,
                    id: state.id.clone(),
                    cause,
                }
            })?;

        tracing::info!(%kind, id = %state.id, "deleted vault entity");
        Ok(())
    }

    /// The client's current bearer token, as an opaque string.
    pub fn auth_token(&self) -> Option<String> {
        self.client.auth_token()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, VaultFailure> {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result.map_err(VaultFailure::Client),
            Err(_) => Err(VaultFailure::DeadlineExceeded(self.deadline)),
        }
    }
}

fn record_fits(record: &VaultRecord, kind: Kind) -> bool {
    match record {
        VaultRecord::Credential(_) => kind.is_credential(),
        VaultRecord::Safe(_) => kind == Kind::SafeObject,
        VaultRecord::SafeMember(_) => kind == Kind::SafeMember,
    }
}
