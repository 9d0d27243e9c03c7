//! Declarative engine: drives every resource of a plan or state through its
//! lifecycle and folds the results back into a new state.
//!
//! Resources are independent, so each one is reconciled on its own task.
//! A failing resource never stops the others; its previous state is kept,
//! even when its task panics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pcloud_client::VaultClient;
use pcloud_core::{DesiredResource, ManagedResource, ReconcileError, Reconciler, TrackedState};
use tokio::task::JoinHandle;

use crate::files::{Plan, State};

/// Shared vault handle; every task works on a clone.
pub type Vault = Arc<dyn VaultClient>;

/// What happened to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok(String),
    /// Not applied, but not an error either (e.g. an unsupported update).
    Notice(String),
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(msg) => write!(f, "ok: {msg}"),
            Self::Notice(msg) => write!(f, "notice: {msg}"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Per-resource outcomes of one run, ordered by address.
#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: BTreeMap<String, Outcome>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failed()).count()
    }
}

enum Task {
    Create(DesiredResource),
    Refresh(TrackedState, Option<DesiredResource>),
    Delete(TrackedState),
}

impl Task {
    /// The state tracked before this task ran.
    fn previous(&self) -> Option<&TrackedState> {
        match self {
            Task::Create(_) => None,
            Task::Refresh(current, _) | Task::Delete(current) => Some(current),
        }
    }
}

struct Settled {
    address: String,
    /// What the state should hold for `address` afterwards.
    tracked: Option<TrackedState>,
    outcome: Outcome,
}

pub struct Engine {
    reconciler: Reconciler<Vault>,
}

impl Engine {
    pub fn new(reconciler: Reconciler<Vault>) -> Self {
        Self { reconciler }
    }

    /// Converge `state` towards `plan`: create what is new, refresh what is
    /// tracked and delete what was dropped from the plan.
    pub async fn apply(&self, plan: Plan, state: State) -> (State, Report) {
        let mut tracked = state.resources;
        let mut tasks = Vec::new();

        for (address, desired) in plan.resources {
            let task = match tracked.remove(&address) {
                Some(current) => Task::Refresh(current, Some(desired)),
                None => Task::Create(desired),
            };
            tasks.push((address, task));
        }
        tasks.extend(
            tracked
                .into_iter()
                .map(|(address, current)| (address, Task::Delete(current))),
        );

        self.run(tasks).await
    }

    /// Refresh every tracked resource from the vault.
    pub async fn refresh(&self, state: State) -> (State, Report) {
        let tasks = state
            .resources
            .into_iter()
            .map(|(address, current)| (address, Task::Refresh(current, None)))
            .collect();
        self.run(tasks).await
    }

    /// Delete every tracked resource.
    pub async fn destroy(&self, state: State) -> (State, Report) {
        let tasks = state
            .resources
            .into_iter()
            .map(|(address, current)| (address, Task::Delete(current)))
            .collect();
        self.run(tasks).await
    }

    async fn run(&self, tasks: Vec<(String, Task)>) -> (State, Report) {
        let handles: Vec<(String, Option<TrackedState>, JoinHandle<Settled>)> = tasks
            .into_iter()
            .map(|(address, task)| {
                let previous = task.previous().cloned();
                let reconciler = self.reconciler.clone();
                let name = address.clone();
                let handle =
                    tokio::spawn(async move { reconcile(&reconciler, name, task).await });
                (address, previous, handle)
            })
            .collect();

        let mut state = State::default();
        let mut report = Report::default();
        for (address, previous, handle) in handles {
            let settled = match handle.await {
                Ok(settled) => settled,
                Err(e) => {
                    tracing::error!(%address, error = %e, "reconciliation task aborted, keeping tracked state");
                    Settled {
                        address,
                        tracked: previous,
                        outcome: Outcome::Failed(format!("reconciliation aborted: {e}")),
                    }
                }
            };
            if let Some(tracked) = settled.tracked {
                state.resources.insert(settled.address.clone(), tracked);
            }
            report.outcomes.insert(settled.address, settled.outcome);
        }
        (state, report)
    }
}

async fn reconcile(reconciler: &Reconciler<Vault>, address: String, task: Task) -> Settled {
    let (tracked, outcome) = match task {
        Task::Create(desired) => create(reconciler, &desired).await,
        Task::Refresh(current, desired) => refresh(reconciler, current, desired.as_ref()).await,
        Task::Delete(current) => delete(reconciler, current).await,
    };
    match &outcome {
        Outcome::Failed(msg) => tracing::warn!(%address, "{msg}"),
        Outcome::Notice(msg) => tracing::info!(%address, "{msg}"),
        Outcome::Ok(_) => {}
    }
    Settled {
        address,
        tracked,
        outcome,
    }
}

async fn create(
    reconciler: &Reconciler<Vault>,
    desired: &DesiredResource,
) -> (Option<TrackedState>, Outcome) {
    let mut resource = ManagedResource::new(desired.kind);
    let created = resource
        .create(reconciler, desired)
        .await
        .map(|state| format!("created {} '{}'", state.kind, state.id));
    match created {
        Ok(msg) => (resource.into_state(), Outcome::Ok(msg)),
        Err(e) => (None, Outcome::Failed(e.to_string())),
    }
}

async fn refresh(
    reconciler: &Reconciler<Vault>,
    current: TrackedState,
    desired: Option<&DesiredResource>,
) -> (Option<TrackedState>, Outcome) {
    if let Some(found) = desired.map(|d| d.kind).filter(|k| *k != current.kind) {
        let e = ReconcileError::KindMismatch {
            expected: current.kind,
            found,
        };
        return (Some(current), Outcome::Failed(e.to_string()));
    }

    let mut resource = ManagedResource::from_state(current);
    let read = resource.refresh(reconciler).await.map(|_| ());
    if let Err(e) = read {
        return (resource.into_state(), Outcome::Failed(e.to_string()));
    }

    let outcome = match desired {
        Some(desired) => drift_outcome(reconciler, &mut resource, desired).await,
        None => refreshed(&resource),
    };
    (resource.into_state(), outcome)
}

async fn drift_outcome(
    reconciler: &Reconciler<Vault>,
    resource: &mut ManagedResource,
    desired: &DesiredResource,
) -> Outcome {
    let drift = resource.state().map(|s| s.drift(desired)).unwrap_or_default();
    if drift.is_empty() {
        return refreshed(resource);
    }
    let fields = drift
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    match resource.update(reconciler, desired).await.map(|_| ()) {
        Err(e) if e.is_unsupported() => Outcome::Notice(format!("drifted fields {fields}: {e}")),
        Err(e) => Outcome::Failed(e.to_string()),
        Ok(()) => refreshed(resource),
    }
}

fn refreshed(resource: &ManagedResource) -> Outcome {
    match resource.state() {
        Some(state) => Outcome::Ok(format!(
            "refreshed '{}', last updated {}",
            state.id, state.last_updated
        )),
        None => Outcome::Ok("refreshed".to_owned()),
    }
}

async fn delete(
    reconciler: &Reconciler<Vault>,
    current: TrackedState,
) -> (Option<TrackedState>, Outcome) {
    let id = current.id.clone();
    let mut resource = ManagedResource::from_state(current);
    match resource.delete(reconciler).await {
        Ok(()) => (None, Outcome::Ok(format!("deleted '{id}'"))),
        // The vault entity stays; only the tracking goes away.
        Err(e) if e.is_unsupported() => (
            None,
            Outcome::Notice(format!("{e}; '{id}' is no longer tracked")),
        ),
        Err(e) => (resource.into_state(), Outcome::Failed(e.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use pcloud_client::{Kind, MemoryVault};
    use pcloud_core::Field;

    use super::*;

    fn engine(vault: &MemoryVault) -> Engine {
        let handle: Vault = Arc::new(vault.clone());
        Engine::new(Reconciler::new(handle).with_env(HashMap::<String, String>::new()))
    }

    fn account(name: &str) -> DesiredResource {
        DesiredResource::new(Kind::DbCredential)
            .with(Field::Name, name)
            .with(Field::Address, "db.internal")
            .with(Field::Username, "orders")
            .with(Field::Platform, "PostgreSQL")
            .with(Field::Safe, "Ops")
            .with(Field::Secrettype, "password")
            .with(Field::Secret, "hunter2")
    }

    fn safe(level: &str) -> DesiredResource {
        DesiredResource::new(Kind::SafeObject)
            .with(Field::SafeName, "Ops")
            .with(Field::Member, "alice")
            .with(Field::MemberType, "user")
            .with(Field::PermissionLevel, level)
    }

    fn plan(entries: &[(&str, DesiredResource)]) -> Plan {
        Plan {
            resources: entries
                .iter()
                .map(|(a, d)| ((*a).to_owned(), d.clone()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn apply_creates_and_keeps_successes_beside_failures() {
        let vault = MemoryVault::new();
        let (state, report) = engine(&vault)
            .apply(
                plan(&[("orders", account("orders-db")), ("bad", safe("owner"))]),
                State::default(),
            )
            .await;

        assert_eq!(report.failures(), 1);
        assert!(matches!(report.outcomes["orders"], Outcome::Ok(_)));
        assert!(state.resources.contains_key("orders"));
        assert!(!state.resources.contains_key("bad"));
        assert_eq!(vault.len().await, 1);
    }

    #[tokio::test]
    async fn apply_twice_only_refreshes() {
        let vault = MemoryVault::new();
        let e = engine(&vault);
        let p = plan(&[("orders", account("orders-db"))]);
        let (state, _) = e.apply(p.clone(), State::default()).await;
        let (again, report) = e.apply(p, state).await;

        assert_eq!(report.failures(), 0);
        assert!(report.outcomes["orders"].to_string().starts_with("ok: refreshed"));
        assert_eq!(again.resources.len(), 1);
        assert_eq!(vault.len().await, 1);
    }

    #[tokio::test]
    async fn drift_is_reported_as_notice() {
        let vault = MemoryVault::new();
        let e = engine(&vault);
        let (state, _) = e
            .apply(plan(&[("orders", account("orders-db"))]), State::default())
            .await;

        let changed = account("orders-db").with(Field::Address, "db2.internal");
        let (state, report) = e.apply(plan(&[("orders", changed)]), state).await;

        let Outcome::Notice(msg) = &report.outcomes["orders"] else {
            panic!("expected notice, got {:?}", report.outcomes["orders"]);
        };
        assert!(msg.contains("address"));
        assert_eq!(report.failures(), 0);
        assert!(state.resources.contains_key("orders"));
    }

    #[tokio::test]
    async fn kind_change_fails_and_keeps_state() {
        let vault = MemoryVault::new();
        let e = engine(&vault);
        let (state, _) = e
            .apply(plan(&[("x", account("orders-db"))]), State::default())
            .await;
        let before = state.resources["x"].clone();

        let (state, report) = e.apply(plan(&[("x", safe("full"))]), state).await;
        assert!(report.outcomes["x"].is_failed());
        assert_eq!(state.resources["x"], before);
    }

    #[tokio::test]
    async fn dropped_resources_are_deleted() {
        let vault = MemoryVault::new();
        let e = engine(&vault);
        let (state, _) = e
            .apply(
                plan(&[("orders", account("orders-db")), ("ops", safe("full"))]),
                State::default(),
            )
            .await;
        let held = vault.len().await;

        let (state, report) = e.apply(Plan::default(), state).await;
        assert_eq!(report.failures(), 0);
        assert!(matches!(report.outcomes["orders"], Outcome::Ok(_)));
        assert!(matches!(report.outcomes["ops"], Outcome::Notice(_)));
        assert!(state.resources.is_empty());
        // The safe is forgotten, not removed.
        assert_eq!(vault.len().await, held - 1);
    }

    struct PanickingVault;

    #[async_trait::async_trait]
    impl VaultClient for PanickingVault {
        async fn create_entity(
            &self,
            _: &pcloud_client::VaultPayload,
        ) -> Result<pcloud_client::EntityId, pcloud_client::ClientError> {
            panic!("vault client bug");
        }

        async fn get_entity(
            &self,
            _: &pcloud_client::EntityId,
            _: Kind,
        ) -> Result<pcloud_client::VaultRecord, pcloud_client::ClientError> {
            panic!("vault client bug");
        }

        async fn delete_entity(
            &self,
            _: &pcloud_client::EntityId,
            _: Kind,
        ) -> Result<(), pcloud_client::ClientError> {
            panic!("vault client bug");
        }

        fn auth_token(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn panicking_task_keeps_state_under_its_address() {
        let vault = MemoryVault::new();
        let (state, _) = engine(&vault)
            .apply(plan(&[("orders", account("orders-db"))]), State::default())
            .await;
        let before = state.resources["orders"].clone();

        let handle: Vault = Arc::new(PanickingVault);
        let broken = Engine::new(Reconciler::new(handle).with_env(HashMap::<String, String>::new()));

        let (after, report) = broken.refresh(state).await;
        assert_eq!(report.failures(), 1);
        assert!(report.outcomes["orders"].is_failed());
        assert_eq!(after.resources["orders"], before);

        let (after, report) = broken.destroy(after).await;
        assert!(report.outcomes["orders"].is_failed());
        assert_eq!(after.resources["orders"], before);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_stale_state() {
        let vault = MemoryVault::new();
        let e = engine(&vault);
        let (state, _) = e
            .apply(plan(&[("orders", account("orders-db"))]), State::default())
            .await;
        let before = state.resources["orders"].clone();
        e.destroy(state).await;

        let mut stale = State::default();
        stale.resources.insert("orders".to_owned(), before.clone());
        let (state, report) = e.refresh(stale).await;
        assert_eq!(report.failures(), 1);
        assert_eq!(state.resources["orders"], before);
    }
}
