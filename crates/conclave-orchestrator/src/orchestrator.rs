//! Fixpoint scheduler over one context store

use crate::{
    Agent, AgentDescriptor, ExecutionMode, OrchestratorConfig, OrchestratorError, RunOutcome,
    RunReport,
};
use conclave_domain::{AgentId, ContextItem, ContextOperation, ContextReader, ContextStore};
use conclave_store::{MemoryStore, StoreError};
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;

/// Drives registered agents over a store until nothing changes
///
/// Each `process` call seeds the store, then repeats scheduling passes:
/// every eligible agent runs once per pass and its operations are applied.
/// The run ends when a pass applies nothing, when no agent is eligible, or
/// when `max_iterations` passes have run.
///
/// # Examples
///
/// ```
/// use conclave_domain::{ContextItem, ContextReader};
/// use conclave_orchestrator::{Orchestrator, RunOutcome};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut orchestrator = Orchestrator::new();
/// let seed = ContextItem::builder("user_input", json!("hello"), "user").build();
///
/// let report = orchestrator.process(vec![seed]).await?;
/// assert_eq!(report.outcome, RunOutcome::NoEligibleAgents);
/// assert!(orchestrator.store().has("user_input"));
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<S = MemoryStore> {
    agents: Vec<Box<dyn Agent>>,
    store: S,
    config: OrchestratorConfig,
    in_flight: HashSet<AgentId>,
}

impl Orchestrator<MemoryStore> {
    /// Orchestrator over a fresh in-memory store with default configuration
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for Orchestrator<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Orchestrator<S>
where
    S: ContextStore<Error = StoreError>,
{
    /// Orchestrator over the given store with default configuration
    pub fn with_store(store: S) -> Self {
        Self {
            agents: Vec::new(),
            store,
            config: OrchestratorConfig::default(),
            in_flight: HashSet::new(),
        }
    }

    /// Replace the configuration after validating it
    pub fn with_config(mut self, config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Current configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register an agent; ids must be unique
    pub fn register_agent(&mut self, agent: Box<dyn Agent>) -> Result<(), OrchestratorError> {
        let descriptor = agent.descriptor();
        if self.agents.iter().any(|a| a.descriptor().id == descriptor.id) {
            return Err(OrchestratorError::DuplicateAgent(descriptor.id.clone()));
        }

        tracing::info!(
            "Registered agent {} (consumes: {:?}, produces: {:?})",
            descriptor.id,
            descriptor.consumes,
            descriptor.produces
        );
        self.agents.push(agent);
        Ok(())
    }

    /// Descriptors of registered agents, in registration order
    pub fn agents(&self) -> Vec<&AgentDescriptor> {
        self.agents.iter().map(|a| a.descriptor()).collect()
    }

    /// Read access to the store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Direct mutable access to the store, outside any run
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give up the orchestrator and keep the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Seed the store and run agents to a fixpoint
    ///
    /// Agent and operation failures are isolated and counted in the report.
    /// The only error is a persistence failure when
    /// `abort_on_persistence_error` is set.
    pub async fn process(
        &mut self,
        initial_items: Vec<ContextItem>,
    ) -> Result<RunReport, OrchestratorError> {
        let mut report = RunReport::new();

        // A cancelled earlier run may have left marks behind
        self.in_flight.clear();

        tracing::info!(
            "Starting run with {} seed items and {} agents",
            initial_items.len(),
            self.agents.len()
        );

        self.seed(initial_items, &mut report)?;

        let mut made_progress = true;
        let mut nobody_eligible = false;

        while made_progress && report.iterations < self.config.max_iterations {
            let eligible = self.eligible_agents();
            tracing::debug!(
                "Iteration {}: {} eligible agents",
                report.iterations + 1,
                eligible.len()
            );

            if eligible.is_empty() {
                report.record_iteration(false);
                nobody_eligible = true;
                break;
            }

            made_progress = match self.config.execution_mode {
                ExecutionMode::Sequential => self.run_sequential(&eligible, &mut report).await?,
                ExecutionMode::Concurrent => self.run_concurrent(&eligible, &mut report).await?,
            };
            report.record_iteration(made_progress);
        }

        report.outcome = if nobody_eligible {
            RunOutcome::NoEligibleAgents
        } else if made_progress {
            RunOutcome::IterationLimit
        } else {
            RunOutcome::Quiescent
        };

        if report.outcome == RunOutcome::IterationLimit {
            tracing::warn!(
                "Run stopped at the iteration limit ({}) while still making progress",
                self.config.max_iterations
            );
        }

        tracing::info!(
            "Run finished: {} after {} iterations, {} operations applied",
            report.outcome,
            report.iterations,
            report.total_applied()
        );

        Ok(report)
    }

    /// Merge seed items one at a time so a bad item only loses itself
    fn seed(
        &mut self,
        initial_items: Vec<ContextItem>,
        report: &mut RunReport,
    ) -> Result<(), OrchestratorError> {
        for item in initial_items {
            let key = item.key.clone();
            match self.store.merge(vec![item]) {
                Ok(()) => {
                    report.affected_keys.insert(key);
                }
                Err(e) => {
                    if self.config.abort_on_persistence_error && e.is_persistence() {
                        tracing::error!("Seeding '{}' failed, aborting run: {}", key, e);
                        return Err(OrchestratorError::Store(e.to_string()));
                    }
                    tracing::error!("Seed item '{}' rejected: {}", key, e);
                    report.seed_failures += 1;
                }
            }
        }
        Ok(())
    }

    /// Indices of agents that may run this iteration, in registration order
    fn eligible_agents(&self) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| {
                let descriptor = agent.descriptor();
                !self.in_flight.contains(&descriptor.id) && descriptor.is_eligible(&self.store)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Run agents one by one; each sees the writes of the ones before it
    async fn run_sequential(
        &mut self,
        eligible: &[usize],
        report: &mut RunReport,
    ) -> Result<bool, OrchestratorError> {
        let timeout = self.config.agent_timeout();
        let abort = self.config.abort_on_persistence_error;
        let mut progress = false;

        for &index in eligible {
            let agent = self.agents[index].as_ref();
            let descriptor = agent.descriptor();

            let result = {
                let _marked = InFlight::mark(&mut self.in_flight, [descriptor.id.clone()]);
                run_agent(agent, &self.store, timeout).await
            };

            if let Some(operations) = record_invocation(report, descriptor, result) {
                progress |= apply_operations(&mut self.store, descriptor, operations, report, abort)?;
            }
        }

        Ok(progress)
    }

    /// Run agents together against the same view, then apply in order
    async fn run_concurrent(
        &mut self,
        eligible: &[usize],
        report: &mut RunReport,
    ) -> Result<bool, OrchestratorError> {
        let timeout = self.config.agent_timeout();
        let abort = self.config.abort_on_persistence_error;

        let store = &self.store;
        let agents = &self.agents;
        let results = {
            let _marked = InFlight::mark(
                &mut self.in_flight,
                eligible.iter().map(|&index| agents[index].descriptor().id.clone()),
            );
            join_all(
                eligible
                    .iter()
                    .map(|&index| run_agent(agents[index].as_ref(), store, timeout)),
            )
            .await
        };

        let mut progress = false;
        for (&index, result) in eligible.iter().zip(results) {
            let descriptor = self.agents[index].descriptor();
            if let Some(operations) = record_invocation(report, descriptor, result) {
                progress |= apply_operations(&mut self.store, descriptor, operations, report, abort)?;
            }
        }

        Ok(progress)
    }
}

/// In-flight marks for a set of agents, released on drop
///
/// Dropping the run future mid-await still clears the marks.
struct InFlight<'a> {
    set: &'a mut HashSet<AgentId>,
    ids: Vec<AgentId>,
}

impl<'a> InFlight<'a> {
    fn mark(set: &'a mut HashSet<AgentId>, ids: impl IntoIterator<Item = AgentId>) -> Self {
        let ids: Vec<AgentId> = ids.into_iter().collect();
        set.extend(ids.iter().cloned());
        Self { set, ids }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        for id in &self.ids {
            self.set.remove(id);
        }
    }
}

/// Invoke one agent, enforcing the optional deadline
async fn run_agent(
    agent: &dyn Agent,
    context: &dyn ContextReader,
    timeout: Option<Duration>,
) -> anyhow::Result<Vec<ContextOperation>> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, agent.process(context)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
        },
        None => agent.process(context).await,
    }
}

/// Count the invocation; failed agents contribute no operations
fn record_invocation(
    report: &mut RunReport,
    descriptor: &AgentDescriptor,
    result: anyhow::Result<Vec<ContextOperation>>,
) -> Option<Vec<ContextOperation>> {
    let stats = report.stats_mut(&descriptor.id);
    stats.invocations += 1;

    match result {
        Ok(operations) => {
            stats.operations_returned += operations.len();
            tracing::debug!(
                "Agent {} returned {} operations",
                descriptor.id,
                operations.len()
            );
            Some(operations)
        }
        Err(e) => {
            stats.failures += 1;
            tracing::error!("Agent {} failed: {:#}", descriptor.id, e);
            None
        }
    }
}

/// Apply one agent's operations in order; returns whether any applied
fn apply_operations<S>(
    store: &mut S,
    descriptor: &AgentDescriptor,
    operations: Vec<ContextOperation>,
    report: &mut RunReport,
    abort_on_persistence_error: bool,
) -> Result<bool, OrchestratorError>
where
    S: ContextStore<Error = StoreError>,
{
    let mut progress = false;

    for operation in operations {
        let kind = operation.kind();

        for key in operation.keys() {
            if !descriptor.declares_output(key) {
                tracing::warn!(
                    "Agent {} wrote undeclared key '{}' ({})",
                    descriptor.id,
                    key,
                    kind
                );
            }
        }

        let applied = apply_operation(store, operation);
        if applied.changed {
            progress = true;
            report.affected_keys.extend(applied.keys);
        }

        match applied.error {
            None if applied.changed => {
                report.stats_mut(&descriptor.id).operations_applied += 1;
            }
            None => {
                tracing::debug!("{} from {} changed nothing", kind, descriptor.id);
            }
            Some(e) => {
                if abort_on_persistence_error && e.is_persistence() {
                    tracing::error!(
                        "{} from {} could not be persisted, aborting run: {}",
                        kind,
                        descriptor.id,
                        e
                    );
                    return Err(OrchestratorError::Store(e.to_string()));
                }
                tracing::error!("{} from {} failed: {}", kind, descriptor.id, e);
                report.stats_mut(&descriptor.id).operations_failed += 1;
            }
        }
    }

    Ok(progress)
}

/// What one operation did to the store
#[derive(Default)]
struct Applied {
    /// Whether anything was written
    changed: bool,
    /// Live keys written, up to any failure
    keys: Vec<String>,
    error: Option<StoreError>,
}

impl Applied {
    fn from_result(result: Result<(), StoreError>, keys: Vec<String>) -> Self {
        match result {
            Ok(()) => Self {
                changed: true,
                keys,
                error: None,
            },
            Err(e) => Self {
                error: Some(e),
                ..Self::default()
            },
        }
    }
}

/// Dispatch an operation to the store
///
/// A `merge` runs item by item, so the items written before a failing one
/// are still reported as changes.
fn apply_operation<S>(store: &mut S, operation: ContextOperation) -> Applied
where
    S: ContextStore<Error = StoreError>,
{
    match operation {
        ContextOperation::Add { item } => {
            let key = item.key.clone();
            Applied::from_result(store.add(item), vec![key])
        }
        ContextOperation::Update {
            key,
            value,
            confidence,
        } => {
            let result = store.update(&key, value, confidence);
            Applied::from_result(result, vec![key])
        }
        ContextOperation::Delete { key } => match store.delete(&key) {
            Ok(true) => Applied::from_result(Ok(()), vec![key]),
            Ok(false) => Applied::default(),
            Err(e) => Applied::from_result(Err(e), Vec::new()),
        },
        ContextOperation::Merge { items } => {
            let mut applied = Applied::default();
            for item in items {
                let key = item.key.clone();
                if let Err(e) = store.merge(vec![item]) {
                    applied.error = Some(e);
                    break;
                }
                applied.changed = true;
                applied.keys.push(key);
            }
            applied
        }
        ContextOperation::Snapshot { id } => {
            Applied::from_result(store.create_snapshot(&id).map(|_| ()), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedAgent {
        descriptor: AgentDescriptor,
        operations: Vec<ContextOperation>,
    }

    impl FixedAgent {
        fn boxed(id: &str, consumes: &[&str], operations: Vec<ContextOperation>) -> Box<dyn Agent> {
            Box::new(Self {
                descriptor: AgentDescriptor::builder(id)
                    .consumes(consumes.iter().copied())
                    .build(),
                operations,
            })
        }
    }

    #[async_trait]
    impl Agent for FixedAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, _context: &dyn ContextReader) -> anyhow::Result<Vec<ContextOperation>> {
            Ok(self.operations.clone())
        }
    }

    fn seed(key: &str) -> ContextItem {
        ContextItem::builder(key, json!(true), "user").build()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut orchestrator = Orchestrator::new();
        orchestrator
            .register_agent(FixedAgent::boxed("a", &["p"], vec![]))
            .unwrap();

        let result = orchestrator.register_agent(FixedAgent::boxed("a", &["q"], vec![]));
        assert!(matches!(result, Err(OrchestratorError::DuplicateAgent(ref id)) if id == "a"));
        assert_eq!(orchestrator.agents().len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OrchestratorConfig {
            max_iterations: 0,
            ..OrchestratorConfig::default()
        };
        assert!(Orchestrator::new().with_config(config).is_err());
    }

    #[tokio::test]
    async fn test_no_agents_counts_one_iteration() {
        let mut orchestrator = Orchestrator::new();
        let report = orchestrator.process(vec![seed("p")]).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::NoEligibleAgents);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.progress_by_iteration, vec![false]);
        assert!(report.affected_keys.contains("p"));
    }

    #[tokio::test]
    async fn test_seed_failure_is_counted_not_fatal() {
        let mut orchestrator = Orchestrator::new();
        let bad = ContextItem::builder("bad", json!(1), "user").confidence(3.0).build();

        let report = orchestrator.process(vec![bad, seed("good")]).await.unwrap();
        assert_eq!(report.seed_failures, 1);
        assert!(orchestrator.store().has("good"));
        assert!(!orchestrator.store().has("bad"));
    }

    #[tokio::test]
    async fn test_delete_of_absent_key_is_not_progress() {
        let mut orchestrator = Orchestrator::new();
        orchestrator
            .register_agent(FixedAgent::boxed("cleaner", &["p"], vec![ContextOperation::delete("ghost")]))
            .unwrap();

        let report = orchestrator.process(vec![seed("p")]).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Quiescent);
        assert_eq!(report.iterations, 1);

        let stats = report.stats("cleaner").unwrap();
        assert_eq!(stats.operations_returned, 1);
        assert_eq!(stats.operations_applied, 0);
        assert_eq!(stats.operations_failed, 0);
    }

    #[tokio::test]
    async fn test_snapshot_operation_applies() {
        let mut orchestrator = Orchestrator::new();
        orchestrator
            .register_agent(FixedAgent::boxed("archivist", &["p"], vec![ContextOperation::snapshot("checkpoint")]))
            .unwrap();
        let config = OrchestratorConfig {
            max_iterations: 2,
            ..OrchestratorConfig::default()
        };
        let mut orchestrator = orchestrator.with_config(config).unwrap();

        let report = orchestrator.process(vec![seed("p")]).await.unwrap();
        // Re-snapshotting each pass counts as a change
        assert_eq!(report.outcome, RunOutcome::IterationLimit);
        assert_eq!(orchestrator.store().snapshot_ids(), vec!["checkpoint"]);
    }

    #[tokio::test]
    async fn test_into_store_keeps_results() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.process(vec![seed("p")]).await.unwrap();

        let store = orchestrator.into_store();
        assert!(store.has("p"));
    }
}
