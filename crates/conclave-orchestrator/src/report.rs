//! Run reports for Orchestrator `process` calls

use conclave_domain::AgentId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// An iteration applied no operation: the fixpoint
    Quiescent,
    /// No registered agent was eligible
    NoEligibleAgents,
    /// `max_iterations` passes ran and the last one still made progress
    IterationLimit,
}

impl RunOutcome {
    /// Whether the run settled on its own rather than hitting the bound
    pub fn reached_fixpoint(&self) -> bool {
        !matches!(self, RunOutcome::IterationLimit)
    }

    /// Short name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Quiescent => "quiescent",
            RunOutcome::NoEligibleAgents => "no_eligible_agents",
            RunOutcome::IterationLimit => "iteration_limit",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// Times the agent was invoked
    pub invocations: usize,
    /// Operations the agent returned
    pub operations_returned: usize,
    /// Of those, operations the store accepted
    pub operations_applied: usize,
    /// Of those, operations the store rejected
    pub operations_failed: usize,
    /// Invocations that errored or timed out
    pub failures: usize,
}

/// Outcome and counters of one `process` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Scheduling passes performed
    pub iterations: usize,
    /// Why the run stopped
    pub outcome: RunOutcome,
    /// Counters keyed by agent id
    pub agents: BTreeMap<AgentId, AgentStats>,
    /// Keys touched by applied operations, seed items included
    pub affected_keys: BTreeSet<String>,
    /// Seed items the store rejected
    pub seed_failures: usize,
    /// Whether each iteration applied anything, in order
    pub progress_by_iteration: Vec<bool>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            iterations: 0,
            outcome: RunOutcome::Quiescent,
            agents: BTreeMap::new(),
            affected_keys: BTreeSet::new(),
            seed_failures: 0,
            progress_by_iteration: Vec::new(),
        }
    }
}

impl RunReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one agent, created on first use
    pub fn stats_mut(&mut self, agent: &str) -> &mut AgentStats {
        self.agents.entry(agent.to_string()).or_default()
    }

    /// Counters for one agent, if it ran
    pub fn stats(&self, agent: &str) -> Option<&AgentStats> {
        self.agents.get(agent)
    }

    /// Record the end of an iteration
    pub fn record_iteration(&mut self, progress: bool) {
        self.iterations += 1;
        self.progress_by_iteration.push(progress);
    }

    /// Operations applied across all agents
    pub fn total_applied(&self) -> usize {
        self.agents.values().map(|s| s.operations_applied).sum()
    }

    /// Operations rejected across all agents
    pub fn total_failed_operations(&self) -> usize {
        self.agents.values().map(|s| s.operations_failed).sum()
    }

    /// Agent invocations that failed
    pub fn total_agent_failures(&self) -> usize {
        self.agents.values().map(|s| s.failures).sum()
    }

    /// Human-readable summary of the run
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Orchestrator Run Summary".to_string(),
            "========================".to_string(),
            format!("Outcome: {}", self.outcome),
            format!("Iterations: {}", self.iterations),
            format!("Operations applied: {}", self.total_applied()),
            format!("Operations failed: {}", self.total_failed_operations()),
            format!("Agent failures: {}", self.total_agent_failures()),
        ];

        if self.seed_failures > 0 {
            lines.push(format!("Seed items rejected: {}", self.seed_failures));
        }

        if !self.agents.is_empty() {
            lines.push(String::new());
            lines.push("Agents:".to_string());
            for (id, stats) in &self.agents {
                lines.push(format!(
                    "  {}: {} runs, {} returned, {} applied, {} failed ops, {} failures",
                    id,
                    stats.invocations,
                    stats.operations_returned,
                    stats.operations_applied,
                    stats.operations_failed,
                    stats.failures
                ));
            }
        }

        if !self.affected_keys.is_empty() {
            lines.push(String::new());
            let keys: Vec<&str> = self.affected_keys.iter().map(String::as_str).collect();
            lines.push(format!("Affected keys: {}", keys.join(", ")));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = RunReport::new();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.total_applied(), 0);
        assert_eq!(report.total_failed_operations(), 0);
        assert!(report.progress_by_iteration.is_empty());
    }

    #[test]
    fn test_counters_accumulate_per_agent() {
        let mut report = RunReport::new();
        report.stats_mut("a").operations_applied += 2;
        report.stats_mut("b").operations_applied += 1;
        report.stats_mut("b").operations_failed += 1;
        report.stats_mut("b").failures += 1;

        assert_eq!(report.total_applied(), 3);
        assert_eq!(report.total_failed_operations(), 1);
        assert_eq!(report.total_agent_failures(), 1);
        assert_eq!(report.stats("a").unwrap().operations_applied, 2);
        assert!(report.stats("c").is_none());
    }

    #[test]
    fn test_record_iteration() {
        let mut report = RunReport::new();
        report.record_iteration(true);
        report.record_iteration(false);

        assert_eq!(report.iterations, 2);
        assert_eq!(report.progress_by_iteration, vec![true, false]);
    }

    #[test]
    fn test_outcome_fixpoint() {
        assert!(RunOutcome::Quiescent.reached_fixpoint());
        assert!(RunOutcome::NoEligibleAgents.reached_fixpoint());
        assert!(!RunOutcome::IterationLimit.reached_fixpoint());
        assert_eq!(RunOutcome::IterationLimit.to_string(), "iteration_limit");
    }

    #[test]
    fn test_summary() {
        let mut report = RunReport::new();
        report.record_iteration(true);
        report.stats_mut("nlp-agent").invocations += 1;
        report.stats_mut("nlp-agent").operations_applied += 1;
        report.affected_keys.insert("entities".to_string());
        report.seed_failures = 1;

        let summary = report.summary();
        assert!(summary.contains("Outcome: quiescent"));
        assert!(summary.contains("Iterations: 1"));
        assert!(summary.contains("Operations applied: 1"));
        assert!(summary.contains("Seed items rejected: 1"));
        assert!(summary.contains("nlp-agent: 1 runs"));
        assert!(summary.contains("Affected keys: entities"));
    }
}
