use crate::models::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};

/// Operations exposed by the coordination tool surface
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationType {
    SwarmInit,
    SwarmStatus,
    SwarmMonitor,
    AgentSpawn,
    AgentList,
    AgentMetrics,
    TaskOrchestrate,
    TaskStatus,
    TaskResults,
    BenchmarkRun,
    FeaturesDetect,
    MemoryUsage,
    NeuralStatus,
    NeuralTrain,
    NeuralPatterns,
}

/// What must hold before an operation may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreflightRequirements {
    /// The swarm must already be initialized
    pub swarm_initialized: bool,
    /// At least one idle agent must exist
    pub idle_agent: bool,
}

impl OperationType {
    /// Deadline applied to one call
    pub fn timeout(&self) -> Duration {
        let secs = match self {
            OperationType::SwarmStatus
            | OperationType::AgentList
            | OperationType::TaskStatus
            | OperationType::FeaturesDetect
            | OperationType::MemoryUsage
            | OperationType::NeuralStatus => 5,
            OperationType::AgentMetrics | OperationType::TaskResults => 10,
            OperationType::SwarmInit
            | OperationType::AgentSpawn
            | OperationType::NeuralPatterns => 30,
            OperationType::SwarmMonitor | OperationType::TaskOrchestrate => 60,
            OperationType::BenchmarkRun | OperationType::NeuralTrain => 120,
        };
        Duration::from_secs(secs)
    }

    /// Category used for classification and strategy selection
    pub fn category(&self) -> ErrorCategory {
        match self {
            OperationType::FeaturesDetect => ErrorCategory::Native,
            OperationType::BenchmarkRun
            | OperationType::NeuralStatus
            | OperationType::NeuralTrain
            | OperationType::NeuralPatterns => ErrorCategory::Compute,
            _ => ErrorCategory::Coordination,
        }
    }

    /// Top-level fields a successful result must carry
    pub fn required_result_fields(&self) -> &'static [&'static str] {
        match self {
            OperationType::SwarmInit => &["id", "topology", "max_agents"],
            OperationType::SwarmStatus => &["agents", "tasks"],
            OperationType::SwarmMonitor => &["monitoring_session"],
            OperationType::AgentSpawn => &["agent"],
            OperationType::AgentList => &["agents"],
            OperationType::AgentMetrics => &["metrics"],
            OperationType::TaskOrchestrate => &["task_id", "status"],
            OperationType::TaskStatus => &["tasks"],
            OperationType::TaskResults => &["task_id", "results"],
            OperationType::BenchmarkRun => &["benchmarks"],
            OperationType::FeaturesDetect => &["features"],
            OperationType::MemoryUsage => &["total_memory_mb"],
            OperationType::NeuralStatus => &["available"],
            OperationType::NeuralTrain => &["training_complete"],
            OperationType::NeuralPatterns => &["patterns"],
        }
    }

    pub fn preflight(&self) -> PreflightRequirements {
        match self {
            OperationType::SwarmInit
            | OperationType::FeaturesDetect
            | OperationType::MemoryUsage
            | OperationType::BenchmarkRun
            | OperationType::NeuralStatus => PreflightRequirements::default(),
            OperationType::TaskOrchestrate => PreflightRequirements {
                swarm_initialized: true,
                idle_agent: true,
            },
            _ => PreflightRequirements {
                swarm_initialized: true,
                idle_agent: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_round_trip_through_strum() {
        assert_eq!(OperationType::AgentSpawn.to_string(), "agent_spawn");
        assert_eq!(
            OperationType::from_str("task_orchestrate").unwrap(),
            OperationType::TaskOrchestrate
        );
        assert!(OperationType::from_str("agent_destroy").is_err());
    }

    #[test]
    fn test_every_type_has_a_bounded_timeout_and_result_shape() {
        for op in OperationType::iter() {
            assert!(op.timeout() >= Duration::from_secs(5));
            assert!(op.timeout() <= Duration::from_secs(120));
            assert!(!op.required_result_fields().is_empty());
        }
        assert_eq!(OperationType::iter().count(), 15);
    }

    #[test]
    fn test_only_orchestration_needs_an_idle_agent() {
        let needing: Vec<_> = OperationType::iter()
            .filter(|op| op.preflight().idle_agent)
            .collect();
        assert_eq!(needing, vec![OperationType::TaskOrchestrate]);
        assert!(!OperationType::SwarmInit.preflight().swarm_initialized);
    }
}
