mod common;

use agent_resilience::error::AppError;
use agent_resilience::models::Severity;
use agent_resilience::operations::{
    OperationType, PreflightChecker, RobustOperationWrapper, WrapperConfig,
};
use agent_resilience::recovery::LocalToolsFallback;
use common::{FakeSwarm, FixedMemory};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn wrapper(initialized: bool, idle_agents: usize) -> RobustOperationWrapper {
    let preflight = PreflightChecker::new(
        Arc::new(FakeSwarm {
            initialized,
            idle_agents,
        }),
        Arc::new(FixedMemory(0.2)),
        0.9,
    );
    RobustOperationWrapper::new(common::fast_manager(), preflight, WrapperConfig::default())
}

fn counting(
    calls: &Arc<AtomicU32>,
    result: Value,
) -> impl Fn(Value) -> std::future::Ready<agent_resilience::Result<Value>> + Send + Sync + 'static {
    let calls = calls.clone();
    move |_params| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(result.clone()))
    }
}

#[tokio::test]
async fn test_unknown_agent_type_never_invokes_the_operation() {
    let wrapper = wrapper(true, 1);
    let calls = Arc::new(AtomicU32::new(0));

    let err = wrapper
        .execute(
            OperationType::AgentSpawn,
            json!({"type": "not-a-real-type"}),
            counting(&calls, json!({"agent": {"id": "a1"}})),
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let recent = wrapper.recent_operations(1);
    assert_eq!(recent[0].status, "failed");
    assert_eq!(recent[0].error_code.as_deref(), Some("VALIDATION_ERROR"));
    // Rejected before the manager saw it
    assert!(wrapper.manager().error_log().is_empty());
}

#[tokio::test]
async fn test_preflight_blocks_orchestration_without_idle_agents() {
    let wrapper = wrapper(true, 0);
    let calls = Arc::new(AtomicU32::new(0));

    let err = wrapper
        .execute(
            OperationType::TaskOrchestrate,
            json!({"task": "index the repository"}),
            counting(&calls, json!({"task_id": "t1", "status": "queued"})),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PreconditionFailed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_result_falls_back_to_local_tools() {
    let wrapper = wrapper(true, 1);
    wrapper
        .manager()
        .register_fallback("mcp-tools", Arc::new(LocalToolsFallback));
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = wrapper
        .execute(
            OperationType::SwarmInit,
            json!({"topology": "mesh", "max_agents": 5}),
            counting(&calls, json!({"id": "swarm-1"})),
        )
        .await
        .unwrap();

    assert!(outcome.is_fallback());
    assert!(calls.load(Ordering::SeqCst) >= 1);

    let metrics = wrapper.metrics();
    assert_eq!(metrics.by_type[&OperationType::SwarmInit].count, 1);
    assert_eq!(wrapper.recent_operations(1)[0].status, "fallback");
}

#[tokio::test]
async fn test_malformed_memory_report_falls_back_like_any_other() {
    let wrapper = wrapper(true, 1);
    wrapper
        .manager()
        .register_fallback("mcp-tools", Arc::new(LocalToolsFallback));
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = wrapper
        .execute(
            OperationType::MemoryUsage,
            json!({"detail": "summary"}),
            counting(&calls, json!({"used_mb": 12})),
        )
        .await
        .unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(wrapper.recent_operations(1)[0].status, "fallback");

    let stats = wrapper
        .manager()
        .get_error_statistics(Duration::from_secs(300));
    assert_eq!(stats.total_errors, 1);
    assert_eq!(stats.severity_count(Severity::Critical), 0);
}

#[tokio::test]
async fn test_well_formed_result_completes() {
    let wrapper = wrapper(true, 1);
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = wrapper
        .execute(
            OperationType::SwarmInit,
            json!({"topology": "ring"}),
            counting(
                &calls,
                json!({"id": "swarm-1", "topology": "ring", "max_agents": 8}),
            ),
        )
        .await
        .unwrap();

    assert_eq!(outcome.into_completed().unwrap()["topology"], "ring");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(wrapper.metrics().total.failure_rate(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_operation_hits_its_deadline() {
    let wrapper = wrapper(true, 1);

    let err = wrapper
        .execute(OperationType::SwarmStatus, json!({}), |_params| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, AppError>(json!({"agents": [], "tasks": []}))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Timeout(_)));
    assert_eq!(
        wrapper.recent_operations(1)[0].error_code.as_deref(),
        Some("TIMEOUT")
    );
}
