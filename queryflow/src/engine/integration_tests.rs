//! End-to-end engine tests covering the main pass, the retry loop, and
//! the fatal-error paths.

#[cfg(test)]
mod tests {
    use crate::context::{ContextSlot, QueryIntent, WorkflowContext};
    use crate::core::WorkflowStatus;
    use crate::engine::ExecutionEngine;
    use crate::persistence::{ContextStore, InMemoryContextStore};
    use crate::registry::{StageId, StageRegistry};
    use crate::testing::fixtures::{pending_context, sample_schema};
    use crate::testing::mocks::{
        CannedStage, FailingStage, FailingStore, NoOpStage, RecordingStore,
        ScriptedValidationStage,
    };
    use std::sync::Arc;

    fn engine_with_defaults(store: Arc<dyn ContextStore>) -> ExecutionEngine {
        let registry = Arc::new(StageRegistry::with_default_stages().unwrap());
        ExecutionEngine::new(registry, store)
    }

    fn status_rank(status: WorkflowStatus) -> u8 {
        match status {
            WorkflowStatus::Pending => 0,
            WorkflowStatus::Running => 1,
            WorkflowStatus::Retrying => 2,
            WorkflowStatus::Completed | WorkflowStatus::Failed => 3,
        }
    }

    #[tokio::test]
    async fn test_count_active_users_end_to_end() {
        let store = Arc::new(InMemoryContextStore::new());
        let engine = engine_with_defaults(store.clone());

        let ctx = engine
            .run(WorkflowContext::new("count all active users", sample_schema()))
            .await;

        assert_eq!(ctx.status, WorkflowStatus::Completed);
        assert_eq!(ctx.retry_count, 0);

        let planning = ctx.planning_output.as_ref().unwrap();
        assert_eq!(planning.intent, QueryIntent::Aggregate);
        assert_eq!(planning.aggregations.len(), 1);
        assert_eq!(planning.filters.len(), 1);

        let mapping = ctx.mapping_output.as_ref().unwrap();
        assert_eq!(mapping.mapped_filters[0].mapped_column, "users.status");

        let sql = &ctx.composition_output.as_ref().unwrap().sql_query;
        assert!(sql.starts_with("SELECT COUNT(*)"));
        assert!(sql.contains("WHERE users.status = 'active'"));

        assert!(ctx.validation_output.as_ref().unwrap().is_valid);

        // The terminal snapshot matches the returned context exactly.
        let persisted = store.load(ctx.workflow_id).await.unwrap().unwrap();
        assert_eq!(persisted, ctx);
    }

    #[tokio::test]
    async fn test_first_pass_acceptance_runs_each_stage_once() {
        let composition = Arc::new(CannedStage::new(StageId::Composition));
        let validation = Arc::new(ScriptedValidationStage::new(0));
        let registry = Arc::new(
            StageRegistry::builder()
                .register(Arc::new(CannedStage::new(StageId::Planning)))
                .register(Arc::new(CannedStage::new(StageId::Mapping)))
                .register(composition.clone())
                .register(validation.clone())
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, Arc::new(InMemoryContextStore::new()));

        let ctx = engine.run(pending_context("count all active users")).await;

        assert_eq!(ctx.status, WorkflowStatus::Completed);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(composition.call_count(), 1);
        assert_eq!(validation.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_retries_composition_sub_path() {
        let composition = Arc::new(CannedStage::new(StageId::Composition));
        let validation = Arc::new(ScriptedValidationStage::new(1));
        let registry = Arc::new(
            StageRegistry::builder()
                .register(Arc::new(CannedStage::new(StageId::Planning)))
                .register(Arc::new(CannedStage::new(StageId::Mapping)))
                .register(composition.clone())
                .register(validation.clone())
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, Arc::new(InMemoryContextStore::new()));

        let ctx = engine.run(pending_context("count all active users")).await;

        assert_eq!(ctx.status, WorkflowStatus::Completed);
        assert_eq!(ctx.retry_count, 1);
        // One main pass plus one retry pass.
        assert_eq!(composition.call_count(), 2);
        assert_eq!(validation.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_fails_workflow() {
        let composition = Arc::new(CannedStage::new(StageId::Composition));
        let validation = Arc::new(ScriptedValidationStage::new(usize::MAX));
        let registry = Arc::new(
            StageRegistry::builder()
                .register(Arc::new(CannedStage::new(StageId::Planning)))
                .register(Arc::new(CannedStage::new(StageId::Mapping)))
                .register(composition.clone())
                .register(validation.clone())
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, Arc::new(InMemoryContextStore::new()));

        let ctx = engine
            .run(pending_context("count all active users").with_max_retries(2))
            .await;

        assert_eq!(ctx.status, WorkflowStatus::Failed);
        assert_eq!(ctx.retry_count, 2);
        assert!(ctx.retry_count <= ctx.max_retries);
        // Main pass plus two retry passes.
        assert_eq!(composition.call_count(), 3);
        assert_eq!(validation.call_count(), 3);
        assert!(ctx
            .feedback
            .as_ref()
            .unwrap()
            .contains("Add WHERE clause"));
    }

    #[tokio::test]
    async fn test_stage_error_fails_without_retry() {
        let composition = Arc::new(CannedStage::new(StageId::Composition));
        let registry = Arc::new(
            StageRegistry::builder()
                .register(Arc::new(CannedStage::new(StageId::Planning)))
                .register(Arc::new(FailingStage::new(
                    StageId::Mapping,
                    "schema service unavailable",
                )))
                .register(composition.clone())
                .register(Arc::new(ScriptedValidationStage::new(0)))
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, Arc::new(InMemoryContextStore::new()));

        let ctx = engine.run(pending_context("count all active users")).await;

        assert_eq!(ctx.status, WorkflowStatus::Failed);
        assert_eq!(ctx.retry_count, 0);
        assert!(ctx
            .feedback
            .as_ref()
            .unwrap()
            .contains("schema service unavailable"));
        // The loop never continues past a failed stage.
        assert_eq!(composition.call_count(), 0);
        assert!(ctx.planning_output.is_some());
        assert!(ctx.mapping_output.is_none());
    }

    #[tokio::test]
    async fn test_missing_precondition_fails_with_no_slot_mutation() {
        let mapping = Arc::new(CannedStage::new(StageId::Mapping));
        let registry = Arc::new(
            StageRegistry::builder()
                // A planning stage that never populates its output slot.
                .register(Arc::new(NoOpStage::new(StageId::Planning)))
                .register(mapping.clone())
                .register(Arc::new(CannedStage::new(StageId::Composition)))
                .register(Arc::new(ScriptedValidationStage::new(0)))
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, Arc::new(InMemoryContextStore::new()));

        let ctx = engine.run(pending_context("count all active users")).await;

        assert_eq!(ctx.status, WorkflowStatus::Failed);
        assert!(ctx.feedback.as_ref().unwrap().contains("planning_output"));
        assert_eq!(mapping.call_count(), 0);
        for slot in [
            ContextSlot::Planning,
            ContextSlot::Mapping,
            ContextSlot::Composition,
            ContextSlot::Validation,
        ] {
            assert!(!ctx.slot_filled(slot));
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        // Three writes succeed: the RUNNING transition and the planning
        // stage's pre/post snapshots. The mapping stage's first write
        // fails.
        let store = Arc::new(FailingStore::new(3));
        let engine = engine_with_defaults(store);

        let ctx = engine
            .run(WorkflowContext::new("count all active users", sample_schema()))
            .await;

        assert_eq!(ctx.status, WorkflowStatus::Failed);
        assert!(ctx.feedback.as_ref().unwrap().contains("Storage write failed"));
        assert!(ctx.planning_output.is_some());
        assert!(ctx.mapping_output.is_none());
    }

    #[tokio::test]
    async fn test_persisted_status_progression_is_monotonic() {
        let store = Arc::new(RecordingStore::new());
        let engine = engine_with_defaults(store.clone());

        let ctx = engine
            .run(WorkflowContext::new("count all active users", sample_schema()))
            .await;
        assert_eq!(ctx.status, WorkflowStatus::Completed);

        let statuses = store.saved_statuses();
        assert_eq!(*statuses.first().unwrap(), WorkflowStatus::Running);
        assert_eq!(*statuses.last().unwrap(), WorkflowStatus::Completed);
        for pair in statuses.windows(2) {
            assert!(status_rank(pair[0]) <= status_rank(pair[1]));
        }
    }

    #[tokio::test]
    async fn test_retrying_status_progression_is_monotonic() {
        let store = Arc::new(RecordingStore::new());
        let registry = Arc::new(
            StageRegistry::builder()
                .register(Arc::new(CannedStage::new(StageId::Planning)))
                .register(Arc::new(CannedStage::new(StageId::Mapping)))
                .register(Arc::new(CannedStage::new(StageId::Composition)))
                .register(Arc::new(ScriptedValidationStage::new(1)))
                .build()
                .unwrap(),
        );
        let engine = ExecutionEngine::new(registry, store.clone());

        let ctx = engine.run(pending_context("count all active users")).await;
        assert_eq!(ctx.status, WorkflowStatus::Completed);

        let statuses = store.saved_statuses();
        assert!(statuses.contains(&WorkflowStatus::Retrying));
        for pair in statuses.windows(2) {
            assert!(status_rank(pair[0]) <= status_rank(pair[1]));
        }
    }

    #[tokio::test]
    async fn test_updated_at_is_monotonic_and_after_creation() {
        let store = Arc::new(InMemoryContextStore::new());
        let engine = engine_with_defaults(store);

        let initial = WorkflowContext::new("count all active users", sample_schema());
        let created_at = initial.created_at;
        let ctx = engine.run(initial).await;

        assert_eq!(ctx.created_at, created_at);
        assert!(ctx.updated_at >= ctx.created_at);
    }
}
