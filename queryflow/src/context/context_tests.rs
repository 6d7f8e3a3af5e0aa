//! Cross-cutting tests for the context module: document round-trip
//! fidelity and malformed-document handling.

#[cfg(test)]
mod tests {
    use crate::context::{
        AggregateFunction, Aggregation, CompositionOutput, ContextSlot, Entity, FilterCondition,
        MappedEntity, MappedFilter, MappingOutput, PlanningOutput, QueryIntent, SchemaDescriptor,
        ValidationOutput, WorkflowContext,
    };
    use crate::core::WorkflowStatus;
    use crate::registry::StageId;

    fn populated_context() -> WorkflowContext {
        let schema = SchemaDescriptor::new().with_table("users", ["id", "name", "status"]);
        let mut ctx = WorkflowContext::new("count all active users", schema)
            .with_user_id("user-42")
            .with_session_id("session-9");

        ctx.planning_output = Some(PlanningOutput {
            intent: QueryIntent::Aggregate,
            entities: vec![Entity::table("users")],
            filters: vec![FilterCondition::new("status", "=", "active")],
            aggregations: vec![Aggregation::new(AggregateFunction::Count, "*")],
            limit: None,
            order_by: None,
        });
        ctx.mapping_output = Some(MappingOutput {
            mapped_entities: vec![MappedEntity {
                entity_name: "users".to_string(),
                table: "users".to_string(),
                column: None,
            }],
            mapped_filters: vec![MappedFilter {
                condition: FilterCondition::new("status", "=", "active"),
                mapped_column: "users.status".to_string(),
            }],
            mapped_aggregations: vec![],
            mapped_order_by: None,
        });
        ctx.composition_output = Some(CompositionOutput::new(
            "SELECT COUNT(*) FROM users WHERE users.status = 'active'",
        ));
        ctx.validation_output = Some(ValidationOutput::valid("query accepted"));
        ctx.status = WorkflowStatus::Completed;
        ctx.current_step = Some(StageId::Validation);
        ctx.retry_count = 1;
        ctx
    }

    #[test]
    fn test_document_round_trip_is_lossless() {
        let ctx = populated_context();
        let document = ctx.to_document();
        let restored = WorkflowContext::from_document(document).unwrap();

        assert_eq!(ctx, restored);
    }

    #[test]
    fn test_round_trip_preserves_empty_slots() {
        let ctx = WorkflowContext::new("q", SchemaDescriptor::new());
        let restored = WorkflowContext::from_document(ctx.to_document()).unwrap();

        assert_eq!(ctx, restored);
        assert!(!restored.slot_filled(ContextSlot::Planning));
        assert!(!restored.slot_filled(ContextSlot::Validation));
    }

    #[test]
    fn test_missing_field_is_named() {
        let ctx = WorkflowContext::new("q", SchemaDescriptor::new());
        let mut document = ctx.to_document();
        document.as_object_mut().unwrap().remove("query");

        let err = WorkflowContext::from_document(document).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("query"));
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_malformed_nested_value_is_rejected() {
        let ctx = populated_context();
        let mut document = ctx.to_document();
        document.as_object_mut().unwrap().insert(
            "status".to_string(),
            serde_json::json!("not-a-real-status"),
        );

        let err = WorkflowContext::from_document(document).unwrap_err();
        assert!(err.to_string().contains("Invalid context document"));
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = WorkflowContext::from_document(serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn test_slot_filled_tracks_outputs() {
        let ctx = populated_context();
        assert!(ctx.slot_filled(ContextSlot::Planning));
        assert!(ctx.slot_filled(ContextSlot::Mapping));
        assert!(ctx.slot_filled(ContextSlot::Composition));
        assert!(ctx.slot_filled(ContextSlot::Validation));
    }

    #[test]
    fn test_identifier_survives_round_trip() {
        let ctx = populated_context();
        let restored = WorkflowContext::from_document(ctx.to_document()).unwrap();
        assert_eq!(ctx.workflow_id, restored.workflow_id);
    }
}
