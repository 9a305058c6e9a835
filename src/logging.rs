// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros so field names stay consistent across the
/// pipeline: `correlation_id`, `stage`, `set_id`, `quiz_id`, `question_id`.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, correlation_id = $cid:expr) => {
        tracing::debug!(
            operation = $operation,
            correlation_id = %$cid,
            "API operation started"
        );
    };
    ($operation:expr, correlation_id = $cid:expr, question_id = $qid:expr) => {
        tracing::debug!(
            operation = $operation,
            correlation_id = %$cid,
            question_id = %$qid,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, correlation_id = $cid:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            correlation_id = %$cid,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, correlation_id = $cid:expr, quiz_id = $quiz_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            correlation_id = %$cid,
            quiz_id = %$quiz_id,
            "API operation completed: {}", $msg
        );
    };
}

// ============================================================================
// Pipeline Stage Logging Macros
// ============================================================================

/// Log orchestrator stage transitions with consistent structure
#[macro_export]
macro_rules! log_stage {
    (enter, $stage:expr, correlation_id = $cid:expr) => {
        tracing::debug!(
            stage = %$stage,
            correlation_id = %$cid,
            "Pipeline stage entered"
        );
    };
    (abort, $stage:expr, correlation_id = $cid:expr, code = $code:expr) => {
        tracing::warn!(
            stage = %$stage,
            correlation_id = %$cid,
            code = $code,
            "Pipeline aborted"
        );
    };
}

// ============================================================================
// Database Operation Logging Macros
// ============================================================================

/// Log database operation results
#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, quiz_id = $quiz_id:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            quiz_id = %$quiz_id,
            "Database operation completed"
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "database",
            operation = $operation,
            error = %$error,
            "Database operation failed"
        );
    };
}

// ============================================================================
// AI Provider Logging Macros
// ============================================================================

/// Log AI provider calls with model context
#[macro_export]
macro_rules! log_llm_operation {
    (start, $operation:expr, model = $model:expr, card_count = $count:expr) => {
        tracing::info!(
            component = "distractor_service",
            operation = $operation,
            model = %$model,
            card_count = $count,
            "AI operation started"
        );
    };
    (success, $operation:expr, model = $model:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "distractor_service",
            operation = $operation,
            model = %$model,
            duration_ms = $duration,
            "AI operation completed successfully"
        );
    };
    (error, $operation:expr, model = $model:expr, error = $error:expr) => {
        tracing::error!(
            component = "distractor_service",
            operation = $operation,
            model = %$model,
            error = %$error,
            "AI operation failed"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and configuration events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    #[test]
    fn test_logging_macros_compile() {
        let correlation_id = Uuid::new_v4();
        let quiz_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        let error = anyhow::anyhow!("test error");

        log_api_start!("generate_quiz", correlation_id = correlation_id);
        log_api_start!(
            "regenerate_answers",
            correlation_id = correlation_id,
            question_id = question_id
        );
        log_api_success!("generate_quiz", correlation_id = correlation_id, "quiz created");
        log_api_success!(
            "generate_quiz",
            correlation_id = correlation_id,
            quiz_id = quiz_id,
            "quiz created"
        );

        log_stage!(enter, "LocatingSet", correlation_id = correlation_id);
        log_stage!(abort, "Persisting", correlation_id = correlation_id, code = "DATABASE_ERROR");

        log_db_operation!(debug, "insert_quiz", quiz_id = quiz_id);
        log_db_operation!(error, "insert_quiz", error = error);

        log_llm_operation!(start, "generate_quiz_draft", model = "gemini-2.0-flash", card_count = 5);
        log_llm_operation!(success, "generate_quiz_draft", model = "gemini-2.0-flash", duration_ms = 1500);
        log_llm_operation!(error, "generate_quiz_draft", model = "gemini-2.0-flash", error = error);

        log_system_event!(startup, component = "server", "server starting");
        log_system_event!(config, "configuration loaded successfully");

        log_validation!(success, "set_payload", "payload validated");
        log_validation!(failure, "set_payload", error = error);
    }
}
