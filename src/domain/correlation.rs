//! Correlation ids shared by every log event of one logical operation

use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Fresh correlation id (UUID v4, simple hex form)
pub fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Correlation id of the enclosing scope, if any
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(|id| id.clone()).ok()
}

/// Runs `future` inside a correlation scope
///
/// An explicit id wins; otherwise the enclosing scope's id is inherited, and
/// a new one is generated when there is none.
pub async fn with_correlation<F>(correlation_id: Option<String>, future: F) -> F::Output
where
    F: Future,
{
    let id = correlation_id
        .or_else(current_correlation_id)
        .unwrap_or_else(new_correlation_id);
    CORRELATION_ID.scope(id, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_id_outside_scope() {
        assert_eq!(current_correlation_id(), None);
    }

    #[tokio::test]
    async fn test_generates_id_when_absent() {
        let id = with_correlation(None, async { current_correlation_id() })
            .await
            .unwrap();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_explicit_id_is_used() {
        let id = with_correlation(Some("req-42".to_string()), async {
            current_correlation_id()
        })
        .await;

        assert_eq!(id.as_deref(), Some("req-42"));
    }

    #[tokio::test]
    async fn test_nested_scope_inherits_outer_id() {
        let (outer, inner) = with_correlation(Some("outer".to_string()), async {
            let inner = with_correlation(None, async { current_correlation_id() }).await;
            (current_correlation_id(), inner)
        })
        .await;

        assert_eq!(outer.as_deref(), Some("outer"));
        assert_eq!(inner.as_deref(), Some("outer"));
    }

    #[tokio::test]
    async fn test_nested_scope_can_override() {
        let inner = with_correlation(Some("outer".to_string()), async {
            with_correlation(Some("inner".to_string()), async { current_correlation_id() })
                .await
        })
        .await;

        assert_eq!(inner.as_deref(), Some("inner"));
    }

    #[tokio::test]
    async fn test_separate_scopes_get_distinct_ids() {
        let first = with_correlation(None, async { current_correlation_id() }).await;
        let second = with_correlation(None, async { current_correlation_id() }).await;

        assert_ne!(first, second);
    }
}
