use std::future::Future;

use sqlx::{Executor, Postgres};

use crate::common::error::AppError;

// SQLSTATE que indicam que a transação perdeu uma corrida:
// serialization_failure, deadlock_detected, lock_not_available
const CONFLICT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

pub(crate) fn is_concurrency_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| CONFLICT_SQLSTATES.iter().any(|state| code == *state))
}

// ---
// Helper de trava: serializa escritores concorrentes da mesma partição
// ---
/// Adquire um advisory lock que vive até o fim da transação corrente.
pub(crate) async fn advisory_xact_lock<'e, E>(executor: E, key: i64) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(executor)
        .await?;
    Ok(())
}

/// Executa a operação e, se ela perder uma corrida de escrita, tenta mais uma vez.
/// A segunda falha sobe para o chamador como `ConcurrencyConflict`.
pub(crate) async fn retry_on_conflict<T, F, Fut>(operation: &'static str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match op().await {
        Err(AppError::ConcurrencyConflict) => {
            tracing::warn!(operation, "Conflito de concorrência, repetindo a transação uma vez");
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_exactly_once_on_conflict() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), AppError> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::ConcurrencyConflict)
        })
        .await;

        assert!(matches!(result, Err(AppError::ConcurrencyConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_attempt_can_succeed() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = retry_on_conflict("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::ConcurrencyConflict)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), AppError> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("x".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
