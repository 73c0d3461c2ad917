use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use deadpool_postgres::GenericClient;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Error as PgError, Row};
use tracing::warn;

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// `CM_DB_LOG_MIN_DURATION_MS`; unset or zero disables slow-query logging.
static SLOW_QUERY_THRESHOLD: LazyLock<Option<Duration>> = LazyLock::new(|| {
    std::env::var("CM_DB_LOG_MIN_DURATION_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
});

async fn measured<T>(label: &str, work: impl Future<Output = T>) -> T {
    let Some(threshold) = *SLOW_QUERY_THRESHOLD else {
        return work.await;
    };
    let started = Instant::now();
    let out = work.await;
    let elapsed = started.elapsed();
    if elapsed >= threshold {
        warn!(
            query = label,
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_ms = threshold.as_millis() as u64,
            "slow query"
        );
    }
    out
}

/// Cached-statement queries tagged with a label for slow-query warnings.
pub trait TimedClientExt: GenericClient {
    fn timed_query<'a>(
        &'a self,
        sql: &'a str,
        params: Params<'a>,
        label: &'a str,
    ) -> impl Future<Output = Result<Vec<Row>, PgError>> + Send + 'a {
        measured(label, async move {
            let stmt = self.prepare_cached(sql).await?;
            self.query(&stmt, params).await
        })
    }

    fn timed_query_opt<'a>(
        &'a self,
        sql: &'a str,
        params: Params<'a>,
        label: &'a str,
    ) -> impl Future<Output = Result<Option<Row>, PgError>> + Send + 'a {
        measured(label, async move {
            let stmt = self.prepare_cached(sql).await?;
            self.query_opt(&stmt, params).await
        })
    }

    fn timed_query_one<'a>(
        &'a self,
        sql: &'a str,
        params: Params<'a>,
        label: &'a str,
    ) -> impl Future<Output = Result<Row, PgError>> + Send + 'a {
        measured(label, async move {
            let stmt = self.prepare_cached(sql).await?;
            self.query_one(&stmt, params).await
        })
    }
}

impl<C: GenericClient + ?Sized> TimedClientExt for C {}
