//! Row-locked sequence allocator
//!
//! Each series owns one row in `sequence_counter`. Every mutation reads that row
//! with an exclusive lock (`SELECT ... FOR UPDATE`), writes the new value and
//! commits, so concurrent callers in any number of processes are serialized by
//! the datastore. Nothing is cached in process: the row is the only source of
//! truth.
//!
//! On SQLite the lock clause is dropped by the query builder; writers are then
//! serialized by SQLite's database write lock and lost races surface as
//! `SQLITE_BUSY`, which is retried like any other contention.

use crate::seq::entities::{SequenceCounter, SequenceCounterModel, Team, sequence_counter, team};
use crate::seq::error::SeqError;
use crate::seq::identifier::{AllocatedIdentifier, IdentifierFormat};
use crate::seq::now_millis;
use crate::seq::retry::RetryPolicy;
use sea_orm::*;
use sea_query::OnConflict;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SequenceAllocator {
    db: DatabaseConnection,
    retry: RetryPolicy,
}

impl SequenceAllocator {
    pub fn new(db: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Create the counter row at 0 if it does not exist yet. Safe to race with
    /// other starters.
    pub async fn ensure_series(&self, series_id: &str) -> Result<(), SeqError> {
        self.retry
            .run("ensure_series", || async {
                let row = sequence_counter::ActiveModel {
                    series_id: Set(series_id.to_string()),
                    last_value: Set(0),
                    updated_at: Set(now_millis()),
                };

                let inserted = SequenceCounter::insert(row)
                    .on_conflict(
                        OnConflict::column(sequence_counter::Column::SeriesId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(&self.db)
                    .await?;

                if inserted > 0 {
                    info!(series_id = series_id, "created sequence counter");
                }
                Ok::<(), SeqError>(())
            })
            .await
    }

    /// Hand out the next value of `series_id`.
    ///
    /// The value is durable once this returns. If the caller then fails to use
    /// it, the value is lost and leaves a gap; it is never handed out again.
    pub async fn allocate_next(&self, series_id: &str) -> Result<i64, SeqError> {
        self.retry
            .run("allocate_next", || self.allocate_once(series_id))
            .await
    }

    /// Allocate and render with `format`.
    pub async fn allocate_identifier(
        &self,
        series_id: &str,
        format: &IdentifierFormat,
    ) -> Result<AllocatedIdentifier, SeqError> {
        let value = self.allocate_next(series_id).await?;
        Ok(format.format(value))
    }

    /// Single read-compute-write transaction, without retries.
    pub(crate) async fn allocate_once(&self, series_id: &str) -> Result<i64, SeqError> {
        let txn = self.db.begin().await?;

        let counter = Self::lock_counter(&txn, series_id).await?;
        let next = counter
            .last_value
            .checked_add(1)
            .ok_or_else(|| SeqError::Overflow(series_id.to_string()))?;

        let mut active: sequence_counter::ActiveModel = counter.into();
        active.last_value = Set(next);
        active.updated_at = Set(now_millis());
        active.update(&txn).await?;

        txn.commit().await?;

        debug!(series_id = series_id, value = next, "allocated sequence value");
        Ok(next)
    }

    /// Unlocked read of the last issued value. May lag allocations that are
    /// still in flight.
    pub async fn current_value(&self, series_id: &str) -> Result<i64, SeqError> {
        self.retry
            .run("current_value", || async {
                SequenceCounter::find_by_id(series_id.to_string())
                    .one(&self.db)
                    .await?
                    .map(|c| c.last_value)
                    .ok_or_else(|| SeqError::SeriesNotFound(series_id.to_string()))
            })
            .await
    }

    /// Overwrite the counter. The next allocation returns `new_value + 1`.
    pub async fn reset(&self, series_id: &str, new_value: i64) -> Result<(), SeqError> {
        if new_value < 0 {
            return Err(SeqError::InvalidValue(new_value));
        }

        let previous = self
            .retry
            .run("reset", || self.reset_once(series_id, new_value))
            .await?;

        warn!(
            series_id = series_id,
            previous = previous,
            value = new_value,
            "sequence counter reset"
        );
        Ok(())
    }

    async fn reset_once(&self, series_id: &str, new_value: i64) -> Result<i64, SeqError> {
        let txn = self.db.begin().await?;

        let counter = Self::lock_counter(&txn, series_id).await?;
        let previous = counter.last_value;

        let mut active: sequence_counter::ActiveModel = counter.into();
        active.last_value = Set(new_value);
        active.updated_at = Set(now_millis());
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(previous)
    }

    /// Raise the counter to the largest value already used by a persisted
    /// team of this series. Never lowers it. Returns the resulting value.
    pub async fn resynchronize(&self, series_id: &str) -> Result<i64, SeqError> {
        self.retry
            .run("resynchronize", || self.resynchronize_once(series_id))
            .await
    }

    async fn resynchronize_once(&self, series_id: &str) -> Result<i64, SeqError> {
        let txn = self.db.begin().await?;

        let counter = Self::lock_counter(&txn, series_id).await?;
        let stored = counter.last_value;

        let observed = Team::find()
            .filter(team::Column::SeriesId.eq(series_id))
            .order_by_desc(team::Column::Seq)
            .one(&txn)
            .await?
            .map(|t| t.seq)
            .unwrap_or(0);

        if observed <= stored {
            txn.commit().await?;
            debug!(
                series_id = series_id,
                value = stored,
                observed = observed,
                "sequence counter in sync"
            );
            return Ok(stored);
        }

        let mut active: sequence_counter::ActiveModel = counter.into();
        active.last_value = Set(observed);
        active.updated_at = Set(now_millis());
        active.update(&txn).await?;

        txn.commit().await?;

        warn!(
            series_id = series_id,
            stored = stored,
            observed = observed,
            "sequence counter behind persisted data, resynchronized"
        );
        Ok(observed)
    }

    async fn lock_counter<C>(conn: &C, series_id: &str) -> Result<SequenceCounterModel, SeqError>
    where
        C: ConnectionTrait,
    {
        SequenceCounter::find_by_id(series_id.to_string())
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| SeqError::SeriesNotFound(series_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seq::factory::open_allocator_from_url;
    use crate::seq::TEAM_SERIES;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    async fn memory_allocator() -> SequenceAllocator {
        open_allocator_from_url("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_first_allocation_is_one() -> anyhow::Result<()> {
        let alloc = memory_allocator().await;
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 0);

        let format = IdentifierFormat::new("ICCT", 3);
        let id = alloc.allocate_identifier(TEAM_SERIES, &format).await?;
        assert_eq!(id.value(), 1);
        assert_eq!(id.to_string(), "ICCT-001");
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_then_allocate() -> anyhow::Result<()> {
        let alloc = memory_allocator().await;
        alloc.reset(TEAM_SERIES, 10).await?;
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 10);

        alloc.reset(TEAM_SERIES, 100).await?;
        assert_eq!(alloc.allocate_next(TEAM_SERIES).await?, 101);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_rejects_negative() {
        let alloc = memory_allocator().await;
        let err = alloc.reset(TEAM_SERIES, -1).await.unwrap_err();
        assert!(matches!(err, SeqError::InvalidValue(-1)));
    }

    #[tokio::test]
    async fn test_unknown_series() {
        let alloc = memory_allocator().await;
        assert!(matches!(
            alloc.allocate_next("nope").await,
            Err(SeqError::SeriesNotFound(_))
        ));
        assert!(matches!(
            alloc.current_value("nope").await,
            Err(SeqError::SeriesNotFound(_))
        ));
        assert!(matches!(
            alloc.reset("nope", 3).await,
            Err(SeqError::SeriesNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_series_keeps_existing_value() -> anyhow::Result<()> {
        let alloc = memory_allocator().await;
        alloc.allocate_next(TEAM_SERIES).await?;
        alloc.allocate_next(TEAM_SERIES).await?;

        alloc.ensure_series(TEAM_SERIES).await?;
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 2);

        alloc.ensure_series("match_fixture").await?;
        assert_eq!(alloc.current_value("match_fixture").await?, 0);
        assert_eq!(alloc.allocate_next("match_fixture").await?, 1);
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_overflow() {
        let alloc = memory_allocator().await;
        alloc.reset(TEAM_SERIES, i64::MAX).await.unwrap();
        assert!(matches!(
            alloc.allocate_next(TEAM_SERIES).await,
            Err(SeqError::Overflow(_))
        ));
        assert_eq!(alloc.current_value(TEAM_SERIES).await.unwrap(), i64::MAX);
    }

    #[tokio::test]
    async fn test_lock_timeout_then_success_advances_once() -> anyhow::Result<()> {
        let alloc = memory_allocator().await;
        let policy = RetryPolicy::new(3, Duration::from_millis(25));
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let value = policy
            .run("allocate_next", || async {
                if attempts.fetch_add(1, Ordering::Relaxed) == 0 {
                    return Err(SeqError::Contention(DbErr::Custom(
                        "lock wait timeout exceeded".into(),
                    )));
                }
                alloc.allocate_once(TEAM_SERIES).await
            })
            .await?;

        assert_eq!(value, 1);
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
        assert!(start.elapsed() >= Duration::from_millis(25));
        assert_eq!(alloc.current_value(TEAM_SERIES).await?, 1);
        Ok(())
    }
}
