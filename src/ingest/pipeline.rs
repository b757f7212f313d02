//! Upload → parse → validate → fingerprint → batched upsert.
//!
//! Batches run one after another. A failed batch is counted as errored and
//! the pipeline moves on; batches already written stay written.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::fingerprint::FingerprintPolicy;
use super::delimited::read_rows;
use super::record_mapper::{RecordMapper, RowRejection};
use crate::domain::{SnapshotScope, StatSnapshotRecord};
use crate::error::AppError;
use crate::persistence::StatsStore;

/// Default rows per upsert statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Maximum number of error messages carried in a summary.
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Outcome of one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct IngestSummary {
    /// Non-blank data records read.
    pub total_rows: u64,
    /// Rows that passed validation.
    pub validated: u64,
    /// Rows written to the store.
    pub processed: u64,
    /// Written rows whose natural key was new.
    pub inserted: u64,
    /// Written rows that replaced an existing row.
    pub updated: u64,
    /// Valid rows skipped because their fingerprint was unchanged.
    pub skipped_unchanged: u64,
    /// Rows rejected by validation.
    pub rejected: u64,
    /// Valid rows lost to a failed batch write.
    pub errored: u64,
    /// Batches attempted.
    pub batches: u64,
    /// Up to [`MAX_ERROR_SAMPLES`] messages describing rejections and
    /// batch failures.
    pub errors: Vec<String>,
}

impl IngestSummary {
    fn note(&mut self, message: String) {
        if self.errors.len() < MAX_ERROR_SAMPLES {
            self.errors.push(message);
        }
    }

    fn reject(&mut self, row_no: u64, reason: &RowRejection) {
        self.rejected += 1;
        self.note(format!("row {row_no}: {reason}"));
    }
}

/// Batch ingestion of one statistics upload.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    store: Arc<dyn StatsStore>,
    batch_size: usize,
    policy: FingerprintPolicy,
}

impl IngestPipeline {
    /// Creates a pipeline writing to `store`. `batch_size` is raised to 1
    /// and lowered to the largest batch the store accepts in one write.
    #[must_use]
    pub fn new(store: Arc<dyn StatsStore>, batch_size: usize, policy: FingerprintPolicy) -> Self {
        let limit = store.max_batch_rows().max(1);
        if batch_size > limit {
            tracing::warn!(requested = batch_size, limit, "ingest batch size capped by store");
        }
        Self {
            store,
            batch_size: batch_size.clamp(1, limit),
            policy,
        }
    }

    /// Rows per upsert statement.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ingests `text` whose first non-blank record is the header. Rows are
    /// numbered from 1 after the header in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EmptyUpload`] if there is no header line and
    /// [`AppError::MissingHeaders`] if required columns are absent. Nothing
    /// is written in either case. Row and batch failures are reported in the
    /// summary, not as errors.
    pub async fn run(&self, text: &str, scope: &SnapshotScope) -> Result<IngestSummary, AppError> {
        let mut rows = read_rows(text);
        let header = rows
            .next()
            .ok_or(AppError::EmptyUpload)?
            .map_err(|err| AppError::InvalidRequest(format!("unreadable header: {err}")))?;
        let mapper = RecordMapper::from_headers(&header)?;

        let processed_at = Utc::now();
        let mut summary = IngestSummary::default();
        let mut pending: Vec<(u64, StatSnapshotRecord)> = Vec::with_capacity(self.batch_size);

        for (row_no, row) in (1..).zip(rows) {
            summary.total_rows += 1;
            let mapped = match row {
                Ok(values) => mapper.map_row(&values, scope, processed_at),
                Err(err) => Err(RowRejection::Unreadable(err.to_string())),
            };
            match mapped {
                Ok(record) => {
                    summary.validated += 1;
                    pending.push((row_no, record));
                }
                Err(reason) => summary.reject(row_no, &reason),
            }
            if pending.len() >= self.batch_size {
                self.flush(std::mem::take(&mut pending), scope, &mut summary).await;
            }
        }
        if !pending.is_empty() {
            self.flush(pending, scope, &mut summary).await;
        }

        tracing::info!(
            snapshot_date = %scope.snapshot_date,
            period_type = %scope.period_type,
            stake = %scope.stake_category,
            total = summary.total_rows,
            processed = summary.processed,
            rejected = summary.rejected,
            errored = summary.errored,
            skipped = summary.skipped_unchanged,
            "upload ingested"
        );
        Ok(summary)
    }

    async fn flush(
        &self,
        batch: Vec<(u64, StatSnapshotRecord)>,
        scope: &SnapshotScope,
        summary: &mut IngestSummary,
    ) {
        summary.batches += 1;
        let batch_no = summary.batches;

        let mut seen = HashSet::new();
        let mut records: Vec<StatSnapshotRecord> = Vec::with_capacity(batch.len());
        for (row_no, record) in batch.into_iter().rev() {
            if seen.insert((record.room.clone(), record.player_name.clone())) {
                records.push(record);
            } else {
                summary.validated -= 1;
                summary.reject(row_no, &RowRejection::Superseded(record.player_name));
            }
        }
        records.reverse();

        if self.policy == FingerprintPolicy::SkipUnchanged {
            records = match self.drop_unchanged(records, scope).await {
                Ok((changed, skipped)) => {
                    summary.skipped_unchanged += skipped;
                    changed
                }
                Err((records, err)) => {
                    tracing::warn!(batch = batch_no, error = %err, "fingerprint lookup failed, upserting batch");
                    records
                }
            };
        }
        if records.is_empty() {
            return;
        }

        let size = records.len() as u64;
        match self.store.upsert_snapshots(&records).await {
            Ok(outcome) => {
                summary.processed += outcome.written();
                summary.inserted += outcome.inserted;
                summary.updated += outcome.updated;
            }
            Err(err) => {
                tracing::warn!(batch = batch_no, rows = size, error = %err, "batch upsert failed");
                summary.errored += size;
                summary.note(format!("batch {batch_no} ({size} rows): {err}"));
            }
        }
    }

    async fn drop_unchanged(
        &self,
        records: Vec<StatSnapshotRecord>,
        scope: &SnapshotScope,
    ) -> Result<(Vec<StatSnapshotRecord>, u64), (Vec<StatSnapshotRecord>, AppError)> {
        let players: Vec<String> = records.iter().map(|r| r.player_name.clone()).collect();
        let stored = match self.store.fingerprints(scope, &players).await {
            Ok(stored) => stored,
            Err(err) => return Err((records, err)),
        };
        let before = records.len();
        let changed: Vec<StatSnapshotRecord> = records
            .into_iter()
            .filter(|r| {
                stored.get(&(r.room.clone(), r.player_name.clone())) != Some(&r.change_hash)
            })
            .collect();
        let skipped = (before - changed.len()) as u64;
        Ok((changed, skipped))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{DateRange, PeriodType};
    use crate::persistence::{MemoryPersistence, UpsertOutcome};

    const HEADER: &str = "Site,Player,Hands,BB/100,VPIP,PFR";

    fn scope() -> SnapshotScope {
        let Some(date) = NaiveDate::from_ymd_opt(2024, 5, 20) else {
            panic!("valid date");
        };
        let Ok(scope) = SnapshotScope::new(date, PeriodType::Week, "NL100") else {
            panic!("valid scope");
        };
        scope
    }

    fn pipeline(store: Arc<MemoryPersistence>, batch_size: usize) -> IngestPipeline {
        IngestPipeline::new(store, batch_size, FingerprintPolicy::Always)
    }

    /// Store whose `fail_on`-th upsert call fails and that takes at most
    /// `max_rows` records per write.
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryPersistence,
        calls: AtomicUsize,
        fail_on: usize,
        max_rows: usize,
    }

    #[async_trait]
    impl StatsStore for FlakyStore {
        fn max_batch_rows(&self) -> usize {
            self.max_rows
        }

        async fn upsert_snapshots(
            &self,
            records: &[StatSnapshotRecord],
        ) -> Result<UpsertOutcome, AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(AppError::PersistenceError("connection reset".to_string()));
            }
            self.inner.upsert_snapshots(records).await
        }

        async fn fingerprints(
            &self,
            scope: &SnapshotScope,
            players: &[String],
        ) -> Result<HashMap<(String, String), String>, AppError> {
            self.inner.fingerprints(scope, players).await
        }

        async fn player_snapshots(
            &self,
            room: &str,
            player_name: &str,
            range: Option<DateRange>,
        ) -> Result<Vec<StatSnapshotRecord>, AppError> {
            self.inner.player_snapshots(room, player_name, range).await
        }

        async fn count_snapshots(&self, scope: &SnapshotScope) -> Result<u64, AppError> {
            self.inner.count_snapshots(scope).await
        }
    }

    #[tokio::test]
    async fn quoted_player_scenario() {
        let store = Arc::new(MemoryPersistence::new());
        let text = format!("{HEADER}\nXPK,\"Villain, Jr\",1500,3.2,24.1,18.0\n");
        let Ok(summary) = pipeline(Arc::clone(&store), 1000).run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.rejected, 0);

        let Ok(rows) = store.player_snapshots("XPK", "Villain, Jr", None).await else {
            panic!("read failed");
        };
        let Some(row) = rows.first() else {
            panic!("row stored");
        };
        assert_eq!(row.hands(), 1500);
        assert_eq!(row.room, "XPK");
    }

    #[tokio::test]
    async fn reingest_updates_without_duplicating() {
        let store = Arc::new(MemoryPersistence::new());
        let text = format!("{HEADER}\nXPK,hero,1500,3.2,24.1,18.0\n");
        let p = pipeline(Arc::clone(&store), 1000);

        let Ok(first) = p.run(&text, &scope()).await else {
            panic!("first ingest failed");
        };
        let Ok(second) = p.run(&text, &scope()).await else {
            panic!("second ingest failed");
        };
        assert_eq!((first.inserted, first.updated), (1, 0));
        assert_eq!((second.inserted, second.updated), (0, 1));
        assert_eq!(store.count_snapshots(&scope()).await.ok(), Some(1));
    }

    #[tokio::test]
    async fn rejected_rows_never_count_as_processed() {
        let store = Arc::new(MemoryPersistence::new());
        let text = format!(
            "{HEADER}\n\
             XPK,good,100,1,2,3\n\
             XPK,zero,0,1,2,3\n\
             XPK,,100,1,2,3\n\
             XPK,short,100\n\
             \n\
             XPK,coerced,100,abc,2,3\n"
        );
        let Ok(summary) = pipeline(store, 1000).run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.validated, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.rejected, 3);
        assert_eq!(summary.errors.len(), 3);
        assert!(summary.errors.iter().any(|e| e.starts_with("row 2:")));
    }

    #[tokio::test]
    async fn missing_headers_fail_before_any_write() {
        let store = Arc::new(MemoryPersistence::new());
        let text = "Site,Player,Hands\nXPK,hero,100\n";
        let result = pipeline(Arc::clone(&store), 1000).run(text, &scope()).await;
        assert!(matches!(result, Err(AppError::MissingHeaders(_))));
        assert_eq!(store.snapshot_len().await, 0);

        let result = pipeline(store, 1000).run("\n  \n", &scope()).await;
        assert!(matches!(result, Err(AppError::EmptyUpload)));
    }

    #[tokio::test]
    async fn failed_batch_is_isolated() {
        let store = Arc::new(FlakyStore {
            inner: MemoryPersistence::new(),
            calls: AtomicUsize::new(0),
            fail_on: 2,
            max_rows: usize::MAX,
        });
        let mut text = HEADER.to_string();
        for i in 0..5 {
            text.push_str(&format!("\nXPK,p{i},100,1,2,3"));
        }
        let p = IngestPipeline::new(Arc::clone(&store) as Arc<dyn StatsStore>, 2, FingerprintPolicy::Always);
        let Ok(summary) = p.run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.errored, 2);
        assert!(summary.errors.iter().any(|e| e.contains("batch 2")));
        assert_eq!(store.inner.snapshot_len().await, 3);
    }

    #[tokio::test]
    async fn duplicate_identity_in_batch_keeps_last() {
        let store = Arc::new(MemoryPersistence::new());
        let text = format!("{HEADER}\nXPK,hero,100,1,2,3\nXPK,hero,250,1,2,3\n");
        let Ok(summary) = pipeline(Arc::clone(&store), 1000).run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.rejected, 1);
        let Ok(rows) = store.player_snapshots("XPK", "hero", None).await else {
            panic!("read failed");
        };
        assert_eq!(rows.first().map(StatSnapshotRecord::hands), Some(250));
    }

    #[tokio::test]
    async fn skip_unchanged_policy_skips_matching_fingerprints() {
        let store = Arc::new(MemoryPersistence::new());
        let p = IngestPipeline::new(Arc::clone(&store) as Arc<dyn StatsStore>, 1000, FingerprintPolicy::SkipUnchanged);
        let text = format!("{HEADER}\nXPK,hero,100,1,2,3\nXPK,villain,200,1,2,3\n");
        let _ = p.run(&text, &scope()).await;

        let changed = format!("{HEADER}\nXPK,hero,100,1,2,3\nXPK,villain,201,1,2,3\n");
        let Ok(summary) = p.run(&changed, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.skipped_unchanged, 1);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.updated, 1);
    }

    #[tokio::test]
    async fn semicolon_uploads_are_supported() {
        let store = Arc::new(MemoryPersistence::new());
        let text = "Site;Player;Hands;BB/100;VPIP;PFR\r\nXPK;\"hero; the\";1500;3.2;24%;18\r\n";
        let Ok(summary) = pipeline(store, 1000).run(text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn batch_size_is_capped_by_the_store() {
        let store = Arc::new(FlakyStore {
            inner: MemoryPersistence::new(),
            calls: AtomicUsize::new(0),
            fail_on: 0,
            max_rows: 2,
        });
        let p = IngestPipeline::new(Arc::clone(&store) as Arc<dyn StatsStore>, 1000, FingerprintPolicy::Always);
        assert_eq!(p.batch_size(), 2);
        assert_eq!(pipeline(Arc::new(MemoryPersistence::new()), 0).batch_size(), 1);

        let mut text = HEADER.to_string();
        for i in 0..5 {
            text.push_str(&format!("\nXPK,p{i},100,1,2,3"));
        }
        let Ok(summary) = p.run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.errored, 0);
    }

    #[tokio::test]
    async fn error_messages_are_capped() {
        let store = Arc::new(MemoryPersistence::new());
        let mut text = HEADER.to_string();
        for i in 0..25 {
            text.push_str(&format!("\nXPK,p{i},0,1,2,3"));
        }
        text.push_str("\nXPK,kept,10,1,2,3");
        let Ok(summary) = pipeline(store, 1000).run(&text, &scope()).await else {
            panic!("ingest failed");
        };
        assert_eq!(summary.total_rows, 26);
        assert_eq!(summary.rejected, 25);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors.len(), MAX_ERROR_SAMPLES);
        assert!(summary.errors.first().is_some_and(|e| e.starts_with("row 1:")));
    }
}
