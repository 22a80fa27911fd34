//! Record store: samples, their audit trail, and the transactional rule that
//! every sample mutation commits together with exactly one history entry.

pub mod export;
pub mod metadata;


use crate::common::errors::{BusinessResult, DbResultExt};
use crate::history::models::{self as history, Change, HistoryRecord, ImportCounts};
use crate::not_found;
use crate::samples::models::{self as samples, Sample, SampleDraft, SampleUpdate};
use crate::utils::timing::Throttle;
use chrono::{DateTime, Utc};
use export::{ExportDocument, ImportDocument, ImportSummary};
use migration::{Migrator, MigratorTrait, SCHEMA_VERSION};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct Store {
    db: DatabaseConnection,
    // Serialises writers so ids and history order follow call order
    write_lock: Mutex<()>,
}

impl Store {
    /// Open (or create) the database at `url` and bring the schema up to date
    ///
    /// # Errors
    /// `StorageFailure` when the database cannot be opened or migrated.
    pub async fn connect(url: &str) -> BusinessResult<Self> {
        let mut options = ConnectOptions::new(url.to_owned());
        // SQLite, single user: one connection keeps in-memory databases
        // alive and makes every transaction exclusive
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(options).await.context("connect")?;
        Migrator::up(&db, None).await.context("migrate")?;
        info!("Record store ready at {url}");

        Ok(Self::new(db))
    }

    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    /// # Errors
    /// `StorageFailure` if the connection pool fails to shut down cleanly.
    pub async fn close(self) -> BusinessResult<()> {
        self.db.close().await.context("close")
    }

    /// Insert a sample and its `add` history entry; returns the new id
    ///
    /// # Errors
    /// `StorageFailure` if either write fails; nothing is committed then.
    pub async fn add_sample(&self, draft: SampleDraft, editor: &str) -> BusinessResult<i32> {
        let _writer = self.write_lock.lock().await;
        let now = Utc::now();
        let mut sample = draft.into_sample(now);

        let txn = self.db.begin().await.context("add_sample")?;
        let inserted = sample
            .to_active_model(false)
            .context("add_sample")?
            .insert(&txn)
            .await
            .context("add_sample")?;
        sample.id = inserted.id;

        let id = sample.id;
        append_history(&txn, Some(id), editor, now, Change::Add(sample)).await?;
        txn.commit().await.context("add_sample")?;

        info!("Sample {id} added by {editor}");
        Ok(id)
    }

    /// Merge `updates` into sample `id` and record the per-field diff
    ///
    /// # Errors
    /// `NotFound` when the sample does not exist, `StorageFailure` on write errors.
    pub async fn update_sample(
        &self,
        id: i32,
        updates: SampleUpdate,
        editor: &str,
    ) -> BusinessResult<()> {
        let _writer = self.write_lock.lock().await;
        let txn = self.db.begin().await.context("update_sample")?;

        let mut sample = find_sample(&txn, id)
            .await?
            .ok_or_else(|| not_found!("Sample", id))?;

        // Never let updateTime go backwards, even if the clock does
        let now = Utc::now().max(sample.update_time);
        let diffs = updates.apply(&mut sample);
        sample.update_time = now;

        sample
            .to_active_model(true)
            .context("update_sample")?
            .update(&txn)
            .await
            .context("update_sample")?;

        let changed = diffs.len();
        append_history(&txn, Some(id), editor, now, Change::Update(diffs)).await?;
        txn.commit().await.context("update_sample")?;

        info!("Sample {id} updated by {editor} ({changed} fields)");
        Ok(())
    }

    /// Remove sample `id`, keeping its last state in the `delete` entry
    ///
    /// # Errors
    /// `NotFound` when the sample does not exist, `StorageFailure` on write errors.
    pub async fn delete_sample(&self, id: i32, editor: &str) -> BusinessResult<()> {
        let _writer = self.write_lock.lock().await;
        let txn = self.db.begin().await.context("delete_sample")?;

        let snapshot = find_sample(&txn, id)
            .await?
            .ok_or_else(|| not_found!("Sample", id))?;

        samples::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .context("delete_sample")?;

        append_history(&txn, Some(id), editor, Utc::now(), Change::Delete(snapshot)).await?;
        txn.commit().await.context("delete_sample")?;

        info!("Sample {id} deleted by {editor}");
        Ok(())
    }

    /// All samples in insertion order
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn get_all_samples(&self) -> BusinessResult<Vec<Sample>> {
        all_samples(&self.db).await
    }

    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn get_sample_by_id(&self, id: i32) -> BusinessResult<Option<Sample>> {
        find_sample(&self.db, id).await
    }

    /// Every history entry, newest first
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn get_all_history(&self) -> BusinessResult<Vec<HistoryRecord>> {
        all_history(&self.db).await
    }

    /// History of one sample, newest first
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn get_sample_history(&self, sample_id: i32) -> BusinessResult<Vec<HistoryRecord>> {
        let models = history::Entity::find()
            .filter(history::Column::SampleId.eq(sample_id))
            .order_by_asc(history::Column::Id)
            .all(&self.db)
            .await
            .context("get_sample_history")?;
        newest_first(models)
    }

    /// Substring search over batch, type, location and notes. A blank query
    /// returns everything in store order.
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn search_samples(&self, query: &str) -> BusinessResult<Vec<Sample>> {
        let samples = self.get_all_samples().await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(samples);
        }

        let results: Vec<Sample> = samples
            .into_iter()
            .filter(|sample| sample.matches(&needle))
            .collect();
        debug!("Sample search '{needle}' matched {} records", results.len());
        Ok(results)
    }

    /// Substring search over editor names and change payloads, newest first
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn search_history(&self, query: &str) -> BusinessResult<Vec<HistoryRecord>> {
        let history = self.get_all_history().await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(history);
        }

        Ok(history
            .into_iter()
            .filter(|record| record.matches(&needle))
            .collect())
    }

    /// Consistent snapshot of both collections, read inside one transaction
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn export_data(&self) -> BusinessResult<ExportDocument> {
        let txn = self.db.begin().await.context("export_data")?;
        let samples = all_samples(&txn).await?;
        let history = all_history(&txn).await?;
        let version = schema_version(&txn).await?;
        txn.commit().await.context("export_data")?;

        Ok(ExportDocument {
            samples,
            history,
            export_date: Utc::now(),
            version,
        })
    }

    /// Replace both collections with the document's contents and append one
    /// `import` entry. The document is validated and staged first; the
    /// clear-and-insert runs in a single transaction, so a failure leaves the
    /// previous contents in place.
    ///
    /// # Errors
    /// `ValidationError` for a missing collection or malformed rows,
    /// `StorageFailure` on write errors.
    pub async fn import_data(
        &self,
        document: ImportDocument,
        editor: &str,
    ) -> BusinessResult<ImportSummary> {
        let (samples, history) = document.into_staged(SCHEMA_VERSION)?;
        let summary = ImportSummary {
            sample_count: samples.len() as u64,
            history_count: history.len() as u64,
        };

        let _writer = self.write_lock.lock().await;
        let txn = self.db.begin().await.context("import_data")?;

        history::Entity::delete_many()
            .exec(&txn)
            .await
            .context("import_data")?;
        samples::Entity::delete_many()
            .exec(&txn)
            .await
            .context("import_data")?;

        let mut progress = Throttle::new(Duration::from_millis(500));
        for (index, sample) in samples.iter().enumerate() {
            sample
                .to_active_model(true)
                .context("import_data")?
                .insert(&txn)
                .await
                .context("import_data")?;
            if progress.ready() {
                debug!("Imported {} of {} samples", index + 1, samples.len());
            }
        }
        for (index, record) in history.iter().enumerate() {
            record
                .to_active_model(true)
                .context("import_data")?
                .insert(&txn)
                .await
                .context("import_data")?;
            if progress.ready() {
                debug!("Imported {} of {} history entries", index + 1, history.len());
            }
        }

        let now = Utc::now();
        let counts = ImportCounts {
            imported_samples: summary.sample_count,
            imported_history: summary.history_count,
            import_date: now,
        };
        append_history(&txn, None, editor, now, Change::Import(counts)).await?;
        txn.commit().await.context("import_data")?;

        info!(
            "Imported {} samples and {} history entries by {editor}",
            summary.sample_count, summary.history_count
        );
        Ok(summary)
    }

    /// Approximate footprint: size of the serialised export snapshot in bytes
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn get_storage_usage(&self) -> BusinessResult<u64> {
        let document = self.export_data().await?;
        let encoded = serde_json::to_vec(&document)
            .map_err(|err| crate::storage_failure!("get_storage_usage", err))?;
        Ok(encoded.len() as u64)
    }

    /// Number of samples and history entries
    ///
    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn counts(&self) -> BusinessResult<(u64, u64)> {
        let samples = samples::Entity::find()
            .count(&self.db)
            .await
            .context("counts")?;
        let history = history::Entity::find()
            .count(&self.db)
            .await
            .context("counts")?;
        Ok((samples, history))
    }

    /// # Errors
    /// `StorageFailure` on read errors.
    pub async fn schema_version(&self) -> BusinessResult<i32> {
        schema_version(&self.db).await
    }
}

async fn find_sample<C: ConnectionTrait>(conn: &C, id: i32) -> BusinessResult<Option<Sample>> {
    samples::Entity::find_by_id(id)
        .one(conn)
        .await
        .context("get_sample_by_id")?
        .map(Sample::try_from)
        .transpose()
        .context("get_sample_by_id")
}

async fn all_samples<C: ConnectionTrait>(conn: &C) -> BusinessResult<Vec<Sample>> {
    samples::Entity::find()
        .order_by_asc(samples::Column::Id)
        .all(conn)
        .await
        .context("get_all_samples")?
        .into_iter()
        .map(Sample::try_from)
        .collect::<Result<Vec<_>, _>>()
        .context("get_all_samples")
}

async fn all_history<C: ConnectionTrait>(conn: &C) -> BusinessResult<Vec<HistoryRecord>> {
    let models = history::Entity::find()
        .order_by_asc(history::Column::Id)
        .all(conn)
        .await
        .context("get_all_history")?;
    newest_first(models)
}

/// Convert rows and order them by time, then id, descending
fn newest_first(models: Vec<history::Model>) -> BusinessResult<Vec<HistoryRecord>> {
    let mut records = models
        .into_iter()
        .map(HistoryRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .context("history")?;
    records.sort_by(|a, b| b.time.cmp(&a.time).then(b.id.cmp(&a.id)));
    Ok(records)
}

async fn schema_version<C: ConnectionTrait>(conn: &C) -> BusinessResult<i32> {
    let stored = metadata::Entity::find_by_id(metadata::SCHEMA_VERSION_KEY.to_string())
        .one(conn)
        .await
        .context("schema_version")?;
    Ok(stored
        .and_then(|row| row.value.parse().ok())
        .unwrap_or(SCHEMA_VERSION))
}

async fn append_history<C: ConnectionTrait>(
    conn: &C,
    sample_id: Option<i32>,
    editor: &str,
    time: DateTime<Utc>,
    change: Change,
) -> BusinessResult<HistoryRecord> {
    let mut record = HistoryRecord {
        id: 0,
        sample_id,
        editor: editor.to_string(),
        time,
        change,
    };
    let inserted = record
        .to_active_model(false)
        .context("append_history")?
        .insert(conn)
        .await
        .context("append_history")?;
    record.id = inserted.id;
    Ok(record)
}
