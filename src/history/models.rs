use crate::common::errors::BusinessResult;
use crate::samples::models::{FieldDiff, Sample};
use crate::validation_error;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    #[sea_orm(string_value = "add")]
    Add,
    #[sea_orm(string_value = "update")]
    Update,
    #[sea_orm(string_value = "delete")]
    Delete,
    #[sea_orm(string_value = "import")]
    Import,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HistoryAction::Add => "add",
            HistoryAction::Update => "update",
            HistoryAction::Delete => "delete",
            HistoryAction::Import => "import",
        };
        f.pad(label)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sample_id: Option<i32>,
    pub action: HistoryAction,
    #[sea_orm(column_type = "Text")]
    pub editor: String,
    pub time: DateTimeUtc,
    #[sea_orm(column_type = "Json")]
    pub changes: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Counts recorded by an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    pub imported_samples: u64,
    pub imported_history: u64,
    pub import_date: DateTime<Utc>,
}

/// What an audit entry records, one shape per action
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Full snapshot of the sample as created
    Add(Sample),
    /// Only the fields that were part of the update
    Update(BTreeMap<String, FieldDiff>),
    /// Full snapshot taken right before removal
    Delete(Sample),
    Import(ImportCounts),
}

impl Change {
    pub fn action(&self) -> HistoryAction {
        match self {
            Change::Add(_) => HistoryAction::Add,
            Change::Update(_) => HistoryAction::Update,
            Change::Delete(_) => HistoryAction::Delete,
            Change::Import(_) => HistoryAction::Import,
        }
    }

    /// The `changes` payload as stored and exported
    ///
    /// # Errors
    /// Fails only if a snapshot cannot be serialised.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Change::Add(sample) => serde_json::to_value(sample),
            Change::Update(diffs) => serde_json::to_value(diffs),
            Change::Delete(sample) => Ok(json!({ "deletedSample": serde_json::to_value(sample)? })),
            Change::Import(counts) => serde_json::to_value(counts),
        }
    }

    /// Rebuild a change from its action tag and stored payload
    ///
    /// # Errors
    /// Fails when the payload does not match the shape expected for `action`.
    pub fn from_parts(action: HistoryAction, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match action {
            HistoryAction::Add => Change::Add(serde_json::from_value(payload)?),
            HistoryAction::Update => Change::Update(serde_json::from_value(payload)?),
            HistoryAction::Delete => {
                #[derive(Deserialize)]
                struct Deleted {
                    #[serde(rename = "deletedSample")]
                    deleted_sample: Sample,
                }
                let deleted: Deleted = serde_json::from_value(payload)?;
                Change::Delete(deleted.deleted_sample)
            }
            HistoryAction::Import => Change::Import(serde_json::from_value(payload)?),
        })
    }
}

/// Immutable audit entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "HistoryRow")]
pub struct HistoryRecord {
    pub id: i32,
    pub sample_id: Option<i32>,
    pub editor: String,
    pub time: DateTime<Utc>,
    pub change: Change,
}

/// Wire shape of an entry in export files. Older backups spell the tag
/// `type` and the timestamp `date`; both are accepted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRow {
    id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_id: Option<i32>,
    #[serde(alias = "type")]
    action: HistoryAction,
    editor: String,
    #[serde(alias = "date")]
    time: DateTime<Utc>,
    changes: Value,
}

impl Serialize for HistoryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let changes = self.change.payload().map_err(serde::ser::Error::custom)?;
        HistoryRow {
            id: self.id,
            sample_id: self.sample_id,
            action: self.action(),
            editor: self.editor.clone(),
            time: self.time,
            changes,
        }
        .serialize(serializer)
    }
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = String;

    fn try_from(mut row: HistoryRow) -> Result<Self, Self::Error> {
        // Add snapshots written before the sample had an id carry it only in `sampleId`
        if let (HistoryAction::Add, Some(sample_id), Value::Object(snapshot)) =
            (row.action, row.sample_id, &mut row.changes)
        {
            snapshot.entry("id").or_insert_with(|| json!(sample_id));
        }
        let change = Change::from_parts(row.action, row.changes)
            .map_err(|err| format!("history entry {} has malformed changes: {err}", row.id))?;
        Ok(Self {
            id: row.id,
            sample_id: row.sample_id,
            editor: row.editor,
            time: row.time,
            change,
        })
    }
}

impl HistoryRecord {
    pub fn action(&self) -> HistoryAction {
        self.change.action()
    }

    /// Case-insensitive match over the editor and the serialised changes.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.editor.to_lowercase().contains(needle)
            || self
                .change
                .payload()
                .is_ok_and(|payload| payload.to_string().to_lowercase().contains(needle))
    }

    /// Checks an imported row against the audit entry shape
    ///
    /// # Errors
    /// `ValidationError` when the entry is not attributable or references
    /// a sample inconsistently with its action.
    pub fn validate(&self) -> BusinessResult<()> {
        if self.editor.trim().is_empty() {
            return Err(validation_error!(
                "history",
                format!("history entry {} has no editor", self.id)
            ));
        }
        let needs_sample = self.action() != HistoryAction::Import;
        if needs_sample != self.sample_id.is_some() {
            return Err(validation_error!(
                "history",
                format!(
                    "history entry {} of type {} has an inconsistent sampleId",
                    self.id,
                    self.action()
                )
            ));
        }
        Ok(())
    }

    pub(crate) fn to_active_model(&self, keep_id: bool) -> Result<ActiveModel, DbErr> {
        let changes = self
            .change
            .payload()
            .map_err(|err| DbErr::Json(err.to_string()))?;
        Ok(ActiveModel {
            id: if keep_id { Set(self.id) } else { NotSet },
            sample_id: Set(self.sample_id),
            action: Set(self.action()),
            editor: Set(self.editor.clone()),
            time: Set(self.time),
            changes: Set(changes),
        })
    }
}

impl TryFrom<Model> for HistoryRecord {
    type Error = DbErr;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let change = Change::from_parts(model.action, model.changes)
            .map_err(|err| DbErr::Json(err.to_string()))?;
        Ok(Self {
            id: model.id,
            sample_id: model.sample_id,
            editor: model.editor,
            time: model.time,
            change,
        })
    }
}
