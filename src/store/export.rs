use crate::common::errors::BusinessResult;
use crate::history::models::HistoryRecord;
use crate::samples::models::Sample;
use crate::validation_error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Point-in-time snapshot of both collections; also the import contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub samples: Vec<Sample>,
    pub history: Vec<HistoryRecord>,
    pub export_date: DateTime<Utc>,
    pub version: i32,
}

impl ExportDocument {
    /// Suggested file name, e.g. `sample-vault-backup_2024-05-01.json`
    pub fn file_name(&self) -> String {
        format!(
            "sample-vault-backup_{}.json",
            self.export_date.format("%Y-%m-%d")
        )
    }
}

/// A document offered for import. Both collections are optional at the
/// type level so that a missing one can be reported as a validation error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
    #[serde(default)]
    pub samples: Option<Vec<Sample>>,
    #[serde(default)]
    pub history: Option<Vec<HistoryRecord>>,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<i32>,
}

impl From<ExportDocument> for ImportDocument {
    fn from(document: ExportDocument) -> Self {
        Self {
            samples: Some(document.samples),
            history: Some(document.history),
            export_date: Some(document.export_date),
            version: Some(document.version),
        }
    }
}

impl ImportDocument {
    /// Parse an export file. Rows that do not match the sample or history
    /// shape are rejected here, before anything touches storage.
    ///
    /// # Errors
    /// `ValidationError` on malformed JSON or malformed rows.
    pub fn from_json(text: &str) -> BusinessResult<Self> {
        serde_json::from_str(text).map_err(|err| validation_error!("document", err))
    }

    /// Unpack into the staged rows, checking presence, version and row invariants
    ///
    /// # Errors
    /// `ValidationError` when a collection is missing, the version is newer
    /// than this build understands, ids repeat, or a row breaks an invariant.
    pub fn into_staged(
        self,
        supported_version: i32,
    ) -> BusinessResult<(Vec<Sample>, Vec<HistoryRecord>)> {
        let samples = self
            .samples
            .ok_or_else(|| validation_error!("samples", "import document has no samples"))?;
        let history = self
            .history
            .ok_or_else(|| validation_error!("history", "import document has no history"))?;

        if let Some(version) = self.version.filter(|version| *version > supported_version) {
            return Err(validation_error!(
                "version",
                format!("document version {version} is newer than {supported_version}")
            ));
        }

        let mut sample_ids = HashSet::new();
        for sample in &samples {
            sample.validate()?;
            if !sample_ids.insert(sample.id) {
                return Err(validation_error!(
                    "samples",
                    format!("duplicate sample id {}", sample.id)
                ));
            }
        }

        let mut history_ids = HashSet::new();
        for record in &history {
            record.validate()?;
            if !history_ids.insert(record.id) {
                return Err(validation_error!(
                    "history",
                    format!("duplicate history id {}", record.id)
                ));
            }
        }

        Ok((samples, history))
    }
}

/// Counts returned to the caller after a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub sample_count: u64,
    pub history_count: u64,
}
