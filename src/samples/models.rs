use crate::common::errors::BusinessResult;
use crate::utils::images::{decoded_len, encode_data_url, is_data_url, mime_for_path};
use crate::validation_error;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "samples")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub batch: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub r#type: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub track: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub location: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub properties: Json,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub create_time: DateTimeUtc,
    pub update_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// One attached picture, stored inline as a data URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleImage {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    pub data: String,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

impl SampleImage {
    pub fn from_bytes(name: impl Into<String>, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.to_string(),
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            data: encode_data_url(mime_type, bytes),
            date: Utc::now(),
        }
    }

    /// Read an image file into its canonical encoded form
    ///
    /// # Errors
    /// Returns the I/O error when the file cannot be read.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_for_path(path);
        Ok(Self::from_bytes(name, mime_type.essence_str(), &bytes))
    }

    /// Canonical form: `data` is a base64 data URL, `type` and `size` are filled in
    pub fn normalized(mut self) -> Self {
        if self.mime_type.is_empty() {
            self.mime_type = self
                .data
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(';'))
                .map_or_else(
                    || mime::APPLICATION_OCTET_STREAM.to_string(),
                    |(mime_type, _)| mime_type.to_string(),
                );
        }
        if !is_data_url(&self.data) {
            self.data = format!("data:{};base64,{}", self.mime_type, self.data.trim());
        }
        if self.size == 0 {
            self.size = decoded_len(&self.data).unwrap_or(0);
        }
        self
    }
}

/// A stored reference sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<SampleImage>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Sample {
    /// Case-insensitive substring match over batch, type, location and notes.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.batch, &self.r#type, &self.location, &self.notes]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(needle))
    }

    /// Editable copy used by the session while a sample is being edited
    pub fn to_draft(&self) -> SampleDraft {
        SampleDraft {
            batch: self.batch.clone(),
            r#type: self.r#type.clone(),
            track: self.track.clone(),
            location: self.location.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            notes: self.notes.clone(),
            properties: self.properties.clone(),
            images: self.images.clone(),
            create_time: Some(self.create_time),
        }
    }

    /// Checks the invariants an imported row has to satisfy
    ///
    /// # Errors
    /// `ValidationError` when the timestamps are out of order.
    pub fn validate(&self) -> BusinessResult<()> {
        if self.create_time > self.update_time {
            return Err(validation_error!(
                "samples",
                format!("sample {} has createTime after updateTime", self.id)
            ));
        }
        Ok(())
    }

    pub(crate) fn to_active_model(&self, keep_id: bool) -> Result<ActiveModel, DbErr> {
        Ok(ActiveModel {
            id: if keep_id { Set(self.id) } else { NotSet },
            batch: Set(self.batch.clone()),
            r#type: Set(self.r#type.clone()),
            track: Set(self.track.clone()),
            location: Set(self.location.clone()),
            name: Set(self.name.clone()),
            description: Set(self.description.clone()),
            notes: Set(self.notes.clone()),
            properties: Set(to_json(&self.properties)?),
            images: Set(to_json(&self.images)?),
            create_time: Set(self.create_time),
            update_time: Set(self.update_time),
        })
    }
}

impl TryFrom<Model> for Sample {
    type Error = DbErr;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            batch: model.batch,
            r#type: model.r#type,
            track: model.track,
            location: model.location,
            name: model.name,
            description: model.description,
            notes: model.notes,
            properties: from_json(model.properties)?,
            images: from_json(model.images)?,
            create_time: model.create_time,
            update_time: model.update_time,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Json, DbErr> {
    serde_json::to_value(value).map_err(|err| DbErr::Json(err.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: Json) -> Result<T, DbErr> {
    serde_json::from_value(value).map_err(|err| DbErr::Json(err.to_string()))
}

/// Input for creating a sample; `id` and timestamps are assigned by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<SampleImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

impl SampleDraft {
    /// Materialise the draft at `now`. A supplied creation time is kept
    /// unless it lies in the future.
    pub(crate) fn into_sample(self, now: DateTime<Utc>) -> Sample {
        let create_time = self.create_time.filter(|time| *time <= now).unwrap_or(now);
        Sample {
            id: 0,
            batch: self.batch,
            r#type: self.r#type,
            track: self.track,
            location: self.location,
            name: self.name,
            description: self.description,
            notes: self.notes,
            properties: self.properties,
            images: self.images.into_iter().map(SampleImage::normalized).collect(),
            create_time,
            update_time: now,
        }
    }

    /// The update that turns `stored` into this draft; only differing fields are set
    pub fn changes_from(&self, stored: &Sample) -> SampleUpdate {
        let stored_draft = stored.to_draft();
        let mut update = SampleUpdate::default();
        for field in SampleField::ALL {
            let value = field.get(self);
            if value != field.get(&stored_draft) {
                field.set_update(&mut update, value.cloned());
            }
        }
        if self.properties != stored.properties {
            update.properties = Some(self.properties.clone());
        }
        if self.images != stored.images {
            update.images = Some(self.images.clone());
        }
        update
    }
}

/// Old and new value of one changed field; a side that was unset is `null`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    #[serde(default)]
    pub old: Value,
    #[serde(default)]
    pub new: Value,
}

/// Partial update; only present keys are applied and recorded in history.
/// Text fields use `Some(None)` to clear a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub batch: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub r#type: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub track: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<SampleImage>>,
}

impl SampleUpdate {
    pub fn is_empty(&self) -> bool {
        SampleField::ALL
            .iter()
            .all(|field| field.update_value(self).is_none())
            && self.properties.is_none()
            && self.images.is_none()
    }

    /// Merge the present keys into `sample` and return the per-field diff.
    /// Images are summarised by count instead of carrying their payloads.
    pub(crate) fn apply(self, sample: &mut Sample) -> BTreeMap<String, FieldDiff> {
        let mut diffs = BTreeMap::new();

        for field in SampleField::ALL {
            if let Some(new_value) = field.update_value(&self) {
                let slot = field.slot_mut(sample);
                diffs.insert(
                    field.to_string(),
                    FieldDiff {
                        old: json!(slot),
                        new: json!(new_value),
                    },
                );
                slot.clone_from(new_value);
            }
        }

        if let Some(properties) = self.properties {
            diffs.insert(
                "properties".to_string(),
                FieldDiff {
                    old: json!(sample.properties),
                    new: json!(properties),
                },
            );
            sample.properties = properties;
        }

        if let Some(images) = self.images {
            let images: Vec<SampleImage> =
                images.into_iter().map(SampleImage::normalized).collect();
            diffs.insert(
                "images".to_string(),
                FieldDiff {
                    old: Value::String(image_summary(sample.images.len())),
                    new: Value::String(image_summary(images.len())),
                },
            );
            sample.images = images;
        }

        diffs
    }
}

fn image_summary(count: usize) -> String {
    if count == 1 {
        "1 image".to_string()
    } else {
        format!("{count} images")
    }
}

/// The free-text attributes of a sample, addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleField {
    Batch,
    Type,
    Track,
    Location,
    Name,
    Description,
    Notes,
}

impl SampleField {
    pub const ALL: [SampleField; 7] = [
        SampleField::Batch,
        SampleField::Type,
        SampleField::Track,
        SampleField::Location,
        SampleField::Name,
        SampleField::Description,
        SampleField::Notes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SampleField::Batch => "batch",
            SampleField::Type => "type",
            SampleField::Track => "track",
            SampleField::Location => "location",
            SampleField::Name => "name",
            SampleField::Description => "description",
            SampleField::Notes => "notes",
        }
    }

    pub fn get(self, draft: &SampleDraft) -> Option<&String> {
        match self {
            SampleField::Batch => draft.batch.as_ref(),
            SampleField::Type => draft.r#type.as_ref(),
            SampleField::Track => draft.track.as_ref(),
            SampleField::Location => draft.location.as_ref(),
            SampleField::Name => draft.name.as_ref(),
            SampleField::Description => draft.description.as_ref(),
            SampleField::Notes => draft.notes.as_ref(),
        }
    }

    pub fn set(self, draft: &mut SampleDraft, value: Option<String>) {
        let slot = match self {
            SampleField::Batch => &mut draft.batch,
            SampleField::Type => &mut draft.r#type,
            SampleField::Track => &mut draft.track,
            SampleField::Location => &mut draft.location,
            SampleField::Name => &mut draft.name,
            SampleField::Description => &mut draft.description,
            SampleField::Notes => &mut draft.notes,
        };
        *slot = value;
    }

    fn slot_mut(self, sample: &mut Sample) -> &mut Option<String> {
        match self {
            SampleField::Batch => &mut sample.batch,
            SampleField::Type => &mut sample.r#type,
            SampleField::Track => &mut sample.track,
            SampleField::Location => &mut sample.location,
            SampleField::Name => &mut sample.name,
            SampleField::Description => &mut sample.description,
            SampleField::Notes => &mut sample.notes,
        }
    }

    fn update_value(self, update: &SampleUpdate) -> Option<&Option<String>> {
        match self {
            SampleField::Batch => update.batch.as_ref(),
            SampleField::Type => update.r#type.as_ref(),
            SampleField::Track => update.track.as_ref(),
            SampleField::Location => update.location.as_ref(),
            SampleField::Name => update.name.as_ref(),
            SampleField::Description => update.description.as_ref(),
            SampleField::Notes => update.notes.as_ref(),
        }
    }

    pub fn set_update(self, update: &mut SampleUpdate, value: Option<String>) {
        let slot = match self {
            SampleField::Batch => &mut update.batch,
            SampleField::Type => &mut update.r#type,
            SampleField::Track => &mut update.track,
            SampleField::Location => &mut update.location,
            SampleField::Name => &mut update.name,
            SampleField::Description => &mut update.description,
            SampleField::Notes => &mut update.notes,
        };
        *slot = Some(value);
    }
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        SampleField::ALL
            .into_iter()
            .find(|field| field.as_str() == lowered)
            .ok_or_else(|| format!("unknown field '{value}'"))
    }
}
