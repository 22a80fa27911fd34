use crate::history::models::{Change, HistoryRecord};
use crate::samples::models::{Sample, SampleField, SampleImage};
use crate::utils::{format_date, format_file_size};
use console::style;
use std::collections::BTreeMap;
use std::fmt::Write;

/// What the front end should show after an action
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Login,
    SampleList {
        query: Option<String>,
        samples: Vec<Sample>,
    },
    SampleDetail {
        sample: Sample,
        history: Vec<HistoryRecord>,
    },
    Edit {
        id: Option<i32>,
        form: Vec<(SampleField, String)>,
        properties: BTreeMap<String, String>,
        images: Vec<SampleImage>,
    },
    History {
        query: Option<String>,
        records: Vec<HistoryRecord>,
    },
    Settings(SettingsSummary),
    /// Keep whatever is on screen; used after failed actions
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSummary {
    pub storage_usage: u64,
    pub sample_count: u64,
    pub history_count: u64,
    pub schema_version: i32,
    pub editor: Option<String>,
}

impl View {
    /// Plain-text rendering for the terminal
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = match self {
            View::Login => writeln!(out, "{}", style("Enter the access password").bold()),
            View::SampleList { query, samples } => render_list(&mut out, query.as_deref(), samples),
            View::SampleDetail { sample, history } => render_detail(&mut out, sample, history),
            View::Edit {
                id,
                form,
                properties,
                images,
            } => render_edit(&mut out, *id, form, properties, images),
            View::History { query, records } => render_history(&mut out, query.as_deref(), records),
            View::Settings(summary) => render_settings(&mut out, summary),
            View::Unchanged => Ok(()),
        };
        out
    }
}

fn render_list(out: &mut String, query: Option<&str>, samples: &[Sample]) -> std::fmt::Result {
    match query {
        Some(query) => writeln!(
            out,
            "{} matching '{}'",
            style(format!("{} samples", samples.len())).bold(),
            query
        )?,
        None => writeln!(out, "{}", style(format!("{} samples", samples.len())).bold())?,
    }
    for sample in samples {
        writeln!(
            out,
            "{:>5}  {:<12} {:<12} {:<14} {}",
            style(sample.id).dim(),
            text(sample.batch.as_ref()),
            text(sample.r#type.as_ref()),
            text(sample.location.as_ref()),
            format_date(&sample.update_time.to_rfc3339(), false)
        )?;
    }
    Ok(())
}

fn render_detail(out: &mut String, sample: &Sample, history: &[HistoryRecord]) -> std::fmt::Result {
    writeln!(
        out,
        "{} {}",
        style(format!("Sample #{}", sample.id)).bold(),
        style(text(sample.name.as_ref())).cyan()
    )?;
    let draft = sample.to_draft();
    for field in SampleField::ALL {
        if let Some(value) = field.get(&draft) {
            writeln!(out, "  {:<12} {value}", format!("{field}:"))?;
        }
    }
    for (key, value) in &sample.properties {
        writeln!(out, "  {:<12} {value}", style(format!("{key}:")).dim())?;
    }
    render_images(out, &sample.images)?;
    writeln!(
        out,
        "  created {}  updated {}",
        format_date(&sample.create_time.to_rfc3339(), true),
        format_date(&sample.update_time.to_rfc3339(), true)
    )?;
    if !history.is_empty() {
        writeln!(out, "{}", style("History").bold())?;
        for record in history {
            render_record(out, record)?;
        }
    }
    Ok(())
}

fn render_edit(
    out: &mut String,
    id: Option<i32>,
    form: &[(SampleField, String)],
    properties: &BTreeMap<String, String>,
    images: &[SampleImage],
) -> std::fmt::Result {
    let title = id.map_or_else(|| "New sample".to_string(), |id| format!("Editing sample #{id}"));
    writeln!(out, "{}", style(title).bold().yellow())?;
    for (field, value) in form {
        writeln!(out, "  {:<12} {value}", format!("{field}:"))?;
    }
    for (key, value) in properties {
        writeln!(out, "  {:<12} {value}", style(format!("{key}:")).dim())?;
    }
    render_images(out, images)
}

fn render_images(out: &mut String, images: &[SampleImage]) -> std::fmt::Result {
    for (index, image) in images.iter().enumerate() {
        writeln!(
            out,
            "  [{}] {} ({}, {})",
            index + 1,
            image.name,
            image.mime_type,
            format_file_size(image.size)
        )?;
    }
    Ok(())
}

fn render_history(
    out: &mut String,
    query: Option<&str>,
    records: &[HistoryRecord],
) -> std::fmt::Result {
    let heading = style(format!("{} history entries", records.len())).bold();
    match query {
        Some(query) => writeln!(out, "{heading} matching '{query}'")?,
        None => writeln!(out, "{heading}")?,
    }
    for record in records {
        render_record(out, record)?;
    }
    Ok(())
}

fn render_record(out: &mut String, record: &HistoryRecord) -> std::fmt::Result {
    let target = record
        .sample_id
        .map_or_else(|| "all".to_string(), |id| format!("#{id}"));
    write!(
        out,
        "  {} {:<7} {:<6} {}",
        format_date(&record.time.to_rfc3339(), true),
        style(record.action()).cyan(),
        target,
        record.editor
    )?;
    match &record.change {
        Change::Update(diffs) => {
            let fields: Vec<&str> = diffs.keys().map(String::as_str).collect();
            writeln!(out, "  [{}]", fields.join(", "))
        }
        Change::Import(counts) => writeln!(
            out,
            "  {} samples, {} entries",
            counts.imported_samples, counts.imported_history
        ),
        Change::Add(_) | Change::Delete(_) => writeln!(out),
    }
}

fn render_settings(out: &mut String, summary: &SettingsSummary) -> std::fmt::Result {
    writeln!(out, "{}", style("Settings").bold())?;
    writeln!(out, "  storage used    {}", format_file_size(summary.storage_usage))?;
    writeln!(out, "  samples         {}", summary.sample_count)?;
    writeln!(out, "  history         {}", summary.history_count)?;
    writeln!(out, "  schema version  {}", summary.schema_version)?;
    writeln!(
        out,
        "  editor          {}",
        summary.editor.as_deref().unwrap_or("(not set)")
    )
}

fn text(value: Option<&String>) -> &str {
    value.map_or("-", String::as_str)
}
