//! Conversion between `field=value` assignments typed in the shell and the
//! attributes of a sample draft.

use crate::common::errors::BusinessResult;
use crate::samples::models::{SampleDraft, SampleField};
use crate::validation_error;

/// Parse one `field=value` assignment. A blank value clears the field.
///
/// # Errors
/// `ValidationError` when `=` is missing or the field is unknown.
pub fn parse_assignment(input: &str) -> BusinessResult<(SampleField, Option<String>)> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| validation_error!("form", format!("expected field=value, got '{input}'")))?;
    let field: SampleField = name
        .parse()
        .map_err(|message: String| validation_error!(name.trim(), message))?;

    let value = value.trim();
    let value = (!value.is_empty()).then(|| value.to_string());
    Ok((field, value))
}

/// Parse a list of assignments, stopping at the first bad one
///
/// # Errors
/// The first error returned by [`parse_assignment`].
pub fn extract_form<'a, I>(inputs: I) -> BusinessResult<Vec<(SampleField, Option<String>)>>
where
    I: IntoIterator<Item = &'a str>,
{
    inputs.into_iter().map(parse_assignment).collect()
}

/// The draft's text fields in display order; unset fields render empty
pub fn fill_form(draft: &SampleDraft) -> Vec<(SampleField, String)> {
    SampleField::ALL
        .into_iter()
        .map(|field| (field, field.get(draft).cloned().unwrap_or_default()))
        .collect()
}
