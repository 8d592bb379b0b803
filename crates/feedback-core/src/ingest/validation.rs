//! Payload validation applied before any side effect.

use std::collections::HashSet;

use feedback_types::{FeedbackResponse, IngestError, ResponseMode, ResponsePatch, SubmitRequest};
use validator::{Validate, ValidationErrors};

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Validate a submission: field bounds first, then the rules of its mode.
pub fn validate_submission(request: &SubmitRequest) -> Result<(), IngestError> {
    request.validate().map_err(from_validation_errors)?;

    match request.mode {
        ResponseMode::Feedback => {
            if !has_text(request.content.as_deref()) && request.rating.is_none() {
                return Err(IngestError::validation(
                    "content",
                    "feedback requires content or a rating",
                ));
            }
        },
        ResponseMode::FeatureRequest => {
            if !has_text(request.content.as_deref()) {
                return Err(IngestError::validation("content", "feature-request requires content"));
            }
        },
        ResponseMode::Vote => {
            if request.vote.is_none() {
                return Err(IngestError::validation("vote", "vote requires a vote value"));
            }
        },
        ResponseMode::Poll => {
            let options = request.poll_options.as_deref().unwrap_or_default();
            let distinct: HashSet<&str> = options.iter().map(String::as_str).collect();
            if options.len() < 2 || distinct.len() != options.len() {
                return Err(IngestError::validation(
                    "pollOptions",
                    "poll requires at least two distinct options",
                ));
            }
            validate_selection(request.poll_selected.as_deref(), options)?;
        },
        ResponseMode::Ab => {
            if !has_text(request.experiment_id.as_deref()) {
                return Err(IngestError::validation("experimentId", "ab requires an experiment id"));
            }
        },
    }
    Ok(())
}

/// Validate a patch against the stored response it would modify.
pub fn validate_patch(existing: &FeedbackResponse, patch: &ResponsePatch) -> Result<(), IngestError> {
    patch.validate().map_err(from_validation_errors)?;

    if patch.is_empty() {
        return Err(IngestError::Validation {
            message: "patch contains no mutable fields".to_string(),
            field: None,
        });
    }

    match existing.mode {
        ResponseMode::FeatureRequest => {
            if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
                return Err(IngestError::validation("content", "feature-request requires content"));
            }
        },
        ResponseMode::Poll => {
            if patch.poll_selected.is_some() {
                let options = existing.poll_options.as_deref().unwrap_or_default();
                validate_selection(patch.poll_selected.as_deref(), options)?;
            }
        },
        ResponseMode::Feedback | ResponseMode::Vote | ResponseMode::Ab => {},
    }
    Ok(())
}

/// Turn a resubmission into a patch of the stored response it resolved to.
/// The mode of a stored response never changes.
pub fn validate_edit(
    existing: &FeedbackResponse,
    request: &SubmitRequest,
) -> Result<ResponsePatch, IngestError> {
    if request.mode != existing.mode {
        return Err(IngestError::validation(
            "mode",
            format!("response {} was recorded as {}, not {}", existing.id, existing.mode, request.mode),
        ));
    }
    let patch = ResponsePatch::from_submission(request);
    if !patch.is_empty() {
        validate_patch(existing, &patch)?;
    }
    Ok(patch)
}

/// Normalise the idempotency header: blank means absent.
pub fn normalize_idempotency_key(raw: Option<&str>) -> Result<Option<String>, IngestError> {
    let Some(key) = raw.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(IngestError::validation(
            "idempotencyKey",
            format!("idempotency key exceeds {} characters", MAX_IDEMPOTENCY_KEY_LEN),
        ));
    }
    Ok(Some(key.to_string()))
}

fn validate_selection(selected: Option<&[String]>, options: &[String]) -> Result<(), IngestError> {
    let selected = selected.unwrap_or_default();
    if selected.is_empty() {
        return Err(IngestError::validation("pollSelected", "poll requires at least one selection"));
    }
    if let Some(unknown) = selected.iter().find(|s| !options.contains(s)) {
        return Err(IngestError::validation(
            "pollSelected",
            format!("'{}' is not one of the poll options", unknown),
        ));
    }
    Ok(())
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// First failing field (alphabetical, for stable output) as a camelCase name.
fn from_validation_errors(errors: ValidationErrors) -> IngestError {
    let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
    fields.sort();
    match fields.first() {
        Some(field) => {
            let field = to_camel_case(field);
            IngestError::validation(field.clone(), format!("{} is out of range", field))
        },
        None => IngestError::Validation { message: errors.to_string(), field: None },
    }
}

fn to_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for ch in snake.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}
