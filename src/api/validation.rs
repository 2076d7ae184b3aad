use thiserror::Error;

use super::models::SubmitJobRequest;

const MAX_URL_LEN: usize = 2048;
const MAX_SELECTOR_LEN: usize = 256;
const MAX_NAME_HINT_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum SubmissionValidationError {
    #[error("sourceUrl exceeds {MAX_URL_LEN} characters")]
    UrlTooLong,
    #[error("formatSelector exceeds {MAX_SELECTOR_LEN} characters")]
    SelectorTooLong,
    #[error("formatSelector must not contain whitespace")]
    SelectorWhitespace,
    #[error("outputNameHint exceeds {MAX_NAME_HINT_LEN} characters")]
    NameHintTooLong,
}

/// Shape checks on a submission body. URL scheme rules are enforced by the
/// service itself so the CLI gets the same treatment.
pub fn validate_submission(request: &SubmitJobRequest) -> Result<(), SubmissionValidationError> {
    if request.source_url.chars().count() > MAX_URL_LEN {
        return Err(SubmissionValidationError::UrlTooLong);
    }

    if let Some(selector) = request.format_selector.as_deref().map(str::trim) {
        if selector.chars().count() > MAX_SELECTOR_LEN {
            return Err(SubmissionValidationError::SelectorTooLong);
        }
        if selector.chars().any(char::is_whitespace) {
            return Err(SubmissionValidationError::SelectorWhitespace);
        }
    }

    if let Some(hint) = &request.output_name_hint {
        if hint.chars().count() > MAX_NAME_HINT_LEN {
            return Err(SubmissionValidationError::NameHintTooLong);
        }
    }

    Ok(())
}
