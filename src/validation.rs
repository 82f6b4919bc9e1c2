//! Bounds checks for question creation, applied before anything is stored.

use crate::types::{CreateQuestion, PollOption};

pub const MIN_QUESTION_CHARS: usize = 5;
pub const MAX_QUESTION_CHARS: usize = 500;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 20;
pub const MIN_LABEL_CHARS: usize = 1;
pub const MAX_LABEL_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Question must be at least {MIN_QUESTION_CHARS} characters")]
    QuestionTooShort,
    #[error("Question exceeds maximum length of {MAX_QUESTION_CHARS}")]
    QuestionTooLong,
    #[error("Too few options (minimum {MIN_OPTIONS})")]
    TooFewOptions,
    #[error("Too many options (maximum {MAX_OPTIONS})")]
    TooManyOptions,
    #[error("Option {0} is empty")]
    EmptyOption(usize),
    #[error("Option {0} exceeds maximum length of {MAX_LABEL_CHARS}")]
    OptionTooLong(usize),
}

/// Validate a create-question payload
pub fn validate_question(request: &CreateQuestion) -> Result<(), ValidationError> {
    validate_question_text(&request.question)?;
    validate_options(&request.options)
}

pub fn validate_question_text(text: &str) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if len < MIN_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooShort);
    }
    if len > MAX_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooLong);
    }
    Ok(())
}

pub fn validate_options(options: &[PollOption]) -> Result<(), ValidationError> {
    if options.len() < MIN_OPTIONS {
        return Err(ValidationError::TooFewOptions);
    }
    if options.len() > MAX_OPTIONS {
        return Err(ValidationError::TooManyOptions);
    }

    for (i, option) in options.iter().enumerate() {
        let len = option.label.chars().count();
        if len < MIN_LABEL_CHARS {
            return Err(ValidationError::EmptyOption(i));
        }
        if len > MAX_LABEL_CHARS {
            return Err(ValidationError::OptionTooLong(i));
        }
    }

    Ok(())
}
