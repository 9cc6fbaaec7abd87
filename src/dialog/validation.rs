//! Input rules for poll titles and options.

use crate::polls::MIN_OPTIONS;

pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 200;
pub const OPTION_MIN_CHARS: usize = 1;
pub const OPTION_MAX_CHARS: usize = 100;

/// Words that end option entry (compared case-insensitively)
pub const DONE_WORDS: &[&str] = &["done", "готово"];
/// Words that confirm the preview
pub const YES_WORDS: &[&str] = &["yes", "да"];
/// Words that discard the preview
pub const NO_WORDS: &[&str] = &["no", "нет"];

/// Input rejected by the dialog; the session is left as it was
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title is too short (minimum {min} characters)")]
    TitleTooShort { min: usize },

    #[error("Title is too long (maximum {max} characters)")]
    TitleTooLong { max: usize },

    #[error("Option cannot be empty")]
    EmptyOption,

    #[error("Option is too long (maximum {max} characters)")]
    OptionTooLong { max: usize },

    #[error("At least {min} options are needed, current count: {count}")]
    NotEnoughOptions { count: usize, min: usize },
}

/// Trimmed title within bounds
pub fn validate_title(text: &str) -> Result<String, ValidationError> {
    let title = text.trim();
    let len = title.chars().count();
    if len < TITLE_MIN_CHARS {
        return Err(ValidationError::TitleTooShort {
            min: TITLE_MIN_CHARS,
        });
    }
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong {
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(title.to_string())
}

/// Trimmed option within bounds
pub fn validate_option(text: &str) -> Result<String, ValidationError> {
    let option = text.trim();
    let len = option.chars().count();
    if len < OPTION_MIN_CHARS {
        return Err(ValidationError::EmptyOption);
    }
    if len > OPTION_MAX_CHARS {
        return Err(ValidationError::OptionTooLong {
            max: OPTION_MAX_CHARS,
        });
    }
    Ok(option.to_string())
}

/// Enough options collected to preview the poll
pub fn validate_option_count(count: usize) -> Result<(), ValidationError> {
    if count < MIN_OPTIONS {
        return Err(ValidationError::NotEnoughOptions {
            count,
            min: MIN_OPTIONS,
        });
    }
    Ok(())
}

/// Case-insensitive membership in a word list
pub fn is_one_of(text: &str, words: &[&str]) -> bool {
    let text = text.trim().to_lowercase();
    words.iter().any(|w| *w == text)
}
