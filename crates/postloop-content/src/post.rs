use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TITLE_MIN_CHARS: usize = 10;
pub const TITLE_MAX_CHARS: usize = 30;
pub const BODY_MIN_CHARS: usize = 100;
pub const MAX_HASHTAGS: usize = 5;

/// The written post artifact produced by the content stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub call_to_action: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum DraftError {
    #[error("title must be {min}-{max} characters, got {0}", min = TITLE_MIN_CHARS, max = TITLE_MAX_CHARS)]
    TitleLength(usize),

    #[error("body must be at least {min} characters, got {0}", min = BODY_MIN_CHARS)]
    BodyTooShort(usize),

    #[error("at most {max} hashtags allowed, got {0}", max = MAX_HASHTAGS)]
    TooManyHashtags(usize),
}

impl PostDraft {
    /// Structural bounds on the draft. Character counts, not bytes: titles
    /// are usually CJK-heavy.
    pub fn validate(&self) -> Result<(), DraftError> {
        let title_len = self.title.chars().count();
        if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
            return Err(DraftError::TitleLength(title_len));
        }

        let body_len = self.body.chars().count();
        if body_len < BODY_MIN_CHARS {
            return Err(DraftError::BodyTooShort(body_len));
        }

        if self.hashtags.len() > MAX_HASHTAGS {
            return Err(DraftError::TooManyHashtags(self.hashtags.len()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PostDraft {
        PostDraft {
            title: "Job hunt survival guide".to_string(),
            body: "x".repeat(120),
            hashtags: vec!["jobs".to_string(), "career".to_string()],
            call_to_action: "Share your own story below".to_string(),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn test_short_title_rejected() {
        let mut d = draft();
        d.title = "Short".to_string();
        assert_eq!(d.validate(), Err(DraftError::TitleLength(5)));
    }

    #[test]
    fn test_short_body_rejected() {
        let mut d = draft();
        d.body = "too thin".to_string();
        assert!(matches!(d.validate(), Err(DraftError::BodyTooShort(_))));
    }

    #[test]
    fn test_hashtag_limit_enforced() {
        let mut d = draft();
        d.hashtags = (0..6).map(|i| format!("tag{}", i)).collect();
        assert_eq!(d.validate(), Err(DraftError::TooManyHashtags(6)));
    }
}
