//! Composer input rules: laser text length, target site, batch size.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::sim_config::{JOB_POS1, JOB_POS2};

/// Maximum engraving text length in characters.
pub const MAX_LASER_TEXT_LEN: usize = 50;
/// Maximum number of jobs in one batch.
pub const MAX_BATCH_JOBS: usize = 5;

/// Outcome of a local text check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextValidation {
    pub valid: bool,
    pub message: String,
}

impl TextValidation {
    fn new(valid: bool, message: &str) -> Self {
        Self {
            valid,
            message: message.to_string(),
        }
    }
}

/// Valid iff the text has 1 to 50 characters.
pub fn validate_laser_text(text: &str) -> TextValidation {
    let len = text.chars().count();
    if len < 1 {
        TextValidation::new(false, "Text cannot be empty")
    } else if len > MAX_LASER_TEXT_LEN {
        TextValidation::new(false, "Text must be 50 characters or less")
    } else {
        TextValidation::new(true, "Valid text length")
    }
}

/// Like [`validate_laser_text`] but as a `Result`.
pub fn check_laser_text(text: &str) -> crate::Result<()> {
    let validation = validate_laser_text(text);
    if validation.valid {
        Ok(())
    } else {
        Err(CoreError::InvalidLaserText(validation.message))
    }
}

/// Sites accepted by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComposerSite {
    #[default]
    #[serde(rename = "JOB_POS1")]
    JobPos1,
    #[serde(rename = "JOB_POS2")]
    JobPos2,
}

impl ComposerSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobPos1 => JOB_POS1,
            Self::JobPos2 => JOB_POS2,
        }
    }
}

impl fmt::Display for ComposerSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComposerSite {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            JOB_POS1 => Ok(Self::JobPos1),
            JOB_POS2 => Ok(Self::JobPos2),
            other => Err(CoreError::InvalidSite(other.to_string())),
        }
    }
}

/// Batch being composed. Always holds at least one entry and at most
/// [`MAX_BATCH_JOBS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDraft {
    pub site: ComposerSite,
    entries: Vec<String>,
}

impl Default for BatchDraft {
    fn default() -> Self {
        Self {
            site: ComposerSite::default(),
            entries: vec![String::new()],
        }
    }
}

impl BatchDraft {
    pub fn new(site: ComposerSite) -> Self {
        Self {
            site,
            ..Self::default()
        }
    }

    /// Draft pre-filled with `texts`. Not clamped, so an oversized draft
    /// is representable and refused at submit time.
    pub fn from_texts<I, S>(site: ComposerSite, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            site,
            entries: texts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an empty entry. Returns false when the batch is full.
    pub fn add(&mut self) -> bool {
        if self.entries.len() >= MAX_BATCH_JOBS {
            return false;
        }
        self.entries.push(String::new());
        true
    }

    /// Remove entry `index`. The last remaining entry is never removed.
    pub fn remove(&mut self, index: usize) -> bool {
        if self.entries.len() <= 1 || index >= self.entries.len() {
            return false;
        }
        self.entries.remove(index);
        true
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                *entry = text.into();
                true
            }
            None => false,
        }
    }

    pub fn validation(&self, index: usize) -> Option<TextValidation> {
        self.entries.get(index).map(|text| validate_laser_text(text))
    }

    /// Submission is allowed iff the batch is non-empty, within the size
    /// limit and every entry is valid.
    pub fn can_submit(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.len() <= MAX_BATCH_JOBS
            && self.entries.iter().all(|t| validate_laser_text(t).valid)
    }

    /// Texts sent to the backend: the non-empty entries.
    pub fn jobs(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect()
    }

    /// Back to a single empty entry, keeping the site.
    pub fn reset(&mut self) {
        self.entries = vec![String::new()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_laser_text_bounds() {
        assert_eq!(validate_laser_text("").message, "Text cannot be empty");
        assert!(validate_laser_text("A").valid);
        assert!(validate_laser_text(&"x".repeat(50)).valid);

        let too_long = validate_laser_text(&"x".repeat(51));
        assert!(!too_long.valid);
        assert_eq!(too_long.message, "Text must be 50 characters or less");
    }

    #[test]
    fn test_laser_text_counts_chars() {
        assert!(validate_laser_text(&"ü".repeat(50)).valid);
        assert!(check_laser_text(&"ü".repeat(51)).is_err());
    }

    #[test]
    fn test_site_parse_and_wire() {
        assert_eq!("JOB_POS2".parse::<ComposerSite>().unwrap(), ComposerSite::JobPos2);
        assert!("HOME".parse::<ComposerSite>().is_err());
        assert_eq!(
            serde_json::to_value(ComposerSite::JobPos1).unwrap(),
            serde_json::json!("JOB_POS1")
        );
    }

    #[test]
    fn test_draft_starts_with_one_empty_entry() {
        let draft = BatchDraft::default();
        assert_eq!(draft.entries(), &[String::new()]);
        assert!(!draft.can_submit());
    }

    #[test]
    fn test_draft_add_caps_at_five() {
        let mut draft = BatchDraft::default();
        for _ in 0..4 {
            assert!(draft.add());
        }
        assert!(!draft.add());
        assert_eq!(draft.len(), MAX_BATCH_JOBS);
    }

    #[test]
    fn test_draft_remove_keeps_last_entry() {
        let mut draft = BatchDraft::default();
        assert!(!draft.remove(0));
        draft.add();
        assert!(draft.remove(1));
        assert!(!draft.remove(0));
        assert_eq!(draft.len(), 1);
    }

    #[test]
    fn test_can_submit_rules() {
        let draft = BatchDraft::from_texts(ComposerSite::JobPos1, ["HELLO", "WORLD"]);
        assert!(draft.can_submit());
        assert_eq!(draft.jobs(), vec!["HELLO", "WORLD"]);

        let with_blank = BatchDraft::from_texts(ComposerSite::JobPos1, ["HELLO", ""]);
        assert!(!with_blank.can_submit());

        let oversized = BatchDraft::from_texts(ComposerSite::JobPos1, ["A"; 6]);
        assert!(!oversized.can_submit());

        let empty = BatchDraft::from_texts(ComposerSite::JobPos1, Vec::<String>::new());
        assert!(!empty.can_submit());
    }

    #[test]
    fn test_set_text_and_reset() {
        let mut draft = BatchDraft::new(ComposerSite::JobPos2);
        assert!(draft.set_text(0, "SMART"));
        assert!(!draft.set_text(3, "nope"));
        assert!(draft.validation(0).unwrap().valid);

        draft.reset();
        assert_eq!(draft.len(), 1);
        assert_eq!(draft.site, ComposerSite::JobPos2);
    }
}
