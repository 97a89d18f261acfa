use std::collections::BTreeMap;

use postloop_provider::PreCheck;
use postloop_review::{Issue, IssueKind};

use crate::image::GeneratedImage;

/// Files smaller than this are assumed to be truncated downloads.
pub const MIN_IMAGE_BYTES: u64 = 10 * 1024;

/// Model-free structural validation of a generated image set: per-part
/// existence and size on disk, plus a produced-vs-expected count check.
pub struct ImagePreCheck {
    min_bytes: u64,
}

impl ImagePreCheck {
    pub fn new(min_bytes: u64) -> Self {
        Self { min_bytes }
    }
}

impl Default for ImagePreCheck {
    fn default() -> Self {
        Self::new(MIN_IMAGE_BYTES)
    }
}

impl PreCheck<GeneratedImage> for ImagePreCheck {
    fn validate(
        &self,
        parts: &BTreeMap<String, GeneratedImage>,
        expected: &[String],
    ) -> Vec<Issue> {
        let mut issues = Vec::new();

        for key in expected {
            match parts.get(key) {
                None => issues.push(Issue::critical(
                    IssueKind::FileMissing,
                    key.as_str(),
                    format!("no {} image was produced", key),
                    "regenerate this part",
                )),
                Some(image) => match std::fs::metadata(&image.path) {
                    Err(_) => issues.push(Issue::critical(
                        IssueKind::FileMissing,
                        key.as_str(),
                        format!("{} image file does not exist: {}", key, image.path.display()),
                        "regenerate and confirm the file was written",
                    )),
                    Ok(meta) if meta.len() < self.min_bytes => issues.push(Issue::critical(
                        IssueKind::FileTooSmall,
                        key.as_str(),
                        format!(
                            "{} image file is {} bytes, likely truncated",
                            key,
                            meta.len()
                        ),
                        "regenerate this part",
                    )),
                    Ok(_) => {}
                },
            }
        }

        if parts.len() < expected.len() {
            issues.push(Issue::critical(
                IssueKind::CountInsufficient,
                "all",
                format!("expected {} images, produced {}", expected.len(), parts.len()),
                "generate the missing parts",
            ));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postloop_review::{PartRef, Severity};
    use std::path::Path;
    use tempfile::TempDir;

    fn image(path: &Path) -> GeneratedImage {
        GeneratedImage {
            path: path.to_path_buf(),
            prompt_used: "a bold cover".to_string(),
        }
    }

    fn write_bytes(dir: &TempDir, name: &str, len: usize) -> GeneratedImage {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; len]).unwrap();
        image(&path)
    }

    fn expected() -> Vec<String> {
        vec!["cover".to_string(), "detail_1".to_string()]
    }

    #[test]
    fn test_complete_valid_set_is_clean() {
        let dir = TempDir::new().unwrap();
        let mut parts = BTreeMap::new();
        parts.insert("cover".to_string(), write_bytes(&dir, "a.png", 20_000));
        parts.insert("detail_1".to_string(), write_bytes(&dir, "b.png", 20_000));

        let issues = ImagePreCheck::default().validate(&parts, &expected());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_missing_file_is_critical_for_that_part() {
        let dir = TempDir::new().unwrap();
        let mut parts = BTreeMap::new();
        parts.insert("cover".to_string(), write_bytes(&dir, "a.png", 20_000));
        parts.insert(
            "detail_1".to_string(),
            image(&dir.path().join("never-written.png")),
        );

        let issues = ImagePreCheck::default().validate(&parts, &expected());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::FileMissing);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(issues[0].part, PartRef::Key("detail_1".to_string()));
    }

    #[test]
    fn test_small_file_is_flagged_truncated() {
        let dir = TempDir::new().unwrap();
        let mut parts = BTreeMap::new();
        parts.insert("cover".to_string(), write_bytes(&dir, "a.png", 512));
        parts.insert("detail_1".to_string(), write_bytes(&dir, "b.png", 20_000));

        let issues = ImagePreCheck::default().validate(&parts, &expected());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::FileTooSmall);
    }

    #[test]
    fn test_undersized_set_flags_count_on_all() {
        let dir = TempDir::new().unwrap();
        let mut parts = BTreeMap::new();
        parts.insert("cover".to_string(), write_bytes(&dir, "a.png", 20_000));

        let issues = ImagePreCheck::default().validate(&parts, &expected());
        // one per-part miss plus the aggregate count issue on "all"
        assert_eq!(issues.len(), 2);
        assert!(issues
            .iter()
            .any(|i| i.kind == IssueKind::CountInsufficient && i.part == PartRef::All));
    }
}
