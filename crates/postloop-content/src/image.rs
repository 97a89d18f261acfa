use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use postloop_provider::{Generation, Generator, Message, ProviderError};

/// One generated image plus its generation provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub path: PathBuf,
    pub prompt_used: String,
}

/// Canonical parts of a post image set.
#[derive(Debug, Clone, Copy)]
pub struct ImagePart {
    pub key: &'static str,
    pub brief: &'static str,
}

pub const IMAGE_PARTS: [ImagePart; 3] = [
    ImagePart {
        key: "cover",
        brief: "cover image, large title style, leads with the topic",
    },
    ImagePart {
        key: "detail_1",
        brief: "first checklist image covering the opening points",
    },
    ImagePart {
        key: "detail_2",
        brief: "second checklist image covering the remaining points",
    },
];

/// Part keys for a set of the requested size, clamped to 1-3 images.
pub fn part_keys(count: usize) -> Vec<String> {
    IMAGE_PARTS
        .iter()
        .take(count.clamp(1, IMAGE_PARTS.len()))
        .map(|part| part.key.to_string())
        .collect()
}

/// Generator that shells out to a configured image tool. The argv template
/// may use `{prompt}` and `{output}` placeholders; each call writes a
/// uniquely named file into the output directory.
pub struct ImageToolGenerator {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
}

impl ImageToolGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, output_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir,
        }
    }
}

#[async_trait]
impl Generator<GeneratedImage> for ImageToolGenerator {
    async fn generate(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> Result<Generation<GeneratedImage>, ProviderError> {
        // The tool is one-shot, so revision feedback is folded into the
        // prompt instead of a conversation.
        let full_prompt = if history.is_empty() {
            prompt.to_string()
        } else {
            let context: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
            format!("{}\n\n{}", context.join("\n\n"), prompt)
        };

        std::fs::create_dir_all(&self.output_dir)?;
        let output = self.output_dir.join(format!("{}.png", Uuid::new_v4()));

        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{prompt}", &full_prompt)
                    .replace("{output}", &output.display().to_string())
            })
            .collect();

        debug!(program = %self.program, output = %output.display(), "Running image tool");

        let result = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !result.status.success() {
            return Err(ProviderError::ToolFailed {
                code: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        Ok(Generation {
            artifact: GeneratedImage {
                path: output,
                prompt_used: full_prompt,
            },
            messages: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_keys_clamped() {
        assert_eq!(part_keys(2), vec!["cover", "detail_1"]);
        assert_eq!(part_keys(0), vec!["cover"]);
        assert_eq!(part_keys(9).len(), 3);
    }
}
