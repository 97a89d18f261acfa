//! The research → content → images pipeline: wires model providers into
//! the loop controllers and persists every accepted artifact.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use postloop_content::{part_keys, ImagePreCheck, ImageToolGenerator, PostDraft, ResearchFindings, StagePrompts};
use postloop_core::{PartitionedLoop, SingleLoop};
use postloop_logging::{LogEvent, LogFormat, Logger};
use postloop_provider::{ModelClient, ModelCritic, ModelGenerator, TaskSpec};

/// Everything the pipeline needs beyond the model client.
pub struct WorkflowOptions {
    pub topic: String,
    pub audience: String,
    pub output_dir: PathBuf,
    pub log_format: LogFormat,
    pub image_count: usize,
    pub research_iterations: usize,
    pub content_iterations: usize,
    pub image_iterations: usize,
    /// Image tool binary plus argv template; the image stage is skipped
    /// when unset.
    pub image_tool: Option<(String, Vec<String>)>,
}

#[derive(Debug, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub converged: bool,
    pub score: f64,
    pub iterations: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub project_dir: PathBuf,
    pub title: Option<String>,
    pub stages: Vec<StageReport>,
}

impl WorkflowReport {
    pub fn all_converged(&self) -> bool {
        self.stages.iter().all(|stage| stage.converged)
    }
}

pub struct Workflow {
    client: Arc<ModelClient>,
    options: WorkflowOptions,
}

impl Workflow {
    pub fn new(client: Arc<ModelClient>, options: WorkflowOptions) -> Self {
        Self { client, options }
    }

    pub async fn run(&self, interrupt: Arc<AtomicBool>) -> Result<WorkflowReport> {
        let project_dir = self.create_project_dir()?;
        let logger = Arc::new(
            Logger::with_file(self.options.log_format, &project_dir.join("run.jsonl"))
                .context("Failed to open run log")?,
        );

        info!(project_dir = %project_dir.display(), "Starting workflow");
        let mut stages = Vec::new();

        // Stage 1: research
        logger.log(&LogEvent::StageStarted {
            stage: "research".to_string(),
        });
        let research_task = TaskSpec::new(
            &self.options.topic,
            &self.options.audience,
            StagePrompts::research_brief(&self.options.topic, &self.options.audience),
        );
        let generator = ModelGenerator::<ResearchFindings>::new(
            self.client.clone(),
            StagePrompts::research_system(),
        );
        let critic = ModelCritic::new(self.client.clone(), StagePrompts::research_review_system());
        let research = SingleLoop::new(&generator, &critic, logger.clone())
            .with_max_iterations(self.options.research_iterations)
            .with_interrupt(interrupt.clone())
            .run(&research_task)
            .await?;
        self.save_artifact(&logger, &project_dir.join("research.json"), &research.artifact)?;
        logger.log(&LogEvent::StageCompleted {
            stage: "research".to_string(),
            converged: research.converged,
            score: research.verdict.score,
        });
        stages.push(StageReport {
            stage: "research".to_string(),
            converged: research.converged,
            score: research.verdict.score,
            iterations: research.iterations,
        });

        // Stage 2: content
        logger.log(&LogEvent::StageStarted {
            stage: "content".to_string(),
        });
        let content_task = TaskSpec::new(
            &self.options.topic,
            &self.options.audience,
            StagePrompts::content_brief(
                &self.options.topic,
                &self.options.audience,
                &research.artifact,
            ),
        );
        let generator =
            ModelGenerator::<PostDraft>::new(self.client.clone(), StagePrompts::content_system());
        let critic = ModelCritic::new(self.client.clone(), StagePrompts::content_review_system());
        let content = SingleLoop::new(&generator, &critic, logger.clone())
            .with_max_iterations(self.options.content_iterations)
            .with_interrupt(interrupt.clone())
            .run(&content_task)
            .await?;
        if let Err(err) = content.artifact.validate() {
            warn!(error = %err, "Accepted draft violates structural bounds");
        }
        self.save_artifact(&logger, &project_dir.join("content.json"), &content.artifact)?;
        logger.log(&LogEvent::StageCompleted {
            stage: "content".to_string(),
            converged: content.converged,
            score: content.verdict.score,
        });
        stages.push(StageReport {
            stage: "content".to_string(),
            converged: content.converged,
            score: content.verdict.score,
            iterations: content.iterations,
        });

        // Stage 3: images (only with a configured tool)
        if let Some((tool, tool_args)) = &self.options.image_tool {
            logger.log(&LogEvent::StageStarted {
                stage: "images".to_string(),
            });
            let image_task = TaskSpec::new(
                &self.options.topic,
                &self.options.audience,
                StagePrompts::image_brief(&self.options.topic, &content.artifact),
            );
            let generator = ImageToolGenerator::new(
                tool.clone(),
                tool_args.clone(),
                project_dir.join("images"),
            );
            let critic =
                ModelCritic::new(self.client.clone(), StagePrompts::image_review_system());
            let precheck = ImagePreCheck::default();
            let keys = part_keys(self.options.image_count);
            let images = PartitionedLoop::new(&generator, &critic, &precheck, logger.clone())
                .with_max_iterations(self.options.image_iterations)
                .with_interrupt(interrupt.clone())
                .run(&image_task, &keys)
                .await?;
            self.save_artifact(&logger, &project_dir.join("images.json"), &images.parts)?;
            logger.log(&LogEvent::StageCompleted {
                stage: "images".to_string(),
                converged: images.converged,
                score: images.verdict.score,
            });
            stages.push(StageReport {
                stage: "images".to_string(),
                converged: images.converged,
                score: images.verdict.score,
                iterations: images.rounds,
            });
        } else {
            info!("No image tool configured, skipping image stage");
        }

        Ok(WorkflowReport {
            project_dir,
            title: Some(content.artifact.title),
            stages,
        })
    }

    fn create_project_dir(&self) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let dir = self
            .options
            .output_dir
            .join(format!("{}-{}", stamp, slugify(&self.options.topic)));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    fn save_artifact<T: Serialize>(
        &self,
        logger: &Logger,
        path: &Path,
        artifact: &T,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(artifact)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        logger.log(&LogEvent::ArtifactSaved {
            path: path.to_path_buf(),
        });
        Ok(())
    }
}

/// Directory-safe slice of the topic for the project directory name.
fn slugify(topic: &str) -> String {
    topic
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>()
        .trim()
        .replace(' ', "-")
}
