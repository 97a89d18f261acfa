use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use postloop_core::{LoopError, PartitionedLoop, SingleLoop};
use postloop_logging::{LogFormat, Logger};
use postloop_provider::{
    Critic, Generation, Generator, Message, PreCheck, ProviderError, Role, TaskSpec,
};
use postloop_review::{Issue, IssueKind, Severity, Verdict};

const PART_KEYS: [&str; 3] = ["cover", "detail_1", "detail_2"];

fn logger() -> Arc<Logger> {
    Arc::new(Logger::new(LogFormat::Compact))
}

fn task() -> TaskSpec {
    TaskSpec::new(
        "first-job survival guide",
        "new graduates",
        "Write a post about surviving the first job hunt.",
    )
}

fn passing_verdict() -> Verdict {
    Verdict {
        passed: true,
        score: 92.0,
        issues: vec![],
        summary: "meets the brief".to_string(),
    }
}

fn failing_verdict() -> Verdict {
    Verdict {
        passed: false,
        score: 45.0,
        issues: vec![Issue::critical(
            IssueKind::MissingDetail,
            "all",
            "no concrete examples",
            "name at least three real cases",
        )],
        summary: "too generic".to_string(),
    }
}

/// Generator that pops scripted artifacts and records every history it saw.
struct ScriptedGenerator {
    outputs: Mutex<VecDeque<String>>,
    seen_histories: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGenerator {
    fn new(outputs: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(String::from).collect()),
            seen_histories: Mutex::new(Vec::new()),
        }
    }

    fn histories(&self) -> Vec<Vec<Message>> {
        self.seen_histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator<String> for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> Result<Generation<String>, ProviderError> {
        self.seen_histories.lock().unwrap().push(history.to_vec());
        let artifact = self
            .outputs
            .lock()
            .unwrap()
            .pop_front()
            .expect("generator script exhausted");
        Ok(Generation {
            artifact: artifact.clone(),
            messages: vec![Message::user(prompt), Message::assistant(artifact)],
        })
    }
}

/// Generator that always fails with a capability error.
struct FailingGenerator;

#[async_trait]
impl Generator<String> for FailingGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _history: &[Message],
    ) -> Result<Generation<String>, ProviderError> {
        Err(ProviderError::RateLimited)
    }
}

/// Critic that pops scripted verdicts.
struct ScriptedCritic {
    verdicts: Mutex<VecDeque<Verdict>>,
}

impl ScriptedCritic {
    fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Critic<String> for ScriptedCritic {
    async fn critique(
        &self,
        _artifact: &String,
        _task: &TaskSpec,
    ) -> Result<Verdict, ProviderError> {
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .expect("critic script exhausted"))
    }
}

// ============================================================
// Single-artifact mode
// ============================================================

#[tokio::test]
async fn passes_on_first_attempt() {
    let generator = ScriptedGenerator::new(["draft-v1"]);
    let critic = ScriptedCritic::new([passing_verdict()]);
    let single = SingleLoop::new(&generator, &critic, logger());

    let run = single.run(&task()).await.unwrap();

    assert!(run.converged);
    assert_eq!(run.iterations, 1);
    assert_eq!(run.artifact, "draft-v1");
    // prompt + reply recorded in the returned history
    assert_eq!(run.history.len(), 2);
    assert_eq!(run.history[0].role, Role::User);
}

#[tokio::test]
async fn revises_once_then_passes() {
    let generator = ScriptedGenerator::new(["draft-v1", "draft-v2"]);
    let critic = ScriptedCritic::new([failing_verdict(), passing_verdict()]);
    let single = SingleLoop::new(&generator, &critic, logger());

    let run = single.run(&task()).await.unwrap();

    assert!(run.converged);
    assert_eq!(run.iterations, 2);
    assert_eq!(run.artifact, "draft-v2");

    // The attempt-1 generator call saw the attempt-0 exchange plus exactly
    // one appended feedback message.
    let histories = generator.histories();
    assert_eq!(histories.len(), 2);
    assert!(histories[0].is_empty());
    let second = &histories[1];
    assert_eq!(second.len(), 3);
    let feedback_turns: Vec<_> = second
        .iter()
        .filter(|m| m.content.contains("did not pass review"))
        .collect();
    assert_eq!(feedback_turns.len(), 1);
    assert!(feedback_turns[0].content.contains("no concrete examples"));
    assert!(feedback_turns[0]
        .content
        .contains("name at least three real cases"));
}

#[tokio::test]
async fn budget_exhaustion_returns_last_artifact() {
    let generator = ScriptedGenerator::new(["draft-v1", "draft-v2"]);
    let critic = ScriptedCritic::new([failing_verdict(), failing_verdict()]);
    let single = SingleLoop::new(&generator, &critic, logger()).with_max_iterations(2);

    let run = single.run(&task()).await.unwrap();

    assert!(!run.converged);
    assert_eq!(run.iterations, 2);
    assert_eq!(run.artifact, "draft-v2");
    // exactly two round-trips, no extra generation after the budget
    assert_eq!(generator.histories().len(), 2);
}

#[tokio::test]
async fn generator_failure_propagates() {
    let generator = FailingGenerator;
    let critic = ScriptedCritic::new([]);
    let single = SingleLoop::new(&generator, &critic, logger());

    let result = single.run(&task()).await;
    assert!(matches!(result, Err(LoopError::Generator(_))));
}

#[tokio::test]
async fn zero_budget_is_rejected() {
    let generator = ScriptedGenerator::new([]);
    let critic = ScriptedCritic::new([]);
    let single = SingleLoop::new(&generator, &critic, logger()).with_max_iterations(0);

    let result = single.run(&task()).await;
    assert!(matches!(result, Err(LoopError::EmptyBudget)));
}

// ============================================================
// Partitioned mode
// ============================================================

/// Generator that answers per-part prompts with versioned artifacts.
struct PartGenerator {
    versions: Mutex<BTreeMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl PartGenerator {
    fn new() -> Self {
        Self {
            versions: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator<String> for PartGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _history: &[Message],
    ) -> Result<Generation<String>, ProviderError> {
        let key = PART_KEYS
            .iter()
            .find(|key| prompt.contains(&format!("\"{}\"", key)))
            .expect("prompt names a known part key")
            .to_string();
        self.calls.lock().unwrap().push(key.clone());

        let mut versions = self.versions.lock().unwrap();
        let version = versions.entry(key.clone()).or_insert(0);
        *version += 1;
        let artifact = format!("{}-v{}", key, version);
        Ok(Generation {
            artifact: artifact.clone(),
            messages: vec![Message::user(prompt), Message::assistant(artifact)],
        })
    }
}

/// Pre-check that pops scripted issue lists, one per round.
struct ScriptedPreCheck {
    rounds: Mutex<VecDeque<Vec<Issue>>>,
}

impl ScriptedPreCheck {
    fn new(rounds: impl IntoIterator<Item = Vec<Issue>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().collect()),
        }
    }
}

impl PreCheck<String> for ScriptedPreCheck {
    fn validate(&self, _parts: &BTreeMap<String, String>, _expected: &[String]) -> Vec<Issue> {
        self.rounds.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Critic over the part mapping; records the valid subset it was shown.
struct ScriptedPartCritic {
    verdicts: Mutex<VecDeque<Verdict>>,
    seen_keys: Mutex<Vec<Vec<String>>>,
}

impl ScriptedPartCritic {
    fn new(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into_iter().collect()),
            seen_keys: Mutex::new(Vec::new()),
        }
    }

    fn seen_keys(&self) -> Vec<Vec<String>> {
        self.seen_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl Critic<BTreeMap<String, String>> for ScriptedPartCritic {
    async fn critique(
        &self,
        artifact: &BTreeMap<String, String>,
        _task: &TaskSpec,
    ) -> Result<Verdict, ProviderError> {
        self.seen_keys
            .lock()
            .unwrap()
            .push(artifact.keys().cloned().collect());
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .expect("part critic script exhausted"))
    }
}

fn part_keys() -> Vec<String> {
    PART_KEYS.iter().map(|key| key.to_string()).collect()
}

#[tokio::test]
async fn regenerates_only_critically_flagged_parts() {
    let generator = PartGenerator::new();
    let precheck = ScriptedPreCheck::new([
        vec![Issue::critical(
            IssueKind::FileMissing,
            "detail_1",
            "detail_1 image file does not exist",
            "regenerate detail_1",
        )],
        vec![],
    ]);
    let critic = ScriptedPartCritic::new([passing_verdict(), passing_verdict()]);
    let partitioned = PartitionedLoop::new(&generator, &critic, &precheck, logger());

    let run = partitioned.run(&task(), &part_keys()).await.unwrap();

    assert!(run.converged);
    assert_eq!(run.rounds, 2);

    // Accepted parts survive byte-identical; only the flagged part was redone.
    assert_eq!(run.parts["cover"], "cover-v1");
    assert_eq!(run.parts["detail_2"], "detail_2-v1");
    assert_eq!(run.parts["detail_1"], "detail_1-v2");

    let calls = generator.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[3], "detail_1");

    // Round 1 critique only saw the structurally valid subset.
    assert_eq!(critic.seen_keys()[0], vec!["cover", "detail_2"]);
}

#[tokio::test]
async fn warnings_alone_stop_the_loop() {
    let generator = PartGenerator::new();
    let precheck = ScriptedPreCheck::new([vec![]]);
    let warning = |desc: &str| {
        Issue::new(
            IssueKind::StyleMismatch,
            Severity::Warning,
            "cover",
            desc,
            "tighten the style",
        )
    };
    // Five warnings: score 50, no criticals. Fails the gate but leaves no
    // regeneration target, so the loop accepts the same round.
    let critic = ScriptedPartCritic::new([Verdict {
        passed: false,
        score: 50.0,
        issues: (0..5).map(|i| warning(&format!("style issue {}", i))).collect(),
        summary: "style drifts".to_string(),
    }]);
    let partitioned =
        PartitionedLoop::new(&generator, &critic, &precheck, logger()).with_max_iterations(3);

    let run = partitioned.run(&task(), &part_keys()).await.unwrap();

    assert!(!run.converged);
    assert_eq!(run.rounds, 1);
    assert!(!run.verdict.passed);
    assert_eq!(generator.calls().len(), 3);
}

#[tokio::test]
async fn skips_critique_when_nothing_is_structurally_valid() {
    let generator = PartGenerator::new();
    let all_critical: Vec<Issue> = PART_KEYS
        .iter()
        .map(|key| {
            Issue::critical(
                IssueKind::FileTooSmall,
                *key,
                format!("{} is truncated", key),
                "regenerate",
            )
        })
        .collect();
    let precheck = ScriptedPreCheck::new([all_critical]);
    let critic = ScriptedPartCritic::new([passing_verdict()]);
    let partitioned =
        PartitionedLoop::new(&generator, &critic, &precheck, logger()).with_max_iterations(1);

    let run = partitioned.run(&task(), &part_keys()).await.unwrap();

    assert!(!run.converged);
    assert_eq!(run.rounds, 1);
    // Critic never ran; scoring came from the pre-check issues alone.
    assert!(critic.seen_keys().is_empty());
    assert_eq!(run.verdict.score, 25.0);
}

#[tokio::test]
async fn empty_part_list_returns_clean() {
    let generator = PartGenerator::new();
    let precheck = ScriptedPreCheck::new([]);
    let critic = ScriptedPartCritic::new([]);
    let partitioned = PartitionedLoop::new(&generator, &critic, &precheck, logger());

    let run = partitioned.run(&task(), &[]).await.unwrap();

    assert!(run.converged);
    assert_eq!(run.rounds, 0);
    assert!(run.parts.is_empty());
    assert!(run.verdict.passed);
}

#[tokio::test]
async fn partitioned_budget_exhaustion_returns_best_effort() {
    let generator = PartGenerator::new();
    // detail_1 stays broken every round.
    let broken = || {
        vec![Issue::critical(
            IssueKind::FileMissing,
            "detail_1",
            "still missing",
            "regenerate",
        )]
    };
    let precheck = ScriptedPreCheck::new([broken(), broken()]);
    let critic = ScriptedPartCritic::new([passing_verdict(), passing_verdict()]);
    let partitioned =
        PartitionedLoop::new(&generator, &critic, &precheck, logger()).with_max_iterations(2);

    let run = partitioned.run(&task(), &part_keys()).await.unwrap();

    assert!(!run.converged);
    assert_eq!(run.rounds, 2);
    // Best-effort mapping still contains every produced part.
    assert_eq!(run.parts.len(), 3);
    assert_eq!(run.parts["detail_1"], "detail_1-v2");
}
