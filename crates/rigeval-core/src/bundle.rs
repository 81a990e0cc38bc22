use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

use crate::config::BundleConfig;
use crate::error::{PipelineError, Stage};
use crate::types::RunMode;

/// One answer file of a bundle with the agent and mode read from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFile {
    pub agent: String,
    pub mode: RunMode,
    pub path: PathBuf,
}

/// Input files of one repository: ground truth, answer key and answer sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBundle {
    /// Path of the bundle directory relative to the comparison root.
    pub repository: String,
    pub dir: PathBuf,
    pub ground_truth: PathBuf,
    pub questions: PathBuf,
    pub answers: Vec<AnswerFile>,
}

impl InputBundle {
    pub fn read_ground_truth(&self) -> Result<String> {
        std::fs::read_to_string(&self.ground_truth).with_context(|| {
            format!(
                "failed to read ground truth '{}'",
                self.ground_truth.display()
            )
        })
    }
}

/// File-name matchers compiled from `[bundle]`.
#[derive(Debug, Clone)]
pub struct BundleMatcher {
    ground_truth: GlobMatcher,
    questions: GlobMatcher,
    answers: GlobMatcher,
    with_suffix: String,
    without_suffix: String,
}

impl BundleMatcher {
    pub fn new(config: &BundleConfig) -> Result<Self> {
        let compile = |pattern: &str| -> Result<GlobMatcher> {
            Ok(Glob::new(pattern)
                .with_context(|| format!("invalid bundle pattern '{pattern}'"))?
                .compile_matcher())
        };
        Ok(Self {
            ground_truth: compile(&config.ground_truth)?,
            questions: compile(&config.questions)?,
            answers: compile(&config.answers)?,
            with_suffix: config.with_metadata_suffix.clone(),
            without_suffix: config.without_metadata_suffix.clone(),
        })
    }

    /// Agent and mode from an answer file name such as `claude_RIG_answers.json`.
    pub fn parse_answer_name(&self, file_name: &str) -> Option<(String, RunMode)> {
        let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
        let stem = stem.strip_suffix("_answers").unwrap_or(stem);

        // Longest suffix first so one suffix never shadows the other.
        let mut suffixes = [
            (self.with_suffix.as_str(), RunMode::WithMetadata),
            (self.without_suffix.as_str(), RunMode::WithoutMetadata),
        ];
        suffixes.sort_by_key(|(s, _)| std::cmp::Reverse(s.len()));

        suffixes.into_iter().find_map(|(suffix, mode)| {
            stem.strip_suffix(suffix)
                .filter(|agent| !agent.is_empty())
                .map(|agent| (agent.to_string(), mode))
        })
    }
}

fn file_names_matching(dir: &Path, matcher: &GlobMatcher) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list '{}'", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

fn repository_id(root: &Path, dir: &Path) -> String {
    let relative: Vec<String> = dir
        .strip_prefix(root)
        .unwrap_or(dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if relative.is_empty() {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    } else {
        relative.join("/")
    }
}

/// Find every bundle below `root`, recursively, in path order.
///
/// A directory is a bundle when it holds a ground-truth file. `skip` (the
/// output directory) is never descended into. Symlinked directories are
/// followed; any walk error (unreadable directory, link loop) is fatal.
pub fn discover(
    root: &Path,
    config: &BundleConfig,
    skip: Option<&Path>,
) -> Result<Vec<InputBundle>, PipelineError> {
    let matcher = BundleMatcher::new(config).map_err(|e| PipelineError::new(Stage::Discover, e))?;
    if !root.is_dir() {
        return Err(PipelineError::new(
            Stage::Discover,
            anyhow!("comparison root '{}' is not a directory", root.display()),
        ));
    }

    let mut bundle_dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| skip != Some(e.path()))
    {
        let entry = entry.map_err(|e| PipelineError::new(Stage::Discover, e))?;
        if !entry.file_type().is_file() || !matcher.ground_truth.is_match(entry.file_name()) {
            continue;
        }
        if let Some(dir) = entry.path().parent() {
            if bundle_dirs.last().map(PathBuf::as_path) != Some(dir) {
                bundle_dirs.push(dir.to_path_buf());
            }
        }
    }
    bundle_dirs.sort();
    bundle_dirs.dedup();

    let mut bundles = Vec::with_capacity(bundle_dirs.len());
    for dir in bundle_dirs {
        let repository = repository_id(root, &dir);
        let bundle = load_bundle(&matcher, config, &dir, &repository).map_err(|e| {
            PipelineError::new(Stage::Discover, e).in_repository(repository.clone())
        })?;
        tracing::debug!(
            repository = %bundle.repository,
            answers = bundle.answers.len(),
            "discovered bundle"
        );
        bundles.push(bundle);
    }
    Ok(bundles)
}

fn load_bundle(
    matcher: &BundleMatcher,
    config: &BundleConfig,
    dir: &Path,
    repository: &str,
) -> Result<InputBundle> {
    let ground_truths = file_names_matching(dir, &matcher.ground_truth)?;
    let ground_truth = ground_truths
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("ground truth vanished from '{}'", dir.display()))?;
    if ground_truths.len() > 1 {
        tracing::warn!(
            repository,
            "several ground-truth files, using '{}'",
            ground_truth.display()
        );
    }

    let questions = file_names_matching(dir, &matcher.questions)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no answer key matching '{}' in '{}'", config.questions, dir.display()))?;

    let mut answers = Vec::new();
    for path in file_names_matching(dir, &matcher.answers)? {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match matcher.parse_answer_name(&file_name) {
            Some((agent, mode)) => answers.push(AnswerFile { agent, mode, path }),
            None => tracing::warn!(
                repository,
                "skipping '{file_name}': name ends in neither '{}' nor '{}'",
                config.with_metadata_suffix,
                config.without_metadata_suffix
            ),
        }
    }

    Ok(InputBundle {
        repository: repository.to_string(),
        dir: dir.to_path_buf(),
        ground_truth,
        questions,
        answers,
    })
}
