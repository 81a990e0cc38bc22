use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{round1, RunMode};

/// Build-artifact extensions ignored when comparing names.
const ARTIFACT_EXTENSIONS: &[&str] = &[".exe", ".lib", ".dll", ".so", ".a", ".dylib", ".out"];

/// Groups of spellings that name the same thing.
const ALIAS_GROUPS: &[&[&str]] = &[&["cxx", "c++", "cpp"], &["static_library", "library"]];

/// How an answer is compared against the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPolicy {
    /// Full credit iff the values are equivalent.
    ScalarEquality,
    /// Full credit iff both collections hold the same elements; no partial credit.
    ExactSet,
    /// Credit = matched expected elements / expected elements.
    SubsetOverlap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyQuestion {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub policy: QuestionPolicy,
    pub expected_answer: Value,
    /// Further acceptable answers.
    #[serde(default)]
    pub alternatives: Vec<Value>,
}

/// Ground-truth answer key of one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerKey {
    pub questions: Vec<KeyQuestion>,
}

impl AnswerKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid answer key")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read answer key '{}'", path.display()))?;
        Self::from_json(&content).with_context(|| format!("in '{}'", path.display()))
    }
}

#[derive(Debug, Deserialize)]
struct RawAnswerFile {
    #[serde(alias = "agent_completion_time_seconds")]
    elapsed_seconds: f64,
    /// Map of id -> answer, or a list of `{"id", "answer"}` entries.
    #[serde(default)]
    answers: Value,
}

/// Answers by question id. Entries that cannot be read are skipped so their
/// questions score 0.
fn answers_by_id(raw: Value, repository: &str, agent: &str) -> BTreeMap<String, Value> {
    match raw {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(entries) => {
            let mut answers = BTreeMap::new();
            for (position, entry) in entries.into_iter().enumerate() {
                let Value::Object(mut fields) = entry else {
                    tracing::warn!(
                        repository,
                        agent,
                        "answer entry {position} is not an object, skipped"
                    );
                    continue;
                };
                let id = match fields.remove("id") {
                    Some(Value::String(s)) => s,
                    Some(Value::Number(n)) => n.to_string(),
                    _ => {
                        tracing::warn!(
                            repository,
                            agent,
                            "answer entry {position} has no usable id, skipped"
                        );
                        continue;
                    }
                };
                let answer = fields.remove("answer").unwrap_or(Value::Null);
                answers.insert(id, answer);
            }
            answers
        }
        Value::Null => BTreeMap::new(),
        other => {
            tracing::warn!(repository, agent, "answers must be a map or a list, got {other}");
            BTreeMap::new()
        }
    }
}

/// One (repository, agent, mode) run: answers by question id plus wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSet {
    pub repository: String,
    pub agent: String,
    pub mode: RunMode,
    pub answers: BTreeMap<String, Value>,
    pub elapsed_seconds: f64,
}

impl AnswerSet {
    pub fn from_json(repository: &str, agent: &str, mode: RunMode, json: &str) -> Result<Self> {
        let raw: RawAnswerFile = serde_json::from_str(json).context("invalid answer bundle")?;
        let answers = answers_by_id(raw.answers, repository, agent);
        Ok(Self {
            repository: repository.to_string(),
            agent: agent.to_string(),
            mode,
            answers,
            elapsed_seconds: raw.elapsed_seconds,
        })
    }

    pub fn load(path: &Path, repository: &str, agent: &str, mode: RunMode) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read answers '{}'", path.display()))?;
        Self::from_json(repository, agent, mode, &content)
            .with_context(|| format!("in '{}'", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub id: String,
    /// Fraction of credit earned, 0.0..=1.0.
    pub credit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Credit earned within one difficulty or category bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketScore {
    pub earned: f64,
    pub max: usize,
    pub percentage: f64,
}

fn add_to_bucket(
    buckets: &mut BTreeMap<String, BucketScore>,
    name: Option<&str>,
    fallback: &str,
    credit: f64,
) {
    let entry = buckets
        .entry(name.unwrap_or(fallback).to_string())
        .or_insert(BucketScore {
            earned: 0.0,
            max: 0,
            percentage: 0.0,
        });
    entry.earned += credit;
    entry.max += 1;
}

fn finish_buckets(buckets: &mut BTreeMap<String, BucketScore>) {
    for bucket in buckets.values_mut() {
        bucket.percentage = round1(bucket.earned / bucket.max as f64 * 100.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub repository: String,
    pub agent: String,
    pub mode: RunMode,
    pub per_question: Vec<QuestionScore>,
    pub accuracy_pct: f64,
    pub elapsed_seconds: f64,
    pub by_difficulty: BTreeMap<String, BucketScore>,
    #[serde(default)]
    pub by_category: BTreeMap<String, BucketScore>,
}

/// Score one answer set against its key. Never fails: missing or unusable
/// answers earn zero for their question.
pub fn evaluate(answers: &AnswerSet, key: &AnswerKey) -> EvaluationResult {
    for id in answers.answers.keys() {
        if !key.questions.iter().any(|q| &q.id == id) {
            tracing::warn!(
                repository = %answers.repository,
                agent = %answers.agent,
                "answer for unknown question '{id}' ignored"
            );
        }
    }

    let mut per_question = Vec::with_capacity(key.questions.len());
    let mut by_difficulty = BTreeMap::new();
    let mut by_category = BTreeMap::new();

    for question in &key.questions {
        let (credit, note) = match answers.answers.get(&question.id) {
            None | Some(Value::Null) => (0.0, Some("missing answer".to_string())),
            Some(answer) => {
                let credit = question_credit(question, answer);
                let note = if credit == 0.0 {
                    Some("incorrect".to_string())
                } else if credit < 1.0 {
                    Some("partial credit".to_string())
                } else {
                    None
                };
                (credit, note)
            }
        };

        add_to_bucket(&mut by_difficulty, question.difficulty.as_deref(), "unspecified", credit);
        add_to_bucket(&mut by_category, question.category.as_deref(), "uncategorized", credit);

        per_question.push(QuestionScore {
            id: question.id.clone(),
            credit,
            difficulty: question.difficulty.clone(),
            category: question.category.clone(),
            note,
        });
    }

    finish_buckets(&mut by_difficulty);
    finish_buckets(&mut by_category);

    let accuracy_pct = if per_question.is_empty() {
        0.0
    } else {
        let earned: f64 = per_question.iter().map(|q| q.credit).sum();
        round1(earned / per_question.len() as f64 * 100.0)
    };

    EvaluationResult {
        repository: answers.repository.clone(),
        agent: answers.agent.clone(),
        mode: answers.mode,
        per_question,
        accuracy_pct,
        elapsed_seconds: answers.elapsed_seconds,
        by_difficulty,
        by_category,
    }
}

/// Best credit over the expected answer and its alternatives.
pub fn question_credit(question: &KeyQuestion, answer: &Value) -> f64 {
    let answer = canonicalize(answer);
    std::iter::once(&question.expected_answer)
        .chain(question.alternatives.iter())
        .map(|expected| credit_for(question.policy, &canonicalize(expected), &answer))
        .fold(0.0, f64::max)
}

fn credit_for(policy: QuestionPolicy, expected: &Value, answer: &Value) -> f64 {
    match policy {
        QuestionPolicy::ScalarEquality => {
            if equivalent(expected, answer) {
                1.0
            } else {
                0.0
            }
        }
        QuestionPolicy::ExactSet => {
            let expected = as_collection(expected);
            let answer = as_collection(answer);
            if expected.len() == answer.len() && matched_count(&expected, &answer) == expected.len()
            {
                1.0
            } else {
                0.0
            }
        }
        QuestionPolicy::SubsetOverlap => {
            let expected = as_collection(expected);
            let answer = as_collection(answer);
            if expected.is_empty() {
                return if answer.is_empty() { 1.0 } else { 0.0 };
            }
            matched_count(&expected, &answer) as f64 / expected.len() as f64
        }
    }
}

/// A scalar stands for a one-element collection.
fn as_collection(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Greedy one-to-one matching of expected elements against answer elements.
fn matched_count(expected: &[Value], answer: &[Value]) -> usize {
    let mut used = vec![false; answer.len()];
    let mut matched = 0;
    for e in expected {
        if let Some(i) = (0..answer.len()).find(|&i| !used[i] && equivalent(e, &answer[i])) {
            used[i] = true;
            matched += 1;
        }
    }
    matched
}

/// Canonical form: normalized strings, integral numbers as integers,
/// arrays sorted and deduplicated. Object key order is already irrelevant.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(canonical_str(s)),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(f as i64),
            _ => value.clone(),
        },
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonicalize).collect();
            items.sort_by_key(|v| v.to_string());
            items.dedup();
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        ),
        Value::Bool(_) | Value::Null => value.clone(),
    }
}

fn canonical_str(s: &str) -> String {
    let s = s.trim().replace('\\', "/");
    let s = if s.len() > 1 { s.trim_end_matches('/') } else { s.as_str() };
    s.to_lowercase()
}

fn strip_artifact_extension(s: &str) -> &str {
    ARTIFACT_EXTENSIONS
        .iter()
        .find_map(|ext| s.strip_suffix(ext))
        .unwrap_or(s)
}

fn aliases(a: &str, b: &str) -> bool {
    ALIAS_GROUPS
        .iter()
        .any(|group| group.contains(&a) && group.contains(&b))
}

/// Lenient equivalence on canonical values.
pub fn equivalent(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(x), Ok(y)) => x == y,
                _ => false,
            }
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => {
            strip_artifact_extension(x) == strip_artifact_extension(y) || aliases(x, y)
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && matched_count(x, y) == x.len()
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| equivalent(v, other)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(id: &str, policy: QuestionPolicy, expected: Value) -> KeyQuestion {
        KeyQuestion {
            id: id.to_string(),
            question: String::new(),
            difficulty: None,
            category: None,
            policy,
            expected_answer: expected,
            alternatives: Vec::new(),
        }
    }

    fn answer_set(answers: Value) -> AnswerSet {
        AnswerSet::from_json(
            "repo",
            "claude",
            RunMode::WithMetadata,
            &json!({"elapsed_seconds": 10.0, "answers": answers}).to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_string_canonicalization() {
        assert!(equivalent(
            &canonicalize(&json!("Src\\Lib\\")),
            &canonicalize(&json!("src/lib"))
        ));
        assert!(equivalent(&canonicalize(&json!("hello.exe")), &canonicalize(&json!("HELLO"))));
        assert!(equivalent(&canonicalize(&json!("C++")), &canonicalize(&json!("cxx"))));
        assert!(equivalent(
            &canonicalize(&json!("static_library")),
            &canonicalize(&json!("library"))
        ));
        assert!(!equivalent(&canonicalize(&json!("cxx")), &canonicalize(&json!("java"))));
    }

    #[test]
    fn test_numeric_string_equals_number() {
        assert!(equivalent(&canonicalize(&json!("16")), &canonicalize(&json!(16))));
        assert!(equivalent(&canonicalize(&json!(3.0)), &canonicalize(&json!(3))));
        assert!(!equivalent(&canonicalize(&json!("sixteen")), &canonicalize(&json!(16))));
    }

    #[test]
    fn test_object_key_order_ignored() {
        let a = canonicalize(&json!({"name": "core", "deps": ["b", "a"]}));
        let b = canonicalize(&json!({"deps": ["a", "b", "a"], "name": "Core"}));
        assert!(equivalent(&a, &b));
    }

    #[test]
    fn test_exact_set_has_no_partial_credit() {
        let q = question("q", QuestionPolicy::ExactSet, json!(["a", "b", "c"]));
        assert!((question_credit(&q, &json!(["c", "a", "b"])) - 1.0).abs() < f64::EPSILON);
        assert_eq!(question_credit(&q, &json!(["a", "b"])), 0.0);
        assert_eq!(question_credit(&q, &json!(["a", "b", "c", "d"])), 0.0);
    }

    #[test]
    fn test_subset_overlap_partial_credit() {
        let q = question("q", QuestionPolicy::SubsetOverlap, json!(["a", "b", "c", "d"]));
        assert!((question_credit(&q, &json!(["a", "B"])) - 0.5).abs() < f64::EPSILON);
        // Superset: every expected element is present.
        assert!((question_credit(&q, &json!(["a", "b", "c", "d", "e"])) - 1.0).abs() < f64::EPSILON);
        assert_eq!(question_credit(&q, &json!(["x"])), 0.0);
        // Scalar answer counts as a one-element collection.
        assert!((question_credit(&q, &json!("c")) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_subset_overlap_empty_expected() {
        let q = question("q", QuestionPolicy::SubsetOverlap, json!([]));
        assert!((question_credit(&q, &json!([])) - 1.0).abs() < f64::EPSILON);
        assert_eq!(question_credit(&q, &json!(["a"])), 0.0);
    }

    #[test]
    fn test_alternatives_take_best_credit() {
        let mut q = question("q", QuestionPolicy::ScalarEquality, json!(3));
        q.alternatives = vec![json!(4)];
        assert!((question_credit(&q, &json!("4")) - 1.0).abs() < f64::EPSILON);
        assert_eq!(question_credit(&q, &json!(5)), 0.0);
    }

    #[test]
    fn test_missing_and_malformed_answers_score_zero() {
        let key = AnswerKey {
            questions: vec![
                question("q1", QuestionPolicy::ScalarEquality, json!(2)),
                question("q2", QuestionPolicy::ExactSet, json!(["a"])),
                question("q3", QuestionPolicy::SubsetOverlap, json!(["a", "b"])),
            ],
        };
        let set = answer_set(json!({"q1": 2, "q2": {"weird": true}, "q3": null}));
        let result = evaluate(&set, &key);
        assert_eq!(result.per_question.len(), 3);
        assert!((result.per_question[0].credit - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.per_question[1].credit, 0.0);
        assert_eq!(result.per_question[2].credit, 0.0);
        assert_eq!(result.per_question[2].note.as_deref(), Some("missing answer"));
        assert!((result.accuracy_pct - 33.3).abs() < 1e-9);
    }

    #[test]
    fn test_answer_order_does_not_change_accuracy() {
        let key = AnswerKey {
            questions: vec![
                question("q1", QuestionPolicy::ScalarEquality, json!("cmake")),
                question("q2", QuestionPolicy::SubsetOverlap, json!(["x", "y", "z"])),
                question("q3", QuestionPolicy::ScalarEquality, json!(7)),
            ],
        };
        let forward = AnswerSet::from_json(
            "repo",
            "codex",
            RunMode::WithoutMetadata,
            r#"{"elapsed_seconds": 5, "answers": [
                {"id": "q1", "answer": "CMake"},
                {"id": "q2", "answer": ["x", "z"]},
                {"id": "q3", "answer": 8}
            ]}"#,
        )
        .unwrap();
        let reversed = AnswerSet::from_json(
            "repo",
            "codex",
            RunMode::WithoutMetadata,
            r#"{"agent_completion_time_seconds": 5, "answers": [
                {"id": "q3", "answer": 8},
                {"id": "q2", "answer": ["z", "x"]},
                {"id": "q1", "answer": "CMake"}
            ]}"#,
        )
        .unwrap();
        let a = evaluate(&forward, &key);
        let b = evaluate(&reversed, &key);
        assert!((a.accuracy_pct - b.accuracy_pct).abs() < f64::EPSILON);
        assert!((a.accuracy_pct - 55.6).abs() < 1e-9);
    }

    #[test]
    fn test_difficulty_breakdown() {
        let mut easy = question("q1", QuestionPolicy::ScalarEquality, json!(1));
        easy.difficulty = Some("easy".to_string());
        let mut hard = question("q2", QuestionPolicy::ScalarEquality, json!(2));
        hard.difficulty = Some("hard".to_string());
        let key = AnswerKey {
            questions: vec![easy, hard],
        };
        let result = evaluate(&answer_set(json!({"q1": 1, "q2": 3})), &key);
        assert!((result.by_difficulty["easy"].percentage - 100.0).abs() < f64::EPSILON);
        assert_eq!(result.by_difficulty["hard"].percentage, 0.0);
        assert_eq!(result.by_difficulty["hard"].max, 1);
        assert_eq!(result.by_category["uncategorized"].max, 2);
    }

    #[test]
    fn test_category_breakdown() {
        let mut build = question("q1", QuestionPolicy::ScalarEquality, json!(1));
        build.category = Some("build_system".to_string());
        let mut deps = question("q2", QuestionPolicy::SubsetOverlap, json!(["a", "b"]));
        deps.category = Some("dependency_analysis".to_string());
        let mut more_deps = question("q3", QuestionPolicy::ScalarEquality, json!("c"));
        more_deps.category = Some("dependency_analysis".to_string());
        let key = AnswerKey {
            questions: vec![build, deps, more_deps],
        };
        let result = evaluate(&answer_set(json!({"q1": 1, "q2": ["a"], "q3": "c"})), &key);
        assert_eq!(result.by_category["build_system"].percentage, 100.0);
        let dependency = &result.by_category["dependency_analysis"];
        assert_eq!(dependency.max, 2);
        assert!((dependency.earned - 1.5).abs() < f64::EPSILON);
        assert_eq!(dependency.percentage, 75.0);
        assert_eq!(result.by_difficulty["unspecified"].max, 3);
    }

    #[test]
    fn test_empty_key_scores_zero() {
        let result = evaluate(&answer_set(json!({"q1": 1})), &AnswerKey::default());
        assert_eq!(result.accuracy_pct, 0.0);
        assert!(result.per_question.is_empty());
    }

    #[test]
    fn test_key_requires_policy() {
        let missing = r#"{"questions": [{"id": "q1", "expected_answer": 1}]}"#;
        assert!(AnswerKey::from_json(missing).is_err());
        let ok = r#"{"questions": [{"id": "q1", "policy": "exact_set", "expected_answer": [1]}]}"#;
        assert_eq!(AnswerKey::from_json(ok).unwrap().questions.len(), 1);
    }

    #[test]
    fn test_malformed_answer_entries_are_skipped() {
        let key = AnswerKey {
            questions: vec![
                question("q1", QuestionPolicy::ScalarEquality, json!(2)),
                question("q2", QuestionPolicy::ScalarEquality, json!(3)),
                question("3", QuestionPolicy::ScalarEquality, json!("x")),
            ],
        };
        let answers = AnswerSet::from_json(
            "repo",
            "claude",
            RunMode::WithMetadata,
            r#"{"elapsed_seconds": 4, "answers": [
                {"id": "q1", "answer": 2},
                {"answer": 3},
                "junk",
                {"id": ["q2"], "answer": 3},
                {"id": 3, "answer": "x"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(answers.answers.len(), 2);

        let result = evaluate(&answers, &key);
        assert_eq!(result.per_question[0].credit, 1.0);
        assert_eq!(result.per_question[1].note.as_deref(), Some("missing answer"));
        assert_eq!(result.per_question[2].credit, 1.0);
        assert!((result.accuracy_pct - 66.7).abs() < 1e-9);
    }

    #[test]
    fn test_unreadable_answers_field_scores_zero() {
        let key = AnswerKey {
            questions: vec![question("q1", QuestionPolicy::ScalarEquality, json!(1))],
        };
        for body in [
            r#"{"elapsed_seconds": 4, "answers": 17}"#,
            r#"{"elapsed_seconds": 4, "answers": null}"#,
            r#"{"elapsed_seconds": 4}"#,
        ] {
            let answers = AnswerSet::from_json("repo", "claude", RunMode::WithMetadata, body)
                .unwrap_or_else(|e| panic!("{body}: {e:#}"));
            let result = evaluate(&answers, &key);
            assert_eq!(result.accuracy_pct, 0.0, "{body}");
            assert_eq!(result.elapsed_seconds, 4.0);
        }
    }
}
