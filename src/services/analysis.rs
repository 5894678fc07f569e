// src/services/analysis.rs

//! Scoring of test attempts and per-dimension performance breakdowns.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        question::Question,
        result::{StudentAnswer, SubmittedAnswer},
    },
    utils::html::clean_html,
};

/// Bucket for answers whose question is no longer in the bank.
pub const UNKNOWN_BUCKET: &str = "unknown";
/// Bucket for questions whose Bloom text does not normalise.
pub const UNCLASSIFIED_BUCKET: &str = "unclassified";
/// Bucket for questions without a topic.
pub const GENERAL_TOPIC: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Difficulty,
    Bloom,
    Topic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketStats {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
}

impl BucketStats {
    fn record(&mut self, is_correct: bool) {
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
        self.percentage = percentage(self.correct, self.total);
    }
}

/// `correct / total * 100`, or 0 for an empty bucket.
pub fn percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 / total as f64) * 100.0
}

fn bucket_key(
    answer: &StudentAnswer,
    metadata: &HashMap<i64, Question>,
    dimension: Dimension,
) -> String {
    let Some(question) = metadata.get(&answer.question_id) else {
        return UNKNOWN_BUCKET.to_string();
    };
    match dimension {
        Dimension::Difficulty => question.difficulty.as_str().to_string(),
        Dimension::Bloom => question
            .bloom()
            .map(|level| level.as_str())
            .unwrap_or(UNCLASSIFIED_BUCKET)
            .to_string(),
        Dimension::Topic => question
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(GENERAL_TOPIC)
            .to_string(),
    }
}

/// Groups answers by one dimension of their question.
///
/// Every answer lands in exactly one bucket, so the bucket totals add up to
/// `answers.len()`.
pub fn aggregate_by_dimension(
    answers: &[StudentAnswer],
    metadata: &HashMap<i64, Question>,
    dimension: Dimension,
) -> BTreeMap<String, BucketStats> {
    let mut buckets: BTreeMap<String, BucketStats> = BTreeMap::new();
    for answer in answers {
        buckets
            .entry(bucket_key(answer, metadata, dimension))
            .or_default()
            .record(answer.is_correct);
    }
    buckets
}

/// Full breakdown of one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub overall: BucketStats,
    pub by_difficulty: BTreeMap<String, BucketStats>,
    pub by_bloom: BTreeMap<String, BucketStats>,
    pub by_topic: BTreeMap<String, BucketStats>,
    pub mastered_prerequisites: Vec<String>,
    pub review_prerequisites: Vec<String>,
    pub mastered_objectives: Vec<String>,
    pub review_objectives: Vec<String>,
}

#[derive(Default)]
struct MasterySets {
    mastered: BTreeSet<String>,
    review: BTreeSet<String>,
}

impl MasterySets {
    fn add(&mut self, items: &[String], is_correct: bool) {
        let target = if is_correct { &mut self.mastered } else { &mut self.review };
        target.extend(
            items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned),
        );
    }

    /// Anything missed at least once needs review, even if also answered correctly.
    fn split(self) -> (Vec<String>, Vec<String>) {
        let mastered = self.mastered.difference(&self.review).cloned().collect();
        (mastered, self.review.into_iter().collect())
    }
}

pub fn performance_report(
    answers: &[StudentAnswer],
    metadata: &HashMap<i64, Question>,
) -> PerformanceReport {
    let mut overall = BucketStats::default();
    let mut prerequisites = MasterySets::default();
    let mut objectives = MasterySets::default();

    for answer in answers {
        overall.record(answer.is_correct);
        if let Some(question) = metadata.get(&answer.question_id) {
            prerequisites.add(&question.prerequisites, answer.is_correct);
            objectives.add(&question.learning_objectives, answer.is_correct);
        }
    }

    let (mastered_prerequisites, review_prerequisites) = prerequisites.split();
    let (mastered_objectives, review_objectives) = objectives.split();

    PerformanceReport {
        overall,
        by_difficulty: aggregate_by_dimension(answers, metadata, Dimension::Difficulty),
        by_bloom: aggregate_by_dimension(answers, metadata, Dimension::Bloom),
        by_topic: aggregate_by_dimension(answers, metadata, Dimension::Topic),
        mastered_prerequisites,
        review_prerequisites,
        mastered_objectives,
        review_objectives,
    }
}

/// Outcome of grading a submission against a test's questions.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttempt {
    pub correct: i32,
    pub incorrect: i32,
    pub skipped: i32,
    pub percentage: f64,
    pub answers: Vec<StudentAnswer>,
}

/// Grades `submitted` against the questions of a test, in test order.
///
/// Test questions missing from `questions` are not graded. Submitted entries
/// for questions not on the test are ignored, and a blank answer counts as
/// skipped. Answers go through the same HTML cleaning as stored options, so
/// raw text such as `a & b` matches its stored form `a &amp; b`, then match
/// the key after trimming surrounding whitespace.
pub fn score_attempt(
    question_ids: &[i64],
    submitted: &[SubmittedAnswer],
    questions: &HashMap<i64, Question>,
    now: DateTime<Utc>,
) -> ScoredAttempt {
    let by_question: HashMap<i64, String> = submitted
        .iter()
        .filter_map(|s| {
            let answer = clean_html(s.answer.as_deref()?).trim().to_owned();
            (!answer.is_empty()).then_some((s.question_id, answer))
        })
        .collect();

    let mut correct = 0;
    let mut incorrect = 0;
    let mut skipped = 0;
    let mut answers = Vec::with_capacity(question_ids.len());

    for id in question_ids {
        let Some(question) = questions.get(id) else {
            continue;
        };
        let answer = by_question.get(id).map(String::as_str);
        let is_correct = answer.is_some_and(|a| a == question.correct_option.trim());
        match (answer, is_correct) {
            (None, _) => skipped += 1,
            (Some(_), true) => correct += 1,
            (Some(_), false) => incorrect += 1,
        }
        answers.push(StudentAnswer {
            question_id: *id,
            question_text: question.text.clone(),
            answer: answer.map(ToOwned::to_owned),
            is_correct,
            answered_at: now,
        });
    }

    let graded = (correct + incorrect + skipped) as u32;
    ScoredAttempt {
        correct,
        incorrect,
        skipped,
        percentage: percentage(correct as u32, graded),
        answers,
    }
}
