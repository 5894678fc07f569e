// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::{
    pagination::{MAX_PAGE_LIMIT, default_limit},
    scope::ScopeFilter,
};
use crate::utils::html::clean_html;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Question difficulty, stored as the `difficulty_level` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficulty_level", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Bloom's taxonomy category.
///
/// Questions store the level as free text, so matching goes through
/// [`BloomLevel::parse`] rather than strict equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remember,
        BloomLevel::Understand,
        BloomLevel::Apply,
        BloomLevel::Analyze,
        BloomLevel::Evaluate,
        BloomLevel::Create,
    ];

    /// Loose, case-insensitive normalisation of a free-text level.
    ///
    /// Matches on word stems so "Applying", "application" and "APPLY" all map to
    /// `Apply`. The first level (in taxonomy order) whose stem occurs wins.
    pub fn parse(raw: &str) -> Option<BloomLevel> {
        let text = raw.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|level| level.stems().iter().any(|stem| text.contains(stem)))
    }

    /// `ILIKE` patterns equivalent to [`BloomLevel::parse`] returning `self`:
    /// the text must match one of the first list and none of the second, which
    /// holds the stems of every earlier level.
    pub fn like_patterns(self) -> (Vec<String>, Vec<String>) {
        let pattern = |stem: &&str| format!("%{}%", stem);
        let matching = self.stems().iter().map(pattern).collect();
        let shadowing = Self::ALL
            .into_iter()
            .take_while(|level| *level != self)
            .flat_map(|level| level.stems().iter().map(pattern))
            .collect();
        (matching, shadowing)
    }

    fn stems(self) -> &'static [&'static str] {
        match self {
            BloomLevel::Remember => &["remember", "knowledge", "recall", "recogni"],
            BloomLevel::Understand => &["understand", "comprehen"],
            BloomLevel::Apply => &["appl"],
            BloomLevel::Analyze => &["analy"],
            BloomLevel::Evaluate => &["evaluat"],
            BloomLevel::Create => &["creat", "synthes"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BloomLevel::Remember => "remember",
            BloomLevel::Understand => "understand",
            BloomLevel::Apply => "apply",
            BloomLevel::Analyze => "analyze",
            BloomLevel::Evaluate => "evaluate",
            BloomLevel::Create => "create",
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The text of the question (sanitised HTML).
    pub text: String,

    /// Exactly four answer options, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Text of the correct option.
    pub correct_option: String,

    pub explanation: Option<String>,
    pub solution: Option<String>,

    pub difficulty: Difficulty,

    /// Free-text Bloom level as entered by the author.
    pub bloom_level: Option<String>,

    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub lesson_id: Option<i64>,

    pub topic: Option<String>,
    pub prerequisites: Json<Vec<String>>,
    pub learning_objectives: Json<Vec<String>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn bloom(&self) -> Option<BloomLevel> {
        self.bloom_level.as_deref().and_then(BloomLevel::parse)
    }
}

/// Columns selected whenever a full `Question` row is loaded.
pub const QUESTION_COLUMNS: &str = "\
    id, text, options, correct_option, explanation, solution, difficulty, bloom_level, \
    class_id, subject_id, chapter_id, lesson_id, topic, prerequisites, learning_objectives, \
    created_at";

/// DTO for sending a question to a student (no answer key, explanation or solution).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Json<Vec<String>>,
    pub difficulty: Difficulty,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            difficulty: q.difficulty,
        }
    }
}

/// DTO for creating or fully replacing a question.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_option: String,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    #[validate(length(max = 4000))]
    pub solution: Option<String>,
    pub difficulty: Difficulty,
    #[validate(length(max = 100))]
    pub bloom_level: Option<String>,
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub lesson_id: Option<i64>,
    #[validate(length(max = 200))]
    pub topic: Option<String>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub learning_objectives: Vec<String>,
}

impl CreateQuestionRequest {
    /// Strips unsafe markup from every author-supplied text field.
    pub fn sanitized(mut self) -> Self {
        self.text = clean_html(&self.text);
        self.options = self.options.iter().map(|o| clean_html(o)).collect();
        self.correct_option = clean_html(&self.correct_option);
        self.explanation = self.explanation.as_deref().map(clean_html);
        self.solution = self.solution.as_deref().map(clean_html);
        self.topic = self
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    /// The answer key must be one of the options.
    pub fn check_answer_key(&self) -> Result<(), String> {
        if self.options.iter().any(|o| o == &self.correct_option) {
            Ok(())
        } else {
            Err("correct_option must match one of the options".to_string())
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() != OPTION_COUNT {
        return Err(validator::ValidationError::new("options_must_have_four_entries"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 50 {
        return Err(validator::ValidationError::new("too_many_entries"));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 300) {
        return Err(validator::ValidationError::new("invalid_entry"));
    }
    Ok(())
}

/// Query parameters for listing questions.
#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub lesson_id: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub bloom: Option<BloomLevel>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl QuestionListParams {
    /// `(skip, limit)` clamped to sane bounds.
    pub fn page(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(1, MAX_PAGE_LIMIT))
    }

    pub fn scope(&self) -> ScopeFilter {
        ScopeFilter {
            class_id: self.class_id,
            subject_id: self.subject_id,
            chapter_id: self.chapter_id,
            lesson_id: self.lesson_id,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_question(id: i64, difficulty: Difficulty, bloom: Option<&str>) -> Question {
    Question {
        id,
        text: format!("Question {}", id),
        options: Json(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
        correct_option: "A".into(),
        explanation: None,
        solution: None,
        difficulty,
        bloom_level: bloom.map(ToOwned::to_owned),
        class_id: Some(1),
        subject_id: Some(1),
        chapter_id: None,
        lesson_id: None,
        topic: None,
        prerequisites: Json(Vec::new()),
        learning_objectives: Json(Vec::new()),
        created_at: None,
    }
}
