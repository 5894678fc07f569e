// src/models/scope.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One level of the class → subject → chapter → lesson hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Class,
    Subject,
    Chapter,
    Lesson,
}

impl ScopeLevel {
    /// Parses the `{level}` path segment. Accepts singular and plural forms.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment.trim().to_ascii_lowercase().as_str() {
            "class" | "classes" => Some(ScopeLevel::Class),
            "subject" | "subjects" => Some(ScopeLevel::Subject),
            "chapter" | "chapters" => Some(ScopeLevel::Chapter),
            "lesson" | "lessons" => Some(ScopeLevel::Lesson),
            _ => None,
        }
    }

    /// Table holding the nodes of this level.
    pub fn table(self) -> &'static str {
        match self {
            ScopeLevel::Class => "classes",
            ScopeLevel::Subject => "subjects",
            ScopeLevel::Chapter => "chapters",
            ScopeLevel::Lesson => "lessons",
        }
    }

    /// The level directly above this one, if any.
    pub fn parent(self) -> Option<ScopeLevel> {
        match self {
            ScopeLevel::Class => None,
            ScopeLevel::Subject => Some(ScopeLevel::Class),
            ScopeLevel::Chapter => Some(ScopeLevel::Subject),
            ScopeLevel::Lesson => Some(ScopeLevel::Chapter),
        }
    }

    /// Column holding the parent reference, `None` for classes.
    pub fn parent_column(self) -> Option<&'static str> {
        self.parent().map(ScopeLevel::question_column)
    }

    /// Column on `questions` that references this level.
    pub fn question_column(self) -> &'static str {
        match self {
            ScopeLevel::Class => "class_id",
            ScopeLevel::Subject => "subject_id",
            ScopeLevel::Chapter => "chapter_id",
            ScopeLevel::Lesson => "lesson_id",
        }
    }
}

/// A row of any of the scope tables. `parent_id` is NULL for classes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScopeNode {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a scope node.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateScopeRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    pub parent_id: Option<i64>,
}

/// Query parameters for listing scope nodes.
#[derive(Debug, Deserialize)]
pub struct ScopeListParams {
    pub parent_id: Option<i64>,
}

/// Hierarchical filter narrowing the question pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub chapter_id: Option<i64>,
    pub lesson_id: Option<i64>,
}

impl ScopeFilter {
    /// The deepest level that is set. Only this level is used to fetch the pool.
    pub fn most_specific(&self) -> Option<(ScopeLevel, i64)> {
        self.lesson_id
            .map(|id| (ScopeLevel::Lesson, id))
            .or(self.chapter_id.map(|id| (ScopeLevel::Chapter, id)))
            .or(self.subject_id.map(|id| (ScopeLevel::Subject, id)))
            .or(self.class_id.map(|id| (ScopeLevel::Class, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_prefers_deepest_level() {
        let filter = ScopeFilter {
            class_id: Some(1),
            subject_id: Some(2),
            chapter_id: Some(3),
            lesson_id: None,
        };
        assert_eq!(filter.most_specific(), Some((ScopeLevel::Chapter, 3)));

        let filter = ScopeFilter {
            lesson_id: Some(9),
            class_id: Some(1),
            ..Default::default()
        };
        assert_eq!(filter.most_specific(), Some((ScopeLevel::Lesson, 9)));
    }

    #[test]
    fn empty_filter_has_no_scope() {
        assert_eq!(ScopeFilter::default().most_specific(), None);
    }

    #[test]
    fn path_segments_parse_both_forms() {
        assert_eq!(ScopeLevel::from_path("classes"), Some(ScopeLevel::Class));
        assert_eq!(ScopeLevel::from_path("Lesson"), Some(ScopeLevel::Lesson));
        assert_eq!(ScopeLevel::from_path("topics"), None);
    }

    #[test]
    fn parents_walk_up_the_hierarchy() {
        assert_eq!(ScopeLevel::Lesson.parent(), Some(ScopeLevel::Chapter));
        assert_eq!(ScopeLevel::Subject.parent(), Some(ScopeLevel::Class));
        assert_eq!(ScopeLevel::Class.parent(), None);
        assert_eq!(ScopeLevel::Chapter.parent_column(), Some("subject_id"));
        assert_eq!(ScopeLevel::Class.parent_column(), None);
    }
}
