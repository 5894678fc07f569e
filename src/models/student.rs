// src/models/student.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Placeholder shown when a student's class cannot be resolved.
pub const UNASSIGNED_CLASS: &str = "Not Assigned";

/// Represents the 'students' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub class_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub const STUDENT_COLUMNS: &str = "id, name, email, class_id, parent_id, created_at";

/// Represents the 'parents' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Parent {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub const PARENT_COLUMNS: &str = "id, name, email, phone, created_at";

/// A student with its class name and parent resolved for display.
#[derive(Debug, Serialize)]
pub struct StudentView {
    #[serde(flatten)]
    pub student: Student,
    pub class_name: String,
    pub parent: Option<Parent>,
}

/// A parent with the students linked to it.
#[derive(Debug, Serialize)]
pub struct ParentView {
    #[serde(flatten)]
    pub parent: Parent,
    pub children: Vec<Student>,
}

/// DTO for a parent created together with a student.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateParentRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 30))]
    pub phone: Option<String>,
}

/// DTO for creating a student.
///
/// Either link an existing parent with `parent_id` or create one inline with
/// `parent`; supplying both is rejected.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub class_id: Option<i64>,
    pub parent_id: Option<i64>,
    #[validate(nested)]
    pub parent: Option<CreateParentRequest>,
}

/// Query parameters for listing students.
#[derive(Debug, Deserialize)]
pub struct StudentListParams {
    pub class_id: Option<i64>,
}
