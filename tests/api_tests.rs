// tests/api_tests.rs
//
// End-to-end flows against a real Postgres. Skipped unless DATABASE_URL is set.

use assessment::{
    config::Config,
    routes,
    state::AppState,
    utils::jwt::{ROLE_STUDENT, ROLE_TEACHER, sign_jwt},
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::{collections::HashSet, time::Duration};

const SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port. Returns the base URL, or `None` when no
/// database is configured.
async fn spawn_app() -> Option<String> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    // A single connection: a handler that needs a second one while holding a
    // transaction times out instead of passing by luck.
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
    };

    let app = routes::create_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(format!("http://127.0.0.1:{}", port))
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

struct Api {
    base: String,
    client: reqwest::Client,
    token: String,
}

impl Api {
    fn new(base: &str, sub: &str, role: &str) -> Self {
        Self {
            base: base.to_string(),
            client: reqwest::Client::new(),
            token: sign_jwt(sub, role, SECRET, 600).unwrap(),
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.expect("Failed to execute request");
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }
}

fn ids(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect()
}

/// Creates a class and subject with 3 easy, 3 medium and 3 hard questions.
async fn seed_subject(staff: &Api) -> (i64, Vec<Value>) {
    let (status, class) = staff
        .post("/api/scopes/classes", json!({ "name": unique("class") }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, subject) = staff
        .post(
            "/api/scopes/subjects",
            json!({ "name": "Mathematics", "parent_id": class["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let subject_id = subject["id"].as_i64().unwrap();

    let mut questions = Vec::new();
    let difficulties = [
        "easy", "easy", "easy", "medium", "medium", "medium", "hard", "hard", "hard",
    ];
    for (i, difficulty) in difficulties.iter().enumerate() {
        let bloom = if i % 2 == 0 { "Applying" } else { "Remembering" };
        let topic = if i < 5 { "Fractions" } else { "Decimals" };
        let (status, question) = staff
            .post(
                "/api/questions",
                json!({
                    "text": format!("Question {}", i),
                    "options": ["A", "B", "C", "D"],
                    "correct_option": "A",
                    "difficulty": difficulty,
                    "bloom_level": bloom,
                    "class_id": class["id"],
                    "subject_id": subject_id,
                    "topic": topic,
                    "prerequisites": ["Division"]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        questions.push(question);
    }
    (subject_id, questions)
}

#[tokio::test]
async fn scope_children_require_existing_parent() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);

    let (status, _) = staff
        .post("/api/scopes/subjects", json!({ "name": "Orphan", "parent_id": 999_999_999 }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = staff.post("/api/scopes/subjects", json!({ "name": "No parent" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_class_name_conflicts() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);
    let name = unique("dup");

    let (status, _) = staff.post("/api/scopes/classes", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = staff.post("/api/scopes/classes", json!({ "name": name })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_assembly_flow() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);
    let (subject_id, questions) = seed_subject(&staff).await;

    let (status, test) = staff
        .post("/api/tests", json!({ "name": unique("quiz"), "is_online": true }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = test["id"].as_i64().unwrap();

    // Generate 2 easy + 1 medium.
    let (status, test) = staff
        .post(
            &format!("/api/tests/{}/generate", test_id),
            json!({
                "scope": { "subject_id": subject_id },
                "by_difficulty": { "easy": 2, "medium": 1 },
                "total": 3,
                "seed": 42
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let generated = ids(&test["question_ids"]);
    assert_eq!(generated.len(), 3);
    assert_eq!(generated.iter().collect::<HashSet<_>>().len(), 3);

    let difficulty_of = |id: i64| {
        questions
            .iter()
            .find(|q| q["id"].as_i64() == Some(id))
            .map(|q| q["difficulty"].as_str().unwrap().to_string())
            .unwrap()
    };
    let easy = generated.iter().filter(|&&id| difficulty_of(id) == "easy").count();
    assert_eq!(easy, 2);

    // Adding what is already there changes nothing.
    let (status, test) = staff
        .post(
            &format!("/api/tests/{}/questions", test_id),
            json!({ "question_ids": generated.clone() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&test["question_ids"]), generated);

    // Unknown ids are refused.
    let (status, _) = staff
        .post(
            &format!("/api/tests/{}/questions", test_id),
            json!({ "question_ids": [999_999_999] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Replace the first question; same difficulty, not already on the test.
    let first = generated[0];
    let (status, replaced) = staff
        .post(
            &format!("/api/tests/{}/questions/{}/replace?seed=7", test_id, first),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let replacement = replaced["replacement"]["id"].as_i64().unwrap();
    assert!(!generated.contains(&replacement));
    assert_eq!(difficulty_of(replacement), difficulty_of(first));
    let after_replace = ids(&replaced["test"]["question_ids"]);
    assert_eq!(after_replace[0], replacement);
    assert_eq!(after_replace.len(), 3);

    // Remove it again.
    let (status, test) = staff
        .post(
            &format!("/api/tests/{}/questions/remove", test_id),
            json!({ "question_ids": [replacement] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&test["question_ids"]), after_replace[1..].to_vec());

    let (status, detail) = staff.get(&format!("/api/tests/{}", test_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["questions"].as_array().unwrap().len(), 2);
    assert!(detail["missing_question_ids"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn locked_list_edits_work_on_a_single_connection() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);
    let (subject_id, questions) = seed_subject(&staff).await;

    let (status, test) = staff
        .post("/api/tests", json!({ "name": unique("single"), "is_online": false }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = test["id"].as_i64().unwrap();

    let first = questions[0]["id"].as_i64().unwrap();
    let (status, _) = staff
        .post(
            &format!("/api/tests/{}/questions", test_id),
            json!({ "question_ids": [first] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let started = std::time::Instant::now();
    let (status, replaced) = staff
        .post(
            &format!("/api/tests/{}/questions/{}/replace", test_id, first),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", replaced);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(replaced["replacement"]["difficulty"], "easy");

    let (status, test) = staff
        .post(
            &format!("/api/tests/{}/generate", test_id),
            json!({ "scope": { "subject_id": subject_id }, "total": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", test);
    assert_eq!(ids(&test["question_ids"]).len(), 3);
}

#[tokio::test]
async fn question_listing_is_paginated_and_filtered_by_bloom() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);
    let (subject_id, _) = seed_subject(&staff).await;

    let (status, page) = staff
        .get(&format!("/api/questions?subject_id={}&limit=4", subject_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], 9);
    assert_eq!(page["items"].as_array().unwrap().len(), 4);

    let (status, page) = staff
        .get(&format!("/api/questions?subject_id={}&skip=8&limit=4", subject_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    // Even-numbered seed questions are "Applying".
    let (status, page) = staff
        .get(&format!("/api/questions?subject_id={}&bloom=apply", subject_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], 5);
    for item in page["items"].as_array().unwrap() {
        assert_eq!(item["bloom_level"], "Applying");
    }
}

#[tokio::test]
async fn student_submission_and_analysis() {
    let Some(base) = spawn_app().await else { return };
    let staff = Api::new(&base, "1", ROLE_TEACHER);
    let (_, questions) = seed_subject(&staff).await;

    let (status, student) = staff
        .post(
            "/api/students",
            json!({
                "name": "Asha",
                "parent": { "name": "Ravi", "phone": "555-0100" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let student_id = student["id"].as_i64().unwrap();

    let (status, view) = staff.get(&format!("/api/students/{}", student_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["class_name"], "Not Assigned");
    assert_eq!(view["parent"]["name"], "Ravi");

    let (status, test) = staff
        .post("/api/tests", json!({ "name": unique("final"), "is_online": true }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let test_id = test["id"].as_i64().unwrap();

    let chosen: Vec<i64> = questions.iter().take(4).map(|q| q["id"].as_i64().unwrap()).collect();
    let (status, _) = staff
        .post(
            &format!("/api/tests/{}/questions", test_id),
            json!({ "question_ids": chosen.clone() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let student_api = Api::new(&base, &student_id.to_string(), ROLE_STUDENT);

    let (status, paper) = student_api.get(&format!("/api/tests/{}/paper", test_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper.as_array().unwrap().len(), 4);
    assert!(paper[0].get("correct_option").is_none());

    let (status, result) = student_api
        .post(
            &format!("/api/tests/{}/results", test_id),
            json!({
                "answers": [
                    { "question_id": chosen[0], "answer": "A" },
                    { "question_id": chosen[1], "answer": "B" },
                    { "question_id": chosen[2], "answer": "A" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["correct"], 2);
    assert_eq!(result["incorrect"], 1);
    assert_eq!(result["skipped"], 1);
    assert_eq!(result["percentage"], 50.0);
    let result_id = result["id"].as_i64().unwrap();

    // One attempt per test.
    let (status, _) = student_api
        .post(&format!("/api/tests/{}/results", test_id), json!({ "answers": [] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = student_api.get(&format!("/api/results/{}/analysis", result_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["overall"]["total"], 4);
    let by_difficulty = report["by_difficulty"].as_object().unwrap();
    let total: i64 = by_difficulty.values().map(|b| b["total"].as_i64().unwrap()).sum();
    assert_eq!(total, 4);
    assert_eq!(report["review_prerequisites"], json!(["Division"]));

    // Another student may not read it.
    let other = Api::new(&base, &(student_id + 1_000_000).to_string(), ROLE_STUDENT);
    let (status, _) = other.get(&format!("/api/results/{}", result_id)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listing) = staff.get(&format!("/api/tests/{}/results", test_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing[0]["student_name"], "Asha");
}
