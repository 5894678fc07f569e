// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{questions, results, scopes, students, test_papers},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Staff routes (question bank, test assembly, rosters) need an admin or
///   teacher token.
/// * Shared routes (scope browsing, test papers, result submission and
///   reading) need any valid token; handlers check ownership.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let staff_routes = Router::new()
        .route("/scopes/{level}", post(scopes::create_scope))
        .route("/scopes/{level}/{id}", delete(scopes::delete_scope))
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/questions/select", post(questions::select_preview))
        .route(
            "/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route(
            "/tests",
            get(test_papers::list_tests).post(test_papers::create_test),
        )
        .route(
            "/tests/{id}",
            get(test_papers::get_test)
                .put(test_papers::update_test)
                .delete(test_papers::delete_test),
        )
        .route("/tests/{id}/questions", post(test_papers::add_questions))
        .route(
            "/tests/{id}/questions/remove",
            post(test_papers::remove_questions),
        )
        .route(
            "/tests/{id}/questions/{question_id}/replace",
            post(test_papers::replace_question),
        )
        .route("/tests/{id}/generate", post(test_papers::generate_questions))
        .route("/tests/{id}/results", get(results::list_results))
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/{id}",
            get(students::get_student).delete(students::delete_student),
        )
        .route("/parents/{id}", get(students::get_parent))
        .layer(middleware::from_fn(staff_middleware));

    let shared_routes = Router::new()
        .route("/scopes/{level}", get(scopes::list_scopes))
        .route("/tests/{id}/paper", get(test_papers::get_paper))
        .route("/tests/{id}/results", post(results::submit_result))
        .route("/results/{id}", get(results::get_result))
        .route("/results/{id}/analysis", get(results::get_analysis));

    // Auth runs first, then the staff check on staff routes.
    let api_routes = staff_routes
        .merge(shared_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
