pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::applications::handlers as applications;
use crate::jobs::handlers as jobs;
use crate::organizations::handlers as organizations;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs
        .route("/api/v1/jobs", get(jobs::index).post(jobs::create))
        .route("/api/v1/jobs/my_jobs", get(jobs::my_jobs))
        .route("/api/v1/jobs/saved_jobs", get(jobs::saved_jobs))
        .route("/api/v1/jobs/created_jobs", get(jobs::created_jobs))
        .route(
            "/api/v1/jobs/:id",
            get(jobs::show).put(jobs::update).delete(jobs::destroy),
        )
        .route("/api/v1/jobs/:id/save_job", post(jobs::save_job))
        .route("/api/v1/jobs/:id/unsave_job", delete(jobs::unsave_job))
        // Applications
        .route(
            "/api/v1/jobs/:id/applications",
            get(applications::index_by_job).post(applications::create),
        )
        .route(
            "/api/v1/jobs/:id/applications/check_applied",
            get(applications::check_applied),
        )
        .route("/api/v1/applications", get(applications::index))
        .route(
            "/api/v1/applications/applied_jobs",
            get(applications::applied_jobs),
        )
        .route(
            "/api/v1/applications/:id",
            get(applications::show)
                .put(applications::update)
                .delete(applications::destroy),
        )
        .route(
            "/api/v1/applications/:id/withdraw",
            put(applications::withdraw),
        )
        // Organizations
        .route(
            "/api/v1/organizations",
            get(organizations::index).post(organizations::create),
        )
        .route(
            "/api/v1/organizations/:id",
            get(organizations::show)
                .put(organizations::update)
                .delete(organizations::destroy),
        )
        .route(
            "/api/v1/organizations/:id/members",
            get(organizations::members),
        )
        .with_state(state)
}
