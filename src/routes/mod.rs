pub mod posts;

use crate::AppState;
use axum::{Router, routing::get};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/wp/v2/posts", post_routes())
        .with_state(state)
}

pub fn post_routes() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        get(posts::get_post)
            .post(posts::update_post)
            .put(posts::update_post)
            .patch(posts::update_post),
    )
}
