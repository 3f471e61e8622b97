use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::views::{present_images, present_texts, ImageView, TextView};
use crate::app::AppState;
use crate::error::AppError;

/// How many texts the home page shows.
pub const LATEST_TEXTS: u64 = 10;
/// How many images the home page shows.
pub const LATEST_IMAGES: u64 = 12;

/// Response of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexView {
    pub latest_texts: Vec<TextView>,
    pub latest_images: Vec<ImageView>,
}

pub async fn index(state: &AppState) -> Result<IndexView, AppError> {
    let texts = state.texts.list(None, 0, LATEST_TEXTS).await?;
    let images = state.images.list(None, 0, LATEST_IMAGES).await?;

    Ok(IndexView {
        latest_texts: present_texts(state.users.as_ref(), state.tags.as_ref(), texts).await?,
        latest_images: present_images(state.users.as_ref(), state.tags.as_ref(), images).await?,
    })
}

/// Axum handler for `GET /`.
pub async fn index_handler(State(state): State<AppState>) -> Result<Json<IndexView>, AppError> {
    Ok(Json(index(&state).await?))
}
