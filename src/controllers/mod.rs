pub mod admin;
pub mod venues;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json, Router,
};
use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult};

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(venues::routes())
        .merge(admin::routes())
}

/* ---------- extractor helpers ---------- */

// Malformed input of any kind goes out with the same error body as the rest

pub(crate) fn path<T>(extracted: Result<Path<T>, PathRejection>) -> CatalogResult<T> {
    extracted
        .map(|Path(value)| value)
        .map_err(|rejection| CatalogError::Validation(rejection.body_text()))
}

pub(crate) fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> CatalogResult<T> {
    extracted
        .map(|Query(value)| value)
        .map_err(|rejection| CatalogError::Validation(rejection.body_text()))
}

pub(crate) fn body<T>(extracted: Result<Json<T>, JsonRejection>) -> CatalogResult<T> {
    extracted
        .map(|Json(value)| value)
        .map_err(|rejection| CatalogError::Validation(rejection.body_text()))
}
