use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use super::{body, path};
use crate::error::CatalogError;
use crate::middleware::AdminUser;
use crate::models::{NewSection, NewVenue, SectionPatch, VenuePatch};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/venue", post(create_venue))
        .route(
            "/admin/venue/{id}",
            axum::routing::put(update_venue).delete(delete_venue),
        )
        .route("/admin/venue/{id}/section", post(create_section))
        .route(
            "/admin/venue/{id}/section/{section_id}",
            axum::routing::put(update_section).delete(delete_section),
        )
}

/* ---------- VENUES ---------- */

// POST /venue/admin/venue
async fn create_venue(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    payload: Result<Json<NewVenue>, JsonRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let venue = state.catalog.create_venue(body(payload)?).await?;
    tracing::debug!("Venue {} created by {}", venue.id, admin.subject);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Venue created successfully", "venue": venue })),
    ))
}

// PUT /venue/admin/venue/{id}
async fn update_venue(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<VenuePatch>, JsonRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let id = path(id)?;
    let venue = state.catalog.update_venue(id, body(payload)?).await?;
    Ok(Json(
        json!({ "message": "Venue updated successfully", "venue": venue }),
    ))
}

// DELETE /venue/admin/venue/{id}
async fn delete_venue(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let id = path(id)?;
    let deletion = state.catalog.delete_venue(id).await?;
    Ok(Json(json!({
        "message": "Venue deleted successfully",
        "venue_id": deletion.venue_id,
        "sections_removed": deletion.sections_removed,
        "seats_removed": deletion.seats_removed,
    })))
}

/* ---------- SECTIONS ---------- */

// POST /venue/admin/venue/{id}/section
async fn create_section(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewSection>, JsonRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let id = path(id)?;
    let created = state.catalog.create_section(id, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Section created with {} seats", created.seats.len()),
            "section": created,
        })),
    ))
}

// PUT /venue/admin/venue/{id}/section/{section_id}
async fn update_section(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
    payload: Result<Json<SectionPatch>, JsonRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let (id, section_id) = path(ids)?;
    let updated = state
        .catalog
        .update_section(id, section_id, body(payload)?)
        .await?;
    Ok(Json(json!({
        "message": format!("Section updated, now {} seats", updated.seats.len()),
        "section": updated,
    })))
}

// DELETE /venue/admin/venue/{id}/section/{section_id}
async fn delete_section(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let (id, section_id) = path(ids)?;
    let deletion = state.catalog.delete_section(id, section_id).await?;
    Ok(Json(json!({
        "message": "Section deleted successfully",
        "section_id": deletion.section_id,
        "seats_removed": deletion.seats_removed,
    })))
}
