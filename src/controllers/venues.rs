use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{path, query};
use crate::error::CatalogError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/venues", get(list_venues))
        .route("/{id}", get(get_venue))
        .route("/{id}/sections", get(list_sections))
        .route("/{id}/sections/{section_id}/seats", get(list_seats))
}

/* ---------- VENUES ---------- */

// GET /venue/venues
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVenuesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub include_sections: Option<bool>,
}

pub async fn list_venues(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListVenuesQuery>, QueryRejection>,
) -> Result<Response, CatalogError> {
    let params = query(params)?;
    let query = state.catalog.listing_query(
        params.page,
        params.limit,
        params.include_sections.unwrap_or(false),
    );
    let listing = state.catalog.list_venues(query).await?;

    // Cached JSON goes out verbatim
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::HeaderName::from_static("x-cache"), listing.cache.as_str()),
        ],
        listing.body,
    )
        .into_response())
}

// GET /venue/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueQuery {
    pub include_details: Option<bool>,
}

pub async fn get_venue(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    params: Result<Query<VenueQuery>, QueryRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let id = path(id)?;
    let params = query(params)?;
    let venue = state
        .catalog
        .get_venue(id, params.include_details.unwrap_or(false))
        .await?;
    Ok(Json(venue))
}

/* ---------- SECTIONS & SEATS ---------- */

// GET /venue/{id}/sections
pub async fn list_sections(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let id = path(id)?;
    let sections = state.catalog.list_sections(id).await?;
    Ok(Json(sections))
}

// GET /venue/{id}/sections/{section_id}/seats
pub async fn list_seats(
    State(state): State<Arc<AppState>>,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> Result<impl IntoResponse, CatalogError> {
    let (id, section_id) = path(ids)?;
    let section = state.catalog.list_seats(id, section_id).await?;
    Ok(Json(section))
}
