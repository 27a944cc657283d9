use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Outcome of every catalog and capacity operation that did not succeed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Infrastructure(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return CatalogError::Conflict(match db_err.constraint() {
                    Some("venue_sections_venue_id_name_key") => {
                        "A section with this name already exists in this venue".to_string()
                    }
                    Some(constraint) => format!("Duplicate value violates `{constraint}`"),
                    None => "Duplicate value".to_string(),
                });
            }
        }
        CatalogError::Infrastructure(err.to_string())
    }
}

impl From<ValidationErrors> for CatalogError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {reason}")
            })
            .collect();
        fields.sort();
        CatalogError::Validation(fields.join("; "))
    }
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
}

impl ApiError {
    pub fn reply(status: StatusCode, message: impl Into<String>) -> Response {
        let body = ApiError {
            success: false,
            message: message.into(),
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            CatalogError::Infrastructure(detail) => {
                tracing::error!("Request failed on storage: {}", detail);
                "Internal error, the operation was not applied".to_string()
            }
            other => other.to_string(),
        };
        ApiError::reply(status, message)
    }
}
