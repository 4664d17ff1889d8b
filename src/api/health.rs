//! Health check and persona listing endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::persona::Persona;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Persona info for API responses
#[derive(Serialize)]
pub struct PersonaInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub voice: &'static str,
}

/// Response for listing all personas
#[derive(Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<PersonaInfo>,
    pub default_id: &'static str,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// List the personas a client may pick
async fn list_personas() -> Json<PersonaListResponse> {
    let personas = Persona::ALL
        .into_iter()
        .map(|p| PersonaInfo {
            id: p.id(),
            name: p.name(),
            voice: p.voice(),
        })
        .collect();

    Json(PersonaListResponse {
        personas,
        default_id: Persona::default().id(),
    })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/personas", get(list_personas))
}
