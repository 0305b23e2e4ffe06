//! HTTP handlers for the reading endpoints.

use super::AppState;
use crate::display::{oled, Canvas, Frame};
use crate::error::{PitempError, Result};
use crate::reading::ApiReading;
use askama::Template;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{Local, SecondsFormat};
use serde_json::json;
use tracing::error;

/// HTML page with the current reading.
pub async fn index(State(state): State<AppState>) -> Response {
    match render_index(&state.api_reading()) {
        Ok(page) => Html(page).into_response(),
        Err(e) => internal_error("rendering index page", e),
    }
}

/// Current reading as JSON.
pub async fn api(State(state): State<AppState>) -> Response {
    match serde_json::to_vec(&state.api_reading()) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => internal_error("encoding reading", PitempError::encode_error(e.to_string())),
    }
}

/// Prometheus exposition of the reading gauges.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => internal_error("encoding metrics", e),
    }
}

/// The OLED layout for the current reading as a PNG.
pub async fn pioled(State(state): State<AppState>) -> Response {
    let frame = Frame::new(state.store.get(), Local::now(), None, state.stale_after);
    let mut canvas = Canvas::oled();
    oled::draw_frame(&mut canvas, &frame).unwrap_or_else(|e| match e {});

    match canvas.to_png() {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => internal_error("encoding PiOLED image", e),
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pitemp",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn internal_error(context: &str, e: PitempError) -> Response {
    error!("Error {}: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// The `/` page.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage<'a> {
    reading: &'a ApiReading,
    updated: String,
}

/// Render the index page for `reading`.
pub fn render_index(reading: &ApiReading) -> Result<String> {
    let updated = match reading.last_sensor_update {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => "never".to_string(),
    };

    IndexPage { reading, updated }
        .render()
        .map_err(|e| PitempError::render_error(e.to_string()))
}
