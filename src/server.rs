//! HTTP front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Landing page linking to the query form |
//! | `GET`  | `/astrological_insights` | Birth-details query form |
//! | `POST` | `/astrological_insights` | Form submission → JSON insight |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures are reported as a flat message:
//!
//! ```json
//! { "error": "Vector store not found at data/vector_index.json" }
//! ```
//!
//! Missing form fields and blank queries are `400`; failed embedding or LLM
//! calls are `502`; every other failure is `500`.

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::InsightError;
use crate::insight::InsightEngine;
use crate::models::{BirthDetails, InsightResponse};

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Astrological Insights</title>
</head>
<body>
  <h1>Astrological Insights</h1>
  <p>Ask a question about your birth chart and get an answer grounded in classical astrology texts.</p>
  <p><a href="/astrological_insights">Start a reading</a></p>
</body>
</html>
"#;

const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Astrological Insights</title>
</head>
<body>
  <h1>Your birth details</h1>
  <form id="insight-form" method="post" action="/astrological_insights">
    <label>Name <input name="name" required></label><br>
    <label>Date of birth <input name="dob" type="date" required></label><br>
    <label>Time of birth <input name="time_of_birth" type="time" required></label><br>
    <label>Place of birth <input name="place_of_birth" required></label><br>
    <label>Gender
      <select name="gender">
        <option value="male">Male</option>
        <option value="female">Female</option>
        <option value="other">Other</option>
      </select>
    </label><br>
    <label>Question <textarea name="query" rows="3" required></textarea></label><br>
    <button type="submit">Get insights</button>
  </form>
  <pre id="result"></pre>
  <script>
    document.getElementById("insight-form").addEventListener("submit", async (event) => {
      event.preventDefault();
      const out = document.getElementById("result");
      out.textContent = "Consulting the stars...";
      const response = await fetch("/astrological_insights", {
        method: "POST",
        body: new URLSearchParams(new FormData(event.target)),
      });
      const data = await response.json();
      if (data.error) {
        out.textContent = "Error: " + data.error;
        return;
      }
      const effects = Object.entries(data.effects)
        .map(([house, effect]) => "House " + house + ": " + effect)
        .join("\n");
      out.textContent = data.answer + "\n\n" + data.birth_chart + "\n" + effects;
    });
  </script>
</body>
</html>
"#;

#[derive(Clone)]
struct AppState {
    engine: Arc<InsightEngine>,
}

/// Starts the HTTP server with production providers.
///
/// Fails before binding if the LLM credential is missing. A missing vector
/// index is not a startup error: queries report it until the index exists.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = InsightEngine::from_config(config)?;
    run_server_with_engine(config, Arc::new(engine)).await
}

/// Starts the HTTP server around an already-built engine.
///
/// Used by tests and by binaries that plug in their own providers.
pub async fn run_server_with_engine(
    config: &Config,
    engine: Arc<InsightEngine>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(engine);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "astro server listening");
    println!("Astro server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the route table.
pub fn router(engine: Arc<InsightEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_home))
        .route(
            "/astrological_insights",
            get(handle_form).post(handle_insights),
        )
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { engine })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl From<InsightError> for AppError {
    fn from(err: InsightError) -> Self {
        let status = match &err {
            InsightError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            InsightError::UpstreamCallFailed(_) => StatusCode::BAD_GATEWAY,
            InsightError::IndexNotFound(_)
            | InsightError::IndexCorrupt { .. }
            | InsightError::CredentialMissing(_)
            | InsightError::RetrievalEmpty => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "query failed");
        } else {
            tracing::warn!(status = %self.status, error = %self.message, "query rejected");
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ============ Pages ============

async fn handle_home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn handle_form() -> Html<&'static str> {
    Html(FORM_PAGE)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /astrological_insights ============

/// Runs the query pipeline for one form submission.
///
/// The form rejection is taken as a value so a missing field produces the
/// JSON error body instead of axum's plain-text rejection.
async fn handle_insights(
    State(state): State<AppState>,
    form: Result<Form<BirthDetails>, FormRejection>,
) -> Result<Json<InsightResponse>, AppError> {
    let Form(details) = form.map_err(|e| InsightError::InvalidInput(e.body_text()))?;
    let response = state.engine.answer(&details).await?;
    Ok(Json(response))
}
