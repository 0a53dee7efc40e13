use crate::commands::SimpleResponse;
use crate::config_store::DbConnectionConfig;
use crate::error::{ColetaError, ColetaResult};
use crate::external;
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};

/// Landing route. The count UI is useless without stock credentials, so an
/// unconfigured service sends the operator straight to the settings page.
pub async fn index(State(state): State<AppState>) -> Response {
    if state.config.load().is_none() {
        return Redirect::to("/settings").into_response();
    }

    Json(json!({
        "service": "coleta",
        "configured": true,
    }))
    .into_response()
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    match state.config.load() {
        Some(mut config) => {
            // Never echo the stored password back to the browser.
            config.password.clear();
            Json(json!({ "config": config }))
        }
        None => Json(json!({ "config": null })),
    }
}

/// Validates, test-connects and only then persists the credentials. A failed
/// test leaves whatever was saved before untouched.
pub async fn save_settings(
    State(state): State<AppState>,
    Json(payload): Json<DbConnectionConfig>,
) -> ColetaResult<Json<SimpleResponse>> {
    if !payload.is_complete() {
        return Err(ColetaError::Validation(
            "Todos os campos de configuração do banco de dados de estoque são obrigatórios."
                .to_string(),
        ));
    }

    external::test_connection(&payload).await?;

    state.config.save(&payload)?;
    tracing::info!("Stock database settings saved for server {}", payload.server);

    Ok(Json(SimpleResponse::ok(
        "Configurações do banco de dados de estoque salvas e testadas com sucesso!",
    )))
}
