//! Webhook HTTP server: verification handshake, signed event intake, and
//! the account-linking page.

use crate::bot::Bot;
use crate::comics::ComicClient;
use crate::config::{self, Config, PageCredentials};
use crate::events::{classify, EventKind, WebhookPayload};
use crate::messenger::SendApiClient;
use crate::signature::{self, SIGNATURE_HEADER};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state for the gateway (credentials, bot, port). Immutable after
/// startup; cloned into every handler and spawned turn.
#[derive(Clone)]
pub struct GatewayState {
    pub credentials: Arc<PageCredentials>,
    pub bot: Arc<Bot>,
    pub port: u16,
}

/// Run the gateway server; binds to config.gateway.bind and the resolved
/// port. Fails fast when any required credential is missing. Blocks until
/// shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let credentials = config::resolve_credentials(&config)?;
    let port = config::resolve_port(&config);

    let send_api = SendApiClient::new(
        config.apis.graph_url.clone(),
        credentials.page_access_token.clone(),
    );
    let comics = ComicClient::new(config.apis.comic_url.clone());
    let bot = Bot::new(send_api.clone(), comics);

    // Page profile is cosmetic; don't hold up the webhook for it.
    tokio::spawn(async move {
        send_api.apply_page_profile().await;
    });

    let state = GatewayState {
        credentials: Arc::new(credentials),
        bot: Arc::new(bot),
        port,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/authorize", get(authorize))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// GET /webhook — subscription handshake. Echo `hub.challenge` when
/// `hub.mode` is "subscribe" and `hub.verify_token` matches, else 403.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    if mode == Some("subscribe") && token == Some(state.credentials.validation_token.as_str()) {
        log::info!("validating webhook");
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        (StatusCode::OK, challenge).into_response()
    } else {
        log::warn!("webhook validation failed: mode {:?}", mode);
        StatusCode::FORBIDDEN.into_response()
    }
}

/// POST /webhook — signed event delivery. The signature covers the raw body
/// bytes, so verification runs before any JSON parsing; unsigned or
/// mis-signed requests are rejected without being dispatched. Once events
/// are handed off, the 200 does not wait for their outcomes.
async fn receive_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(&state.credentials.app_secret, &body, header) {
        log::warn!("rejecting webhook delivery: {}", e);
        return StatusCode::FORBIDDEN;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("webhook body is not valid JSON: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    if payload.object != "page" {
        log::warn!("ignoring webhook for object {:?}", payload.object);
        return StatusCode::NOT_FOUND;
    }

    for entry in payload.entry {
        log::debug!(
            "page entry {:?} at {:?}: {} event(s)",
            entry.id,
            entry.time,
            entry.messaging.len()
        );
        for raw in entry.messaging {
            let event = classify(raw);
            if matches!(event.kind, EventKind::Unknown) {
                log::warn!("webhook received unknown event from {:?}", event.sender_id);
                continue;
            }
            let bot = state.bot.clone();
            tokio::spawn(async move {
                bot.handle_event(event).await;
            });
        }
    }
    StatusCode::OK
}

/// GET /authorize — account-linking landing page. The authorization code is
/// generated per request and appended to the platform's redirect URI.
async fn authorize(Query(params): Query<HashMap<String, String>>) -> Html<String> {
    let linking_token = params
        .get("account_linking_token")
        .cloned()
        .unwrap_or_default();
    let redirect_uri = params.get("redirect_uri").cloned().unwrap_or_default();
    let auth_code = uuid::Uuid::new_v4().to_string();
    let redirect_success = format!("{}&authorization_code={}", redirect_uri, auth_code);
    log::info!("account linking page requested (token {:?})", linking_token);
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Link your account</title></head>\n<body>\n\
         <h1>Link your account</h1>\n\
         <p>Continue to finish linking this conversation to your account.</p>\n\
         <a href=\"{}\">Authorize</a>\n\
         </body>\n</html>\n",
        redirect_success
    ))
}
