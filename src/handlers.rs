use crate::catalog;
use crate::errors::AppError;
use crate::models::{
    AppsDocument, EmailRequest, NewsletterSendsResponse, SaveAppsRequest, SaveResponse,
    SaveSubscribersRequest, StatsResponse, SubscribeResponse, SubscribersDocument,
    UnsubscribeResponse,
};
use crate::newsletter;
use crate::snapshots::normalize_history;
use crate::state::AppState;
use crate::stats::build_stats;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

pub async fn get_subscribers(State(state): State<AppState>) -> Result<Json<SubscribersDocument>, AppError> {
    let document = newsletter::load_subscribers(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(document))
}

/// Replaces the subscriber list. Omitted `historicalData` or `newsletterSends`
/// keep their stored values.
pub async fn save_subscribers(
    State(state): State<AppState>,
    payload: Result<Json<SaveSubscribersRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, AppError> {
    let Json(payload) = payload?;
    let subscribers = string_array(&payload.subscribers)
        .ok_or_else(|| AppError::bad_request("subscribers must be an array"))?;

    let _guard = state.write_lock.lock().await;
    let now = Utc::now();
    let stored = newsletter::load_subscribers(state.store.as_ref(), now).await?;
    let history = if payload.historical_data.is_null() {
        stored.historical_data
    } else {
        normalize_history(&payload.historical_data)
    };
    let newsletter_sends = payload.newsletter_sends.unwrap_or(stored.newsletter_sends);

    let saved = newsletter::save_subscribers(
        state.store.as_ref(),
        subscribers,
        history,
        newsletter_sends,
        now,
    )
    .await?;

    Ok(Json(SaveResponse {
        success: true,
        message: "Subscribers saved successfully".to_string(),
        bin_id: saved.receipt.location,
        count: saved.document.count,
        metadata: saved.receipt.metadata,
    }))
}

pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let Json(payload) = payload?;
    let subscribed = {
        let _guard = state.write_lock.lock().await;
        newsletter::add_subscriber(state.store.as_ref(), &payload.email, Utc::now()).await?
    };
    let notification =
        newsletter::send_welcome(state.notifier.as_ref(), &state.welcome, &subscribed.email).await;
    info!(
        "subscribed {}, {} total, welcome email {notification}",
        subscribed.email, subscribed.count
    );

    Ok(Json(SubscribeResponse {
        email: subscribed.email,
        count: subscribed.count,
        notification: notification.to_string(),
    }))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let Json(payload) = payload?;
    let _guard = state.write_lock.lock().await;
    let saved = newsletter::unsubscribe(state.store.as_ref(), &payload.email, Utc::now()).await?;
    let email = newsletter::normalize_email(&payload.email);
    info!("unsubscribed {email}, {} remaining", saved.document.count);

    Ok(Json(UnsubscribeResponse {
        email,
        count: saved.document.count,
    }))
}

pub async fn record_newsletter_send(
    State(state): State<AppState>,
) -> Result<Json<NewsletterSendsResponse>, AppError> {
    let _guard = state.write_lock.lock().await;
    let newsletter_sends = newsletter::record_newsletter_send(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(NewsletterSendsResponse { newsletter_sends }))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let document = newsletter::load_subscribers(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(build_stats(&document.historical_data)))
}

pub async fn get_apps(State(state): State<AppState>) -> Result<Json<AppsDocument>, AppError> {
    let document = catalog::load_apps(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(document))
}

pub async fn save_apps(
    State(state): State<AppState>,
    payload: Result<Json<SaveAppsRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, AppError> {
    let Json(payload) = payload?;
    let Value::Array(apps) = payload.apps else {
        return Err(AppError::bad_request("apps must be an array"));
    };

    let _guard = state.write_lock.lock().await;
    let (document, receipt) = catalog::save_apps(state.store.as_ref(), apps, Utc::now()).await?;

    Ok(Json(SaveResponse {
        success: true,
        message: "Apps saved successfully".to_string(),
        bin_id: receipt.location,
        count: document.count,
        metadata: receipt.metadata,
    }))
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|entry| entry.as_str().map(str::to_owned))
        .collect()
}
