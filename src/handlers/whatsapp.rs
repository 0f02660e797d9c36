// src/handlers/whatsapp.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::whatsapp::{Conversation, Message, WebhookEnvelope, WebhookResponse},
    services::whatsapp_service::WebhookOutcome,
};

// POST /api/whatsapp/webhook
//
// Entrada pública do provedor de mensageria. Eventos ignorados de propósito
// (tipo desconhecido, eco fromMe) respondem 200 com success = true, para o
// provedor não reentregar; só evento malformado (400) e sessão sem dona
// (404) são falhas visíveis.
#[utoipa::path(
    post,
    path = "/api/whatsapp/webhook",
    tag = "WhatsApp",
    request_body = WebhookEnvelope,
    responses(
        (status = 200, description = "Evento processado ou ignorado de propósito", body = WebhookResponse),
        (status = 400, description = "Evento malformado"),
        (status = 404, description = "Sessão não registrada para nenhuma organização")
    )
)]
pub async fn receive_webhook(
    State(app_state): State<AppState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.whatsapp_service.process_event(&envelope).await?;

    let response = match outcome {
        WebhookOutcome::Ignored { reason } => WebhookResponse {
            success: true,
            message: Some(reason.to_string()),
            conversation_id: None,
        },
        WebhookOutcome::Stored { conversation, .. } => WebhookResponse {
            success: true,
            message: None,
            conversation_id: Some(conversation.id),
        },
    };

    Ok((StatusCode::OK, Json(response)))
}

// GET /api/whatsapp/conversations
#[utoipa::path(
    get,
    path = "/api/whatsapp/conversations",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Conversas do tenant, atividade recente primeiro", body = Vec<Conversation>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da organização")
    )
)]
pub async fn list_conversations(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let conversations = app_state.whatsapp_service.list_conversations(tenant.0).await?;

    Ok((StatusCode::OK, Json(conversations)))
}

// GET /api/whatsapp/conversations/{id}/messages
#[utoipa::path(
    get,
    path = "/api/whatsapp/conversations/{id}/messages",
    tag = "WhatsApp",
    responses(
        (status = 200, description = "Mensagens da conversa, ordenadas por sent_at", body = Vec<Message>),
        (status = 404, description = "Conversa não encontrada neste tenant")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da conversa"),
        ("x-tenant-id" = Uuid, Header, description = "ID da organização")
    )
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_state
        .whatsapp_service
        .list_messages(tenant.0, conversation_id)
        .await?;

    Ok((StatusCode::OK, Json(messages)))
}
