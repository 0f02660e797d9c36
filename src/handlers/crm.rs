// src/handlers/crm.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::crm::{ConvertLeadPayload, Lead, LeadConversionResponse, UpdateLeadStatusPayload},
};

// POST /api/crm/leads/convert
//
// Conversão de conversa em lead. O chamador sempre recebe UM lead bem
// formado, nunca erro de chave duplicada: corrida com outro operador cai
// no caminho de fallback e volta com `existing = true`.
#[utoipa::path(
    post,
    path = "/api/crm/leads/convert",
    tag = "CRM",
    request_body = ConvertLeadPayload,
    responses(
        (status = 200, description = "Lead criado ou localizado", body = LeadConversionResponse),
        (status = 404, description = "Conversa não encontrada neste tenant")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da organização")
    )
)]
pub async fn convert_lead(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<ConvertLeadPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state.crm_service.convert_to_lead(tenant.0, &payload).await?;

    Ok((
        StatusCode::OK,
        Json(LeadConversionResponse {
            success: true,
            data: outcome.lead,
            existing: outcome.existing,
        }),
    ))
}

// GET /api/crm/leads
#[utoipa::path(
    get,
    path = "/api/crm/leads",
    tag = "CRM",
    responses(
        (status = 200, description = "Leads do tenant", body = Vec<Lead>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da organização")
    )
)]
pub async fn list_leads(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let leads = app_state.crm_service.list_leads(tenant.0).await?;

    Ok((StatusCode::OK, Json(leads)))
}

// PATCH /api/crm/leads/{id}/status
#[utoipa::path(
    patch,
    path = "/api/crm/leads/{id}/status",
    tag = "CRM",
    request_body = UpdateLeadStatusPayload,
    responses(
        (status = 200, description = "Status atualizado", body = Lead),
        (status = 404, description = "Lead não encontrado neste tenant")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lead"),
        ("x-tenant-id" = Uuid, Header, description = "ID da organização")
    )
)]
pub async fn update_lead_status(
    State(app_state): State<AppState>,
    tenant: TenantContext,
    Path(lead_id): Path<Uuid>,
    Json(payload): Json<UpdateLeadStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lead = app_state
        .crm_service
        .update_lead_status(tenant.0, lead_id, payload.status)
        .await?;

    Ok((StatusCode::OK, Json(lead)))
}
