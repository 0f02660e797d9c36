// src/handlers/admin.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::{
    common::error::AppError, config::AppState, middleware::tenancy::TenantContext,
    models::whatsapp::ReconcileSummary,
};

// POST /api/whatsapp/admin/reconcile
//
// Gatilho administrativo do job de reconciliação de conversas duplicadas.
// Roda fora do caminho de requisição normal; não dispare duas vezes em
// paralelo para o mesmo tenant.
#[utoipa::path(
    post,
    path = "/api/whatsapp/admin/reconcile",
    tag = "Admin",
    responses(
        (status = 200, description = "Resumo da reconciliação", body = ReconcileSummary)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da organização a reconciliar")
    )
)]
pub async fn reconcile_conversations(
    State(app_state): State<AppState>,
    tenant: TenantContext,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.reconcile_service.reconcile_tenant(tenant.0).await?;

    Ok((StatusCode::OK, Json(summary)))
}
