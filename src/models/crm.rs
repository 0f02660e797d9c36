// src/models/crm.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- ENUMS ---

// Mapeia o CREATE TYPE lead_status do banco.
// O pipeline avança para frente; as estatísticas de vendas agregam por
// transição de status, então o status é a unidade de verdade do funil.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Appointment,
    Converted,
    Lost,
}

// --- LEAD (entidade de registro do funil) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,

    pub name: String,
    pub phone: String,
    pub email: Option<String>,

    pub estimated_value: Option<Decimal>,
    pub source: String,
    pub assigned_to: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,

    // Referência fraca de exibição para a conversa de origem.
    pub whatsapp_conversation_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
}

// --- PAYLOADS (ferramenta do operador) ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLeadPayload {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub conversation_id: Uuid,

    #[schema(example = 1500.0)]
    pub estimated_value: Option<Decimal>,

    #[schema(example = "vendedor-1")]
    pub assigned_to: Option<String>,

    #[validate(length(max = 2000, message = "notes_too_long"))]
    pub notes: Option<String>,

    #[schema(example = "whatsapp")]
    pub lead_source: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadStatusPayload {
    #[schema(example = "CONTACTED")]
    pub status: LeadStatus,
}

// Resposta da conversão. `existing = true` significa que a requisição caiu
// no caminho de corrida: outro chamador já tinha criado o lead e nós apenas
// vinculamos a conversa a ele.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadConversionResponse {
    pub success: bool,
    pub data: Lead,
    pub existing: bool,
}
