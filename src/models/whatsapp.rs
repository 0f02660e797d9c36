// src/models/whatsapp.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

// Mapeia o CREATE TYPE conversation_status do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "conversation_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationStatus {
    Active,
    Closed,
}

// Mapeia o CREATE TYPE message_direction do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "message_direction", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

// --- CONVERSA ---

// Uma thread de mensagens com um cliente final, dentro de uma organização.
// `phone` é a forma canônica (só dígitos) para linhas novas; linhas legadas
// podem ainda guardar a forma crua até o job de reconciliação passar.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub tenant_id: Uuid,

    pub phone: String,
    pub display_name: Option<String>,
    pub status: ConversationStatus,

    // Campos desnormalizados para a listagem (informativos; last-writer-wins).
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_text: Option<String>,
    pub messages_count: i32,

    // Referência fraca para o lead; a verdade sobre o pipeline vive no Lead.
    pub is_lead: bool,
    pub lead_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

// --- MENSAGEM ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    // Desnormalizado da conversa, para checagens de isolamento.
    pub tenant_id: Uuid,

    pub direction: MessageDirection,
    pub body: String,
    pub provider_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,

    // Payload cru do provedor, guardado para diagnóstico.
    pub raw_payload: Option<Value>,

    pub created_at: DateTime<Utc>,
}

// --- ENVELOPE DO WEBHOOK (o que o provedor nos manda) ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEnvelope {
    // Tipo do evento ("message", "message.any", "session.status", ...)
    pub event: String,
    // Identificador opaco da sessão, atribuído no provisionamento do canal.
    pub session: String,
    // Guardamos o payload como Value para persistir o cru; a visão tipada
    // é extraída depois com WebhookMessagePayload.
    #[serde(default)]
    pub payload: Value,
}

// Visão tipada do payload de mensagem. Todos os campos são opcionais:
// provedores variam e a validação do que realmente importa é feita no serviço.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessagePayload {
    pub from: Option<String>,
    pub to: Option<String>,
    pub body: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    pub id: Option<String>,
    // Epoch em segundos, como o provedor envia.
    pub timestamp: Option<i64>,
    pub push_name: Option<String>,
}

// Resposta do webhook. `success: true` mesmo para eventos ignorados de
// propósito; o provedor não deve reentregar o que decidimos descartar.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

// Resumo do job de reconciliação de duplicatas (ver services/reconcile_service.rs).
#[derive(Debug, Default, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub phones_normalized: u32,
    pub conversations_merged: u32,
    pub groups_processed: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desserializa_envelope_de_mensagem_do_provedor() {
        let raw = serde_json::json!({
            "event": "message",
            "session": "org-7",
            "payload": {
                "from": "+52 55 1234 5678",
                "body": "hola",
                "fromMe": false,
                "id": "ABCD1234",
                "timestamp": 1_735_689_600,
                "pushName": "María"
            }
        });

        let envelope: WebhookEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.event, "message");
        assert_eq!(envelope.session, "org-7");

        let payload: WebhookMessagePayload =
            serde_json::from_value(envelope.payload.clone()).unwrap();
        assert_eq!(payload.from.as_deref(), Some("+52 55 1234 5678"));
        assert_eq!(payload.body.as_deref(), Some("hola"));
        assert!(!payload.from_me);
        assert_eq!(payload.push_name.as_deref(), Some("María"));
    }

    #[test]
    fn payload_ausente_vira_default() {
        let raw = serde_json::json!({ "event": "session.status", "session": "org-7" });
        let envelope: WebhookEnvelope = serde_json::from_value(raw).unwrap();
        let payload: WebhookMessagePayload =
            serde_json::from_value(envelope.payload).unwrap_or_default();
        assert!(payload.from.is_none());
        assert!(!payload.from_me);
    }
}
