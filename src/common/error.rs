// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
//
// Importante: violação de chave única NÃO tem variante aqui de propósito.
// Nos fluxos de conversa/lead ela é ramo de controle (alguém criou a linha
// primeiro), tratada localmente nos repositórios/serviços e nunca exposta
// ao chamador como falha.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Evento de webhook malformado (ex: remetente ausente/vazio).
    #[error("Payload de webhook inválido: {0}")]
    InvalidWebhookPayload(String),

    // A sessão do provedor não está registrada para nenhuma organização.
    #[error("Sessão não registrada para nenhuma organização")]
    SessionNotFound,

    #[error("Conversa não encontrada")]
    ConversationNotFound,

    #[error("Lead não encontrado")]
    LeadNotFound,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidWebhookPayload(ref reason) => {
                let body = Json(json!({ "success": false, "error": reason }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                "Sessão não registrada para nenhuma organização.",
            ),
            AppError::ConversationNotFound => {
                (StatusCode::NOT_FOUND, "Conversa não encontrada.")
            }
            AppError::LeadNotFound => (StatusCode::NOT_FOUND, "Lead não encontrado."),

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.")
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
