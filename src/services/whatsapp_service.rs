// src/services/whatsapp_service.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_phone},
    db::{ConversationRepository, InsertResult, SessionRepository},
    models::whatsapp::{
        Conversation, Message, MessageDirection, WebhookEnvelope, WebhookMessagePayload,
    },
};

// Tipos de evento que representam mensagem recebida. Qualquer outro evento
// do provedor (status de sessão, ack de entrega...) é confirmado e ignorado.
const INBOUND_EVENTS: [&str; 2] = ["message", "message.any"];

/// Resultado do processamento de um evento de webhook.
///
/// `Ignored` ainda vira resposta de sucesso para o provedor: não queremos
/// reentrega de eventos que descartamos de propósito.
#[derive(Debug)]
pub enum WebhookOutcome {
    Ignored { reason: &'static str },
    Stored { conversation: Conversation, message: Message },
}

#[derive(Clone)]
pub struct WhatsappService {
    sessions: SessionRepository,
    conversations: ConversationRepository,
}

impl WhatsappService {
    pub fn new(sessions: SessionRepository, conversations: ConversationRepository) -> Self {
        Self {
            sessions,
            conversations,
        }
    }

    /// Pipeline de ingestão de um evento do provedor, na ordem:
    /// filtro de tipo de evento, filtro de eco (fromMe), validação do
    /// remetente, resolução de tenant, normalização, find-or-create da
    /// conversa e append da mensagem.
    ///
    /// Efeitos colaterais estritamente aditivos: nada é apagado aqui.
    /// Não há deduplicação por id de mensagem do provedor: entrega duplicada
    /// gera linha duplicada (comportamento conhecido do sistema de origem).
    pub async fn process_event(
        &self,
        envelope: &WebhookEnvelope,
    ) -> Result<WebhookOutcome, AppError> {
        // 1. Só nos interessa mensagem recebida.
        if !is_inbound_event(&envelope.event) {
            return Ok(WebhookOutcome::Ignored {
                reason: "evento não é mensagem recebida",
            });
        }

        let payload: WebhookMessagePayload =
            serde_json::from_value(envelope.payload.clone()).map_err(|_| {
                AppError::InvalidWebhookPayload("payload de mensagem malformado".to_string())
            })?;

        // 2. Eco da nossa própria mensagem enviada: confirmar e descartar,
        //    senão mensagens de saída viram mensagens "do cliente".
        if payload.from_me {
            return Ok(WebhookOutcome::Ignored {
                reason: "eco de mensagem própria",
            });
        }

        // 3. Remetente é obrigatório; ausência é evento genuinamente malformado.
        let sender = extract_sender(&payload).ok_or_else(|| {
            AppError::InvalidWebhookPayload("remetente ausente ou vazio".to_string())
        })?;

        // 4. Sessão -> organização. Sem dono, nada é criado.
        let tenant_id = self
            .sessions
            .find_tenant_by_session(&envelope.session)
            .await?
            .ok_or(AppError::SessionNotFound)?;

        // 5. Forma canônica do endereço, a chave de deduplicação.
        let canonical = normalize_phone(&sender);
        if canonical.is_empty() {
            return Err(AppError::InvalidWebhookPayload(
                "remetente sem dígitos".to_string(),
            ));
        }

        // 6. Thread do cliente + persistência da mensagem.
        let conversation = self
            .find_or_create_conversation(tenant_id, &canonical, payload.push_name.as_deref())
            .await?;

        let body = extract_body(&payload);
        let sent_at = payload
            .timestamp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        let message = self
            .conversations
            .insert_message(
                &conversation,
                MessageDirection::Inbound,
                &body,
                payload.id.as_deref(),
                sent_at,
                Some(&envelope.payload),
            )
            .await?;

        let conversation = self
            .conversations
            .register_inbound_message(tenant_id, conversation.id, sent_at, &body)
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            conversation_id = %conversation.id,
            message_id = %message.id,
            "mensagem recebida registrada"
        );

        Ok(WebhookOutcome::Stored {
            conversation,
            message,
        })
    }

    /// Find-or-create da conversa para (tenant, telefone canônico).
    ///
    /// Duas entregas concorrentes para um cliente novo podem tentar o insert
    /// ao mesmo tempo; quem perder a corrida no índice único relê e retorna
    /// a linha vencedora em vez de falhar.
    async fn find_or_create_conversation(
        &self,
        tenant_id: Uuid,
        canonical_phone: &str,
        display_name_hint: Option<&str>,
    ) -> Result<Conversation, AppError> {
        if let Some(existing) = self
            .conversations
            .find_by_phone(tenant_id, canonical_phone)
            .await?
        {
            return Ok(existing);
        }

        match self
            .conversations
            .insert(tenant_id, canonical_phone, display_name_hint)
            .await?
        {
            InsertResult::Inserted(conversation) => Ok(conversation),
            InsertResult::UniqueViolation => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    phone = canonical_phone,
                    "corrida na criação da conversa; relendo a vencedora"
                );
                self.conversations
                    .find_by_phone(tenant_id, canonical_phone)
                    .await?
                    .ok_or_else(|| {
                        // Violação única sem linha legível em seguida só
                        // acontece se alguém apagou a vencedora no meio.
                        AppError::InternalServerError(anyhow::anyhow!(
                            "conversa vencedora da corrida não encontrada (tenant {tenant_id})"
                        ))
                    })
            }
        }
    }

    pub async fn list_conversations(&self, tenant_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        self.conversations.list_for_tenant(tenant_id).await
    }

    pub async fn list_messages(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, AppError> {
        // 404 se a conversa não é deste tenant: isolamento antes de tudo.
        self.conversations
            .find_by_id(tenant_id, conversation_id)
            .await?
            .ok_or(AppError::ConversationNotFound)?;

        self.conversations
            .list_messages(tenant_id, conversation_id)
            .await
    }
}

fn is_inbound_event(event: &str) -> bool {
    INBOUND_EVENTS.contains(&event)
}

fn extract_sender(payload: &WebhookMessagePayload) -> Option<String> {
    payload
        .from
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// `body` ou `text`, conforme o provedor; mensagem de mídia pode vir sem
// texto nenhum e ainda assim conta na thread.
fn extract_body(payload: &WebhookMessagePayload) -> String {
    payload
        .body
        .clone()
        .or_else(|| payload.text.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn so_eventos_de_mensagem_sao_processados() {
        assert!(is_inbound_event("message"));
        assert!(is_inbound_event("message.any"));
        assert!(!is_inbound_event("session.status"));
        assert!(!is_inbound_event("message.ack"));
        assert!(!is_inbound_event(""));
    }

    #[test]
    fn remetente_vazio_ou_ausente_nao_passa() {
        let vazio = WebhookMessagePayload {
            from: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(extract_sender(&vazio).is_none());
        assert!(extract_sender(&WebhookMessagePayload::default()).is_none());

        let ok = WebhookMessagePayload {
            from: Some(" 5215512345678@c.us ".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_sender(&ok).as_deref(), Some("5215512345678@c.us"));
    }

    #[test]
    fn corpo_cai_para_text_quando_body_falta() {
        let payload = WebhookMessagePayload {
            text: Some("hola".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_body(&payload), "hola");

        let midia = WebhookMessagePayload::default();
        assert_eq!(extract_body(&midia), "");
    }
}
