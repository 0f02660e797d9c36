// src/db/whatsapp_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InsertResult,
    models::whatsapp::{Conversation, Message, MessageDirection},
};

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CONVERSAS
    // =========================================================================

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, tenant_id, phone, display_name, status,
                   last_message_at, last_message_text, messages_count,
                   is_lead, lead_id, created_at
            FROM whatsapp_conversations
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    pub async fn find_by_phone(
        &self,
        tenant_id: Uuid,
        phone: &str,
    ) -> Result<Option<Conversation>, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, tenant_id, phone, display_name, status,
                   last_message_at, last_message_text, messages_count,
                   is_lead, lead_id, created_at
            FROM whatsapp_conversations
            WHERE tenant_id = $1 AND phone = $2
            "#,
        )
        .bind(tenant_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Insert otimista de uma conversa nova. Duas entregas de webhook para um
    /// cliente novo podem correr até aqui; o índice único em
    /// (tenant_id, phone) decide o vencedor e o perdedor recebe
    /// `InsertResult::UniqueViolation` para reler a linha vencedora.
    pub async fn insert(
        &self,
        tenant_id: Uuid,
        phone: &str,
        display_name: Option<&str>,
    ) -> Result<InsertResult<Conversation>, AppError> {
        let inserted = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO whatsapp_conversations (tenant_id, phone, display_name)
            VALUES ($1, $2, $3)
            RETURNING id, tenant_id, phone, display_name, status,
                      last_message_at, last_message_text, messages_count,
                      is_lead, lead_id, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(phone)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(conversation) => Ok(InsertResult::Inserted(conversation)),
            Err(e) => {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return Ok(InsertResult::UniqueViolation);
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Atualiza os campos informativos da conversa a cada mensagem recebida.
    /// É update-in-place (last-writer-wins); o contador incrementa no banco
    /// para não perder incrementos entre requisições concorrentes.
    pub async fn register_inbound_message(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
        at: DateTime<Utc>,
        text: &str,
    ) -> Result<Conversation, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE whatsapp_conversations
            SET last_message_at = $3,
                last_message_text = $4,
                messages_count = messages_count + 1
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, phone, display_name, status,
                      last_message_at, last_message_text, messages_count,
                      is_lead, lead_id, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(at)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    // Listagem para a caixa de entrada do operador: atividade recente primeiro.
    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, tenant_id, phone, display_name, status,
                   last_message_at, last_message_text, messages_count,
                   is_lead, lead_id, created_at
            FROM whatsapp_conversations
            WHERE tenant_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    // Carga para o job de reconciliação: mais antiga primeiro, pois a
    // primeira de cada grupo de duplicatas é a sobrevivente canônica.
    pub async fn list_oldest_first(&self, tenant_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, tenant_id, phone, display_name, status,
                   last_message_at, last_message_text, messages_count,
                   is_lead, lead_id, created_at
            FROM whatsapp_conversations
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    pub async fn set_phone(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
        phone: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE whatsapp_conversations SET phone = $3 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Atualiza a referência fraca para o lead. A verdade do funil vive no
    // Lead; aqui é só cache de exibição.
    pub async fn link_lead(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
        lead_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE whatsapp_conversations
            SET is_lead = TRUE, lead_id = $3
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(lead_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_messages_count(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
        count: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE whatsapp_conversations SET messages_count = $3 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Só o job de reconciliação chama isto, e só depois de reatribuir as
    // mensagens da duplicata para a sobrevivente.
    pub async fn delete(&self, tenant_id: Uuid, conversation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM whatsapp_conversations WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  MENSAGENS
    // =========================================================================

    /// Insert puro de uma mensagem. O tenant_id é carimbado a partir da
    /// conversa dona, então a invariante de isolamento vale por construção.
    pub async fn insert_message(
        &self,
        conversation: &Conversation,
        direction: MessageDirection,
        body: &str,
        provider_message_id: Option<&str>,
        sent_at: DateTime<Utc>,
        raw_payload: Option<&Value>,
    ) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO whatsapp_messages (
                conversation_id, tenant_id, direction, body,
                provider_message_id, sent_at, raw_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, conversation_id, tenant_id, direction, body,
                      provider_message_id, sent_at, raw_payload, created_at
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.tenant_id)
        .bind(direction)
        .bind(body)
        .bind(provider_message_id)
        .bind(sent_at)
        .bind(raw_payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    // A ordem exposta é por sent_at (desempate pelo id do provedor):
    // a ordem de inserção não é garantia de nada sob entregas concorrentes.
    pub async fn list_messages(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, tenant_id, direction, body,
                   provider_message_id, sent_at, raw_payload, created_at
            FROM whatsapp_messages
            WHERE tenant_id = $1 AND conversation_id = $2
            ORDER BY sent_at ASC, provider_message_id ASC NULLS LAST
            "#,
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Move em bloco as mensagens de uma conversa duplicada para a
    /// sobrevivente. Retorna quantas linhas foram movidas.
    pub async fn reassign_messages(
        &self,
        tenant_id: Uuid,
        from_conversation: Uuid,
        to_conversation: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE whatsapp_messages
            SET conversation_id = $3
            WHERE tenant_id = $1 AND conversation_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(from_conversation)
        .bind(to_conversation)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Contagem direta das mensagens de uma conversa. Usada para recalcular
    /// messages_count depois de um merge, em vez de somar contadores
    /// pré-merge (que podem carregar drift acumulado).
    pub async fn count_messages(
        &self,
        tenant_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM whatsapp_messages WHERE tenant_id = $1 AND conversation_id = $2",
        )
        .bind(tenant_id)
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
