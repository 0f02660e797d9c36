// src/db/crm_repo.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InsertResult,
    models::crm::{Lead, LeadStatus},
};

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert otimista de um lead novo (status NEW). A unicidade de
    /// (tenant_id, phone) é do banco; quem perder a corrida recebe
    /// `InsertResult::UniqueViolation` e o serviço localiza o lead vencedor.
    pub async fn insert(
        &self,
        tenant_id: Uuid,
        name: &str,
        phone: &str,
        email: Option<&str>,
        estimated_value: Option<Decimal>,
        source: &str,
        assigned_to: Option<&str>,
        notes: Option<&str>,
        conversation_id: Option<Uuid>,
    ) -> Result<InsertResult<Lead>, AppError> {
        let inserted = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                tenant_id, name, phone, email, estimated_value,
                source, assigned_to, notes, whatsapp_conversation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, tenant_id, name, phone, email, estimated_value,
                      source, assigned_to, status, notes,
                      whatsapp_conversation_id, created_at, converted_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(phone)
        .bind(email)
        .bind(estimated_value)
        .bind(source)
        .bind(assigned_to)
        .bind(notes)
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(lead) => Ok(InsertResult::Inserted(lead)),
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

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, tenant_id, name, phone, email, estimated_value,
                   source, assigned_to, status, notes,
                   whatsapp_conversation_id, created_at, converted_at
            FROM leads
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    pub async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, tenant_id, name, phone, email, estimated_value,
                   source, assigned_to, status, notes,
                   whatsapp_conversation_id, created_at, converted_at
            FROM leads
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(leads)
    }

    // Propagação da normalização de telefone feita pelo job de reconciliação.
    pub async fn set_phone(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        phone: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE leads SET phone = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(lead_id)
            .bind(phone)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Mantém a referência de exibição apontando para a conversa sobrevivente
    // quando a duplicata vinculada é apagada num merge.
    pub async fn set_conversation(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE leads SET whatsapp_conversation_id = $3 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(lead_id)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Avança o status no funil. `converted_at` é carimbado na primeira
    /// transição para CONVERTED e não é sobrescrito depois.
    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET status = $3,
                converted_at = CASE
                    WHEN $3 = 'CONVERTED'::lead_status AND converted_at IS NULL THEN NOW()
                    ELSE converted_at
                END
            WHERE tenant_id = $1 AND id = $2
            RETURNING id, tenant_id, name, phone, email, estimated_value,
                      source, assigned_to, status, notes,
                      whatsapp_conversation_id, created_at, converted_at
            "#,
        )
        .bind(tenant_id)
        .bind(lead_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }
}
