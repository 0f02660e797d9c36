// src/db/tenancy_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::common::error::AppError;

// Resolve a sessão do provedor de mensageria para a organização dona.
// O provisionamento (URL/credenciais do canal) é gerido por outro
// subsistema; aqui a sessão é só uma chave opaca de lookup.
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Retorna o tenant dono da sessão, ou None se a sessão não está registrada.
    pub async fn find_tenant_by_session(
        &self,
        session_key: &str,
    ) -> Result<Option<Uuid>, AppError> {
        let tenant_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT tenant_id FROM whatsapp_sessions WHERE session_key = $1",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant_id)
    }
}
