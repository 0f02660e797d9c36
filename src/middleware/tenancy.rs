// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use serde_json::json;
use uuid::Uuid;

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

// Extrator do tenant nas rotas de operador. A autenticação em si
// (quem é o usuário, se ele pode acessar este tenant) é resolvida por
// outro subsistema antes de chegar aqui; nós só precisamos do UUID.
#[derive(Debug, Clone)]
pub struct TenantContext(pub Uuid);

// Rejeição simples: status + mensagem, já em JSON.
pub struct TenantRejection {
    status: StatusCode,
    message: &'static str,
}

impl axum::response::IntoResponse for TenantRejection {
    fn into_response(self) -> axum::response::Response {
        let body = axum::Json(json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = TenantRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Tenta ler o cabeçalho X-Tenant-ID
        let header_value = parts.headers.get(TENANT_ID_HEADER);

        match header_value {
            Some(value) => {
                let value_str = value.to_str().map_err(|_| TenantRejection {
                    status: StatusCode::BAD_REQUEST,
                    message: "Cabeçalho X-Tenant-ID contém caracteres inválidos.",
                })?;

                let tenant_id = Uuid::parse_str(value_str).map_err(|_| TenantRejection {
                    status: StatusCode::BAD_REQUEST,
                    message: "Cabeçalho X-Tenant-ID inválido (não é um UUID).",
                })?;

                Ok(TenantContext(tenant_id))
            }
            None => Err(TenantRejection {
                status: StatusCode::BAD_REQUEST,
                message: "O cabeçalho X-Tenant-ID é obrigatório.",
            }),
        }
    }
}
