// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, time::Duration};

use crate::{
    db::{ConversationRepository, LeadRepository, SessionRepository},
    services::{CrmService, ReconcileService, WhatsappService},
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub whatsapp_service: WhatsappService,
    pub crm_service: CrmService,
    pub reconcile_service: ReconcileService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let sessions = SessionRepository::new(db_pool.clone());
        let conversations = ConversationRepository::new(db_pool.clone());
        let leads = LeadRepository::new(db_pool.clone());

        let whatsapp_service = WhatsappService::new(sessions, conversations.clone());
        let crm_service = CrmService::new(leads.clone(), conversations.clone());
        let reconcile_service = ReconcileService::new(conversations, leads);

        Ok(Self {
            db_pool,
            whatsapp_service,
            crm_service,
            reconcile_service,
        })
    }
}
