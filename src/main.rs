//src/main.rs

use axum::{
    Router,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rota pública: o provedor de mensageria chama sem cabeçalho de tenant;
    // a organização dona é resolvida pela sessão dentro do evento.
    let whatsapp_routes = Router::new()
        .route("/webhook", post(handlers::whatsapp::receive_webhook))
        .route(
            "/conversations",
            get(handlers::whatsapp::list_conversations),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::whatsapp::list_messages),
        )
        .route(
            "/admin/reconcile",
            post(handlers::admin::reconcile_conversations),
        );

    let crm_routes = Router::new()
        .route("/leads", get(handlers::crm::list_leads))
        .route("/leads/convert", post(handlers::crm::convert_lead))
        .route("/leads/{id}/status", patch(handlers::crm::update_lead_status));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/whatsapp", whatsapp_routes)
        .nest("/api/crm", crm_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
