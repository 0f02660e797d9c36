// src/docs.rs

use crate::handlers;
use crate::models;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- WhatsApp ---
        handlers::whatsapp::receive_webhook,
        handlers::whatsapp::list_conversations,
        handlers::whatsapp::list_messages,

        // --- CRM ---
        handlers::crm::convert_lead,
        handlers::crm::list_leads,
        handlers::crm::update_lead_status,

        // --- Admin ---
        handlers::admin::reconcile_conversations,
    ),
    components(
        schemas(
            // --- WhatsApp ---
            models::whatsapp::Conversation,
            models::whatsapp::ConversationStatus,
            models::whatsapp::Message,
            models::whatsapp::MessageDirection,
            models::whatsapp::WebhookEnvelope,
            models::whatsapp::WebhookMessagePayload,
            models::whatsapp::WebhookResponse,
            models::whatsapp::ReconcileSummary,

            // --- CRM ---
            models::crm::Lead,
            models::crm::LeadStatus,
            models::crm::ConvertLeadPayload,
            models::crm::UpdateLeadStatusPayload,
            models::crm::LeadConversionResponse,
        )
    ),
    tags(
        (name = "WhatsApp", description = "Ingestão de mensagens e conversas"),
        (name = "CRM", description = "Funil de leads"),
        (name = "Admin", description = "Rotinas administrativas")
    )
)]
pub struct ApiDoc;
