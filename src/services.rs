// src/services.rs

pub mod crm_service;
pub mod reconcile_service;
pub mod whatsapp_service;

pub use crm_service::CrmService;
pub use reconcile_service::ReconcileService;
pub use whatsapp_service::WhatsappService;
