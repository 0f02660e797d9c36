// src/db.rs

pub mod crm_repo;
pub mod tenancy_repo;
pub mod whatsapp_repo;

pub use crm_repo::LeadRepository;
pub use tenancy_repo::SessionRepository;
pub use whatsapp_repo::ConversationRepository;

/// Resultado de um insert otimista sobre uma chave única.
///
/// Violação de unicidade aqui NÃO é erro: é o sinal de que um escritor
/// concorrente criou a linha lógica primeiro. O chamador relê/localiza a
/// linha vencedora em vez de propagar falha.
#[derive(Debug)]
pub enum InsertResult<T> {
    Inserted(T),
    UniqueViolation,
}
