// src/services/crm_service.rs

use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        phone::{normalize_phone, phones_match},
    },
    db::{ConversationRepository, InsertResult, LeadRepository},
    models::crm::{ConvertLeadPayload, Lead, LeadStatus},
};

const DEFAULT_LEAD_SOURCE: &str = "whatsapp";

/// Resultado da conversão: `existing = true` quando a requisição caiu no
/// caminho de corrida ou no curto-circuito idempotente, ou seja, o lead já
/// existia e nós só (re)vinculamos a conversa.
#[derive(Debug)]
pub struct LeadOutcome {
    pub lead: Lead,
    pub existing: bool,
}

#[derive(Clone)]
pub struct CrmService {
    leads: LeadRepository,
    conversations: ConversationRepository,
}

impl CrmService {
    pub fn new(leads: LeadRepository, conversations: ConversationRepository) -> Self {
        Self {
            leads,
            conversations,
        }
    }

    /// Converte uma conversa em lead do funil de vendas.
    ///
    /// Dois caminhos:
    /// - otimista: insere o lead; se o banco aceitar, vincula a conversa.
    /// - corrida: o insert bate no índice único de (tenant, telefone) porque
    ///   um chamador concorrente acabou de criar o lead. Isso NÃO é erro:
    ///   localizamos o lead vencedor (igualdade canônica, depois sufixo de
    ///   10 dígitos, depois o primeiro registro como último recurso),
    ///   vinculamos a conversa a ele e devolvemos `existing = true`.
    ///
    /// Chamar duas vezes para a mesma conversa nunca cria dois leads.
    pub async fn convert_to_lead(
        &self,
        tenant_id: Uuid,
        payload: &ConvertLeadPayload,
    ) -> Result<LeadOutcome, AppError> {
        let conversation = self
            .conversations
            .find_by_id(tenant_id, payload.conversation_id)
            .await?
            .ok_or(AppError::ConversationNotFound)?;

        // Curto-circuito idempotente: a conversa já aponta para um lead.
        if conversation.is_lead {
            if let Some(lead_id) = conversation.lead_id {
                if let Some(lead) = self.leads.find_by_id(tenant_id, lead_id).await? {
                    return Ok(LeadOutcome {
                        lead,
                        existing: true,
                    });
                }
                // Referência pendurada (lead apagado por fora): segue para
                // o caminho de criação e o vínculo é refeito.
                tracing::warn!(
                    tenant_id = %tenant_id,
                    conversation_id = %conversation.id,
                    lead_id = %lead_id,
                    "conversa aponta para lead inexistente; recriando vínculo"
                );
            }
        }

        // Campos de contato derivados da própria conversa. A conversa não
        // guarda e-mail; o operador completa depois pela tela de CRM.
        let name = conversation
            .display_name
            .clone()
            .unwrap_or_else(|| conversation.phone.clone());
        let phone = normalize_phone(&conversation.phone);
        let source = payload.lead_source.as_deref().unwrap_or(DEFAULT_LEAD_SOURCE);

        let inserted = self
            .leads
            .insert(
                tenant_id,
                &name,
                &phone,
                None,
                payload.estimated_value,
                source,
                payload.assigned_to.as_deref(),
                payload.notes.as_deref(),
                Some(conversation.id),
            )
            .await?;

        match inserted {
            InsertResult::Inserted(lead) => {
                self.conversations
                    .link_lead(tenant_id, conversation.id, lead.id)
                    .await?;
                tracing::info!(
                    tenant_id = %tenant_id,
                    conversation_id = %conversation.id,
                    lead_id = %lead.id,
                    "conversa convertida em lead"
                );
                Ok(LeadOutcome {
                    lead,
                    existing: false,
                })
            }
            InsertResult::UniqueViolation => {
                // Alguém converteu este cliente entre a nossa leitura e o
                // insert. Localiza o lead vencedor e vincula a conversa.
                let all = self.leads.list_for_tenant(tenant_id).await?;
                let winner = pick_matching_lead(&all, &phone).cloned().ok_or_else(|| {
                    AppError::InternalServerError(anyhow::anyhow!(
                        "violação de unicidade sem lead localizável (tenant {tenant_id})"
                    ))
                })?;

                self.conversations
                    .link_lead(tenant_id, conversation.id, winner.id)
                    .await?;
                tracing::info!(
                    tenant_id = %tenant_id,
                    conversation_id = %conversation.id,
                    lead_id = %winner.id,
                    "corrida na conversão; conversa vinculada a lead existente"
                );
                Ok(LeadOutcome {
                    lead: winner,
                    existing: true,
                })
            }
        }
    }

    pub async fn list_leads(&self, tenant_id: Uuid) -> Result<Vec<Lead>, AppError> {
        self.leads.list_for_tenant(tenant_id).await
    }

    pub async fn update_lead_status(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<Lead, AppError> {
        self.leads
            .update_status(tenant_id, lead_id, status)
            .await?
            .ok_or(AppError::LeadNotFound)
    }
}

/// Escolhe, entre os leads do tenant, o que corresponde ao telefone dado:
/// igualdade canônica exata tem preferência, depois o casamento aproximado
/// por sufixo, e por fim o primeiro registro como último recurso.
fn pick_matching_lead<'a>(leads: &'a [Lead], phone: &str) -> Option<&'a Lead> {
    let canonical = normalize_phone(phone);

    leads
        .iter()
        .find(|l| normalize_phone(&l.phone) == canonical)
        .or_else(|| leads.iter().find(|l| phones_match(&l.phone, phone)))
        .or_else(|| leads.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lead(phone: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Cliente".to_string(),
            phone: phone.to_string(),
            email: None,
            estimated_value: None,
            source: "whatsapp".to_string(),
            assigned_to: None,
            status: LeadStatus::New,
            notes: None,
            whatsapp_conversation_id: None,
            created_at: Utc::now(),
            converted_at: None,
        }
    }

    #[test]
    fn igualdade_exata_tem_preferencia_sobre_sufixo() {
        // O primeiro casa só por sufixo; o segundo é canônico idêntico.
        let leads = vec![lead("5512345678"), lead("525512345678")];
        let escolhido = pick_matching_lead(&leads, "+52 55 1234 5678").unwrap();
        assert_eq!(escolhido.phone, "525512345678");
    }

    #[test]
    fn sufixo_casa_quando_codigo_do_pais_diverge() {
        let leads = vec![lead("5215587654321"), lead("5512345678")];
        let escolhido = pick_matching_lead(&leads, "5215512345678").unwrap();
        assert_eq!(escolhido.phone, "5512345678");
    }

    #[test]
    fn primeiro_registro_e_o_ultimo_recurso() {
        let leads = vec![lead("111"), lead("222")];
        let escolhido = pick_matching_lead(&leads, "5215512345678").unwrap();
        assert_eq!(escolhido.phone, "111");
    }

    #[test]
    fn lista_vazia_nao_escolhe_nada() {
        assert!(pick_matching_lead(&[], "5215512345678").is_none());
    }
}
