// src/services/reconcile_service.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::{error::AppError, phone::normalize_phone},
    db::{ConversationRepository, LeadRepository},
    models::whatsapp::{Conversation, ReconcileSummary},
};

// Job administrativo de reconciliação de conversas duplicadas.
//
// Dados legados guardam telefones sem normalização; o mesmo cliente pode ter
// várias threads ("5215512345678", "+52 1 55 1234 5678"...). O job agrupa
// pelo telefone canônico, reescreve formas cruas e mescla duplicatas na
// conversa mais antiga, preservando todas as mensagens.
//
// Falha em um grupo é logada e não derruba o lote: o erro fica escopado ao
// grupo corrente e os demais seguem. Rodar de novo depois é seguro: a
// segunda passada vira no-op.
//
// Restrição operacional: NÃO rodar duas instâncias para o mesmo tenant ao
// mesmo tempo, nem junto com tráfego vivo de webhook desse tenant.
#[derive(Clone)]
pub struct ReconcileService {
    conversations: ConversationRepository,
    leads: LeadRepository,
}

/// Plano de trabalho de um grupo canônico: quem sobrevive, quem é mesclada
/// e se o telefone armazenado da sobrevivente precisa ser reescrito.
/// Função pura dos dados carregados; a execução (apply_plan) é quem toca o
/// banco.
#[derive(Debug)]
struct GroupPlan {
    canonical: String,
    survivor: Conversation,
    rewrite_survivor_phone: bool,
    duplicates: Vec<Conversation>,
}

impl ReconcileService {
    pub fn new(conversations: ConversationRepository, leads: LeadRepository) -> Self {
        Self {
            conversations,
            leads,
        }
    }

    pub async fn reconcile_tenant(&self, tenant_id: Uuid) -> Result<ReconcileSummary, AppError> {
        let all = self.conversations.list_oldest_first(tenant_id).await?;
        let total = all.len();
        let plans = plan_groups(group_by_canonical(all));

        let mut summary = ReconcileSummary::default();

        for plan in &plans {
            // Erro aqui fica no grupo: loga com as chaves de correlação e
            // segue para o próximo, como no tratamento por duplicata.
            if let Err(e) = self.apply_plan(tenant_id, plan, &mut summary).await {
                tracing::error!(
                    tenant_id = %tenant_id,
                    survivor_id = %plan.survivor.id,
                    canonical = %plan.canonical,
                    error = %e,
                    "falha ao processar grupo; seguindo para o próximo"
                );
            }
        }

        tracing::info!(
            tenant_id = %tenant_id,
            conversations = total,
            phones_normalized = summary.phones_normalized,
            conversations_merged = summary.conversations_merged,
            groups_processed = summary.groups_processed,
            "reconciliação concluída"
        );

        Ok(summary)
    }

    async fn apply_plan(
        &self,
        tenant_id: Uuid,
        plan: &GroupPlan,
        summary: &mut ReconcileSummary,
    ) -> Result<(), AppError> {
        // Singleton com telefone cru: só reescrita, nada a mesclar.
        if plan.duplicates.is_empty() {
            if plan.rewrite_survivor_phone {
                self.normalize_stored_phone(tenant_id, &plan.survivor, &plan.canonical)
                    .await?;
                summary.phones_normalized += 1;
            }
            return Ok(());
        }

        // O vínculo de lead pode vir de uma duplicata se a sobrevivente não
        // tiver o seu.
        let mut survivor_lead = plan.survivor.lead_id;
        let mut skipped = 0u32;

        for duplicate in &plan.duplicates {
            match self
                .merge_duplicate(tenant_id, &plan.survivor, duplicate, &mut survivor_lead)
                .await
            {
                Ok(moved) => {
                    summary.conversations_merged += 1;
                    tracing::info!(
                        tenant_id = %tenant_id,
                        survivor_id = %plan.survivor.id,
                        duplicate_id = %duplicate.id,
                        messages_moved = moved,
                        "conversa duplicada mesclada"
                    );
                }
                Err(e) => {
                    // Progresso parcial dentro do grupo é aceitável: a
                    // duplicata que falhou será pega na próxima execução.
                    skipped += 1;
                    tracing::error!(
                        tenant_id = %tenant_id,
                        survivor_id = %plan.survivor.id,
                        duplicate_id = %duplicate.id,
                        error = %e,
                        "falha ao mesclar duplicata; seguindo para a próxima"
                    );
                }
            }
        }

        // Recontagem direta, nunca soma dos contadores pré-merge: contador
        // incremental pode carregar drift e drift não pode compor.
        let count = self
            .conversations
            .count_messages(tenant_id, plan.survivor.id)
            .await?;
        let count = i32::try_from(count).map_err(|_| {
            AppError::InternalServerError(anyhow::anyhow!(
                "contagem de mensagens fora do alcance de i32 (conversa {})",
                plan.survivor.id
            ))
        })?;
        self.conversations
            .set_messages_count(tenant_id, plan.survivor.id, count)
            .await?;

        // A reescrita do telefone da sobrevivente vem DEPOIS das exclusões:
        // uma duplicata recente pode já armazenar a string canônica e, com
        // ela viva, o UPDATE bateria no índice único de (tenant_id, phone).
        // Apagadas as duplicatas, nenhuma outra linha do tenant pode segurar
        // essa string (normalizar é idempotente, então quem a tivesse
        // estaria neste mesmo grupo).
        if plan.rewrite_survivor_phone {
            if skipped == 0 {
                self.normalize_stored_phone(tenant_id, &plan.survivor, &plan.canonical)
                    .await?;
                summary.phones_normalized += 1;
            } else {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    survivor_id = %plan.survivor.id,
                    "duplicata pulada no grupo; normalização da sobrevivente adiada para a próxima execução"
                );
            }
        }

        summary.groups_processed += 1;
        Ok(())
    }

    // Reescreve o telefone armazenado para a forma canônica e propaga a
    // mesma normalização para o lead vinculado, se houver.
    async fn normalize_stored_phone(
        &self,
        tenant_id: Uuid,
        conversation: &Conversation,
        canonical: &str,
    ) -> Result<(), AppError> {
        self.conversations
            .set_phone(tenant_id, conversation.id, canonical)
            .await?;

        if let Some(lead_id) = conversation.lead_id {
            self.leads.set_phone(tenant_id, lead_id, canonical).await?;
        }

        Ok(())
    }

    async fn merge_duplicate(
        &self,
        tenant_id: Uuid,
        survivor: &Conversation,
        duplicate: &Conversation,
        survivor_lead: &mut Option<Uuid>,
    ) -> Result<u64, AppError> {
        let moved = self
            .conversations
            .reassign_messages(tenant_id, duplicate.id, survivor.id)
            .await?;

        // A duplicata pode ser a ponta vinculada ao lead; o vínculo migra
        // para a sobrevivente antes da linha sumir.
        if survivor_lead.is_none() {
            if let Some(lead_id) = duplicate.lead_id {
                self.conversations
                    .link_lead(tenant_id, survivor.id, lead_id)
                    .await?;
                self.leads
                    .set_conversation(tenant_id, lead_id, survivor.id)
                    .await?;
                *survivor_lead = Some(lead_id);
            }
        }

        // Só apaga depois que as mensagens já moraram na sobrevivente.
        self.conversations.delete(tenant_id, duplicate.id).await?;

        Ok(moved)
    }
}

/// Agrupa as conversas pelo telefone canônico, preservando a ordem de
/// chegada (a entrada veio ordenada por created_at ascendente, então o
/// primeiro de cada grupo é o mais antigo).
fn group_by_canonical(conversations: Vec<Conversation>) -> Vec<(String, Vec<Conversation>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Conversation>)> = Vec::new();

    for conversation in conversations {
        let canonical = normalize_phone(&conversation.phone);
        match index.get(&canonical) {
            Some(&i) => groups[i].1.push(conversation),
            None => {
                index.insert(canonical.clone(), groups.len());
                groups.push((canonical, vec![conversation]));
            }
        }
    }

    groups
}

/// Transforma os grupos em planos executáveis. Grupos sem dígito algum no
/// telefone ficam de fora (não há chave de deduplicação; limpeza manual),
/// assim como singletons já canônicos (nada a fazer).
fn plan_groups(groups: Vec<(String, Vec<Conversation>)>) -> Vec<GroupPlan> {
    let mut plans = Vec::new();

    for (canonical, mut group) in groups {
        if canonical.is_empty() {
            continue;
        }

        let survivor = group.remove(0);
        let rewrite_survivor_phone = survivor.phone != canonical;

        if group.is_empty() && !rewrite_survivor_phone {
            continue;
        }

        plans.push(GroupPlan {
            canonical,
            survivor,
            rewrite_survivor_phone,
            duplicates: group,
        });
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::whatsapp::ConversationStatus;
    use chrono::{Duration, Utc};

    fn conversation(phone: &str, minutes_ago: i64) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            phone: phone.to_string(),
            display_name: None,
            status: ConversationStatus::Active,
            last_message_at: None,
            last_message_text: None,
            messages_count: 0,
            is_lead: false,
            lead_id: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn formas_diferentes_do_mesmo_numero_caem_no_mesmo_grupo() {
        let a = conversation("5215512345678", 30);
        let b = conversation("+52 1 55 1234 5678", 10);
        let groups = group_by_canonical(vec![a.clone(), b]);

        assert_eq!(groups.len(), 1);
        let (canonical, members) = &groups[0];
        assert_eq!(canonical, "525512345678");
        assert_eq!(members.len(), 2);
        // A mais antiga veio primeiro e será a sobrevivente.
        assert_eq!(members[0].id, a.id);
    }

    #[test]
    fn numeros_distintos_ficam_em_grupos_distintos() {
        let groups = group_by_canonical(vec![
            conversation("525512345678", 5),
            conversation("525587654321", 3),
        ]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn segunda_passada_sobre_dados_canonicos_nao_gera_plano() {
        // Estado pós-reconciliação: telefones já canônicos e únicos.
        let plans = plan_groups(group_by_canonical(vec![
            conversation("525512345678", 5),
            conversation("525587654321", 3),
        ]));
        assert!(plans.is_empty());
    }

    #[test]
    fn sobrevivente_crua_com_duplicata_ja_canonica_planeja_merge_e_reescrita() {
        // A forma mais comum de duplicata legada: a linha antiga guarda o
        // telefone cru e uma linha nova (criada pelo webhook) já guarda a
        // string canônica. A canônica precisa sair ANTES da reescrita do
        // telefone da sobrevivente, senão o índice único reclama.
        let legada = conversation("+52 1 55 1234 5678", 60);
        let nova = conversation("525512345678", 5);
        let plans = plan_groups(group_by_canonical(vec![legada.clone(), nova.clone()]));

        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        assert_eq!(plan.survivor.id, legada.id);
        assert!(plan.rewrite_survivor_phone);
        // A linha que já segura a string canônica é mesclada (e apagada),
        // liberando o valor para a sobrevivente.
        assert_eq!(plan.duplicates.len(), 1);
        assert_eq!(plan.duplicates[0].id, nova.id);
        assert_eq!(plan.duplicates[0].phone, plan.canonical);
    }

    #[test]
    fn plano_contabiliza_uma_particao_mista() {
        // Partição: singleton já canônico, singleton cru, grupo de 3 com
        // sobrevivente crua, grupo de 2 com sobrevivente já canônica e uma
        // conversa sem dígitos.
        let convs = vec![
            conversation("525533334444", 90),         // singleton canônico
            conversation("+52 55 1111 2222", 80),     // singleton cru
            conversation("+52 1 55 1234 5678", 70),   // grupo A, sobrevivente crua
            conversation("525587654321", 60),         // grupo B, sobrevivente canônica
            conversation("5215512345678", 50),        // grupo A
            conversation("sem numero", 40),           // sem dígitos: fora
            conversation("525512345678", 30),         // grupo A
            conversation("+52 1 55 8765 4321", 20),   // grupo B
        ];

        let plans = plan_groups(group_by_canonical(convs));

        // Singleton canônico e conversa sem dígitos não geram plano.
        assert_eq!(plans.len(), 3);

        // Contabilidade esperada do resumo numa execução sem falhas.
        let phones_normalized = plans.iter().filter(|p| p.rewrite_survivor_phone).count();
        let conversations_merged: usize = plans.iter().map(|p| p.duplicates.len()).sum();
        let groups_processed = plans.iter().filter(|p| !p.duplicates.is_empty()).count();

        assert_eq!(phones_normalized, 2); // singleton cru + sobrevivente do grupo A
        assert_eq!(conversations_merged, 3); // 2 do grupo A + 1 do grupo B
        assert_eq!(groups_processed, 2);

        // Conservação: todo membro de um grupo com duplicatas aparece no
        // plano exatamente uma vez (sobrevivente ou duplicata); nenhuma
        // thread some sem antes ceder suas mensagens à sobrevivente.
        for plan in &plans {
            let mut ids: Vec<Uuid> = plan.duplicates.iter().map(|c| c.id).collect();
            ids.push(plan.survivor.id);
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), plan.duplicates.len() + 1);
        }
    }
}
