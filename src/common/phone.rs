// src/common/phone.rs

// Normalização de telefones vindos do provedor de mensageria.
// O endereço pode chegar de várias formas: "5215512345678@c.us",
// "+52 1 55 1234-5678", "52 55 1234 5678"... A chave de deduplicação
// das conversas é a forma canônica (só dígitos) produzida aqui.

/// Quantidade de dígitos usada na comparação aproximada por sufixo.
const SUFFIX_LEN: usize = 10;

/// Produz a representação canônica (só dígitos) de um endereço de telefone.
///
/// 1. Corta qualquer decoração de domínio ("@c.us", "@s.whatsapp.net").
/// 2. Remove tudo que não for dígito.
/// 3. Colapsa o formato WhatsApp México "521" + 10 dígitos para
///    "52" + 10 dígitos (o "1" é o prefixo de longa distância, redundante
///    junto ao código do país).
///
/// A função é pura e idempotente: normalizar um número já canônico o
/// devolve inalterado.
pub fn normalize_phone(raw: &str) -> String {
    let without_domain = raw.split('@').next().unwrap_or(raw);

    let digits: String = without_domain
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.len() == 13 && digits.starts_with("521") {
        return format!("52{}", &digits[3..]);
    }

    digits
}

/// Compara dois endereços como "o mesmo cliente".
///
/// Igualdade exata sobre as formas canônicas; se falhar, compara os
/// últimos 10 dígitos (dados legados têm presença inconsistente do código
/// do país). Simétrica por construção.
pub fn phones_match(a: &str, b: &str) -> bool {
    let ca = normalize_phone(a);
    let cb = normalize_phone(b);

    if ca.is_empty() || cb.is_empty() {
        return false;
    }

    if ca == cb {
        return true;
    }

    match (last_digits(&ca), last_digits(&cb)) {
        (Some(sa), Some(sb)) => sa == sb,
        _ => false,
    }
}

/// Sufixo de 10 dígitos de um número já canônico, se ele tiver tamanho
/// suficiente para a comparação fazer sentido.
pub fn last_digits(canonical: &str) -> Option<&str> {
    if canonical.len() >= SUFFIX_LEN {
        Some(&canonical[canonical.len() - SUFFIX_LEN..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_decoracao_de_dominio_e_pontuacao() {
        assert_eq!(normalize_phone("5215512345678@c.us"), "525512345678");
        assert_eq!(normalize_phone("+52 55 1234 5678"), "525512345678");
        assert_eq!(normalize_phone("(55) 1234-5678"), "5512345678");
    }

    #[test]
    fn colapsa_prefixo_521_do_whatsapp_mexico() {
        assert_eq!(normalize_phone("+52 1 55 1234 5678"), "525512345678");
        assert_eq!(normalize_phone("5215512345678"), "525512345678");
    }

    #[test]
    fn nao_colapsa_numeros_que_so_parecem_ter_o_prefixo() {
        // 12 dígitos começando com 521: o "1" faz parte do número local.
        assert_eq!(normalize_phone("521234567890"), "521234567890");
    }

    #[test]
    fn normalizacao_e_idempotente() {
        for raw in [
            "5215512345678@c.us",
            "+52 1 55 1234 5678",
            "5512345678",
            "",
            "sem digitos",
        ] {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once);
        }
    }

    #[test]
    fn comparacao_aproximada_por_sufixo_e_simetrica() {
        let a = "5215512345678";
        let b = "5512345678"; // mesmo número, sem código do país
        assert!(phones_match(a, b));
        assert!(phones_match(b, a));
    }

    #[test]
    fn numeros_diferentes_nao_casam() {
        assert!(!phones_match("5215512345678", "5215587654321"));
        assert!(!phones_match("", "5512345678"));
    }
}
