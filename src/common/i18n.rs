// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LANG: &str = "en";
pub const SUPPORTED_LANGS: &[&str] = &["en", "pt"];

// Catálogo de mensagens. Placeholders posicionais: {0}, {1}...
const EN: &[(&str, &str)] = &[
    ("validation_failed", "One or more fields are invalid."),
    ("required", "This field is required."),
    ("invalid_email", "The e-mail address is invalid."),
    ("password_too_short", "The password must have at least 6 characters."),
    ("email_already_exists", "This e-mail is already in use."),
    ("invalid_credentials", "Invalid e-mail or password."),
    ("invalid_token", "Missing or invalid authentication token."),
    ("user_not_found", "User not found."),
    ("forbidden", "You are not allowed to perform this action."),
    ("not_found", "{0} not found."),
    ("invalid_transition", "Cannot change status from '{0}' to '{1}'."),
    ("invoice_number_conflict", "Invoice number {0} was taken concurrently. Please retry."),
    ("cron_unauthorized", "Missing or invalid scheduler secret."),
    ("cron_not_configured", "Scheduler secret is not configured."),
    ("integration_failed", "External service failed: {0}"),
    ("internal_error", "An unexpected error occurred."),
    ("amount_not_numeric", "Amount must be a number."),
    ("amount_not_positive", "Amount must be greater than zero."),
    ("quantity_not_numeric", "Quantity must be a number."),
    ("amount_too_precise", "Amounts accept at most 2 decimal places."),
    ("quantity_too_precise", "Quantities accept at most 4 decimal places."),
    ("amount_out_of_range", "The amount is too large."),
    ("line_items_required", "At least one line item is required."),
    ("due_before_issue", "The due date cannot be before the issue date."),
    ("date_out_of_range", "The resulting date is out of range."),
    ("overdue_is_derived", "'overdue' is set automatically once the due date passes."),
    ("invoice_not_draft", "Only draft invoices can have their line items changed."),
    ("invoice_void", "Payments cannot be recorded against a void invoice."),
    ("payment_client_mismatch", "The payment client does not match the invoice client."),
    ("occurrence_not_pending", "This occurrence was already completed or skipped."),
    ("schedule_in_past", "The scheduled time must be in the future."),
    ("post_not_editable", "Only draft or scheduled posts can be changed."),
    ("page_not_connected", "The social page has no stored access token."),
    ("caption_required", "The caption cannot be empty."),
    ("invalid_currency", "Currency must be a 3-letter ISO code."),
    ("prefix_too_long", "The invoice prefix is too long."),
    ("invalid_number_width", "The number width must be between 1 and 12."),
    ("interval_out_of_range", "The recurrence interval must be between 1 and 365."),
    ("recurring_task_needs_due_date", "Recurring tasks need a due date."),
    ("invalid_url", "The URL is invalid."),
    ("message_required", "The message cannot be empty."),
    ("page_connected_elsewhere", "This page is already connected to another client."),
    ("password_required", "The password is required."),
    ("entity.client", "Client"),
    ("entity.invoice", "Invoice"),
    ("entity.task", "Task"),
    ("entity.occurrence", "Task occurrence"),
    ("entity.page", "Social page"),
    ("entity.post", "Social post"),
    ("entity.conversation", "Conversation"),
    ("entity.user", "User"),
];

const PT: &[(&str, &str)] = &[
    ("validation_failed", "Um ou mais campos são inválidos."),
    ("required", "Este campo é obrigatório."),
    ("invalid_email", "O e-mail fornecido é inválido."),
    ("password_too_short", "A senha deve ter no mínimo 6 caracteres."),
    ("email_already_exists", "Este e-mail já está em uso."),
    ("invalid_credentials", "E-mail ou senha inválidos."),
    ("invalid_token", "Token de autenticação inválido ou ausente."),
    ("user_not_found", "Usuário não encontrado."),
    ("forbidden", "Você não tem permissão para realizar esta ação."),
    ("not_found", "{0} não encontrado(a)."),
    ("invalid_transition", "Não é possível mudar o status de '{0}' para '{1}'."),
    ("invoice_number_conflict", "O número {0} foi usado por outra operação. Tente novamente."),
    ("cron_unauthorized", "Segredo do agendador ausente ou inválido."),
    ("cron_not_configured", "Segredo do agendador não configurado."),
    ("integration_failed", "Falha no serviço externo: {0}"),
    ("internal_error", "Ocorreu um erro inesperado."),
    ("amount_not_numeric", "O valor deve ser numérico."),
    ("amount_not_positive", "O valor deve ser maior que zero."),
    ("quantity_not_numeric", "A quantidade deve ser numérica."),
    ("amount_too_precise", "Valores aceitam no máximo 2 casas decimais."),
    ("quantity_too_precise", "Quantidades aceitam no máximo 4 casas decimais."),
    ("amount_out_of_range", "O valor é grande demais."),
    ("line_items_required", "Informe ao menos um item."),
    ("due_before_issue", "O vencimento não pode ser anterior à emissão."),
    ("date_out_of_range", "A data calculada está fora do intervalo suportado."),
    ("overdue_is_derived", "'overdue' é definido automaticamente após o vencimento."),
    ("invoice_not_draft", "Somente faturas em rascunho podem ter itens alterados."),
    ("invoice_void", "Não é possível registrar pagamento em fatura anulada."),
    ("payment_client_mismatch", "O cliente do pagamento não corresponde ao da fatura."),
    ("occurrence_not_pending", "Esta ocorrência já foi concluída ou pulada."),
    ("schedule_in_past", "O horário agendado deve estar no futuro."),
    ("post_not_editable", "Somente posts em rascunho ou agendados podem ser alterados."),
    ("page_not_connected", "A página social não possui token de acesso."),
    ("caption_required", "A legenda não pode ficar vazia."),
    ("invalid_currency", "A moeda deve ser um código ISO de 3 letras."),
    ("prefix_too_long", "O prefixo da fatura é longo demais."),
    ("invalid_number_width", "A largura do número deve ficar entre 1 e 12."),
    ("interval_out_of_range", "O intervalo de recorrência deve ficar entre 1 e 365."),
    ("recurring_task_needs_due_date", "Tarefas recorrentes precisam de data de vencimento."),
    ("invalid_url", "A URL é inválida."),
    ("message_required", "A mensagem não pode ficar vazia."),
    ("page_connected_elsewhere", "Esta página já está conectada a outro cliente."),
    ("password_required", "A senha é obrigatória."),
    ("entity.client", "Cliente"),
    ("entity.invoice", "Fatura"),
    ("entity.task", "Tarefa"),
    ("entity.occurrence", "Ocorrência"),
    ("entity.page", "Página social"),
    ("entity.post", "Post"),
    ("entity.conversation", "Conversa"),
    ("entity.user", "Usuário"),
];

pub struct I18nStore {
    catalogs: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl I18nStore {
    pub fn new() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("en", EN.iter().copied().collect());
        catalogs.insert("pt", PT.iter().copied().collect());
        Self { catalogs }
    }

    // Idioma desconhecido cai no inglês; chave desconhecida volta como está
    // (mensagens literais do validator passam direto)
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.catalogs
            .get(lang)
            .and_then(|c| c.get(key))
            .or_else(|| self.catalogs.get(DEFAULT_LANG).and_then(|c| c.get(key)))
            .map(|m| m.to_string())
            .unwrap_or_else(|| key.to_string())
    }

    pub fn format(&self, lang: &str, key: &str, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.translate(lang, key), |msg, (i, arg)| {
                msg.replace(&format!("{{{}}}", i), arg)
            })
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_english_key_has_a_portuguese_translation() {
        let store = I18nStore::new();
        for (key, _) in EN {
            assert!(
                store.catalogs["pt"].contains_key(key),
                "faltando tradução pt para '{}'",
                key
            );
        }
    }

    #[test]
    fn unknown_language_falls_back_to_english_and_unknown_key_passes_through() {
        let store = I18nStore::new();
        assert_eq!(store.translate("fr", "required"), "This field is required.");
        assert_eq!(store.translate("pt", "Mensagem literal"), "Mensagem literal");
    }

    #[test]
    fn format_fills_positional_placeholders() {
        let store = I18nStore::new();
        assert_eq!(
            store.format("en", "invalid_transition", &["paid", "draft"]),
            "Cannot change status from 'paid' to 'draft'."
        );
    }
}
