// src/models/scope.rs

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::common::error::AppError;

/// Escopo de acesso do principal: irrestrito ou um conjunto explícito de clientes.
/// É passado explicitamente para toda operação do núcleo (os workers usam `Unrestricted`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    Unrestricted,
    Clients(BTreeSet<Uuid>),
}

impl AccessScope {
    pub fn clients<I: IntoIterator<Item = Uuid>>(ids: I) -> Self {
        AccessScope::Clients(ids.into_iter().collect())
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, AccessScope::Unrestricted)
    }

    pub fn allows(&self, client_id: Uuid) -> bool {
        match self {
            AccessScope::Unrestricted => true,
            AccessScope::Clients(ids) => ids.contains(&client_id),
        }
    }

    // Tarefa sem cliente ("geral") é visível para todos
    pub fn allows_optional(&self, client_id: Option<Uuid>) -> bool {
        client_id.is_none_or(|id| self.allows(id))
    }

    /// Filtro para o SQL: `None` = sem restrição, `Some(ids)` = `client_id = ANY(ids)`.
    pub fn client_filter(&self) -> Option<Vec<Uuid>> {
        match self {
            AccessScope::Unrestricted => None,
            AccessScope::Clients(ids) => Some(ids.iter().copied().collect()),
        }
    }

    /// Para ações de topo (criar cliente, configurações): escopo restrito é proibido.
    pub fn require_unrestricted(&self) -> Result<(), AppError> {
        if self.is_unrestricted() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Para entidades de um cliente: fora do escopo é "não encontrado".
    pub fn ensure_client(&self, client_id: Uuid, entity: &'static str) -> Result<(), AppError> {
        if self.allows(client_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(entity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_scope_hides_other_clients_as_not_found() {
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let scope = AccessScope::clients([mine]);

        assert!(scope.allows(mine));
        assert!(scope.ensure_client(mine, "entity.invoice").is_ok());
        assert!(matches!(
            scope.ensure_client(other, "entity.invoice"),
            Err(AppError::NotFound("entity.invoice"))
        ));
        assert_eq!(scope.client_filter(), Some(vec![mine]));
    }

    #[test]
    fn general_tasks_are_visible_to_everyone() {
        let scope = AccessScope::clients(Vec::<Uuid>::new());
        assert!(scope.allows_optional(None));
        assert!(!scope.allows_optional(Some(Uuid::new_v4())));
    }

    #[test]
    fn only_unrestricted_passes_top_level_actions() {
        assert!(AccessScope::Unrestricted.require_unrestricted().is_ok());
        assert!(AccessScope::Unrestricted.client_filter().is_none());
        assert!(matches!(
            AccessScope::clients([Uuid::new_v4()]).require_unrestricted(),
            Err(AppError::Forbidden)
        ));
    }
}
