// src/common/db_utils.rs
//
// Filtro de escopo nas queries: o parâmetro é `Option<Vec<Uuid>>` (ver
// `AccessScope::client_filter`) e a cláusula segue sempre o mesmo formato:
//   ($n::uuid[] IS NULL OR client_id = ANY($n))
// NULL = irrestrito.

/// Nome da constraint quando o erro é uma violação de unicidade.
/// As constraints únicas seguram as corridas (numeração, ciclos, webhooks).
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert_eq!(unique_violation(&sqlx::Error::RowNotFound), None);
    }
}
