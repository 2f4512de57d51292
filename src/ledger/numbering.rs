// src/ledger/numbering.rs

// Formato: <prefixo opcional><inteiro com zeros à esquerda>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingFormat {
    pub prefix: String,
    pub width: usize,
}

impl NumberingFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self { prefix: prefix.into(), width: width.max(1) }
    }

    /// Extrai a sequência de um número existente.
    /// Com prefixo configurado, só contam números que começam com ele
    /// (comparação sensível a maiúsculas). Fora do padrão => None (ignorado).
    pub fn parse_sequence(&self, number: &str) -> Option<u64> {
        let rest = if self.prefix.is_empty() {
            number
        } else {
            number.strip_prefix(self.prefix.as_str())?
        };

        let digits_start = rest
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;

        rest[digits_start..].parse::<u64>().ok()
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }

    /// Próximo número: maior sequência existente + 1.
    pub fn next_number<'a, I>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let max = existing
            .into_iter()
            .filter_map(|n| self.parse_sequence(n))
            .max()
            .unwrap_or(0);

        self.format(max.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_the_highest_sequence_and_pads() {
        let fmt = NumberingFormat::new("INV-", 4);
        let next = fmt.next_number(["INV-0007", "INV-0012", "INV-0003"]);
        assert_eq!(next, "INV-0013");
    }

    #[test]
    fn first_number_when_nothing_exists() {
        let fmt = NumberingFormat::new("", 5);
        assert_eq!(fmt.next_number(std::iter::empty()), "00001");
    }

    #[test]
    fn ignores_numbers_outside_the_pattern() {
        let fmt = NumberingFormat::new("INV-", 4);
        let next = fmt.next_number([
            "INV-0004",
            "inv-0999",     // prefixo com caixa diferente
            "LEGACY-9999",  // outro prefixo
            "INV-DRAFT",    // sem sequência numérica
            "INV-99999999999999999999999", // estoura u64
        ]);
        assert_eq!(next, "INV-0005");
    }

    #[test]
    fn uses_the_trailing_numeric_run() {
        let fmt = NumberingFormat::new("INV-", 4);
        assert_eq!(fmt.parse_sequence("INV-2024-0042"), Some(42));
        assert_eq!(fmt.parse_sequence("INV-"), None);
    }

    #[test]
    fn sequence_wider_than_width_is_not_truncated() {
        let fmt = NumberingFormat::new("INV-", 2);
        assert_eq!(fmt.next_number(["INV-99"]), "INV-100");
    }
}
