// src/ledger/money.rs

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::common::error::AppError;

const MONEY_SCALE: u32 = 2;
const QUANTITY_SCALE: u32 = 4;

// Dígitos inteiros das colunas NUMERIC(14,2), NUMERIC(12,4) e NUMERIC(12,2)
const MONEY_INTEGER_DIGITS: u32 = 12;
const QUANTITY_INTEGER_DIGITS: u32 = 8;
const RETAINER_INTEGER_DIGITS: u32 = 10;

fn decimal_from_text(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        // to_string preserva a representação textual (sem passar por f64)
        Value::Number(n) => decimal_from_text(&n.to_string()),
        Value::String(s) => decimal_from_text(s),
        _ => None,
    }
}

fn upper_bound(integer_digits: u32) -> Decimal {
    Decimal::from(10_u64.pow(integer_digits))
}

/// O valor precisa caber na coluna sem arredondar nem estourar.
fn fit_column(
    value: Decimal,
    scale: u32,
    integer_digits: u32,
    too_precise: &'static str,
) -> Result<Decimal, AppError> {
    if value.normalize().scale() > scale {
        return Err(AppError::InvalidInput(too_precise));
    }
    if value.abs() >= upper_bound(integer_digits) {
        return Err(AppError::InvalidInput("amount_out_of_range"));
    }
    Ok(value)
}

fn fit_money(value: Decimal) -> Result<Decimal, AppError> {
    fit_column(value, MONEY_SCALE, MONEY_INTEGER_DIGITS, "amount_too_precise")
}

/// Valor de retainer do cliente (coluna mais estreita que a das faturas).
pub fn fit_retainer(value: Decimal) -> Result<Decimal, AppError> {
    fit_column(value, MONEY_SCALE, RETAINER_INTEGER_DIGITS, "amount_too_precise")
}

/// Leitura estrita para caminhos que alteram o livro-razão.
/// Aceita número JSON ou string numérica com no máximo 2 casas; qualquer
/// outra coisa é rejeitada.
pub fn parse_amount(value: &Value) -> Result<Decimal, AppError> {
    let parsed = decimal_from_value(value).ok_or(AppError::InvalidInput("amount_not_numeric"))?;
    fit_money(parsed)
}

/// Quantidade de item: até 4 casas decimais.
pub fn parse_quantity(value: &Value) -> Result<Decimal, AppError> {
    let parsed = decimal_from_value(value).ok_or(AppError::InvalidInput("quantity_not_numeric"))?;
    fit_column(parsed, QUANTITY_SCALE, QUANTITY_INTEGER_DIGITS, "quantity_too_precise")
}

pub fn parse_positive_amount(value: &Value) -> Result<Decimal, AppError> {
    let amount = parse_amount(value)?;
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidInput("amount_not_positive"));
    }
    Ok(amount)
}

/// Leitura tolerante para exibição: nulo ou não numérico vira zero, nunca falha.
pub fn coerce_amount(value: Option<&Value>) -> Decimal {
    value.and_then(decimal_from_value).unwrap_or(Decimal::ZERO)
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn checked_sum(a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    a.checked_add(b)
        .ok_or(AppError::InvalidInput("amount_out_of_range"))
        .and_then(fit_money)
}

/// quantidade × preço unitário, arredondado a centavos
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, AppError> {
    let product = quantity
        .checked_mul(unit_price)
        .ok_or(AppError::InvalidInput("amount_out_of_range"))?;
    fit_money(round_money(product))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    #[schema(example = "8500.00")]
    pub subtotal: Decimal,
    #[schema(example = "0.00")]
    pub tax: Decimal,
    #[schema(example = "8500.00")]
    pub total: Decimal,
}

impl InvoiceTotals {
    /// subtotal = soma dos totais de linha; total = subtotal + imposto.
    /// Estouro de faixa vira erro de validação.
    pub fn from_lines<I>(lines: I, tax: Decimal) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        let line_totals = lines
            .into_iter()
            .map(|(quantity, unit_price)| line_total(quantity, unit_price));
        Self::sum(line_totals, tax)
    }

    /// Versão de exibição: linha fora de faixa conta zero e nunca falha.
    pub fn lenient<I>(lines: I, tax: Decimal) -> Self
    where
        I: IntoIterator<Item = (Decimal, Decimal)>,
    {
        let line_totals = lines.into_iter().map(|(quantity, unit_price)| {
            Ok::<_, AppError>(line_total(quantity, unit_price).unwrap_or(Decimal::ZERO))
        });
        let tax = fit_money(round_money(tax)).unwrap_or(Decimal::ZERO);
        Self::sum(line_totals, tax).unwrap_or_default()
    }

    fn sum<I>(line_totals: I, tax: Decimal) -> Result<Self, AppError>
    where
        I: Iterator<Item = Result<Decimal, AppError>>,
    {
        let mut subtotal = Decimal::ZERO;
        for line in line_totals {
            subtotal = checked_sum(subtotal, line?)?;
        }
        let tax = fit_money(round_money(tax))?;

        Ok(Self { subtotal, tax, total: checked_sum(subtotal, tax)? })
    }
}

/// Saldo em aberto (nunca negativo; excesso é reportado à parte)
pub fn remaining_balance(total: Decimal, paid: Decimal) -> Decimal {
    (total - paid).max(Decimal::ZERO)
}

pub fn overpayment(total: Decimal, paid: Decimal) -> Option<Decimal> {
    (paid > total).then(|| paid - total)
}

pub fn is_settled(total: Decimal, paid: Decimal) -> bool {
    paid >= total
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn strict_parse_keeps_exact_decimal_text() {
        assert_eq!(parse_amount(&json!("600.10")).unwrap(), d("600.10"));
        assert_eq!(parse_amount(&json!(8500)).unwrap(), d("8500"));
        assert_eq!(parse_amount(&json!(0.1)).unwrap() + d("0.2"), d("0.3"));
    }

    #[test]
    fn strict_parse_rejects_non_numeric_input() {
        for bad in [json!(null), json!("abc"), json!(""), json!(true), json!({"v": 1})] {
            assert!(matches!(
                parse_amount(&bad),
                Err(AppError::InvalidInput("amount_not_numeric"))
            ));
        }
        assert!(matches!(
            parse_positive_amount(&json!("-5")),
            Err(AppError::InvalidInput("amount_not_positive"))
        ));
    }

    #[test]
    fn display_coercion_never_fails() {
        assert_eq!(coerce_amount(None), Decimal::ZERO);
        assert_eq!(coerce_amount(Some(&json!(null))), Decimal::ZERO);
        assert_eq!(coerce_amount(Some(&json!("n/a"))), Decimal::ZERO);
        assert_eq!(coerce_amount(Some(&json!("12.5"))), d("12.5"));
    }

    #[test]
    fn ledger_values_must_fit_their_columns() {
        assert!(matches!(
            parse_amount(&json!("0.333")),
            Err(AppError::InvalidInput("amount_too_precise"))
        ));
        assert!(matches!(
            parse_positive_amount(&json!("0.001")),
            Err(AppError::InvalidInput("amount_too_precise"))
        ));
        // Zeros à direita não contam como casas
        assert_eq!(parse_amount(&json!("12.5000")).unwrap(), d("12.5"));

        assert!(matches!(
            parse_amount(&json!("1e15")),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
        assert_eq!(parse_amount(&json!("999999999999.99")).unwrap(), d("999999999999.99"));

        assert_eq!(parse_quantity(&json!("0.3333")).unwrap(), d("0.3333"));
        assert!(matches!(
            parse_quantity(&json!("0.33333")),
            Err(AppError::InvalidInput("quantity_too_precise"))
        ));
        assert!(matches!(
            parse_quantity(&json!(100_000_000)),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
        assert!(matches!(
            parse_quantity(&json!("dois")),
            Err(AppError::InvalidInput("quantity_not_numeric"))
        ));
    }

    #[test]
    fn oversized_lines_are_rejected_without_panicking() {
        let huge = coerce_amount(Some(&json!("1e15")));
        assert!(matches!(
            InvoiceTotals::from_lines([(huge, huge)], Decimal::ZERO),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));

        // Cada linha cabe, mas a soma não
        let big = d("999999999999.00");
        assert!(matches!(
            InvoiceTotals::from_lines([(Decimal::ONE, big), (Decimal::ONE, big)], Decimal::ZERO),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
        assert!(matches!(
            line_total(d("99999999"), big),
            Err(AppError::InvalidInput("amount_out_of_range"))
        ));
    }

    #[test]
    fn display_totals_count_out_of_range_as_zero() {
        let huge = coerce_amount(Some(&json!("1e15")));
        let totals = InvoiceTotals::lenient([(huge, huge), (d("2"), d("5.00"))], huge);
        assert_eq!(totals.subtotal, d("10.00"));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, d("10.00"));

        let max = Decimal::MAX;
        assert_eq!(InvoiceTotals::lenient([(max, max)], max), InvoiceTotals::default());
    }

    #[test]
    fn totals_are_sum_of_lines_plus_tax() {
        let totals = InvoiceTotals::from_lines(
            [(d("2"), d("150.00")), (d("0.5"), d("99.99"))],
            d("10.00"),
        )
        .unwrap();

        // 0.5 * 99.99 = 49.995 -> 50.00
        assert_eq!(totals.subtotal, d("350.00"));
        assert_eq!(totals.total, totals.subtotal + totals.tax);
        assert_eq!(totals.total, d("360.00"));
    }

    #[test]
    fn partial_payments_leave_a_remaining_balance() {
        assert_eq!(remaining_balance(d("1000"), d("600")), d("400"));
        assert!(!is_settled(d("1000"), d("600")));
        assert!(is_settled(d("1000"), d("1000")));
        assert_eq!(overpayment(d("1000"), d("1200")), Some(d("200")));
        assert_eq!(remaining_balance(d("1000"), d("1200")), Decimal::ZERO);
    }
}
