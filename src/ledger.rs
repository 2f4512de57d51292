// src/ledger.rs
// Primitivas do livro-razão: valores, numeração de faturas e datas.

pub mod dates;
pub mod money;
pub mod numbering;

pub use dates::DateStep;
pub use money::InvoiceTotals;
pub use numbering::NumberingFormat;
