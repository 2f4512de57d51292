// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::{DynamicImage, Luma};
use qrcode::QrCode;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::SettingsRepository,
    models::{invoices::InvoiceDetail, scope::AccessScope, settings::AgencySettings},
    services::{invoice_service::InvoiceService, notifications},
};

fn render_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

fn money(currency: &str, amount: Decimal) -> String {
    format!("{} {:.2}", currency, amount)
}

// QR Code apontando para a fatura no portal
pub fn portal_qr_image(url: &str) -> Result<DynamicImage, AppError> {
    let code = QrCode::new(url.as_bytes()).map_err(render_error)?;
    let image_buffer = code.render::<Luma<u8>>().build();
    Ok(DynamicImage::ImageLuma8(image_buffer))
}

#[derive(Clone)]
pub struct DocumentService {
    invoice_service: InvoiceService,
    settings_repo: SettingsRepository,
    public_app_url: Option<String>,
}

impl DocumentService {
    pub fn new(
        invoice_service: InvoiceService,
        settings_repo: SettingsRepository,
        public_app_url: Option<String>,
    ) -> Self {
        Self { invoice_service, settings_repo, public_app_url }
    }

    pub async fn generate_invoice_pdf(&self, scope: &AccessScope, invoice_id: Uuid) -> Result<(String, Vec<u8>), AppError> {
        // 1. Busca os dados (mesmo escopo da tela de detalhe)
        let detail = self.invoice_service.detail(scope, invoice_id).await?;
        let settings = self.settings_repo.current().await?;
        let portal_url = notifications::portal_url(
            self.public_app_url.as_deref(),
            detail.invoice.portal_token.as_deref(),
        );

        let file_name = format!("{}.pdf", detail.invoice.number);
        let bytes = render_invoice(&detail, &settings, portal_url.as_deref())?;
        Ok((file_name, bytes))
    }
}

fn render_invoice(
    detail: &InvoiceDetail,
    settings: &AgencySettings,
    portal_url: Option<&str>,
) -> Result<Vec<u8>, AppError> {
    let invoice = &detail.invoice;
    let currency = settings.currency.as_str();

    // 2. Configura o PDF (fontes na pasta 'fonts/')
    let font_family = genpdf::fonts::from_files("./fonts", "Roboto", None)
        .map_err(|_| AppError::FontNotFound("Fonte não encontrada na pasta ./fonts".to_string()))?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(format!("Invoice {}", invoice.number));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- CABEÇALHO ---
    doc.push(
        elements::Paragraph::new(settings.sender_name().to_string())
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    if let Some(reply_to) = &settings.reply_to_email {
        doc.push(elements::Paragraph::new(reply_to.clone()).styled(style::Style::new().with_font_size(10)));
    }

    doc.push(elements::Break::new(1.5));

    doc.push(
        elements::Paragraph::new(format!("INVOICE {}", invoice.number))
            .styled(style::Style::new().bold().with_font_size(14)),
    );
    doc.push(elements::Paragraph::new(format!("Status: {}", invoice.status.as_str())));
    doc.push(elements::Paragraph::new(format!("Issued: {}", invoice.issue_date.format("%Y-%m-%d"))));
    doc.push(elements::Paragraph::new(format!("Due: {}", invoice.due_date.format("%Y-%m-%d"))));
    doc.push(elements::Paragraph::new(format!("Bill to: {}", detail.client_name)));

    doc.push(elements::Break::new(2));

    // --- ITENS ---
    // Pesos das colunas: Descrição (4), Qtd (1), Unitário (2), Total (2)
    let mut table = elements::TableLayout::new(vec![4, 1, 2, 2]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let style_bold = style::Style::new().bold();
    table
        .row()
        .element(elements::Paragraph::new("Description").styled(style_bold))
        .element(elements::Paragraph::new("Qty").styled(style_bold))
        .element(elements::Paragraph::new("Unit price").styled(style_bold))
        .element(elements::Paragraph::new("Total").styled(style_bold))
        .push()
        .map_err(render_error)?;

    for item in &detail.line_items {
        table
            .row()
            .element(elements::Paragraph::new(item.description.clone()))
            .element(elements::Paragraph::new(format!("{}", item.quantity.normalize())))
            .element(elements::Paragraph::new(money(currency, item.unit_price)))
            .element(elements::Paragraph::new(money(currency, item.line_total)))
            .push()
            .map_err(render_error)?;
    }

    doc.push(table);
    doc.push(elements::Break::new(2));

    // --- TOTAIS ---
    let totals = [
        ("Subtotal", invoice.subtotal),
        ("Tax", invoice.tax),
        ("Total", invoice.total),
        ("Paid", detail.amount_paid),
        ("Balance due", detail.remaining),
    ];
    for (label, amount) in totals {
        let mut line = elements::Paragraph::new(format!("{}: {}", label, money(currency, amount)));
        line.set_alignment(genpdf::Alignment::Right);
        doc.push(line.styled(style::Style::new().bold().with_font_size(11)));
    }

    if let Some(notes) = &invoice.notes {
        doc.push(elements::Break::new(1));
        doc.push(elements::Paragraph::new(notes.clone()).styled(style::Style::new().italic().with_font_size(9)));
    }

    // --- PORTAL (QR CODE) ---
    if let Some(url) = portal_url {
        doc.push(elements::Break::new(2));
        doc.push(
            elements::Paragraph::new("VIEW AND PAY ONLINE").styled(style::Style::new().bold().with_font_size(12)),
        );
        doc.push(elements::Paragraph::new(url.to_string()).styled(style::Style::new().with_font_size(8)));
        doc.push(elements::Break::new(1));

        let pdf_image = elements::Image::from_dynamic_image(portal_qr_image(url)?)
            .map_err(render_error)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(pdf_image);
    }

    // --- RODAPÉ ---
    if let Some(address) = &settings.address {
        doc.push(elements::Break::new(2));
        doc.push(elements::Paragraph::new(address.clone()).styled(style::Style::new().italic().with_font_size(8)));
    }

    // 3. Renderiza em memória
    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(render_error)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use std::str::FromStr;

    #[test]
    fn qr_code_encodes_the_portal_link() {
        let image = portal_qr_image("https://app.test/portal/invoices/abc").unwrap();
        assert!(image.width() > 20);
        assert_eq!(image.width(), image.height());
    }

    #[test]
    fn money_is_printed_with_two_decimals() {
        assert_eq!(money("USD", Decimal::from_str("8500").unwrap()), "USD 8500.00");
    }
}
