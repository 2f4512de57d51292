// src/services/notifications.rs
//
// Montagem dos e-mails de cobrança (fatura enviada e lembretes).

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    integrations::OutgoingEmail,
    models::{jobs::ReminderKind, settings::AgencySettings},
};

pub fn portal_url(base_url: Option<&str>, token: Option<&str>) -> Option<String> {
    let base = base_url?.trim_end_matches('/');
    let token = token?;
    if base.is_empty() {
        return None;
    }
    Some(format!("{}/portal/invoices/{}", base, token))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn portal_link(url: Option<&str>) -> String {
    match url {
        Some(url) => format!(
            r#"<p><a href="{0}">View invoice online</a></p>"#,
            escape_html(url)
        ),
        None => String::new(),
    }
}

pub struct InvoiceMailData<'a> {
    pub number: &'a str,
    pub client_name: &'a str,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub portal_url: Option<&'a str>,
}

pub fn invoice_sent_email(settings: &AgencySettings, to: &str, data: &InvoiceMailData<'_>) -> OutgoingEmail {
    let subject = format!("Invoice {} from {}", data.number, settings.sender_name());
    let html = format!(
        "<p>Hello {client},</p>\
         <p>Please find invoice <strong>{number}</strong> for {currency} {amount}, due on {due}.</p>\
         {link}\
         <p>Thank you,<br>{sender}</p>",
        client = escape_html(data.client_name),
        number = escape_html(data.number),
        currency = escape_html(&settings.currency),
        amount = data.amount_due.round_dp(2),
        due = data.due_date.format("%Y-%m-%d"),
        link = portal_link(data.portal_url),
        sender = escape_html(settings.sender_name()),
    );

    OutgoingEmail {
        to: to.to_string(),
        subject,
        html,
        reply_to: settings.reply_to_email.clone(),
    }
}

pub fn reminder_email(
    settings: &AgencySettings,
    to: &str,
    kind: ReminderKind,
    data: &InvoiceMailData<'_>,
) -> OutgoingEmail {
    let (subject, lead) = match kind {
        ReminderKind::DueSoon => (
            format!("Reminder: invoice {} is due soon", data.number),
            format!("This is a friendly reminder that invoice <strong>{}</strong> is due on {}.",
                escape_html(data.number), data.due_date.format("%Y-%m-%d")),
        ),
        ReminderKind::Overdue => (
            format!("Overdue: invoice {}", data.number),
            format!("Invoice <strong>{}</strong> was due on {} and is now overdue.",
                escape_html(data.number), data.due_date.format("%Y-%m-%d")),
        ),
    };

    let html = format!(
        "<p>Hello {client},</p><p>{lead}</p><p>Amount due: {currency} {amount}</p>{link}<p>{sender}</p>",
        client = escape_html(data.client_name),
        currency = escape_html(&settings.currency),
        amount = data.amount_due.round_dp(2),
        link = portal_link(data.portal_url),
        sender = escape_html(settings.sender_name()),
    );

    OutgoingEmail {
        to: to.to_string(),
        subject,
        html,
        reply_to: settings.reply_to_email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn settings() -> AgencySettings {
        AgencySettings {
            company_name: Some("Aurora".into()),
            reply_to_email: Some("billing@aurora.studio".into()),
            address: None,
            currency: "USD".into(),
            invoice_prefix: "INV-".into(),
            invoice_number_width: 4,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn portal_url_needs_both_base_and_token() {
        assert_eq!(
            portal_url(Some("https://app.test/"), Some("abc")).as_deref(),
            Some("https://app.test/portal/invoices/abc")
        );
        assert_eq!(portal_url(None, Some("abc")), None);
        assert_eq!(portal_url(Some("https://app.test"), None), None);
    }

    #[test]
    fn overdue_reminder_mentions_amount_and_escapes_names() {
        let data = InvoiceMailData {
            number: "INV-0001",
            client_name: "Tom & Jerry <Ltd>",
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount_due: Decimal::from_str("400").unwrap(),
            portal_url: None,
        };
        let email = reminder_email(&settings(), "ap@client.test", ReminderKind::Overdue, &data);

        assert_eq!(email.subject, "Overdue: invoice INV-0001");
        assert!(email.html.contains("Tom &amp; Jerry &lt;Ltd&gt;"));
        assert!(email.html.contains("USD 400"));
        assert_eq!(email.reply_to.as_deref(), Some("billing@aurora.studio"));
    }
}
