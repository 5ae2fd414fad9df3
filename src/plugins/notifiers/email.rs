use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailSettings;
use crate::models::Deal;
use crate::plugins::traits::Notifier;
use crate::utils::error::{AppError, Result};

#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub use_starttls: bool,
}

impl From<&EmailSettings> for EmailConfig {
    fn from(settings: &EmailSettings) -> Self {
        EmailConfig {
            smtp_server: settings.smtp_host.clone(),
            smtp_port: settings.smtp_port,
            username: settings.address.clone(),
            password: settings.password.clone(),
            from_email: settings.address.clone(),
            from_name: settings.from_name.clone(),
            to_email: settings.recipient.clone(),
            use_starttls: settings.use_starttls,
        }
    }
}

/// Sends one multipart (text + HTML) summary per cycle over SMTP.
pub struct EmailNotifier {
    from: Mailbox,
    to: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    /// Addresses and relay are checked here so a bad setup fails at startup.
    pub fn new(config: EmailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = config
            .to_email
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid recipient address: {}", e)))?;

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let builder = if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay '{}': {}", config.smtp_server, e)))?;

        let mailer = builder.port(config.smtp_port).credentials(credentials).build();

        Ok(EmailNotifier { from, to, mailer })
    }

    pub fn from_settings(settings: &EmailSettings) -> Result<Self> {
        Self::new(EmailConfig::from(settings))
    }

    fn format_subject(&self, deals: &[Deal]) -> String {
        match deals {
            [deal] => format!("🎯 New Deal Found! {} - ${:.2}", deal.keyword, deal.price),
            _ => format!("🎯 New Deals Found: {} listings", deals.len()),
        }
    }

    fn format_html_body(&self, deals: &[Deal], now: DateTime<Utc>) -> String {
        let mut html = String::new();

        html.push_str(&format!(
            r#"
<html>
<body style="font-family: Arial, sans-serif;">
    <h2 style="color: #2ecc71;">🎯 {} New Deal(s) Found!</h2>
"#,
            deals.len()
        ));

        for deal in deals {
            let link = deal.listing.url.as_deref().unwrap_or("");
            html.push_str(&format!(
                r#"
    <table style="border-collapse: collapse; width: 100%; margin: 20px 0;">
        <tr style="background-color: #f0f0f0;"><td style="padding: 10px; border: 1px solid #ddd;"><b>Title</b></td><td style="padding: 10px; border: 1px solid #ddd;">{}</td></tr>
        <tr><td style="padding: 10px; border: 1px solid #ddd;"><b>Price</b></td><td style="padding: 10px; border: 1px solid #ddd;"><b style="color: #e74c3c;">${:.2}</b></td></tr>
        <tr style="background-color: #f0f0f0;"><td style="padding: 10px; border: 1px solid #ddd;"><b>Max Buy</b></td><td style="padding: 10px; border: 1px solid #ddd;">${:.2}</td></tr>
        <tr><td style="padding: 10px; border: 1px solid #ddd;"><b>Resale Avg</b></td><td style="padding: 10px; border: 1px solid #ddd;">${:.2}</td></tr>
        <tr style="background-color: #f0f0f0;"><td style="padding: 10px; border: 1px solid #ddd;"><b>Profit Potential</b></td><td style="padding: 10px; border: 1px solid #ddd;"><b style="color: #27ae60;">${:.2} ({:.1}%)</b>{}</td></tr>
        <tr><td style="padding: 10px; border: 1px solid #ddd;"><b>Location</b></td><td style="padding: 10px; border: 1px solid #ddd;">{}</td></tr>
    </table>
    <p><a href="{}" style="background-color: #3498db; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px;">View Listing →</a></p>
"#,
                escape_html(&deal.listing.title),
                deal.price,
                deal.max_buy,
                deal.resale_avg,
                deal.profit,
                deal.profit_pct,
                if deal.meets_target_margin() { "" } else { " (below target margin)" },
                escape_html(&location_label(deal)),
                escape_html(link),
            ));
        }

        html.push_str(&format!(
            r#"
    <hr style="margin-top: 30px; border: none; border-top: 1px solid #ddd;">
    <p style="color: #7f8c8d; font-size: 12px;">Automated deal alert from Marketplace Monitor, {}</p>
</body>
</html>
"#,
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        html
    }

    fn format_text_body(&self, deals: &[Deal], now: DateTime<Utc>) -> String {
        let mut text = String::new();

        text.push_str(&format!("🎯 MARKETPLACE MONITOR: {} NEW DEAL(S)\n\n", deals.len()));
        for deal in deals {
            text.push_str(&format!("Title: {}\n", deal.listing.title));
            text.push_str(&format!("Price: ${:.2} (max buy ${:.2})\n", deal.price, deal.max_buy));
            text.push_str(&format!("Resale Avg: ${:.2}\n", deal.resale_avg));
            text.push_str(&format!("Profit Potential: ${:.2} ({:.1}%)\n", deal.profit, deal.profit_pct));
            text.push_str(&format!("Location: {}\n", location_label(deal)));
            if let Some(url) = &deal.listing.url {
                text.push_str(&format!("Link: {}\n", url));
            }
            text.push('\n');
        }
        text.push_str(&format!("Checked at {}\n", now.format("%Y-%m-%d %H:%M:%S UTC")));

        text
    }

    fn build_message(&self, deals: &[Deal], now: DateTime<Utc>) -> Result<Message> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.format_subject(deals))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(self.format_text_body(deals, now)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(self.format_html_body(deals, now)),
                    ),
            )?;
        Ok(email)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send_summary(&self, deals: &[Deal]) -> Result<()> {
        if deals.is_empty() {
            return Ok(());
        }

        let email = self.build_message(deals, Utc::now())?;
        self.mailer.send(email).await?;
        tracing::info!(deals = deals.len(), recipient = %self.to, "📧 Email sent");
        Ok(())
    }
}

/// `LOCATION (partition)`, or just the partition when the post had none.
fn location_label(deal: &Deal) -> String {
    let partition = deal.listing.source_partition.to_uppercase();
    if deal.listing.location.is_empty() {
        partition
    } else {
        format!("{} ({})", deal.listing.location.to_uppercase(), partition)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
