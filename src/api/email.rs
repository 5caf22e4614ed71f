//! Outbound email delivery for one-time login codes and contact-form
//! notifications.
//!
//! Provider priority: the SendGrid HTTP API when an API key is configured,
//! SMTP when credentials are present, and a log-only sender otherwise so the
//! login flow stays usable in local development. The provider is picked once
//! at startup and the client is reused for the life of the process.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone, Debug)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email delivery abstraction; failures surface as `DispatchError` upstream.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &OutboundEmail) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &OutboundEmail) -> Result<()> {
        info!(
            to_email = %message.to,
            subject = %message.subject,
            body = %message.text,
            "email send stub (logged only)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// SendGrid v3 mail/send over HTTP.
pub struct SendGridSender {
    client: reqwest::Client,
    api_key: SecretString,
    from_email: String,
}

impl SendGridSender {
    #[must_use]
    pub fn new(api_key: SecretString, from_email: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::api::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, message: &OutboundEmail) -> Result<()> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": self.from_email },
            "subject": message.subject,
            "content": [
                { "type": "text/plain", "value": message.text },
                { "type": "text/html", "value": message.html },
            ],
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .context("failed to reach SendGrid")?;

        if !response.status().is_success() {
            bail!("SendGrid rejected the message: {}", response.status());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

/// SMTP delivery with fail-fast timeouts.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(
        host: &str,
        port: u16,
        secure: bool,
        username: String,
        password: SecretString,
        from: &str,
    ) -> Result<Self> {
        let credentials = Credentials::new(username, password.expose_secret().to_string());
        let builder = if secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .context("failed to create SMTP transport")?;
        let transport = builder
            .port(port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(10)))
            .build();
        let from = from
            .parse::<Mailbox>()
            .context("invalid SMTP from address")?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, message: &OutboundEmail) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message
                .to
                .parse::<Mailbox>()
                .context("invalid recipient address")?)
            .subject(message.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(message.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(message.html.clone()),
                    ),
            )
            .context("failed to build email")?;

        self.transport
            .send(email)
            .await
            .context("SMTP send failed")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Contact-form submission forwarded to the front office.
#[derive(Clone, Debug)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// Message composition on top of a configured sender.
pub struct Mailer {
    sender: Arc<dyn EmailSender>,
    brand: String,
    contact_recipient: Option<String>,
    code_recipient_override: Option<String>,
}

impl Mailer {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>, brand: String) -> Self {
        Self {
            sender,
            brand,
            contact_recipient: None,
            code_recipient_override: None,
        }
    }

    #[must_use]
    pub fn with_contact_recipient(mut self, recipient: Option<String>) -> Self {
        self.contact_recipient = recipient;
        self
    }

    #[must_use]
    pub fn with_code_recipient_override(mut self, recipient: Option<String>) -> Self {
        self.code_recipient_override = recipient;
        self
    }

    /// Pick the delivery provider from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let from_email = env::var("FROM_EMAIL")
            .or_else(|_| env::var("SMTP_USER"))
            .unwrap_or_else(|_| "no-reply@localhost".to_string());
        let brand =
            env::var("BRAND_NAME").unwrap_or_else(|_| "Jolly Children Academic Center".to_string());

        let sender: Arc<dyn EmailSender> = match env::var("SENDGRID_API_KEY") {
            Ok(key) if !key.trim().is_empty() => {
                Arc::new(SendGridSender::new(key.into(), from_email.clone()))
            }
            _ => match smtp_sender_from_env(&from_email) {
                Some(sender) => Arc::new(sender),
                None => {
                    warn!("No mail provider configured; emails will be logged, not sent");
                    Arc::new(LogEmailSender)
                }
            },
        };

        let contact_recipient = env::var("CONTACT_RECIPIENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or(Some(from_email));

        let mailer = Self::new(sender, brand)
            .with_contact_recipient(contact_recipient)
            .with_code_recipient_override(env::var("MFA_RECIPIENT_OVERRIDE").ok());
        info!(provider = mailer.provider(), "mail dispatcher ready");
        mailer
    }

    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.sender.name()
    }

    /// Deliver a one-time login code.
    pub async fn send_login_code(&self, to: &str, code: &str) -> Result<()> {
        let to = self.code_recipient_override.as_deref().unwrap_or(to);
        let subject = "Your verification code".to_string();
        let text = format!("Your verification code is: {code}\nIt expires in 10 minutes.");
        let html = format!(
            "<div style=\"font-family:Arial,sans-serif\">\
             <p><strong>{brand}</strong></p>\
             <p>Use the following code to complete your sign-in:</p>\
             <p style=\"font-size:26px;letter-spacing:6px;font-weight:700\">{code}</p>\
             <p>This code will expire in 10 minutes. If you didn't request it, you can ignore this email.</p>\
             </div>",
            brand = escape_html(&self.brand),
        );
        self.sender
            .send(&OutboundEmail {
                to: to.to_string(),
                subject,
                text,
                html,
            })
            .await
    }

    /// Forward a contact-form submission to the configured recipient.
    pub async fn send_contact_notification(&self, contact: &ContactMessage) -> Result<()> {
        let Some(to) = self.contact_recipient.as_deref() else {
            bail!("no contact recipient configured");
        };
        let subject = format!("New Contact Form Message from {}", contact.name);
        let meta = format!(
            "IP: {}\nUser-Agent: {}\nReferrer: {}",
            contact.ip.as_deref().unwrap_or("N/A"),
            contact.user_agent.as_deref().unwrap_or("N/A"),
            contact.referer.as_deref().unwrap_or("N/A"),
        );
        let text = format!(
            "You have received a new contact form submission.\n\nName: {}\nEmail: {}\nMessage:\n{}\n\n--\n{meta}",
            contact.name, contact.email, contact.message,
        );
        let html = format!(
            "<p>You have received a new contact form submission.</p>\
             <p><strong>Name:</strong> {}<br><strong>Email:</strong> {}</p>\
             <p><strong>Message:</strong><br>{}</p>\
             <hr><p style=\"font-size:12px;color:#666\">{}</p>",
            escape_html(&contact.name),
            escape_html(&contact.email),
            escape_html(&contact.message).replace('\n', "<br>"),
            escape_html(&meta).replace('\n', "<br>"),
        );
        self.sender
            .send(&OutboundEmail {
                to: to.to_string(),
                subject,
                text,
                html,
            })
            .await
    }
}

fn smtp_sender_from_env(from_email: &str) -> Option<SmtpSender> {
    let host = env::var("SMTP_HOST").ok()?;
    let user = env::var("SMTP_USER").ok()?;
    let pass = env::var("SMTP_PASS").ok()?;
    let port = env::var("SMTP_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(587);
    let secure = env::var("SMTP_SECURE")
        .map(|value| value.to_lowercase() == "true")
        .unwrap_or(false);

    match SmtpSender::new(&host, port, secure, user, pass.into(), from_email) {
        Ok(sender) => Some(sender),
        Err(err) => {
            warn!("SMTP configuration rejected, falling back to log-only sender: {err:#}");
            None
        }
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
