//! Email delivery for newsletter verification codes and welcome messages.
//!
//! [`SmtpMailer`] sends through SMTP via lettre with Askama templates.
//! [`LogMailer`] only logs and stands in when SMTP is not configured.
//! [`OutboxMailer`] keeps a bounded number of messages in memory so tests can
//! read the codes that were sent.

use std::collections::VecDeque;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::Mutex;

use prism_core::{Email, OtpCode};

use crate::config::EmailConfig;

pub const OTP_SUBJECT: &str = "Verify your email - Your OTP Code";
pub const WELCOME_SUBJECT: &str = "Welcome to Our Community!";

#[derive(Template)]
#[template(path = "email/otp_code.html")]
struct OtpCodeEmailHtml<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/otp_code.txt")]
struct OtpCodeEmailText<'a> {
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    shop_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Address rejected by the message builder.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Outbound email channel used by the OTP service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a verification code that is valid for `ttl_minutes`.
    async fn send_otp(&self, to: &Email, code: &OtpCode, ttl_minutes: i64)
    -> Result<(), MailError>;

    /// Deliver the post-verification welcome message.
    async fn send_welcome(&self, to: &Email) -> Result<(), MailError>;
}

/// SMTP mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    shop_url: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host cannot be resolved into a transport.
    pub fn new(config: &EmailConfig, shop_url: impl Into<String>) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            shop_url: shop_url.into(),
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &Email,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.transport.send(message).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> Result<(), MailError> {
        let code = code.as_str();
        let html = OtpCodeEmailHtml { code, ttl_minutes }.render()?;
        let text = OtpCodeEmailText { code, ttl_minutes }.render()?;

        self.send_multipart_email(to, OTP_SUBJECT, text, html).await
    }

    async fn send_welcome(&self, to: &Email) -> Result<(), MailError> {
        let shop_url = self.shop_url.as_str();
        let html = WelcomeEmailHtml { shop_url }.render()?;
        let text = WelcomeEmailText { shop_url }.render()?;

        self.send_multipart_email(to, WELCOME_SUBJECT, text, html)
            .await
    }
}

/// What an [`OutboxMailer`] recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxMessage {
    Otp { to: Email, code: OtpCode },
    Welcome { to: Email },
}

impl OutboxMessage {
    #[must_use]
    pub const fn to(&self) -> &Email {
        match self {
            Self::Otp { to, .. } | Self::Welcome { to } => to,
        }
    }

    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Otp { .. } => OTP_SUBJECT,
            Self::Welcome { .. } => WELCOME_SUBJECT,
        }
    }
}

/// Messages an [`OutboxMailer`] keeps before dropping the oldest.
pub const OUTBOX_CAPACITY: usize = 256;

/// Mailer that records messages instead of sending them.
///
/// Holds at most a fixed number of messages; older ones are dropped first.
#[derive(Debug)]
pub struct OutboxMailer {
    messages: Mutex<VecDeque<OutboxMessage>>,
    capacity: usize,
}

impl Default for OutboxMailer {
    fn default() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }
}

impl OutboxMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outbox keeping the `capacity` most recent messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity.min(OUTBOX_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Everything still held, oldest first.
    pub async fn messages(&self) -> Vec<OutboxMessage> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// The most recent code sent to `to`.
    pub async fn latest_code(&self, to: &Email) -> Option<OtpCode> {
        self.messages
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|message| match message {
                OutboxMessage::Otp { to: recipient, code } if recipient == to => {
                    Some(code.clone())
                }
                _ => None,
            })
    }

    async fn record(&self, message: OutboxMessage) {
        let mut messages = self.messages.lock().await;
        while messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        _ttl_minutes: i64,
    ) -> Result<(), MailError> {
        self.record(OutboxMessage::Otp {
            to: to.clone(),
            code: code.clone(),
        })
        .await;
        Ok(())
    }

    async fn send_welcome(&self, to: &Email) -> Result<(), MailError> {
        self.record(OutboxMessage::Welcome { to: to.clone() }).await;
        Ok(())
    }
}

/// Mailer that only logs, used when SMTP is not configured.
///
/// Keeps nothing in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> Result<(), MailError> {
        // Dev mode: surface the code in logs so the flow can be completed by hand.
        tracing::info!(
            to = %to,
            code = %code.as_str(),
            ttl_minutes,
            "SMTP not configured, verification code logged"
        );
        Ok(())
    }

    async fn send_welcome(&self, to: &Email) -> Result<(), MailError> {
        tracing::info!(to = %to, "SMTP not configured, welcome email skipped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_templates_include_code_and_ttl() {
        let html = OtpCodeEmailHtml {
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .unwrap();
        let text = OtpCodeEmailText {
            code: "482913",
            ttl_minutes: 10,
        }
        .render()
        .unwrap();

        for body in [&html, &text] {
            assert!(body.contains("482913"));
            assert!(body.contains("10 minutes"));
        }
    }

    #[test]
    fn test_welcome_template_links_shop() {
        let text = WelcomeEmailText {
            shop_url: "https://shop.example",
        }
        .render()
        .unwrap();
        assert!(text.contains("https://shop.example"));
    }

    #[tokio::test]
    async fn test_outbox_tracks_latest_code_per_recipient() {
        let outbox = OutboxMailer::new();
        let a = Email::parse("a@b.com").unwrap();
        let b = Email::parse("c@d.com").unwrap();

        outbox
            .send_otp(&a, &OtpCode::parse("111111").unwrap(), 10)
            .await
            .unwrap();
        outbox
            .send_otp(&b, &OtpCode::parse("222222").unwrap(), 10)
            .await
            .unwrap();
        outbox
            .send_otp(&a, &OtpCode::parse("333333").unwrap(), 10)
            .await
            .unwrap();
        outbox.send_welcome(&a).await.unwrap();

        assert_eq!(
            outbox.latest_code(&a).await,
            Some(OtpCode::parse("333333").unwrap())
        );
        assert_eq!(
            outbox.latest_code(&b).await,
            Some(OtpCode::parse("222222").unwrap())
        );

        let messages = outbox.messages().await;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].subject(), WELCOME_SUBJECT);
        assert_eq!(messages[3].to(), &a);
    }

    #[tokio::test]
    async fn test_outbox_drops_oldest_beyond_capacity() {
        let outbox = OutboxMailer::with_capacity(3);
        let a = Email::parse("a@b.com").unwrap();
        let b = Email::parse("c@d.com").unwrap();

        outbox
            .send_otp(&a, &OtpCode::parse("111111").unwrap(), 10)
            .await
            .unwrap();
        for code in ["222222", "333333", "444444"] {
            outbox
                .send_otp(&b, &OtpCode::parse(code).unwrap(), 10)
                .await
                .unwrap();
        }

        let messages = outbox.messages().await;
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.to() == &b));
        assert_eq!(outbox.latest_code(&a).await, None);
        assert_eq!(
            outbox.latest_code(&b).await,
            Some(OtpCode::parse("444444").unwrap())
        );
    }

    #[tokio::test]
    async fn test_default_outbox_is_bounded() {
        let outbox = OutboxMailer::new();
        let a = Email::parse("a@b.com").unwrap();

        for _ in 0..OUTBOX_CAPACITY + 10 {
            outbox.send_welcome(&a).await.unwrap();
        }

        assert_eq!(outbox.messages().await.len(), OUTBOX_CAPACITY);
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_mail() {
        let a = Email::parse("a@b.com").unwrap();

        LogMailer
            .send_otp(&a, &OtpCode::parse("123456").unwrap(), 10)
            .await
            .unwrap();
        LogMailer.send_welcome(&a).await.unwrap();
    }
}
