use async_trait::async_trait;
use lettre::message::{Mailbox, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::plugins::traits::Mailer;
use crate::utils::error::{AppError, Result};

pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = Self::sender(config)?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                AppError::Validation(format!("Invalid SMTP relay {}: {}", config.host, e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let builder = builder.port(config.port);
        let transport = match (&config.username, &config.password) {
            (Some(username), Some(password)) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            _ => builder.build(),
        };

        Ok(Self {
            from,
            transport,
            host: config.host.clone(),
        })
    }

    fn sender(config: &SmtpConfig) -> Result<Mailbox> {
        let address = config
            .from_address
            .as_deref()
            .or(config.username.as_deref())
            .ok_or_else(|| {
                AppError::Validation("SMTP from_address or username must be set".to_string())
            })?;

        format!("{} <{}>", config.from_name, address)
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid sender address {}: {}", address, e)))
    }

    fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| AppError::delivery(recipient, format!("invalid address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::delivery(recipient, e))
    }

    /// Connect and authenticate without sending anything.
    pub async fn test_connection(&self) -> Result<bool> {
        match self.transport.test_connection().await {
            Ok(ok) => Ok(ok),
            Err(e) => {
                tracing::warn!(host = %self.host, "SMTP connection test failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let email = self.build_message(recipient, subject, body)?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| AppError::delivery(recipient, e))
    }
}
