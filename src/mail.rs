use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port);
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid SMTP_FROM {}", cfg.from))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let to = email
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {}", email.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        info!(to = %email.to, "email sent");
        Ok(())
    }
}

/// Used when SMTP is not configured. Nothing leaves the process.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        warn!(to = %email.to, subject = %email.subject, "smtp not configured, email dropped");
        Ok(())
    }
}

pub fn reset_link(webapp_url: &str, token: &str) -> String {
    format!("{webapp_url}/auth/request-password/verify?token={token}")
}

pub fn password_reset_email(to: &str, link: &str) -> OutgoingEmail {
    let text = format!(
        "You requested a password reset. Open the link below to reset your password:\n{link}\n\
         If you did not request this, please ignore this email."
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 480px; margin: 0 auto; border: 1px solid #eee; border-radius: 8px; padding: 24px; background: #fafbfc;">
  <h2 style="color: #333;">Password Reset Request</h2>
  <p>Hello,</p>
  <p>You requested a password reset. Click the button below to reset your password:</p>
  <a href="{link}" style="display: inline-block; padding: 12px 24px; background: #007bff; color: #fff; text-decoration: none; border-radius: 4px; font-weight: bold;">Reset Password</a>
  <p style="margin-top: 24px; color: #888; font-size: 13px;">If you did not request this, please ignore this email.</p>
  <hr style="margin: 32px 0; border: none; border-top: 1px solid #eee;" />
  <p style="color: #888; font-size: 13px;">If the button above does not work, copy and paste this link into your browser:</p>
  <p style="word-break: break-all; color: #007bff; font-size: 13px;">{link}</p>
</div>"#
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password Reset Request".into(),
        text,
        html,
    }
}
