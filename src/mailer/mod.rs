//! Outbound mail for password resets, using the SMTP settings from the main
//! config file. Sending is skipped with a warning when SMTP is unconfigured,
//! so single-box installs work without a mail server.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

#[derive(Clone)]
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send the password reset link to an account holder.
    pub async fn send_password_reset(&self, to_email: &str, reset_link: &str) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, skipping reset email to {}", to_email);
            return Ok(());
        }

        let subject = "Password reset";
        let html_body = render_reset_html(reset_link);
        let text_body = render_reset_text(reset_link);

        self.send_email(to_email, subject, &html_body, &text_body).await
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let transport = builder.build();
        transport.send(message).await?;

        tracing::info!("Sent password reset email to {}", to_email);
        Ok(())
    }
}

fn render_reset_html(reset_link: &str) -> String {
    format!(
        "<p>Hello,</p>\
         <p>You requested a password reset for your account.</p>\
         <p><a href=\"{link}\"><b>Tap here to reset your password</b></a></p>\
         <p>The link expires in 30 minutes. If you did not request this, you can ignore this email.</p>",
        link = reset_link
    )
}

fn render_reset_text(reset_link: &str) -> String {
    format!(
        "Hello,\n\nYou requested a password reset for your account.\n\n\
         Open this link to choose a new password:\n{link}\n\n\
         The link expires in 30 minutes. If you did not request this, you can ignore this email.\n",
        link = reset_link
    )
}
