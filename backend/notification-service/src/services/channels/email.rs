//! Email delivery via SMTP.
//!
//! Messages are rendered from a named template (falling back to a generic
//! one) and handed to an abstract mail transport, so tests can capture
//! outgoing mail without a broker.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::SmtpTransport;
use lettre::{Message, Transport};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::{NotificationChannel, NotificationPreferences, NotificationRecord, User};
use crate::services::channels::{ChannelSender, DeliveryOutcome};
use crate::store::UserStore;

/// A fully rendered outbound email.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Abstract mail-transport capability.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &RenderedEmail) -> anyhow::Result<()>;
}

/// SMTP transport backed by lettre.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailer {
    /// Builds the transport at startup; missing credentials fail here, never
    /// per-send.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        config.validate()?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::Configuration(format!("SMTP relay {}: {}", config.host, e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &RenderedEmail) -> anyhow::Result<()> {
        let from = self
            .from
            .parse()
            .map_err(|e| anyhow!("invalid from address: {e}"))?;
        let to = mail
            .to
            .parse()
            .map_err(|e| anyhow!("invalid recipient address: {e}"))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html.clone()),
                    ),
            )
            .map_err(|e| anyhow!("failed to build email message: {e}"))?;

        self.transport
            .send(&message)
            .map_err(|e| anyhow!("failed to send email: {e}"))?;

        Ok(())
    }
}

/// A named email template with `{{name}}`, `{{title}}` and `{{message}}`
/// placeholders.
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    pub subject: &'static str,
    pub html: &'static str,
    pub text: &'static str,
}

const GENERIC_TEMPLATE: EmailTemplate = EmailTemplate {
    subject: "{{title}}",
    html: r#"<html><body style="font-family: Arial, sans-serif; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #2e7d32;">{{title}}</h2>
<p>Hi <strong>{{name}}</strong>,</p>
<p>{{message}}</p>
<p style="margin-top: 24px; font-size: 12px; color: #666;">FinTrack &lt;noreply@fintrack.app&gt;</p>
</div></body></html>"#,
    text: "Hi {{name}},\n\n{{title}}\n\n{{message}}\n\n--\nFinTrack <noreply@fintrack.app>",
};

/// Template registry keyed by notification type, with a generic fallback.
pub struct TemplateRegistry {
    templates: HashMap<&'static str, EmailTemplate>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "goal_achieved",
            EmailTemplate {
                subject: "Goal reached: {{title}}",
                html: r#"<html><body style="font-family: Arial, sans-serif; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #2e7d32;">🎉 {{title}}</h2>
<p>Congratulations <strong>{{name}}</strong>!</p>
<p>{{message}}</p>
<p style="margin-top: 24px; font-size: 12px; color: #666;">FinTrack &lt;noreply@fintrack.app&gt;</p>
</div></body></html>"#,
                text: "Congratulations {{name}}!\n\n{{title}}\n\n{{message}}\n\n--\nFinTrack",
            },
        );
        templates.insert(
            "savings_milestone",
            EmailTemplate {
                subject: "Savings milestone: {{title}}",
                html: r#"<html><body style="font-family: Arial, sans-serif; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #1565c0;">{{title}}</h2>
<p>Nice work <strong>{{name}}</strong> — your savings keep growing.</p>
<p>{{message}}</p>
<p style="margin-top: 24px; font-size: 12px; color: #666;">FinTrack &lt;noreply@fintrack.app&gt;</p>
</div></body></html>"#,
                text: "Nice work {{name}}!\n\n{{title}}\n\n{{message}}\n\n--\nFinTrack",
            },
        );
        templates.insert(
            "goal_reminder",
            EmailTemplate {
                subject: "Reminder: {{title}}",
                html: r#"<html><body style="font-family: Arial, sans-serif; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #ef6c00;">{{title}}</h2>
<p>Hi <strong>{{name}}</strong>,</p>
<p>{{message}}</p>
<p style="margin-top: 24px; font-size: 12px; color: #666;">FinTrack &lt;noreply@fintrack.app&gt;</p>
</div></body></html>"#,
                text: "Hi {{name}},\n\n{{title}}\n\n{{message}}\n\n--\nFinTrack",
            },
        );
        Self { templates }
    }

    fn lookup(&self, name: &str) -> &EmailTemplate {
        self.templates.get(name).unwrap_or(&GENERIC_TEMPLATE)
    }

    /// Render the template named after the record's type, substituting the
    /// record's title/message and the recipient's name.
    pub fn render(&self, record: &NotificationRecord, user: &User) -> RenderedEmail {
        let template = self.lookup(record.notification_type.as_str());
        let fill = |s: &str| {
            s.replace("{{name}}", &user.name)
                .replace("{{title}}", &record.title)
                .replace("{{message}}", &record.message)
        };

        RenderedEmail {
            to: user.email.clone(),
            subject: fill(template.subject),
            text: fill(template.text),
            html: fill(template.html),
        }
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Email channel sender.
pub struct EmailSender {
    users: Arc<dyn UserStore>,
    transport: Arc<dyn MailTransport>,
    templates: TemplateRegistry,
}

impl EmailSender {
    pub fn new(users: Arc<dyn UserStore>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            users,
            transport,
            templates: TemplateRegistry::builtin(),
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _preferences: &NotificationPreferences,
    ) -> Result<DeliveryOutcome> {
        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| AppError::ChannelDelivery {
                channel: "email",
                reason: format!("no user record for {}", record.user_id),
            })?;

        let mail = self.templates.render(record, &user);

        self.transport
            .send(&mail)
            .await
            .map_err(|e| AppError::ChannelDelivery {
                channel: "email",
                reason: e.to_string(),
            })?;

        debug!(
            notification_id = %record.id,
            user_id = %record.user_id,
            "email delivered"
        );

        Ok(DeliveryOutcome::single(
            NotificationChannel::Email,
            mail.to,
        ))
    }
}
