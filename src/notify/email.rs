use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::RunDigest;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// Build from env, or `None` when notification is simply not configured.
    /// SMTP_HOST / SMTP_USER / SMTP_PASS / NOTIFY_EMAIL_FROM / NOTIFY_EMAIL_TO.
    pub fn maybe_from_env() -> Result<Option<Self>> {
        let vars = ["SMTP_HOST", "SMTP_USER", "SMTP_PASS", "NOTIFY_EMAIL_FROM", "NOTIFY_EMAIL_TO"];
        let values: Vec<Option<String>> = vars
            .iter()
            .map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
            .collect();
        if values.iter().any(|v| v.is_none()) {
            return Ok(None);
        }
        let [host, user, pass, from_addr, to_addr]: [String; 5] = values
            .into_iter()
            .map(|v| v.unwrap())
            .collect::<Vec<_>>()
            .try_into()
            .expect("five vars");

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Some(Self { mailer, from, to }))
    }

    pub async fn send_digest(&self, digest: &RunDigest) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&digest.subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(digest.body.clone())
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
