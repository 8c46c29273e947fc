use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::warn;

use crate::config::SmtpConfig;

/// Отправка писем через SMTP. Все отправки best-effort: ошибка
/// логируется и никогда не валит породивший её запрос.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();

        let from: Mailbox = cfg.from.parse()?;

        Ok(Self { transport, from })
    }

    pub async fn send(&self, to: &str, subject: &str, html: String) {
        let to_mailbox: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!("invalid recipient address {}: {:?}", to, e);
                return;
            }
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html);

        match message {
            Ok(message) => {
                if let Err(e) = self.transport.send(message).await {
                    warn!("failed to send email to {}: {:?}", to, e);
                }
            }
            Err(e) => warn!("failed to build email to {}: {:?}", to, e),
        }
    }

    /// Отправка в фоне, чтобы не держать обработчик запроса.
    pub fn send_detached(&self, to: String, subject: String, html: String) {
        let mailer = self.clone();
        tokio::spawn(async move {
            mailer.send(&to, &subject, html).await;
        });
    }
}
