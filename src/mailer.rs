use crate::config::MailSettings;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use std::error::Error;
use std::path::Path;

pub const REPORT_SUBJECT: &str = "Your SheetGenius Report";

const REPORT_BODY: &str = "Thanks for using SheetGenius!\n\n\
Attached: summary.csv, scatterplot.png (if available), clustered.csv (if applicable).\n\n\
The SheetGenius team";

/// Anything that can hand a composed message to a mail server
///
/// Implemented for every `lettre` transport, so the SMTP connection can be
/// swapped for an in-memory one.
pub trait Outbox {
    fn deliver(&self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>>;
}

impl<T> Outbox for T
where
    T: Transport,
    T::Error: Error + Send + Sync + 'static,
{
    fn deliver(&self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.send(message).map(|_| ()).map_err(|e| e.into())
    }
}

/// Sends report and alert emails from the operator's account
pub struct Mailer {
    operator: Mailbox,
    outbox: Box<dyn Outbox + Send + Sync>,
}

impl Mailer {
    /// Connect-on-send SMTP mailer built from configured credentials
    ///
    /// Port 465 uses implicit TLS, any other port STARTTLS. Every connection
    /// and command is bounded by the configured timeout.
    pub fn new(settings: &MailSettings) -> Result<Self, Box<dyn Error>> {
        let creds = Credentials::new(settings.address.clone(), settings.password.clone());

        let builder = if settings.smtp_port == 465 {
            let tls_parameters = TlsParameters::new(settings.smtp_host.clone())?;
            SmtpTransport::relay(&settings.smtp_host)?.tls(Tls::Wrapper(tls_parameters))
        } else {
            SmtpTransport::starttls_relay(&settings.smtp_host)?
        };

        let smtp = builder
            .credentials(creds)
            .port(settings.smtp_port)
            .timeout(Some(settings.timeout()))
            .build();

        Ok(Mailer {
            operator: settings.address.parse()?,
            outbox: Box::new(smtp),
        })
    }

    /// Mailer sending through an arbitrary outbox
    pub fn with_outbox(
        operator: &str,
        outbox: impl Outbox + Send + Sync + 'static,
    ) -> Result<Self, Box<dyn Error>> {
        Ok(Mailer {
            operator: operator.parse()?,
            outbox: Box::new(outbox),
        })
    }

    pub fn operator(&self) -> &Mailbox {
        &self.operator
    }

    /// Build the report email: archive attached, operator in BCC
    ///
    /// # Arguments
    /// * `recipient` - Customer address as entered in the upload form
    /// * `archive` - ZIP file to attach, sent under its own file name
    ///
    /// # Returns
    /// * `Result<Message, Box<dyn Error>>` - The message, or an error for an
    ///   unparseable address or unreadable archive
    pub fn compose_report(&self, recipient: &str, archive: &Path) -> Result<Message, Box<dyn Error>> {
        let to: Mailbox = recipient.trim().parse()?;
        let filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or("Archive path has no file name")?;
        let bytes = std::fs::read(archive)?;

        let attachment = Attachment::new(filename).body(bytes, ContentType::parse("application/zip")?);

        let email = Message::builder()
            .from(self.operator.clone())
            .to(to)
            .bcc(self.operator.clone())
            .subject(REPORT_SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(REPORT_BODY.to_string()))
                    .singlepart(attachment),
            )?;

        Ok(email)
    }

    pub fn send_report(&self, recipient: &str, archive: &Path) -> Result<(), Box<dyn Error>> {
        let email = self.compose_report(recipient, archive)?;
        self.outbox.deliver(&email).map_err(|e| e as Box<dyn Error>)
    }

    /// Send a plain-text note to the operator's own address
    pub fn send_alert(&self, subject: &str, body: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(self.operator.clone())
            .to(self.operator.clone())
            .subject(subject)
            .body(body.to_string())?;

        self.outbox.deliver(&email).map_err(|e| e as Box<dyn Error>)
    }
}
