use crate::mailer::Mailer;
use log::{debug, warn};
use std::sync::Arc;

pub const BLOCKED_SUBJECT: &str = "SheetGenius: blocked upload";

/// Best-effort operator notification about rejected uploads
///
/// Failures never reach the customer; they are logged and handed back to the
/// caller only so they can be observed.
#[derive(Clone)]
pub struct AuditNotifier {
    mailer: Option<Arc<Mailer>>,
}

impl AuditNotifier {
    pub fn new(mailer: Option<Arc<Mailer>>) -> Self {
        AuditNotifier { mailer }
    }

    /// Tell the operator an upload was blocked
    ///
    /// # Returns
    /// * `Option<String>` - `None` when the alert was sent or mail is not
    ///   configured, the error text when sending failed
    pub fn notify_blocked(&self, reason: &str, filename: &str, size: u64) -> Option<String> {
        let mailer = match &self.mailer {
            Some(mailer) => mailer,
            None => {
                debug!("mail not configured; blocked-upload alert not sent");
                return None;
            }
        };

        let body = format!("Reason: {}\nFile: {}\nSize: {} bytes", reason, filename, size);
        match mailer.send_alert(BLOCKED_SUBJECT, &body) {
            Ok(()) => None,
            Err(e) => {
                warn!("blocked-upload alert failed: {}", e);
                Some(e.to_string())
            }
        }
    }
}
