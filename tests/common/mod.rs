#![allow(dead_code)]

use lettre::address::Envelope;
use lettre::Transport;
use sheetgenius::mailer::Mailer;
use std::io;
use std::sync::{Arc, Mutex};

pub const OPERATOR: &str = "ops@example.com";
pub const CUSTOMER: &str = "customer@example.com";

/// A sent message as the mail server would have received it
#[derive(Debug, Clone)]
pub struct Sent {
    pub recipients: Vec<String>,
    pub raw: String,
}

/// Transport that keeps every message in memory, or refuses them all
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        RecordingTransport {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    type Ok = ();
    type Error = io::Error;

    fn send_raw(&self, envelope: &Envelope, email: &[u8]) -> Result<(), io::Error> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "relay refused"));
        }
        self.sent.lock().unwrap().push(Sent {
            recipients: envelope.to().iter().map(|a| a.to_string()).collect(),
            raw: String::from_utf8_lossy(email).into_owned(),
        });
        Ok(())
    }
}

pub fn recording_mailer() -> (Arc<Mailer>, RecordingTransport) {
    let transport = RecordingTransport::default();
    let mailer = Mailer::with_outbox(OPERATOR, transport.clone()).unwrap();
    (Arc::new(mailer), transport)
}

/// CSV with an `id`, two numeric columns and a text column
pub fn numeric_csv(rows: usize) -> Vec<u8> {
    let mut body = String::from("id,height,weight,city\n");
    let cities = ["Oslo", "Lima", "Pune"];
    for i in 0..rows {
        body.push_str(&format!(
            "r{},{},{},{}\n",
            i,
            150 + (i * 7) % 40,
            50 + (i * 13) % 35,
            cities[i % cities.len()]
        ));
    }
    body.into_bytes()
}
