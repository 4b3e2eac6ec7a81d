use crate::game::activity::Activity;
use chrono::NaiveDateTime;
use log::{error, info, warn};
use qrcodegen::{QrCode, QrCodeEcc};
use serde::Serialize;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

const RECEIPT_COLUMNS: usize = 32;
const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %I:%M%p";

/// Everything the receipt printer needs about a resolved activity.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReceiptData {
    pub title: String,
    #[serde(rename = "playerNum")]
    pub player_num: String,
    pub tags: String,
    pub body: String,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
    #[serde(rename = "qrLink")]
    pub qr_link: String,
}

impl ReceiptData {
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            title: activity.name.clone(),
            player_num: format!("for {}", activity.players.summary()),
            tags: activity.tags.summary(),
            body: activity.description.clone(),
            has_qr: activity.has_qr(),
            qr_link: activity.qr_link.clone().unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text rendering of the printed slip.
    pub fn render_text(&self, printed_at: NaiveDateTime) -> String {
        let rule = "-".repeat(RECEIPT_COLUMNS);
        let mut out = String::new();

        out.push_str(&rule);
        out.push_str("\n\n");
        push_centered(&mut out, &self.title.to_uppercase());
        push_centered(&mut out, &self.player_num);
        if !self.tags.is_empty() {
            out.push('\n');
            for line in wrap(&self.tags, RECEIPT_COLUMNS) {
                push_centered(&mut out, &line);
            }
        }

        for paragraph in self.body.lines() {
            out.push('\n');
            for line in wrap(paragraph, RECEIPT_COLUMNS) {
                out.push_str(&line);
                out.push('\n');
            }
        }

        if self.has_qr {
            out.push('\n');
            match qr_block(&self.qr_link) {
                Some(block) => out.push_str(&block),
                None => {
                    out.push_str(&self.qr_link);
                    out.push('\n');
                }
            }
        }

        out.push('\n');
        out.push_str(&printed_at.format(TIMESTAMP_FORMAT).to_string());
        out.push('\n');
        out.push_str(&rule);
        out.push_str("\n\n");
        push_centered(&mut out, "THANK YOU");
        push_centered(&mut out, "COME AGAIN");
        out.push_str(&rule);
        out.push('\n');
        out
    }
}

fn push_centered(out: &mut String, text: &str) {
    let len = text.chars().count();
    let pad = RECEIPT_COLUMNS.saturating_sub(len) / 2;
    out.extend(std::iter::repeat_n(' ', pad));
    out.push_str(text);
    out.push('\n');
}

/// Greedy word wrap. Words longer than a line are hard-split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            lines.push(word.drain(..columns).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > columns {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// QR code as text, one character per module with a one-module quiet zone.
fn qr_block(content: &str) -> Option<String> {
    if content.trim().is_empty() {
        return None;
    }
    let qr = QrCode::encode_text(content, QrCodeEcc::Low).ok()?;
    let size = qr.size();
    let mut out = String::with_capacity(((size + 3) * (size + 2)) as usize);
    for y in -1..=size {
        for x in -1..=size {
            out.push(if qr.get_module(x, y) { '#' } else { ' ' });
        }
        out.push('\n');
    }
    Some(out)
}

/// Receives accepted activities. Printing is fire-and-forget: failures are
/// logged and never reach the caller.
pub trait ReceiptPrinter {
    fn print(&self, receipt: &ReceiptData);
}

pub struct LogPrinter;

impl ReceiptPrinter for LogPrinter {
    fn print(&self, receipt: &ReceiptData) {
        let now = chrono::Local::now().naive_local();
        info!("Receipt:\n{}", receipt.render_text(now));
    }
}

/// Writes the receipt as JSON for an external print job, then optionally
/// launches that job without waiting on it.
pub struct SpoolPrinter {
    spool_path: PathBuf,
    command: Option<String>,
}

impl SpoolPrinter {
    pub fn new(spool_path: impl Into<PathBuf>, command: Option<String>) -> Self {
        Self {
            spool_path: spool_path.into(),
            command: command.filter(|c| !c.trim().is_empty()),
        }
    }

    fn write_spool(&self, receipt: &ReceiptData) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.spool_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.spool_path, receipt.to_json()?)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn spool_path(&self) -> &std::path::Path {
        &self.spool_path
    }
}

impl ReceiptPrinter for SpoolPrinter {
    fn print(&self, receipt: &ReceiptData) {
        if let Err(e) = self.write_spool(receipt) {
            error!(
                "Failed to write receipt to '{}': {e}",
                self.spool_path.display()
            );
            return;
        }
        let Some(cmd) = self.command.as_deref() else {
            return;
        };
        match spawn_reaped(cmd) {
            Ok((pid, _reaper)) => info!("Started print job '{cmd}' (pid {pid})."),
            Err(e) => error!("Failed to start print job '{cmd}': {e}"),
        }
    }
}

/// Starts `cmd` with its standard streams closed. A detached thread waits on
/// the child so finished jobs are reaped while the wheel keeps running.
fn spawn_reaped(cmd: &str) -> std::io::Result<(u32, JoinHandle<std::io::Result<ExitStatus>>)> {
    let mut child = Command::new(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let pid = child.id();
    let label = cmd.to_string();
    let reaper = std::thread::spawn(move || {
        let status = child.wait();
        match &status {
            Ok(s) if !s.success() => warn!("Print job '{label}' exited with {s}."),
            Ok(_) => {}
            Err(e) => warn!("Lost track of print job '{label}': {e}"),
        }
        status
    });
    Ok((pid, reaper))
}
