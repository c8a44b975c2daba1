//! Alert delivery
//!
//! Delivery runs after the tracking decision is persisted and never feeds
//! back into it: a failed send is logged and dropped, not retried.
//!
//! ## Telegram Bot API
//!
//! Endpoint: POST https://api.telegram.org/bot{token}/sendMessage
//! Body: `{ chat_id, text, parse_mode: "HTML", disable_web_page_preview: true }`
//! Returns: `{ ok: bool, description?: string }`

use super::error::NotifyError;
use super::types::{AttributeType, CurrentOutcome, PatternResult, PatternType};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Delivers alert batches to a subscriber
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        subscriber_id: i64,
        results: &[PatternResult],
        current: &CurrentOutcome,
    ) -> Result<(), NotifyError>;
}

/// Writes alerts to the log; used when no bot token is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        subscriber_id: i64,
        results: &[PatternResult],
        current: &CurrentOutcome,
    ) -> Result<(), NotifyError> {
        let message = format_alert_message(results, current);
        if !message.is_empty() {
            log::info!("📣 Alert for subscriber {}:\n{}", subscriber_id, message);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    send_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            send_url: format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, bot_token),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(
        &self,
        subscriber_id: i64,
        results: &[PatternResult],
        current: &CurrentOutcome,
    ) -> Result<(), NotifyError> {
        let text = format_alert_message(results, current);
        if text.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({
            "chat_id": subscriber_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&self.send_url).json(&body).send().await?;
        let status = response.status();

        // Error bodies are not guaranteed to be JSON (proxies, 502 pages)
        if !status.is_success() {
            let raw = response.text().await?;
            return Err(send_failure(subscriber_id, status, &raw));
        }

        let reply: TelegramResponse = response.json().await?;
        if !reply.ok {
            return Err(NotifyError::Api(format!(
                "sendMessage to {} failed ({}): {}",
                subscriber_id,
                status,
                reply.description.unwrap_or_default()
            )));
        }

        log::debug!("📨 Alert delivered to {} ({} streaks)", subscriber_id, results.len());
        Ok(())
    }
}

/// Error for a non-2xx reply, using the API's description when present
fn send_failure(subscriber_id: i64, status: reqwest::StatusCode, raw: &str) -> NotifyError {
    let detail = serde_json::from_str::<TelegramResponse>(raw)
        .ok()
        .and_then(|reply| reply.description)
        .unwrap_or_else(|| raw.trim().to_string());

    NotifyError::Api(format!(
        "sendMessage to {} failed ({}): {}",
        subscriber_id, status, detail
    ))
}

/// Render an alert batch as Telegram HTML
///
/// Results are grouped by attribute type (size, parity, sum, combo) and
/// sorted by count descending within each group. Empty input renders as
/// an empty string.
pub fn format_alert_message(results: &[PatternResult], current: &CurrentOutcome) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut text = String::from("🔥 <b>Streak alert</b>\n");

    let _ = write!(text, "Draw <code>{}</code>: ", escape_html(&current.sequence_id));
    if current.draw.is_empty() {
        let _ = write!(text, "<b>{}</b>", current.sum);
    } else {
        let _ = write!(text, "<b>{}={}</b>", escape_html(&current.draw), current.sum);
    }
    let _ = writeln!(text, " {} {}", current.size.as_str(), current.parity.as_str());

    let sections = [
        (AttributeType::Size, "📊"),
        (AttributeType::Parity, "🎯"),
        (AttributeType::Sum, "🔢"),
        (AttributeType::SizeParity, "🔄"),
    ];

    for (attribute_type, icon) in sections {
        let mut group: Vec<&PatternResult> = results
            .iter()
            .filter(|r| r.attribute_type == attribute_type)
            .collect();
        if group.is_empty() {
            continue;
        }

        // Stable: equal counts keep their analyzer order
        group.sort_by(|a, b| b.count.cmp(&a.count));

        let _ = writeln!(
            text,
            "<blockquote>{} <b>[{} streaks]</b></blockquote>",
            icon,
            attribute_type.label()
        );
        for result in group {
            text.push_str(&format_single_result(result));
        }
    }

    text.trim_end_matches('\n').to_string()
}

fn format_single_result(result: &PatternResult) -> String {
    let labels = result.detail_labels();

    let (count, unit, detail) = if result.pattern_type == PatternType::GroupedRepeat {
        let groups: Vec<String> = labels
            .chunks(3)
            .map(|chunk| {
                if chunk.len() == 3 {
                    format!("({})", chunk.join(" "))
                } else {
                    chunk.join(" ")
                }
            })
            .collect();
        (result.count / 3, "groups", groups.join(" "))
    } else {
        (result.count, "draws", labels.join(" "))
    };

    format!(
        "  • {} <b>{} {}</b>\n    <code>{}</code>\n    Since: {}\n\n",
        result.pattern_type.label(),
        count,
        unit,
        detail,
        escape_html(&result.start_sequence)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
