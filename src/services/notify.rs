// src/services/notify.rs

//! Notification dispatch.
//!
//! Channels: SMTP email, PushPlus, Telegram. Each configured channel is
//! attempted independently; one failure never blocks the others, and the
//! per-channel outcome is reported back to the orchestrator.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailConfig, NotifyConfig, TelegramConfig};
use crate::error::{AppError, Result};
use crate::pipeline::ChangeReport;

/// A formatted notification, ready for any channel.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub title: String,
    pub text: String,
    pub html: String,
}

/// Per-channel delivery outcome of one `send_all`.
#[derive(Debug, Clone, Default)]
pub struct NotifyOutcome {
    /// (channel name, delivered) in attempt order
    pub results: Vec<(String, bool)>,
}

impl NotifyOutcome {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, ok)| *ok).count()
    }

    /// True when at least one channel was tried and none delivered.
    pub fn all_failed(&self) -> bool {
        self.attempted() > 0 && self.succeeded() == 0
    }
}

/// Notification manager over all configured channels.
pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifyConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Send the message over every configured channel.
    pub async fn send_all(
        &self,
        message: &NotificationMessage,
        attachments: &[PathBuf],
    ) -> NotifyOutcome {
        let mut outcome = NotifyOutcome::default();

        if let Some(email) = self.config.email.as_ref().filter(|e| e.is_configured()) {
            let ok = match self.send_email(email, message, attachments).await {
                Ok(()) => {
                    log::info!("[Email] Push succeeded -> {}", email.recipient());
                    true
                }
                Err(e) => {
                    log::error!("{e}");
                    false
                }
            };
            outcome.results.push(("Email".to_string(), ok));
        }

        if let Some(token) = self.config.pushplus_token.as_deref() {
            let ok = match self.send_pushplus(token, message).await {
                Ok(()) => {
                    log::info!("[PushPlus] Push succeeded");
                    true
                }
                Err(e) => {
                    log::error!("{e}");
                    false
                }
            };
            outcome.results.push(("PushPlus".to_string(), ok));
        }

        if let Some(telegram) = self.config.telegram.as_ref() {
            let ok = match self.send_telegram(telegram, message).await {
                Ok(()) => {
                    log::info!("[Telegram] Push succeeded");
                    true
                }
                Err(e) => {
                    log::error!("{e}");
                    false
                }
            };
            outcome.results.push(("Telegram".to_string(), ok));
        }

        if outcome.results.is_empty() {
            log::warn!("No notification channels configured");
        }

        outcome
    }

    async fn send_email(
        &self,
        email: &EmailConfig,
        message: &NotificationMessage,
        attachments: &[PathBuf],
    ) -> Result<()> {
        let notify_err = |e: &dyn std::fmt::Display| AppError::notify("Email", e);

        let from_address = email
            .user
            .parse()
            .map_err(|e| notify_err(&format!("invalid sender address: {e}")))?;
        let from = Mailbox::new(Some(email.sender.clone()), from_address);
        let to: Mailbox = email
            .recipient()
            .parse()
            .map_err(|e| notify_err(&format!("invalid recipient address: {e}")))?;

        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            message.text.clone(),
            message.html.clone(),
        ));

        for path in attachments {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Attachment not readable, skipping {}: {e}", path.display());
                    continue;
                }
            };
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "attachment.pdf".to_string());
            let content_type = ContentType::parse("application/pdf")
                .map_err(|e| notify_err(&e))?;
            body = body.singlepart(Attachment::new(filename).body(bytes, content_type));
            log::info!("Added attachment: {}", path.display());
        }

        let mail = Message::builder()
            .from(from)
            .to(to)
            .subject(message.title.clone())
            .multipart(body)
            .map_err(|e| notify_err(&e))?;

        let host = email
            .host()
            .ok_or_else(|| notify_err(&"cannot derive SMTP host from sender address"))?;

        // Implicit TLS on 465, the submission setup Chinese mail providers use.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| notify_err(&e))?
            .credentials(Credentials::new(email.user.clone(), email.pass.clone()))
            .build();

        transport.send(mail).await.map_err(|e| notify_err(&e))?;
        Ok(())
    }

    async fn send_pushplus(&self, token: &str, message: &NotificationMessage) -> Result<()> {
        let payload = serde_json::json!({
            "token": token,
            "title": message.title,
            "content": message.html,
            "template": "html",
        });

        self.client
            .post("https://www.pushplus.plus/send")
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::notify("PushPlus", e))?;
        Ok(())
    }

    async fn send_telegram(
        &self,
        telegram: &TelegramConfig,
        message: &NotificationMessage,
    ) -> Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            telegram.bot_token
        );
        let text = format!(
            "*{}*\n\n{}",
            escape_markdown(&message.title),
            escape_markdown(&message.text)
        );
        let payload = serde_json::json!({
            "chat_id": telegram.chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
        });

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::notify("Telegram", e))?;
        Ok(())
    }
}

/// Escape MarkdownV2 special characters for Telegram.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Format the run's change report as a notification.
///
/// Timestamps are rendered in Beijing time, where the monitored site lives.
pub fn format_message(report: &ChangeReport, checked_at: DateTime<Utc>) -> NotificationMessage {
    let beijing = FixedOffset::east_opt(8 * 3600).expect("static offset");
    let local = checked_at.with_timezone(&beijing);

    let title = format!("📋 CAAC 文件更新通知 ({} 条)", report.total_count());

    let mut lines = vec![
        format!("检测时间: {}", local.format("%Y-%m-%d %H:%M:%S")),
        format!("新增文件: {} 条", report.added_count()),
    ];
    if report.updated_count() > 0 {
        lines.push(format!("更新文件: {} 条", report.updated_count()));
    }
    lines.push(String::new());

    for category in &report.categories {
        if !category.added.is_empty() {
            lines.push(format!("【{}】({} 条)", category.category_name, category.added.len()));
            for doc in &category.added {
                if doc.doc_number.is_empty() {
                    lines.push(format!("  • {}", doc.title));
                } else {
                    lines.push(format!("  • {} {}", doc.doc_number, doc.title));
                }
                let mut details = Vec::new();
                if !doc.validity.is_empty() {
                    details.push(format!("状态: {}", doc.validity));
                }
                if !doc.publish_date.is_empty() {
                    details.push(format!("发布: {}", doc.publish_date));
                }
                if !doc.office_unit.is_empty() {
                    details.push(format!("单位: {}", doc.office_unit));
                }
                if !details.is_empty() {
                    lines.push(format!("    {}", details.join(" | ")));
                }
                lines.push(format!("    详情: {}", doc.url));
            }
            lines.push(String::new());
        }

        if !category.updated.is_empty() {
            lines.push(format!(
                "【{}】更新 ({} 条)",
                category.category_name,
                category.updated.len()
            ));
            for update in &category.updated {
                lines.push(format!("  • {}", update.current.title));
                if update.previous.title != update.current.title {
                    lines.push(format!("    原标题: {}", update.previous.title));
                }
                if update.previous.validity != update.current.validity
                    && !update.current.validity.is_empty()
                {
                    lines.push(format!(
                        "    有效性: {} → {}",
                        update.previous.validity, update.current.validity
                    ));
                }
                lines.push(format!("    详情: {}", update.current.url));
            }
            lines.push(String::new());
        }
    }

    let text = lines.join("\n");
    let html = render_html(report, &local);

    NotificationMessage { title, text, html }
}

fn render_html(report: &ChangeReport, local: &DateTime<FixedOffset>) -> String {
    let mut sections = String::new();

    for category in &report.categories {
        let mut items = String::new();
        for doc in &category.added {
            let validity_color = match doc.validity.as_str() {
                "有效" => "#34C759",
                "失效" | "废止" => "#FF3B30",
                _ => "#86868B",
            };
            let heading = if doc.doc_number.is_empty() {
                doc.title.clone()
            } else {
                format!("{} {}", doc.doc_number, doc.title)
            };
            let mut details = Vec::new();
            if !doc.publish_date.is_empty() {
                details.push(format!("📅 {}", doc.publish_date));
            }
            if !doc.office_unit.is_empty() {
                details.push(format!("🏢 {}", doc.office_unit));
            }
            items.push_str(&format!(
                r#"<li style="margin-bottom:10px;">
  <a href="{url}" style="color:#1D1D1F;font-weight:500;text-decoration:none;">{heading}</a>
  <span style="color:{validity_color};font-size:12px;margin-left:6px;">{validity}</span>
  <div style="color:#86868B;font-size:12px;">{details}</div>
</li>"#,
                url = doc.url,
                heading = heading,
                validity_color = validity_color,
                validity = doc.validity,
                details = details.join(" · "),
            ));
        }
        for update in &category.updated {
            items.push_str(&format!(
                r#"<li style="margin-bottom:10px;">
  <a href="{url}" style="color:#1D1D1F;font-weight:500;text-decoration:none;">{title}</a>
  <span style="color:#FF9500;font-size:12px;margin-left:6px;">已更新</span>
</li>"#,
                url = update.current.url,
                title = update.current.title,
            ));
        }

        sections.push_str(&format!(
            r#"<div style="background:#FFFFFF;border-radius:12px;padding:16px;margin-bottom:12px;">
  <div style="font-size:15px;font-weight:600;color:#1D1D1F;margin-bottom:10px;">{name}
    <span style="background:#007AFF;color:#FFFFFF;font-size:11px;padding:2px 8px;border-radius:10px;margin-left:6px;">{count}</span>
  </div>
  <ul style="list-style:none;margin:0;padding:0;">{items}</ul>
</div>"#,
            name = category.category_name,
            count = category.added.len() + category.updated.len(),
            items = items,
        ));
    }

    let (status_text, status_bg) = if report.has_changes() {
        ("检测完成", "#34C759")
    } else {
        ("暂无更新", "#86868B")
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="margin:0;padding:0;background:#F5F5F7;">
<div style="font-family:-apple-system,'Helvetica Neue',Arial,sans-serif;max-width:520px;margin:0 auto;padding:24px 16px;">
  <div style="text-align:center;margin-bottom:20px;">
    <span style="display:inline-block;background:{status_bg};color:#FFFFFF;border-radius:12px;padding:4px 14px;font-size:14px;">{status_text}</span>
    <p style="color:#86868B;font-size:12px;margin:8px 0 0 0;">{time}</p>
  </div>
  {sections}
  <div style="text-align:center;padding:12px 0;">
    <p style="font-size:11px;color:#AEAEB2;margin:0;">CAAC 文件监控系统 · 自动发送</p>
  </div>
</div>
</body>
</html>"#,
        status_bg = status_bg,
        status_text = status_text,
        time = local.format("%Y年%m月%d日 %H:%M"),
        sections = sections,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::pipeline::{CategoryChanges, ChangeReport, DocumentUpdate};

    fn report_with_one_added() -> ChangeReport {
        let mut report = ChangeReport::default();
        report.push(CategoryChanges::new(
            "13",
            vec![Document {
                title: "新规章".to_string(),
                url: "https://www.caac.gov.cn/t1.html".to_string(),
                doc_number: "CCAR-91".to_string(),
                validity: "有效".to_string(),
                publish_date: "2026-08-01".to_string(),
                ..Document::default()
            }],
            vec![],
        ));
        report
    }

    #[test]
    fn test_format_message_title_and_text() {
        let checked_at: DateTime<Utc> = "2026-08-07T02:15:00Z".parse().unwrap();
        let message = format_message(&report_with_one_added(), checked_at);

        assert_eq!(message.title, "📋 CAAC 文件更新通知 (1 条)");
        // 02:15 UTC is 10:15 in Beijing.
        assert!(message.text.contains("检测时间: 2026-08-07 10:15:00"));
        assert!(message.text.contains("【民航规章】(1 条)"));
        assert!(message.text.contains("• CCAR-91 新规章"));
        assert!(message.text.contains("状态: 有效 | 发布: 2026-08-01"));
        assert!(message.html.contains("民航规章"));
    }

    #[test]
    fn test_format_message_updated_section() {
        let mut report = ChangeReport::default();
        report.push(CategoryChanges::new(
            "14",
            vec![],
            vec![DocumentUpdate {
                previous: Document {
                    title: "旧标题".to_string(),
                    url: "https://www.caac.gov.cn/u.html".to_string(),
                    ..Document::default()
                },
                current: Document {
                    title: "新标题".to_string(),
                    url: "https://www.caac.gov.cn/u.html".to_string(),
                    ..Document::default()
                },
            }],
        ));

        let message = format_message(&report, "2026-08-07T02:15:00Z".parse().unwrap());
        assert!(message.text.contains("【规范性文件】更新 (1 条)"));
        assert!(message.text.contains("原标题: 旧标题"));
        assert!(message.html.contains("已更新"));
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a-b.c!"), "a\\-b\\.c\\!");
        assert_eq!(escape_markdown("文件"), "文件");
    }

    #[test]
    fn test_outcome_all_failed() {
        let outcome = NotifyOutcome {
            results: vec![("Email".into(), false), ("Telegram".into(), false)],
        };
        assert!(outcome.all_failed());

        let mixed = NotifyOutcome {
            results: vec![("Email".into(), false), ("Telegram".into(), true)],
        };
        assert!(!mixed.all_failed());
        assert_eq!(mixed.succeeded(), 1);

        assert!(!NotifyOutcome::default().all_failed());
    }
}
