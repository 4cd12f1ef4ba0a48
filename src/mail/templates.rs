//! HTML email bodies.

use std::fmt::Write as _;

use super::EmailMessage;
use crate::domain::PaymentBreakdown;

/// Formats a minor-unit amount as naira, e.g. `₦1,015.00`.
#[must_use]
pub fn format_naira(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}\u{20a6}{grouped}.{:02}", abs % 100)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, accent: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: {accent};">{title}</h2>
{body}
        <p style="color: #666; font-size: 12px; margin-top: 40px;">Tixhub</p>
    </div>
</body>
</html>
"#
    )
}

fn button(link: &str, label: &str, color: &str) -> String {
    format!(
        r#"        <p style="margin: 30px 0;">
            <a href="{link}" style="display: inline-block; background-color: {color}; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px;">{label}</a>
        </p>
        <p style="color: #666; font-size: 12px;">Or copy and paste this link into your browser:<br>{link}</p>"#
    )
}

/// Email confirmation link, valid for 24 hours.
#[must_use]
pub fn email_verification(to: &str, name: &str, link: &str) -> EmailMessage {
    let body = format!(
        "        <p>Hi {},</p>\n        <p>Confirm your email address to start buying and selling tickets. This link expires in 24 hours.</p>\n{}",
        escape(name),
        button(&escape(link), "Verify email", "#2563eb"),
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        html: layout("Verify your email address", "#2563eb", &body),
    }
}

/// Password reset link, valid for one hour.
#[must_use]
pub fn password_reset(to: &str, name: &str, link: &str) -> EmailMessage {
    let body = format!(
        "        <p>Hi {},</p>\n        <p>Someone requested a password reset for your account. This link expires in 1 hour.</p>\n{}\n        <p style=\"color: #666; font-size: 14px;\">If you didn't request this, you can ignore this email.</p>",
        escape(name),
        button(&escape(link), "Reset password", "#dc2626"),
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        html: layout("Reset your password", "#dc2626", &body),
    }
}

/// One purchased ticket as listed in a confirmation email.
#[derive(Debug, Clone)]
pub struct TicketLine {
    /// Ticket type name.
    pub ticket_type: String,
    /// Admission code.
    pub code: String,
}

/// Purchase confirmation with admission codes.
#[must_use]
pub fn ticket_confirmation(
    to: &str,
    event_title: &str,
    reference: &str,
    tickets: &[TicketLine],
    breakdown: &PaymentBreakdown,
) -> EmailMessage {
    let mut rows = String::new();
    for ticket in tickets {
        let _ = writeln!(
            rows,
            "            <tr><td>{}</td><td><code>{}</code></td></tr>",
            escape(&ticket.ticket_type),
            escape(&ticket.code)
        );
    }
    let body = format!(
        r#"        <p>Your tickets for <strong>{event}</strong> are confirmed.</p>
        <table style="border-collapse: collapse;">
{rows}        </table>
        <p>Subtotal: {subtotal}<br>Processing fee: {fee}<br><strong>Total paid: {total}</strong></p>
        <p style="color: #666; font-size: 14px;">Reference: {reference}</p>"#,
        event = escape(event_title),
        subtotal = format_naira(breakdown.subtotal),
        fee = format_naira(breakdown.processor_fee),
        total = format_naira(breakdown.total_amount),
        reference = escape(reference),
    );
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your tickets for {event_title}"),
        html: layout("Booking confirmed", "#16a34a", &body),
    }
}

/// Notice that a withdrawal was approved.
#[must_use]
pub fn payout_approved(to: &str, name: &str, amount: i64, account: &str) -> EmailMessage {
    let body = format!(
        "        <p>Hi {},</p>\n        <p>Your withdrawal of <strong>{}</strong> has been approved and will be paid to account {}.</p>",
        escape(name),
        format_naira(amount),
        escape(account),
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Withdrawal approved".to_string(),
        html: layout("Withdrawal approved", "#16a34a", &body),
    }
}

/// Notice that a withdrawal was rejected, with the reviewer's note.
#[must_use]
pub fn payout_rejected(to: &str, name: &str, amount: i64, note: Option<&str>) -> EmailMessage {
    let reason = note
        .map(|n| format!("\n        <p>Reason: {}</p>", escape(n)))
        .unwrap_or_default();
    let body = format!(
        "        <p>Hi {},</p>\n        <p>Your withdrawal of <strong>{}</strong> was not approved. The amount is available in your balance again.</p>{reason}",
        escape(name),
        format_naira(amount),
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Withdrawal rejected".to_string(),
        html: layout("Withdrawal rejected", "#dc2626", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naira_formatting() {
        assert_eq!(format_naira(0), "\u{20a6}0.00");
        assert_eq!(format_naira(101_500), "\u{20a6}1,015.00");
        assert_eq!(format_naira(123_456_789), "\u{20a6}1,234,567.89");
        assert_eq!(format_naira(-5), "-\u{20a6}0.05");
    }

    #[test]
    fn user_text_is_escaped() {
        let msg = payout_rejected("o@example.com", "<b>Org</b>", 1000, Some("bad & wrong"));
        assert!(msg.html.contains("&lt;b&gt;Org&lt;/b&gt;"));
        assert!(msg.html.contains("bad &amp; wrong"));
        assert!(!msg.html.contains("<b>Org</b>"));
    }

    #[test]
    fn confirmation_lists_codes() {
        let breakdown = PaymentBreakdown {
            subtotal: 100_000,
            processor_fee: 1_500,
            total_amount: 101_500,
            organizer_amount: 93_000,
            platform_amount: 7_000,
        };
        let tickets = vec![
            TicketLine {
                ticket_type: "VIP".into(),
                code: "TIX-AAAA".into(),
            },
            TicketLine {
                ticket_type: "VIP".into(),
                code: "TIX-BBBB".into(),
            },
        ];
        let msg = ticket_confirmation("b@example.com", "Gala", "ref-1", &tickets, &breakdown);
        assert_eq!(msg.subject, "Your tickets for Gala");
        assert!(msg.html.contains("TIX-AAAA"));
        assert!(msg.html.contains("TIX-BBBB"));
        assert!(msg.html.contains("\u{20a6}1,015.00"));
    }
}
