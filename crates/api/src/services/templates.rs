//! HTML templates for workflow emails.
//!
//! Each function returns the subject and HTML body for one email type.

use chrono::{DateTime, Utc};
use domain::models::{Registration, WaitingListEntry};

fn layout(title: &str, inner: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: #1f3a5f; padding: 24px; border-radius: 10px 10px 0 0;">
        <h1 style="color: white; margin: 0; font-size: 22px;">Seminar Registration</h1>
    </div>
    <div style="background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px;">
{inner}
    </div>
</body>
</html>"#
    )
}

fn button(url: &str, label: &str) -> String {
    format!(
        r#"<div style="text-align: center; margin: 30px 0;">
            <a href="{url}" style="background: #1f3a5f; color: white; padding: 14px 28px; text-decoration: none; border-radius: 6px; font-weight: bold; display: inline-block;">{label}</a>
        </div>
        <p style="color: #999; font-size: 12px;">Or copy and paste this link into your browser:<br><a href="{url}" style="color: #1f3a5f;">{url}</a></p>"#
    )
}

fn format_when(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Approval request to the supervisor, with approve/decline links.
pub fn supervisor_approval(base_url: &str, registration: &Registration) -> (String, String) {
    let approve_url = format!(
        "{base_url}/approval?token={}&decision=approve",
        registration.approval_token
    );
    let decline_url = format!(
        "{base_url}/approval?token={}&decision=decline",
        registration.approval_token
    );

    let subject = format!(
        "Approval requested: seminar registration by {}",
        registration.presenter_username
    );
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">Approval requested</h2>
        <p>Dear {supervisor},</p>
        <p><strong>{presenter}</strong> has registered a seminar presentation and named you as supervisor.</p>
        <p><strong>Topic:</strong> {topic}</p>
        {approve}
        <p style="text-align: center;"><a href="{decline_url}" style="color: #999;">Decline this registration</a></p>
        <p style="color: #666; font-size: 14px;">This link expires on {expires}. Without a decision the registration lapses and the seat is released.</p>"#,
        supervisor = registration.supervisor_name,
        presenter = registration.presenter_username,
        topic = registration.topic,
        approve = button(&approve_url, "Approve Registration"),
        expires = format_when(registration.approval_token_expires_at),
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Re-sent approval request after a quiet period.
pub fn supervisor_reminder(base_url: &str, registration: &Registration) -> (String, String) {
    let (_, body) = supervisor_approval(base_url, registration);
    let subject = format!(
        "Reminder: approval pending for {}",
        registration.presenter_username
    );
    (subject, body)
}

/// Registration confirmation to the presenter.
pub fn registration_confirmation(registration: &Registration) -> (String, String) {
    let subject = "Seminar registration received".to_string();
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">Registration received</h2>
        <p>Your registration for topic <strong>{topic}</strong> has been recorded.</p>
        <p>An approval request was sent to {supervisor}. You will be notified of the decision.</p>"#,
        topic = registration.topic,
        supervisor = registration.supervisor_name,
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Waiting list confirmation to the presenter.
pub fn waitlist_confirmation(entry: &WaitingListEntry) -> (String, String) {
    let subject = "Added to the seminar waiting list".to_string();
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">You are on the waiting list</h2>
        <p>The slot you requested is currently full. You were added to the waiting list at position <strong>{position}</strong>.</p>
        <p>If a seat frees up you will receive an offer by email.</p>"#,
        position = entry.position,
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Promotion offer to a waiting presenter, with the accept link.
pub fn promotion_offer(
    base_url: &str,
    entry: &WaitingListEntry,
    token: &str,
    expires_at: DateTime<Utc>,
) -> (String, String) {
    let accept_url = format!("{base_url}/promotion?token={token}");
    let subject = "A seminar seat is available for you".to_string();
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">A seat has opened up</h2>
        <p>A seat became available in the slot you were waiting for (topic: <strong>{topic}</strong>).</p>
        {accept}
        <p style="color: #666; font-size: 14px;">This offer expires on {expires}. If you do not accept in time the seat is passed to the next person and you leave the waiting list.</p>"#,
        topic = entry.topic,
        accept = button(&accept_url, "Accept Seat"),
        expires = format_when(expires_at),
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Supervisor decision outcome to the presenter.
pub fn approval_notification(registration: &Registration, approved: bool) -> (String, String) {
    let subject = if approved {
        "Seminar registration approved".to_string()
    } else {
        "Seminar registration declined".to_string()
    };
    let verdict = if approved {
        "approved your registration. Your seat is confirmed."
    } else {
        "declined your registration. The seat has been released."
    };
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">{subject}</h2>
        <p>{supervisor} has {verdict}</p>
        <p><strong>Topic:</strong> {topic}</p>"#,
        supervisor = registration.supervisor_name,
        topic = registration.topic,
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Approval window lapsed without a decision.
pub fn expiration_warning(registration: &Registration) -> (String, String) {
    let subject = "Seminar registration expired".to_string();
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">Registration expired</h2>
        <p>Your supervisor did not act on the approval request in time, so your registration for topic <strong>{topic}</strong> has expired and the seat was released.</p>
        <p>You can register again for another slot.</p>"#,
        topic = registration.topic,
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

/// Notice to the presenter that a reminder went out to the supervisor.
pub fn reminder_notice(registration: &Registration) -> (String, String) {
    let subject = "Reminder sent to your supervisor".to_string();
    let inner = format!(
        r#"        <h2 style="color: #333; margin-top: 0;">Still waiting for approval</h2>
        <p>Your registration for topic <strong>{topic}</strong> is still awaiting a decision. We re-sent the approval request to {supervisor}.</p>"#,
        topic = registration.topic,
        supervisor = registration.supervisor_name,
    );
    let body = layout(&subject, &inner);
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::models::{ApprovalStatus, Degree};
    use uuid::Uuid;

    fn registration() -> Registration {
        let now = Utc::now();
        Registration {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            presenter_username: "jdoe".to_string(),
            degree: Degree::Msc,
            topic: "Streaming joins".to_string(),
            supervisor_name: "Prof. Example".to_string(),
            supervisor_email: "prof@university.edu".to_string(),
            approval_status: ApprovalStatus::Pending,
            approval_token: "tok123".to_string(),
            approval_token_expires_at: now + Duration::hours(48),
            last_reminder_sent_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_approval_contains_both_decision_links() {
        let (subject, body) = supervisor_approval("https://seminars.example.edu", &registration());
        assert!(subject.contains("jdoe"));
        assert!(body.contains("token=tok123&decision=approve"));
        assert!(body.contains("token=tok123&decision=decline"));
    }

    #[test]
    fn test_notification_subject_reflects_decision() {
        let (approved, _) = approval_notification(&registration(), true);
        let (declined, _) = approval_notification(&registration(), false);
        assert!(approved.contains("approved"));
        assert!(declined.contains("declined"));
    }

    #[test]
    fn test_offer_contains_accept_link() {
        let entry = WaitingListEntry {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            presenter_username: "jdoe".to_string(),
            degree: Degree::Phd,
            topic: "Topic".to_string(),
            supervisor_name: "Prof. Example".to_string(),
            supervisor_email: "prof@university.edu".to_string(),
            position: 1,
            promotion_token: None,
            promotion_token_expires_at: None,
            created_at: Utc::now(),
        };
        let (_, body) = promotion_offer(
            "https://seminars.example.edu",
            &entry,
            "offer456",
            Utc::now() + Duration::hours(24),
        );
        assert!(body.contains("promotion?token=offer456"));
    }
}
