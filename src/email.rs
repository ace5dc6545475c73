//! Verification and password reset email templates.
//!
//! Rendering is pure: a token and an expiration window go in, a subject and
//! an HTML body come out. Delivery belongs to an [`EmailSender`].

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::Config;

pub const VERIFICATION_SUBJECT: &str = "Verify your email address";
pub const RESET_SUBJECT: &str = "Reset your password";

/// Query parameter carrying the token in generated links.
pub const TOKEN_PARAM: &str = "token";

/// A rendered email, ready to hand to a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("expiration hours must be positive, got {0}")]
    InvalidExpiration(i64),
}

/// Renders verification and reset emails against configured link bases.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    verification_link_base: Url,
    reset_link_base: Url,
}

impl EmailTemplates {
    pub fn new(config: &Config) -> Self {
        Self {
            verification_link_base: config.verification_link_base.clone(),
            reset_link_base: config.reset_link_base.clone(),
        }
    }

    pub fn verification_template(
        &self,
        token: &str,
        expiration_hours: i64,
    ) -> Result<EmailTemplate, TemplateError> {
        render(
            VERIFICATION_SUBJECT,
            "Please confirm your email address by opening the link below.",
            &self.verification_link_base,
            token,
            expiration_hours,
        )
    }

    pub fn reset_template(
        &self,
        token: &str,
        expiration_hours: i64,
    ) -> Result<EmailTemplate, TemplateError> {
        render(
            RESET_SUBJECT,
            concat!(
                "A password reset was requested for your account. ",
                "Open the link below to choose a new password. ",
                "If you did not request this, you can ignore this email."
            ),
            &self.reset_link_base,
            token,
            expiration_hours,
        )
    }
}

fn render(
    subject: &str,
    intro: &str,
    base: &Url,
    token: &str,
    expiration_hours: i64,
) -> Result<EmailTemplate, TemplateError> {
    if expiration_hours <= 0 {
        return Err(TemplateError::InvalidExpiration(expiration_hours));
    }

    let link = token_link(base, token);
    let href = escape_html(link.as_str());
    let body = format!(
        "<p>{}</p>\n<p><a href=\"{href}\">{href}</a></p>\n<p>This link expires in {}.</p>\n",
        escape_html(intro),
        format_hours(expiration_hours),
    );

    Ok(EmailTemplate {
        subject: subject.to_string(),
        body,
        is_html: true,
    })
}

/// Append the token as a query parameter, keeping any existing query.
fn token_link(base: &Url, token: &str) -> Url {
    let mut link = base.clone();
    link.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    link
}

fn format_hours(hours: i64) -> String {
    if hours == 1 {
        "1 hour".to_string()
    } else {
        format!("{} hours", hours)
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Email delivery abstraction. The identity core only renders templates.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error describing why it failed.
    fn send(&self, to: &str, template: &EmailTemplate) -> anyhow::Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, to: &str, template: &EmailTemplate) -> anyhow::Result<()> {
        info!(
            to_email = %to,
            subject = %template.subject,
            is_html = template.is_html,
            body_len = template.body.len(),
            "email send stub"
        );
        Ok(())
    }
}
