use crate::mailer::OutboundEmail;

const VERIFY_SUBJECT: &str = "Verify your email for the InstAPI waitlist";
const WELCOME_SUBJECT: &str = "You're on the InstAPI waitlist!";

const BODY_STYLE: &str = "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; \
     background-color: #0a0a0a; color: #fafafa; padding: 40px 20px; margin: 0;";
const TEXT_STYLE: &str = "font-size: 16px; line-height: 1.6; color: #a1a1aa;";
const SMALL_STYLE: &str = "font-size: 14px; color: #52525b;";

const SIGN_OFF: &str = r#"<p style="font-size: 14px; color: #52525b; margin-top: 32px;">
  Ship backends in minutes, not days.<br>
  <span style="color: #71717a;">The InstAPI Team</span>
</p>"#;

pub fn verification_email(to: &str, verify_url: &str, language_label: &str) -> OutboundEmail {
    let url = escape_html(verify_url);
    let lang = escape_html(language_label);
    let content = format!(
        r#"<h1 style="font-size: 24px; font-weight: 600; margin-bottom: 24px;">Verify your email</h1>
<p style="{TEXT_STYLE}">Thanks for joining the InstAPI waitlist! Please verify your email address to confirm your spot.</p>
<p style="{TEXT_STYLE}">You selected <strong style="color: #fafafa;">{lang}</strong> as your preferred language.</p>
<div style="margin: 32px 0;">
  <a href="{url}" style="display: inline-block; padding: 14px 28px; background: #059669; color: #ffffff; text-decoration: none; font-weight: 600; border-radius: 8px;">Verify my email</a>
</div>
<p style="font-size: 14px; color: #71717a;">Or copy and paste this link into your browser:</p>
<p style="{SMALL_STYLE} word-break: break-all;">{url}</p>
<p style="{SMALL_STYLE} margin-top: 32px;">This link expires in 24 hours.<br><br>
  If you didn't sign up for the InstAPI waitlist, you can safely ignore this email.</p>
{SIGN_OFF}"#
    );

    OutboundEmail {
        to: to.to_string(),
        subject: VERIFY_SUBJECT.to_string(),
        html: layout(&content),
    }
}

pub fn welcome_email(to: &str, language_label: &str) -> OutboundEmail {
    let lang = escape_html(language_label);
    let content = format!(
        r#"<h1 style="font-size: 24px; font-weight: 600; margin-bottom: 24px;">You're on the list!</h1>
<p style="{TEXT_STYLE}">Your email has been verified. Thanks for joining the InstAPI waitlist. We're building something that'll save you hours of backend setup work.</p>
<p style="{TEXT_STYLE}">You selected <strong style="color: #fafafa;">{lang}</strong> as your preferred language. We'll let you know as soon as it's ready.</p>
<div style="background-color: #18181b; border-radius: 8px; padding: 20px; margin-bottom: 24px;">
  <p style="font-size: 14px; color: #71717a; margin: 0 0 8px 0;">What you'll get:</p>
  <ul style="font-size: 14px; color: #a1a1aa; margin: 0; padding-left: 20px;">
    <li>Production-ready backend in minutes</li>
    <li>Authentication, validation, rate limiting built-in</li>
    <li>Tests and OpenAPI docs included</li>
    <li>Code you own and control</li>
  </ul>
</div>
{SIGN_OFF}"#
    );

    OutboundEmail {
        to: to.to_string(),
        subject: WELCOME_SUBJECT.to_string(),
        html: layout(&content),
    }
}

fn layout(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="{BODY_STYLE}">
<div style="max-width: 560px; margin: 0 auto;">
{content}
</div>
</body>
</html>"#
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
