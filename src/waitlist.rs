//! Double opt-in workflows: joining the waitlist and confirming the address.

use chrono::Utc;

use crate::{
    models::signup::{NewSignup, PreferredLanguage},
    store::StoreError,
    templates, token,
    validation::Submission,
    AppState,
};

/// Which branch a submission took. Callers answer all of them identically so
/// the endpoint cannot be used to probe for registered addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    Created,
    Resent,
    AlreadyVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    Expired,
    /// Missing or malformed token.
    InvalidLink,
    /// No pending row carries this token.
    UnknownToken,
    /// The row was found but could not be updated.
    Failed,
}

impl VerifyOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified => "success",
            VerifyOutcome::AlreadyVerified => "already_verified",
            VerifyOutcome::Expired => "expired",
            VerifyOutcome::InvalidLink | VerifyOutcome::UnknownToken | VerifyOutcome::Failed => {
                "error"
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified => "Email verified successfully",
            VerifyOutcome::AlreadyVerified => "Email already verified",
            VerifyOutcome::Expired => "Verification link has expired",
            VerifyOutcome::InvalidLink => "Invalid verification link",
            VerifyOutcome::UnknownToken => "Invalid or expired verification link",
            VerifyOutcome::Failed => "Failed to verify email",
        }
    }
}

/// Creates a pending signup or re-issues the token for one that is still
/// pending. Only a failed insert is reported; everything after the row exists
/// is best effort.
pub async fn submit(state: &AppState, submission: &Submission) -> Result<SignupOutcome, StoreError> {
    let email = submission.email.as_str();
    let preferred_lang = submission.preferred_lang.to_stored();

    let existing = match state.signups.find_by_email(email).await {
        Ok(existing) => existing,
        Err(e) => {
            tracing::warn!("Signup lookup failed, treating as new: {}", e);
            None
        }
    };

    match existing {
        Some(signup) if signup.email_verified => {
            tracing::debug!(signup_id = signup.id, "signup already verified, nothing to do");
            Ok(SignupOutcome::AlreadyVerified)
        }
        Some(signup) => {
            let fresh_token = token::generate();
            let expires_at = Utc::now() + token::token_ttl();

            match state
                .signups
                .refresh_pending(signup.id, &fresh_token, expires_at, &preferred_lang)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(signup_id = signup.id, "signup verified before token refresh");
                    return Ok(SignupOutcome::AlreadyVerified);
                }
                Err(e) => {
                    tracing::error!(signup_id = signup.id, "Failed to refresh verification token: {}", e);
                    return Ok(SignupOutcome::Resent);
                }
            }

            send_verification(state, email, &fresh_token, &submission.preferred_lang).await;
            Ok(SignupOutcome::Resent)
        }
        None => {
            let new_signup = NewSignup {
                email: email.to_string(),
                preferred_lang,
                verification_token: token::generate(),
                token_expires_at: Utc::now() + token::token_ttl(),
            };

            let signup = state.signups.insert(&new_signup).await?;
            tracing::info!(signup_id = signup.id, lang = %signup.preferred_lang, "waitlist signup created");

            send_verification(state, email, &new_signup.verification_token, &submission.preferred_lang).await;
            Ok(SignupOutcome::Created)
        }
    }
}

/// Consumes a verification token. The row is only ever flipped once; the
/// welcome email is sent after the flip and its failure does not undo it.
pub async fn verify(state: &AppState, candidate: Option<&str>) -> VerifyOutcome {
    let Some(candidate) = candidate.filter(|t| t.chars().count() == token::TOKEN_LEN) else {
        return VerifyOutcome::InvalidLink;
    };

    let signup = match state.verifications.find_by_token(candidate).await {
        Ok(Some(signup)) => signup,
        Ok(None) => return VerifyOutcome::UnknownToken,
        Err(e) => {
            tracing::error!("Verification lookup failed: {}", e);
            return VerifyOutcome::UnknownToken;
        }
    };

    if signup.email_verified {
        return VerifyOutcome::AlreadyVerified;
    }

    if signup.token_expires_at.is_some_and(token::is_expired) {
        tracing::info!(signup_id = signup.id, "verification link expired");
        return VerifyOutcome::Expired;
    }

    match state.verifications.mark_verified(signup.id, Utc::now()).await {
        Ok(true) => {}
        Ok(false) => return VerifyOutcome::AlreadyVerified,
        Err(e) => {
            tracing::error!(signup_id = signup.id, "Failed to verify email: {}", e);
            return VerifyOutcome::Failed;
        }
    }
    tracing::info!(signup_id = signup.id, "waitlist signup verified");

    let lang = PreferredLanguage::from_stored(&signup.preferred_lang);
    let email = templates::welcome_email(&signup.email, lang.label());
    if let Err(e) = state.mailer.send(&email).await {
        tracing::error!(signup_id = signup.id, "Failed to send welcome email: {}", e);
    }

    VerifyOutcome::Verified
}

async fn send_verification(state: &AppState, to: &str, token: &str, lang: &PreferredLanguage) {
    let verify_url = state.config.verify_url(token);
    let email = templates::verification_email(to, verify_url.as_str(), lang.label());
    if let Err(e) = state.mailer.send(&email).await {
        tracing::error!("Failed to send verification email: {}", e);
    }
}
