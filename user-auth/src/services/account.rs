use chrono::Duration;
use std::sync::Arc;

use super::email::EmailProvider;
use super::error::AuthError;
use super::identity_store::IdentityStore;
use super::single_use::SingleUseTokenFlow;
use crate::config::LinkConfig;
use crate::models::{Identity, IdentityUpdate, NewIdentity, Role, TokenIssuer, UserStatus};
use crate::utils::{
    case_insensitive, email_is_valid, hash_password, verify_password, Password,
    PasswordHashString, PASSWORD_POLICY_DESCRIPTION,
};

pub const MIN_LINK_EXPIRATION_DAYS: i64 = 1;
pub const MAX_LINK_EXPIRATION_DAYS: i64 = 366;
pub const RESET_LINK_MINUTES: i64 = 60;

#[derive(Debug, Clone)]
pub struct Invitee {
    pub name: String,
    pub email: String,
}

/// One administrator request to invite several people at once.
#[derive(Debug, Clone)]
pub struct InviteBatch {
    pub users: Vec<Invitee>,
    pub link_expiration_days: i64,
    pub default_password: Password,
    pub role: Role,
    /// `{{name}}` and `{{email}}` are replaced per invitee.
    pub subject: String,
    pub body: String,
}

/// An invitee that was skipped, with the HTTP status describing why.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteFailure {
    pub status: u16,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct InviteOutcome {
    pub total: usize,
    pub failures: Vec<InviteFailure>,
}

impl InviteOutcome {
    pub fn invited(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn message(&self) -> String {
        format!(
            "{} of {} users invited successfully",
            self.invited(),
            self.total
        )
    }
}

/// Account flows built on single-use links: invites, password reset and
/// password change.
#[derive(Clone)]
pub struct AccountService {
    identities: Arc<dyn IdentityStore>,
    links: SingleUseTokenFlow,
    email: Arc<dyn EmailProvider>,
    urls: LinkConfig,
}

impl AccountService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        links: SingleUseTokenFlow,
        email: Arc<dyn EmailProvider>,
        urls: LinkConfig,
    ) -> Self {
        Self {
            identities,
            links,
            email,
            urls,
        }
    }

    /// Create `incomplete` accounts and mail each an invite link.
    ///
    /// Per-invitee problems are collected, not raised; only a malformed batch
    /// fails as a whole.
    pub async fn invite_users(
        &self,
        inviter: &Identity,
        batch: InviteBatch,
    ) -> Result<InviteOutcome, AuthError> {
        if batch.users.is_empty() {
            return Err(AuthError::Validation(
                "Must specify at least one user".to_string(),
            ));
        }
        if batch.link_expiration_days < MIN_LINK_EXPIRATION_DAYS {
            return Err(AuthError::Validation(
                "Link expiration must be at least 1 day".to_string(),
            ));
        }
        if batch.link_expiration_days > MAX_LINK_EXPIRATION_DAYS {
            return Err(AuthError::Validation(format!(
                "Link cannot stay active for more than a year ({} days)",
                MAX_LINK_EXPIRATION_DAYS
            )));
        }
        if !batch.default_password.meets_policy() {
            return Err(AuthError::Validation(PASSWORD_POLICY_DESCRIPTION.to_string()));
        }
        if batch.role == Role::Undefined {
            return Err(AuthError::Validation("A role must be assigned".to_string()));
        }
        if !inviter.role.is_some_and(|r| r.authorizes(batch.role)) {
            return Err(AuthError::InsufficientRole);
        }

        let hashed_password = hash_password(&batch.default_password)?.into_string();
        let window = Duration::days(batch.link_expiration_days);
        let mut failures = Vec::new();

        for invitee in &batch.users {
            let email = case_insensitive(&invitee.email);
            match self
                .invite_one(invitee, &email, &hashed_password, window, &batch)
                .await
            {
                Ok(()) => {}
                Err(status) => failures.push(InviteFailure { status, email }),
            }
        }

        let outcome = InviteOutcome {
            total: batch.users.len(),
            failures,
        };
        tracing::info!(
            inviter_id = inviter.id,
            invited = outcome.invited(),
            total = outcome.total,
            "Invite batch processed"
        );
        Ok(outcome)
    }

    async fn invite_one(
        &self,
        invitee: &Invitee,
        email: &str,
        hashed_password: &str,
        window: Duration,
        batch: &InviteBatch,
    ) -> Result<(), u16> {
        if !email_is_valid(email) {
            return Err(400);
        }

        match self.identities.find_by_email(email).await {
            Ok(None) => {}
            Ok(Some(_)) => return Err(409),
            Err(e) => {
                tracing::error!(error = %e, "Invitee lookup failed");
                return Err(500);
            }
        }

        let created = self
            .identities
            .create_identity(NewIdentity {
                name: invitee.name.clone(),
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
                status: UserStatus::Incomplete,
                role: batch.role,
            })
            .await;
        let created = match created {
            Ok(identity) => identity,
            Err(AuthError::UserAlreadyExists) => return Err(409),
            Err(e) => {
                tracing::error!(error = %e, "Invitee creation failed");
                return Err(500);
            }
        };

        let issued = match self.links.issue(email, TokenIssuer::EmailInvite, window).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(error = %e, "Invite token issue failed");
                self.discard_invitee(created.id).await;
                return Err(500);
            }
        };

        let subject = fill_template(&batch.subject, &invitee.name, email);
        let body = invite_email_body(
            &fill_template(&batch.body, &invitee.name, email),
            &format!(
                "{}?t={}&origin=emailInvite",
                self.urls.reset_password_url(),
                issued.token
            ),
        );

        if let Err(e) = self.email.send(email, &subject, &body).await {
            tracing::warn!(error = %e, "Invite email not delivered; withdrawing invite");
            if let Err(e) = self.links.revoke(issued.record_id).await {
                tracing::error!(error = %e, record_id = issued.record_id, "Failed to withdraw invite link");
            }
            self.discard_invitee(created.id).await;
            return Err(503);
        }

        Ok(())
    }

    /// Drop an account whose invite never went out, so the address can be invited again.
    async fn discard_invitee(&self, user_id: i64) {
        match self.identities.delete_identity(user_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(user_id, "Uninvited identity already gone"),
            Err(e) => tracing::error!(error = %e, user_id, "Failed to remove uninvited identity"),
        }
    }

    /// Finish an invite: set name and password and enable the account.
    pub async fn complete_invite(
        &self,
        token: &str,
        email: &str,
        name: &str,
        password: &Password,
    ) -> Result<i64, AuthError> {
        let email = case_insensitive(email);
        let identity = self
            .identities
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let redemption = self
            .links
            .redeem(token, &email, TokenIssuer::EmailInvite)
            .await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name must be provided".to_string()));
        }
        if !password.meets_policy() {
            return Err(AuthError::Validation(PASSWORD_POLICY_DESCRIPTION.to_string()));
        }

        let update = IdentityUpdate {
            name: Some(name.to_string()),
            hashed_password: Some(hash_password(password)?.into_string()),
            status: Some(UserStatus::Enabled),
        };
        if !self.identities.update_fields(identity.id, update).await? {
            return Err(AuthError::UserNotFound);
        }

        self.links.consume(redemption).await?;
        tracing::info!(user_id = identity.id, "Invite completed");
        Ok(identity.id)
    }

    /// Mail a one-hour reset link and park the account as `incomplete`.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = case_insensitive(email);
        if !email_is_valid(&email) {
            return Err(AuthError::Validation(
                "Email must be a valid email address".to_string(),
            ));
        }

        let identity = self
            .identities
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if identity.status == UserStatus::Disabled {
            return Err(AuthError::AccountDisabled);
        }

        let previous_status = identity.status;
        if !self
            .identities
            .update_fields(identity.id, IdentityUpdate::status(UserStatus::Incomplete))
            .await?
        {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "Could not reset user password"
            )));
        }

        let issued = self
            .links
            .issue(
                &email,
                TokenIssuer::ForgotPassword,
                Duration::minutes(RESET_LINK_MINUTES),
            )
            .await?;

        let link = format!(
            "{}?e={}&t={}",
            self.urls.reset_password_url(),
            email,
            issued.token
        );
        let body = format!(
            "<p>Click the following link to reset your password: <a href=\"{link}\">{link}</a>.</p>\
             <p>It will expire in 1 hour.</p>"
        );

        if let Err(e) = self.email.send(&email, "Password Reset", &body).await {
            if let Err(revoke) = self.links.revoke(issued.record_id).await {
                tracing::error!(error = %revoke, record_id = issued.record_id, "Failed to withdraw reset link");
            }
            match self
                .identities
                .update_fields(identity.id, IdentityUpdate::status(previous_status))
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::error!(user_id = identity.id, "Account vanished before status restore"),
                Err(restore) => {
                    tracing::error!(error = %restore, user_id = identity.id, "Failed to restore account status")
                }
            }
            return Err(e.into());
        }

        tracing::info!(user_id = identity.id, "Password reset link sent");
        Ok(())
    }

    /// Redeem a reset link and set a new password.
    pub async fn reset_password(
        &self,
        token: &str,
        email: &str,
        new_password: &Password,
    ) -> Result<(), AuthError> {
        let email = case_insensitive(email);
        if !email_is_valid(&email) {
            return Err(AuthError::Validation(
                "Email must be a valid email address".to_string(),
            ));
        }

        let identity = self
            .identities
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let redemption = self
            .links
            .redeem(token, &email, TokenIssuer::ForgotPassword)
            .await?;

        if !new_password.meets_policy() {
            return Err(AuthError::Validation(PASSWORD_POLICY_DESCRIPTION.to_string()));
        }

        let update = IdentityUpdate {
            hashed_password: Some(hash_password(new_password)?.into_string()),
            status: Some(UserStatus::Enabled),
            ..Default::default()
        };
        if !self.identities.update_fields(identity.id, update).await? {
            return Err(AuthError::UserNotFound);
        }

        self.links.consume(redemption).await?;
        tracing::info!(user_id = identity.id, "Password reset");
        Ok(())
    }

    /// Change the caller's own password.
    pub async fn change_password(
        &self,
        identity: &Identity,
        old_password: &Password,
        new_password: &Password,
    ) -> Result<(), AuthError> {
        if old_password.as_str() == new_password.as_str() {
            return Err(AuthError::Validation(
                "New password must be different from the old password".to_string(),
            ));
        }
        if !new_password.meets_policy() {
            return Err(AuthError::Validation(PASSWORD_POLICY_DESCRIPTION.to_string()));
        }

        let stored = PasswordHashString::new(identity.hashed_password.clone());
        if !verify_password(old_password, &stored) {
            return Err(AuthError::IncorrectPassword);
        }

        let update = IdentityUpdate {
            hashed_password: Some(hash_password(new_password)?.into_string()),
            ..Default::default()
        };
        if !self.identities.update_fields(identity.id, update).await? {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "Could not change user password"
            )));
        }

        tracing::info!(user_id = identity.id, "Password changed");
        Ok(())
    }
}

fn fill_template(template: &str, name: &str, email: &str) -> String {
    template
        .replace("{{name}}", name)
        .replace("{{email}}", email)
}

fn invite_email_body(message: &str, link: &str) -> String {
    format!(
        r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <p>{}</p>
        <p>
            <a href="{}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                Create your account
            </a>
        </p>
    </body>
</html>"#,
        message.replace('\n', "<br>"),
        link
    )
}
