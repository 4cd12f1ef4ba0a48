//! Accounts: registration, login, email verification, password reset and
//! profile changes.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::validation::{
    MIN_PASSWORD_LEN, is_valid_account_number, is_valid_email, normalize_email,
};
use crate::domain::{FieldErrors, Role, TokenPurpose, UserId};
use crate::error::AppError;
use crate::mail::{Mailer, send_best_effort, templates};
use crate::persistence::Repository;
use crate::persistence::models::{BankAccount, NewUser, User, VerificationToken};

/// Lifetime of an email verification link, in hours.
pub const VERIFICATION_TTL_HOURS: i64 = 24;
/// Lifetime of a password reset link, in hours.
pub const RESET_TTL_HOURS: i64 = 1;

const INVALID_CREDENTIALS: &str = "invalid email or password";
const INVALID_TOKEN: &str = "invalid or expired token";

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: UserId,
    /// Role at issue time. Informational; requests re-read the role.
    pub role: Role,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User id.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Current role.
    pub role: Role,
    /// Whether the email address is confirmed.
    pub email_verified: bool,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            email_verified: user.is_verified(),
        }
    }
}

impl AuthUser {
    /// Fails unless the caller may run events.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for plain users.
    pub fn require_organizer(&self) -> Result<(), AppError> {
        if self.role.can_organize() {
            Ok(())
        } else {
            Err(AppError::Forbidden("organizer account required".into()))
        }
    }

    /// Fails unless the caller is an administrator.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] for non-admins.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator access required".into()))
        }
    }

    /// `true` if the caller owns the resource or is an administrator.
    #[must_use]
    pub fn can_manage(&self, owner: UserId) -> bool {
        self.id == owner || self.role.is_admin()
    }
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct Session {
    /// Signed JWT.
    pub access_token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
    /// The logged-in user.
    pub user: User,
}

/// Settings for [`AuthService`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// HMAC secret for access tokens.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub jwt_ttl: Duration,
    /// Public web client URL for email links.
    pub app_base_url: String,
    /// Emails that register as administrators.
    pub admin_emails: Vec<String>,
}

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtKeys(..)")
    }
}

/// Account and session management.
#[derive(Debug)]
pub struct AuthService {
    repo: Arc<dyn Repository>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    jwt_ttl: Duration,
    app_base_url: String,
    admin_emails: Vec<String>,
}

impl AuthService {
    /// Creates the service.
    #[must_use]
    pub fn new(repo: Arc<dyn Repository>, mailer: Arc<dyn Mailer>, settings: AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        Self {
            repo,
            mailer,
            keys: JwtKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            },
            jwt_ttl: settings.jwt_ttl,
            app_base_url: settings.app_base_url,
            admin_emails: settings.admin_emails,
        }
    }

    /// Creates an account and emails a verification link.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidFields`] for bad input, [`AppError::Conflict`] if
    /// the email is taken.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);
        let name = name.trim();

        let mut errors = FieldErrors::new();
        if !is_valid_email(&email) {
            errors.add("email", "a valid email address is required");
        }
        if name.is_empty() {
            errors.add("name", "name is required");
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let role = if self.admin_emails.iter().any(|a| *a == email) {
            Role::Admin
        } else {
            Role::User
        };
        let user = self
            .repo
            .create_user(NewUser {
                email,
                name: name.to_string(),
                password_hash: hash_password(password.to_string()).await?,
                role,
            })
            .await?;
        tracing::info!(user_id = %user.id, %role, "user registered");

        self.send_verification(&user).await?;
        Ok(user)
    }

    /// Checks credentials and issues an access token.
    ///
    /// # Errors
    ///
    /// [`AppError::Unauthorized`] with the same message for an unknown email
    /// and a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = normalize_email(email);
        let user = self
            .repo
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "login with wrong password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        let access_token = self.issue_token(&user)?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Session {
            access_token,
            expires_in: self.jwt_ttl.as_secs(),
            user,
        })
    }

    /// Signs an access token for `user`.
    ///
    /// # Errors
    ///
    /// [`AppError::Internal`] if signing fails.
    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.jwt_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now,
            exp: now.saturating_add(ttl),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    /// Resolves a bearer token to the current user. The role comes from
    /// storage, not from the token.
    ///
    /// # Errors
    ///
    /// [`AppError::Unauthorized`] for invalid or expired tokens and deleted
    /// users.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.keys.decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| AppError::Unauthorized(format!("invalid access token: {e}")))?;

        let user = self
            .repo
            .find_user(data.claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;
        Ok(AuthUser::from(&user))
    }

    /// Consumes a verification token and marks the email verified.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidRequest`] for unknown or expired tokens.
    pub async fn verify_email(&self, token: &str) -> Result<User, AppError> {
        let user = self.consume_token(TokenPurpose::EmailVerification, token).await?;
        self.repo.mark_email_verified(user.id, Utc::now()).await?;
        tracing::info!(user_id = %user.id, "email verified");
        self.repo
            .find_user(user.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", user.id)))
    }

    /// Sends a fresh verification link if the account exists and is not yet
    /// verified. Succeeds either way.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        match self.repo.find_user_by_email(&email).await? {
            Some(user) if !user.is_verified() => self.send_verification(&user).await,
            _ => Ok(()),
        }
    }

    /// Emails a password reset link if the account exists. Succeeds either
    /// way.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };
        let token = self
            .store_token(&user.email, TokenPurpose::PasswordReset, RESET_TTL_HOURS)
            .await?;
        let link = format!("{}/reset-password?token={token}", self.app_base_url);
        send_best_effort(
            self.mailer.as_ref(),
            templates::password_reset(&user.email, &user.name, &link),
        )
        .await;
        Ok(())
    }

    /// Consumes a reset token and replaces the password.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidFields`] for a short password,
    /// [`AppError::InvalidRequest`] for unknown or expired tokens.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AppError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            let mut errors = FieldErrors::new();
            errors.add(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            );
            return Err(errors.into());
        }
        let user = self.consume_token(TokenPurpose::PasswordReset, token).await?;
        let hash = hash_password(password.to_string()).await?;
        self.repo.update_password(user.id, &hash).await?;
        self.repo.mark_email_verified(user.id, Utc::now()).await?;
        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Loads the caller's account.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the account was deleted.
    pub async fn profile(&self, caller: &AuthUser) -> Result<User, AppError> {
        self.repo
            .find_user(caller.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", caller.id)))
    }

    /// Changes the display name.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidFields`] for an empty name.
    pub async fn update_name(&self, caller: &AuthUser, name: &str) -> Result<User, AppError> {
        let name = name.trim();
        if name.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("name", "name is required");
            return Err(errors.into());
        }
        self.repo.update_user_name(caller.id, name).await
    }

    /// Upgrades the caller to organizer and records payout bank details.
    /// Administrators keep their role.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`] if the email is unverified,
    /// [`AppError::InvalidFields`] for incomplete bank details.
    pub async fn become_organizer(
        &self,
        caller: &AuthUser,
        bank: BankAccount,
    ) -> Result<User, AppError> {
        if !caller.email_verified {
            return Err(AppError::Forbidden(
                "verify your email address before becoming an organizer".into(),
            ));
        }

        let bank = BankAccount {
            bank_name: bank.bank_name.trim().to_string(),
            account_number: bank.account_number.trim().to_string(),
            account_name: bank.account_name.trim().to_string(),
        };
        let mut errors = FieldErrors::new();
        if bank.bank_name.is_empty() {
            errors.add("bank_name", "bank name is required");
        }
        if !is_valid_account_number(&bank.account_number) {
            errors.add("account_number", "account number must be 10 digits");
        }
        if bank.account_name.is_empty() {
            errors.add("account_name", "account name is required");
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let role = if caller.role.is_admin() {
            Role::Admin
        } else {
            Role::Organizer
        };
        let user = self
            .repo
            .update_organizer_profile(caller.id, role, &bank)
            .await?;
        tracing::info!(user_id = %user.id, "organizer profile saved");
        Ok(user)
    }

    async fn send_verification(&self, user: &User) -> Result<(), AppError> {
        let token = self
            .store_token(&user.email, TokenPurpose::EmailVerification, VERIFICATION_TTL_HOURS)
            .await?;
        let link = format!("{}/verify-email?token={token}", self.app_base_url);
        send_best_effort(
            self.mailer.as_ref(),
            templates::email_verification(&user.email, &user.name, &link),
        )
        .await;
        Ok(())
    }

    async fn store_token(
        &self,
        identifier: &str,
        purpose: TokenPurpose,
        ttl_hours: i64,
    ) -> Result<String, AppError> {
        let token = random_token();
        self.repo
            .replace_token(VerificationToken {
                identifier: identifier.to_string(),
                token_hash: hash_token(&token),
                purpose,
                expires_at: Utc::now() + chrono::Duration::hours(ttl_hours),
            })
            .await?;
        Ok(token)
    }

    async fn consume_token(&self, purpose: TokenPurpose, token: &str) -> Result<User, AppError> {
        let stored = self
            .repo
            .take_token(purpose, &hash_token(token.trim()))
            .await?
            .ok_or_else(|| AppError::InvalidRequest(INVALID_TOKEN.into()))?;
        if stored.expires_at < Utc::now() {
            return Err(AppError::InvalidRequest(INVALID_TOKEN.into()));
        }
        self.repo
            .find_user_by_email(&stored.identifier)
            .await?
            .ok_or_else(|| AppError::InvalidRequest(INVALID_TOKEN.into()))
    }
}

/// 32 random bytes, base64url.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of a one-time token, base64url. Only hashes are stored.
fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| AppError::Internal(format!("stored hash is invalid: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::test_support::{Harness, token_from};

    #[tokio::test]
    async fn register_validates_every_field() {
        let h = Harness::new();
        let result = h.auth.register("nope", "  ", "short").await;
        let Err(AppError::InvalidFields(fields)) = result else {
            panic!("expected field errors");
        };
        assert!(fields.get("email").is_some());
        assert!(fields.get("name").is_some());
        assert!(fields.get("password").is_some());
    }

    #[tokio::test]
    async fn register_normalizes_email_and_rejects_duplicates() {
        let h = Harness::new();
        let Ok(user) = h.auth.register(" Ada@Example.COM ", "Ada", "password123").await else {
            panic!("register failed");
        };
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::User);
        assert!(!user.is_verified());

        let dup = h.auth.register("ada@example.com", "Ada", "password123").await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn admin_emails_register_as_admin() {
        let h = Harness::new();
        let Ok(user) = h.auth.register("root@example.com", "Root", "password123").await else {
            panic!("register failed");
        };
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn login_and_authenticate() {
        let h = Harness::new();
        assert!(h.auth.register("ada@example.com", "Ada", "password123").await.is_ok());

        let wrong = h.auth.login("ada@example.com", "password124").await;
        let unknown = h.auth.login("bob@example.com", "password123").await;
        let (Err(AppError::Unauthorized(a)), Err(AppError::Unauthorized(b))) = (wrong, unknown)
        else {
            panic!("expected unauthorized");
        };
        assert_eq!(a, b);

        let Ok(session) = h.auth.login("ADA@example.com", "password123").await else {
            panic!("login failed");
        };
        let Ok(caller) = h.auth.authenticate(&session.access_token).await else {
            panic!("token rejected");
        };
        assert_eq!(caller.id, session.user.id);
        assert!(matches!(
            h.auth.authenticate("garbage").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn verification_token_is_single_use() {
        let h = Harness::new();
        assert!(h.auth.register("ada@example.com", "Ada", "password123").await.is_ok());
        let mails = h.mailer.sent_to("ada@example.com").await;
        let Some(token) = mails.first().and_then(|m| token_from(&m.html)) else {
            panic!("verification email missing");
        };

        let Ok(user) = h.auth.verify_email(&token).await else {
            panic!("verification failed");
        };
        assert!(user.is_verified());
        assert!(matches!(
            h.auth.verify_email(&token).await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn reset_password_flow() {
        let h = Harness::new();
        assert!(h.auth.register("ada@example.com", "Ada", "password123").await.is_ok());
        assert!(h.auth.forgot_password("ada@example.com").await.is_ok());
        assert!(h.auth.forgot_password("ghost@example.com").await.is_ok());

        let mails = h.mailer.sent_to("ada@example.com").await;
        let Some(token) = mails.last().and_then(|m| token_from(&m.html)) else {
            panic!("reset email missing");
        };
        assert!(h.auth.reset_password(&token, "brand-new-pass").await.is_ok());
        assert!(h.auth.login("ada@example.com", "password123").await.is_err());
        assert!(h.auth.login("ada@example.com", "brand-new-pass").await.is_ok());
    }

    #[tokio::test]
    async fn organizer_upgrade_requires_verified_email() {
        let h = Harness::new();
        let Ok(user) = h.auth.register("ada@example.com", "Ada", "password123").await else {
            panic!("register failed");
        };
        let caller = AuthUser::from(&user);
        let bank = BankAccount {
            bank_name: "GTBank".into(),
            account_number: "0123456789".into(),
            account_name: "Ada Obi".into(),
        };
        assert!(matches!(
            h.auth.become_organizer(&caller, bank.clone()).await,
            Err(AppError::Forbidden(_))
        ));

        let verified = AuthUser {
            email_verified: true,
            ..caller
        };
        let bad = BankAccount {
            account_number: "12345".into(),
            ..bank.clone()
        };
        let Err(AppError::InvalidFields(fields)) = h.auth.become_organizer(&verified, bad).await
        else {
            panic!("expected field errors");
        };
        assert!(fields.get("account_number").is_some());

        let Ok(upgraded) = h.auth.become_organizer(&verified, bank).await else {
            panic!("upgrade failed");
        };
        assert_eq!(upgraded.role, Role::Organizer);
        assert!(upgraded.bank_account().is_some());
    }

    #[test]
    fn token_hash_is_stable_and_opaque() {
        let token = random_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_ne!(random_token(), token);
    }
}
