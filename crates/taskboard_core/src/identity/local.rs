//! In-process identity provider.
//!
//! # Responsibility
//! - Implement the provider SPI without a network dependency, for local
//!   deployments, the CLI and tests.
//! - Enforce the same account rules a hosted provider applies (duplicate
//!   email, weak password, lockout, recent-login for sensitive operations).
//!
//! # Invariants
//! - Passwords are stored only as salted SHA-256 digests.
//! - Emails are unique across accounts, compared case-insensitively.
//! - A popup sign-in consumes the account staged for that provider.

use super::{codes, IdentityProvider, OAuthProvider, ProviderError, ProviderResult, ProviderUser};
use crate::model::profile::AuthProvider;
use crate::validation::rules::{is_valid_email, is_valid_password};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_RECENT_LOGIN_MINUTES: i64 = 5;
const DEFAULT_LOCKOUT_MINUTES: i64 = 5;

/// Identity returned by a staged OAuth popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedAccount {
    /// Provider-side subject id.
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone)]
struct PasswordDigest {
    salt: String,
    digest: String,
}

impl PasswordDigest {
    fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = hash_password(&salt, password);
        Self { salt, digest }
    }

    fn matches(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.digest
    }
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    provider: AuthProvider,
    password: Option<PasswordDigest>,
    federated_subject: Option<String>,
    disabled: bool,
}

impl Account {
    fn to_user(&self) -> ProviderUser {
        ProviderUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider: self.provider,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailedAttempts {
    count: u32,
    last_failure: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Session {
    uid: String,
    authenticated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<String, Account>,
    session: Option<Session>,
    failed_attempts: BTreeMap<String, FailedAttempts>,
    staged_popups: BTreeMap<OAuthProvider, FederatedAccount>,
    reset_outbox: Vec<String>,
}

impl State {
    fn uid_by_email(&self, email: &str) -> Option<String> {
        self.accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .map(|account| account.uid.clone())
    }

    fn start_session(&mut self, uid: &str) {
        self.session = Some(Session {
            uid: uid.to_string(),
            authenticated_at: Utc::now(),
        });
    }

    fn current_account(&self) -> ProviderResult<&Account> {
        self.session
            .as_ref()
            .and_then(|session| self.accounts.get(&session.uid))
            .ok_or_else(no_current_user)
    }

    fn current_account_mut(&mut self) -> ProviderResult<&mut Account> {
        let uid = self
            .session
            .as_ref()
            .map(|session| session.uid.clone())
            .ok_or_else(no_current_user)?;
        self.accounts.get_mut(&uid).ok_or_else(no_current_user)
    }
}

/// Thread-safe in-memory identity provider.
pub struct LocalIdentityProvider {
    state: Mutex<State>,
    max_failed_attempts: u32,
    recent_login_window: Duration,
    lockout_window: Duration,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            recent_login_window: Duration::minutes(DEFAULT_RECENT_LOGIN_MINUTES),
            lockout_window: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        }
    }

    /// Consecutive failed sign-ins per email before `too-many-requests`.
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    /// How long a sign-in counts as recent for sensitive operations.
    pub fn with_recent_login_window(mut self, window: Duration) -> Self {
        self.recent_login_window = window;
        self
    }

    /// How long a locked email stays locked after its last failed sign-in.
    pub fn with_lockout_window(mut self, window: Duration) -> Self {
        self.lockout_window = window;
        self
    }

    /// Stages the account the next popup for `provider` will return.
    pub fn stage_popup_account(&self, provider: OAuthProvider, account: FederatedAccount) {
        self.state.lock().staged_popups.insert(provider, account);
    }

    /// Enables or disables the account registered under `email`.
    pub fn set_disabled(&self, email: &str, disabled: bool) -> ProviderResult<()> {
        let mut state = self.state.lock();
        let uid = state.uid_by_email(email).ok_or_else(user_not_found)?;
        if let Some(account) = state.accounts.get_mut(&uid) {
            account.disabled = disabled;
        }
        if disabled && state.session.as_ref().is_some_and(|s| s.uid == uid) {
            state.session = None;
        }
        Ok(())
    }

    /// Emails that password-reset messages were sent to, oldest first.
    pub fn password_reset_outbox(&self) -> Vec<String> {
        self.state.lock().reset_outbox.clone()
    }

    fn require_recent_login(&self, state: &State) -> ProviderResult<()> {
        let session = state.session.as_ref().ok_or_else(no_current_user)?;
        if Utc::now() - session.authenticated_at >= self.recent_login_window {
            return Err(ProviderError::new(
                codes::REQUIRES_RECENT_LOGIN,
                "This operation is sensitive and requires recent authentication.",
            ));
        }
        Ok(())
    }

    /// Drops an expired lock and reports whether `key` is still locked.
    fn is_locked_out(&self, state: &mut State, key: &str) -> bool {
        let Some(attempts) = state.failed_attempts.get(key).copied() else {
            return false;
        };
        if attempts.count < self.max_failed_attempts {
            return false;
        }
        if Utc::now() - attempts.last_failure >= self.lockout_window {
            state.failed_attempts.remove(key);
            return false;
        }
        true
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn create_user_with_email(&self, email: &str, password: &str) -> ProviderResult<ProviderUser> {
        ensure_valid_email(email)?;
        if !is_valid_password(password) {
            return Err(ProviderError::new(
                codes::WEAK_PASSWORD,
                "Password should be at least 6 characters.",
            ));
        }

        let mut state = self.state.lock();
        if state.uid_by_email(email).is_some() {
            return Err(ProviderError::new(
                codes::EMAIL_ALREADY_IN_USE,
                "The email address is already in use by another account.",
            ));
        }

        let account = Account {
            uid: new_uid(),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
            provider: AuthProvider::Email,
            password: Some(PasswordDigest::new(password)),
            federated_subject: None,
            disabled: false,
        };
        let user = account.to_user();
        state.accounts.insert(account.uid.clone(), account);
        state.start_session(&user.uid);

        info!(
            "event=identity_create module=identity status=ok provider=email uid={}",
            user.uid
        );
        Ok(user)
    }

    fn sign_in_with_email(&self, email: &str, password: &str) -> ProviderResult<ProviderUser> {
        ensure_valid_email(email)?;
        let key = email.to_ascii_lowercase();

        let mut state = self.state.lock();
        if self.is_locked_out(&mut state, &key) {
            warn!("event=identity_sign_in module=identity status=error error_code=too_many_requests");
            return Err(ProviderError::new(
                codes::TOO_MANY_REQUESTS,
                "Access to this account has been temporarily disabled due to many failed login attempts.",
            ));
        }

        let uid = state.uid_by_email(email).ok_or_else(user_not_found)?;
        let account = state.accounts.get(&uid).ok_or_else(user_not_found)?;
        if account.disabled {
            return Err(user_disabled());
        }
        let password_ok = account
            .password
            .as_ref()
            .is_some_and(|digest| digest.matches(password));
        if !password_ok {
            let now = Utc::now();
            let attempts = state.failed_attempts.entry(key).or_insert(FailedAttempts {
                count: 0,
                last_failure: now,
            });
            attempts.count += 1;
            attempts.last_failure = now;
            return Err(ProviderError::new(
                codes::WRONG_PASSWORD,
                "The password is invalid or the user does not have a password.",
            ));
        }

        let user = account.to_user();
        state.failed_attempts.remove(&key);
        state.start_session(&uid);
        info!(
            "event=identity_sign_in module=identity status=ok provider=email uid={}",
            uid
        );
        Ok(user)
    }

    fn sign_in_with_popup(&self, provider: OAuthProvider) -> ProviderResult<ProviderUser> {
        let mut state = self.state.lock();
        let federated = state.staged_popups.remove(&provider).ok_or_else(|| {
            ProviderError::new(
                codes::POPUP_CLOSED_BY_USER,
                "The popup has been closed by the user before finalizing the operation.",
            )
        })?;
        let kind = provider.auth_provider();

        let existing = state
            .accounts
            .values()
            .find(|account| {
                account.provider == kind
                    && account.federated_subject.as_deref() == Some(federated.subject.as_str())
            })
            .map(|account| account.uid.clone());

        let uid = match existing {
            Some(uid) => {
                if state.accounts.get(&uid).is_some_and(|account| account.disabled) {
                    return Err(user_disabled());
                }
                uid
            }
            None => {
                if state.uid_by_email(&federated.email).is_some() {
                    return Err(ProviderError::new(
                        codes::ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL,
                        "An account already exists with the same email address.",
                    ));
                }
                let account = Account {
                    uid: new_uid(),
                    email: federated.email,
                    display_name: federated.display_name,
                    photo_url: federated.photo_url,
                    provider: kind,
                    password: None,
                    federated_subject: Some(federated.subject),
                    disabled: false,
                };
                let uid = account.uid.clone();
                state.accounts.insert(uid.clone(), account);
                uid
            }
        };

        state.start_session(&uid);
        let user = state.current_account()?.to_user();
        info!(
            "event=identity_sign_in module=identity status=ok provider={} uid={}",
            kind, uid
        );
        Ok(user)
    }

    fn sign_out(&self) -> ProviderResult<()> {
        self.state.lock().session = None;
        Ok(())
    }

    fn current_user(&self) -> Option<ProviderUser> {
        self.state
            .lock()
            .current_account()
            .ok()
            .map(Account::to_user)
    }

    fn send_password_reset_email(&self, email: &str) -> ProviderResult<()> {
        ensure_valid_email(email)?;
        let mut state = self.state.lock();
        state.uid_by_email(email).ok_or_else(user_not_found)?;
        state.failed_attempts.remove(&email.to_ascii_lowercase());
        state.reset_outbox.push(email.to_string());
        Ok(())
    }

    fn update_profile(
        &self,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ProviderResult<ProviderUser> {
        let mut state = self.state.lock();
        let account = state.current_account_mut()?;
        if let Some(name) = display_name {
            account.display_name = Some(name.to_string());
        }
        if let Some(url) = photo_url {
            account.photo_url = Some(url.to_string()).filter(|value| !value.is_empty());
        }
        Ok(account.to_user())
    }

    fn update_email(&self, email: &str) -> ProviderResult<ProviderUser> {
        ensure_valid_email(email)?;
        let mut state = self.state.lock();
        self.require_recent_login(&state)?;

        let current_uid = state.current_account()?.uid.clone();
        if state
            .uid_by_email(email)
            .is_some_and(|uid| uid != current_uid)
        {
            return Err(ProviderError::new(
                codes::EMAIL_ALREADY_IN_USE,
                "The email address is already in use by another account.",
            ));
        }
        let account = state.current_account_mut()?;
        account.email = email.to_string();
        Ok(account.to_user())
    }

    fn update_password(&self, password: &str) -> ProviderResult<()> {
        if !is_valid_password(password) {
            return Err(ProviderError::new(
                codes::WEAK_PASSWORD,
                "Password should be at least 6 characters.",
            ));
        }
        let mut state = self.state.lock();
        self.require_recent_login(&state)?;
        let account = state.current_account_mut()?;
        account.password = Some(PasswordDigest::new(password));
        let key = account.email.to_ascii_lowercase();
        state.failed_attempts.remove(&key);
        Ok(())
    }

    fn reauthenticate(&self, password: &str) -> ProviderResult<ProviderUser> {
        let mut state = self.state.lock();
        let account = state.current_account()?;
        let Some(digest) = account.password.as_ref() else {
            return Err(ProviderError::new(
                codes::OPERATION_NOT_ALLOWED,
                "Password credentials are not enabled for this account.",
            ));
        };
        if !digest.matches(password) {
            return Err(ProviderError::new(
                codes::WRONG_PASSWORD,
                "The password is invalid or the user does not have a password.",
            ));
        }
        let user = account.to_user();
        state.start_session(&user.uid);
        Ok(user)
    }

    fn delete_current_user(&self) -> ProviderResult<()> {
        let mut state = self.state.lock();
        self.require_recent_login(&state)?;
        let uid = state.current_account()?.uid.clone();
        state.accounts.remove(&uid);
        state.session = None;
        info!(
            "event=identity_delete module=identity status=ok uid={}",
            uid
        );
        Ok(())
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

fn ensure_valid_email(email: &str) -> ProviderResult<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ProviderError::new(
            codes::INVALID_EMAIL,
            "The email address is badly formatted.",
        ))
    }
}

fn no_current_user() -> ProviderError {
    ProviderError::new(codes::NO_CURRENT_USER, "No user logged in")
}

fn user_not_found() -> ProviderError {
    ProviderError::new(
        codes::USER_NOT_FOUND,
        "There is no user record corresponding to this identifier.",
    )
}

fn user_disabled() -> ProviderError {
    ProviderError::new(
        codes::USER_DISABLED,
        "The user account has been disabled by an administrator.",
    )
}

#[cfg(test)]
mod tests {
    use super::{FederatedAccount, LocalIdentityProvider};
    use crate::identity::{codes, IdentityProvider, OAuthProvider};
    use chrono::Duration;

    fn octocat() -> FederatedAccount {
        FederatedAccount {
            subject: "gh-1".to_string(),
            email: "octo@example.com".to_string(),
            display_name: None,
            photo_url: None,
        }
    }

    #[test]
    fn sign_up_signs_in_and_rejects_duplicates() {
        let provider = LocalIdentityProvider::new();
        let user = provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");
        assert_eq!(provider.current_user().map(|u| u.uid), Some(user.uid));

        let err = provider
            .create_user_with_email("ADA@example.com", "secret1")
            .expect_err("duplicate email");
        assert_eq!(err.code, codes::EMAIL_ALREADY_IN_USE);
    }

    #[test]
    fn lockout_after_repeated_failures() {
        let provider = LocalIdentityProvider::new().with_max_failed_attempts(2);
        provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");

        for _ in 0..2 {
            let err = provider
                .sign_in_with_email("ada@example.com", "nope")
                .expect_err("wrong password");
            assert_eq!(err.code, codes::WRONG_PASSWORD);
        }
        let err = provider
            .sign_in_with_email("ada@example.com", "secret1")
            .expect_err("locked");
        assert_eq!(err.code, codes::TOO_MANY_REQUESTS);
    }

    #[test]
    fn lockout_lifts_after_window() {
        let provider = LocalIdentityProvider::new()
            .with_max_failed_attempts(1)
            .with_lockout_window(Duration::zero());
        provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");

        provider
            .sign_in_with_email("ada@example.com", "nope")
            .expect_err("wrong password");
        provider
            .sign_in_with_email("ada@example.com", "secret1")
            .expect("lock expired");
    }

    #[test]
    fn password_reset_clears_lockout() {
        let provider = LocalIdentityProvider::new().with_max_failed_attempts(1);
        provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");
        provider
            .sign_in_with_email("ada@example.com", "nope")
            .expect_err("wrong password");
        let err = provider
            .sign_in_with_email("ada@example.com", "secret1")
            .expect_err("locked");
        assert_eq!(err.code, codes::TOO_MANY_REQUESTS);

        provider
            .send_password_reset_email("ADA@example.com")
            .expect("reset");
        provider
            .sign_in_with_email("ada@example.com", "secret1")
            .expect("unlocked");
    }

    #[test]
    fn popup_without_staged_account_is_closed_by_user() {
        let provider = LocalIdentityProvider::new();
        let err = provider
            .sign_in_with_popup(OAuthProvider::Google)
            .expect_err("nothing staged");
        assert_eq!(err.code, codes::POPUP_CLOSED_BY_USER);
    }

    #[test]
    fn popup_reuses_account_for_same_subject() {
        let provider = LocalIdentityProvider::new();
        provider.stage_popup_account(OAuthProvider::Github, octocat());
        let first = provider
            .sign_in_with_popup(OAuthProvider::Github)
            .expect("first popup");

        provider.stage_popup_account(OAuthProvider::Github, octocat());
        let second = provider
            .sign_in_with_popup(OAuthProvider::Github)
            .expect("second popup");
        assert_eq!(first.uid, second.uid);
    }

    #[test]
    fn popup_with_email_of_other_provider_conflicts() {
        let provider = LocalIdentityProvider::new();
        provider
            .create_user_with_email("octo@example.com", "secret1")
            .expect("create");
        provider.stage_popup_account(OAuthProvider::Github, octocat());
        let err = provider
            .sign_in_with_popup(OAuthProvider::Github)
            .expect_err("conflict");
        assert_eq!(err.code, codes::ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL);
    }

    #[test]
    fn sensitive_operations_require_recent_login() {
        let provider = LocalIdentityProvider::new().with_recent_login_window(Duration::zero());
        provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");
        let err = provider
            .update_password("another1")
            .expect_err("stale session");
        assert_eq!(err.code, codes::REQUIRES_RECENT_LOGIN);
    }

    #[test]
    fn disabled_account_cannot_sign_in() {
        let provider = LocalIdentityProvider::new();
        provider
            .create_user_with_email("ada@example.com", "secret1")
            .expect("create");
        provider
            .set_disabled("ada@example.com", true)
            .expect("disable");
        assert!(provider.current_user().is_none());
        let err = provider
            .sign_in_with_email("ada@example.com", "secret1")
            .expect_err("disabled");
        assert_eq!(err.code, codes::USER_DISABLED);
    }
}
