//! Logging in to user accounts and exporting their sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use grammers_client::{Client, Config, SignInError};
use grammers_client::client::chats::{AuthorizationError, InvocationError};
use grammers_client::types::{LoginToken, PasswordToken};
use grammers_session::Session;
use tokio::sync::Mutex;

use crate::BoxFuture;
use crate::retry::{self, FloodPolicy, Sleeper};

/// Pending logins older than this are dropped
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(15 * 60);
/// Reported when `acquire` finds no login to continue
pub const NO_PENDING_LOGIN: &str = "Error: login expired, please /start again";

/// Outcome of one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Reusable session string
    Success(String),
    /// Account has 2FA, call again with the password
    PasswordRequired,
    /// Anything else, terminal
    Failure(String),
}

/// Obtains session strings for user accounts
pub trait Acquirer: Send + Sync {
    /// Have Telegram send the login code to `phone`, `Err` contains the failure message
    fn request_code<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, Result<(), String>>;

    /// Log in and export the session
    fn acquire<'a>(&'a self, phone: &'a str, code: &'a str, password: Option<&'a str>) -> BoxFuture<'a, Acquisition>;

    /// Forget a login that won't be finished
    fn discard<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, ()>;
}

/// Login in progress, kept between the code and the password
struct PendingLogin {
    client: Client,
    token: LoginToken,
    password: Option<PasswordToken>,
}

/// Logins by phone number, stale ones are evicted whenever one is stored
struct PendingLogins<T> {
    logins: HashMap<String, (Instant, T)>,
}

impl<T> Default for PendingLogins<T> {
    fn default() -> Self {
        PendingLogins { logins: HashMap::new() }
    }
}

impl<T> PendingLogins<T> {
    fn insert(&mut self, phone: &str, login: T, now: Instant) {
        self.logins.retain(|_, (updated, _)| now.saturating_duration_since(*updated) < PENDING_LOGIN_TTL);
        // Requesting again replaces the older code
        self.logins.insert(phone.to_string(), (now, login));
    }

    fn take(&mut self, phone: &str, now: Instant) -> Option<T> {
        let (updated, login) = self.logins.remove(phone)?;
        match now.saturating_duration_since(updated) < PENDING_LOGIN_TTL {
            true => Some(login),
            false => None,
        }
    }

    fn len(&self) -> usize {
        self.logins.len()
    }
}

enum Incomplete {
    PasswordRequired,
    Failed(String),
}

/// [`Acquirer`] logging in with a fresh in-memory session per phone number
pub struct TelegramAcquirer {
    api_id: i32,
    api_hash: String,
    sleeper: Arc<dyn Sleeper>,
    policy: FloodPolicy,
    pending: Mutex<PendingLogins<PendingLogin>>,
}

impl TelegramAcquirer {
    pub fn new(api_id: i32, api_hash: &str, sleeper: Arc<dyn Sleeper>) -> TelegramAcquirer {
        TelegramAcquirer {
            api_id,
            api_hash: api_hash.to_string(),
            sleeper,
            policy: FloodPolicy::unbounded(),
            pending: Mutex::new(PendingLogins::default()),
        }
    }

    /// Set how flood waits are retried
    pub fn flood_policy(mut self, policy: FloodPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect a new client and request the login code
    async fn login(&self, phone: &str) -> Result<PendingLogin, AuthorizationError> {
        let client = Client::connect(Config {
            session: Session::new(),
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: Default::default(),
        })
        .await?;

        let api_hash = self.api_hash.as_str();
        let token = retry::retry_on_flood(&*self.sleeper, self.policy, authorization_flood_wait, || {
            let mut client = client.clone();
            async move { client.request_login_code(phone, self.api_id, api_hash).await }
        })
        .await?;

        debug!("Login code requested");
        Ok(PendingLogin { client, token, password: None })
    }

    /// Sign in with the code, then the password if the account has one
    async fn complete(&self, login: &mut PendingLogin, code: &str, password: Option<&str>) -> Result<String, Incomplete> {
        if login.password.is_none() {
            let token = &login.token;
            let signed_in = retry::retry_on_flood(&*self.sleeper, self.policy, sign_in_flood_wait, || {
                let mut client = login.client.clone();
                async move { client.sign_in(token, code).await }
            })
            .await;
            match signed_in {
                Ok(_) => return Ok(export(&login.client)),
                Err(SignInError::PasswordRequired(token)) => login.password = Some(token),
                Err(e) => return Err(Incomplete::Failed(failure(e))),
            }
        }

        let (Some(password), Some(token)) = (password, login.password.as_ref()) else {
            return Err(Incomplete::PasswordRequired);
        };
        retry::retry_on_flood(&*self.sleeper, self.policy, sign_in_flood_wait, || {
            let mut client = login.client.clone();
            let token = token.clone();
            async move { client.check_password(token, password).await }
        })
        .await
        .map_err(|e| Incomplete::Failed(failure(e)))?;
        Ok(export(&login.client))
    }
}

impl Acquirer for TelegramAcquirer {
    fn request_code<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let login = self.login(phone).await.map_err(failure)?;
            let mut pending = self.pending.lock().await;
            pending.insert(phone, login, Instant::now());
            debug!("{} pending logins", pending.len());
            Ok(())
        })
    }

    fn acquire<'a>(&'a self, phone: &'a str, code: &'a str, password: Option<&'a str>) -> BoxFuture<'a, Acquisition> {
        Box::pin(async move {
            // Taken out for the duration of the call, a concurrent attempt finds nothing
            let pending = self.pending.lock().await.take(phone, Instant::now());
            let Some(mut login) = pending else {
                warn!("No pending login to continue");
                return Acquisition::Failure(NO_PENDING_LOGIN.to_string());
            };

            match self.complete(&mut login, code, password).await {
                Ok(session) => {
                    info!("Session exported");
                    Acquisition::Success(session)
                }
                Err(Incomplete::PasswordRequired) => {
                    self.pending.lock().await.insert(phone, login, Instant::now());
                    Acquisition::PasswordRequired
                }
                Err(Incomplete::Failed(message)) => {
                    warn!("Login failed: {message}");
                    Acquisition::Failure(message)
                }
            }
        })
    }

    fn discard<'a>(&'a self, phone: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if self.pending.lock().await.logins.remove(phone).is_some() {
                debug!("Discarded pending login");
            }
        })
    }
}

/// Serialized session as a printable string
fn export(client: &Client) -> String {
    URL_SAFE_NO_PAD.encode(client.session().save())
}

fn failure(e: impl std::fmt::Display) -> String {
    format!("Error: {e}")
}

fn invocation_flood_wait(e: &InvocationError) -> Option<Duration> {
    match e {
        InvocationError::Rpc(rpc) => retry::flood_wait(&rpc.name, rpc.value),
        _ => None,
    }
}

fn authorization_flood_wait(e: &AuthorizationError) -> Option<Duration> {
    match e {
        AuthorizationError::Invoke(e) => invocation_flood_wait(e),
        _ => None,
    }
}

fn sign_in_flood_wait(e: &SignInError) -> Option<Duration> {
    match e {
        SignInError::Other(e) => invocation_flood_wait(e),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message() {
        assert_eq!(failure("PHONE_NUMBER_INVALID"), "Error: PHONE_NUMBER_INVALID");
        // The flow relays failures as they are, and the prefix is what users get to see
        assert!(failure(42).contains("Error"));
        assert!(NO_PENDING_LOGIN.starts_with("Error: "));
    }

    #[test]
    fn test_pending_take_once() {
        let now = Instant::now();
        let mut pending = PendingLogins::default();
        pending.insert("+1", "first", now);
        pending.insert("+1", "second", now);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.take("+1", now), Some("second"));
        assert_eq!(pending.take("+1", now), None);
    }

    #[test]
    fn test_pending_expire() {
        let start = Instant::now();
        let later = start + PENDING_LOGIN_TTL;
        let mut pending = PendingLogins::default();
        pending.insert("+1", 1, start);
        pending.insert("+2", 2, start);
        assert_eq!(pending.take("+2", later), None);

        // Storing another login evicts the abandoned one
        pending.insert("+3", 3, later);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.take("+3", later + Duration::from_secs(1)), Some(3));
    }
}
