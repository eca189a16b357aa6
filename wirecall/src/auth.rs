//! Credential management with single-flight refresh.
//!
//! An [`Authenticator`] knows how to apply a credential to a request and how
//! to obtain a new one. The [`AuthCoordinator`] wraps it and guarantees that
//! however many requests ask for a refresh at the same time, only one
//! refresh runs; everybody else awaits its result.
//!
//! Every installed credential gets a new generation number. The pipeline
//! remembers which generation each attempt was sent with, so an
//! unauthorized response to a request that was sent with an older
//! credential simply retries with the current one instead of refreshing
//! again.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::{BearerAuth, Session};
//!
//! let session = Session::new(transport)
//!     .base_url("https://api.example.com")
//!     .authorization(BearerAuth::new(|_current, session| async move {
//!         let token = session
//!             .send_json::<Token>(&HttpRequest::post().path("/oauth/token").form(&grant))
//!             .await?;
//!         Ok(token.into_inner().access_token)
//!     }));
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::FutureExt;
use futures::future::Shared;
use http::{HeaderValue, header};

use crate::request::WireRequest;
use crate::session::Session;
use crate::transport::BoxFuture;
use crate::Error;

/// Obtains and applies credentials.
pub trait Authenticator: Send + Sync + 'static {
    type Credential: Clone + Send + Sync + 'static;

    /// Attach `credential` to `request`.
    fn apply(&self, credential: &Self::Credential, request: &mut WireRequest) -> Result<(), Error>;

    /// Obtain a fresh credential.
    ///
    /// `session` has authorization removed, so the authenticator can call
    /// its token endpoint through it without recursing.
    fn refresh(
        &self,
        current: Option<Self::Credential>,
        session: Session,
    ) -> BoxFuture<'static, Result<Self::Credential, Error>>;

    /// Whether `credential` can still be used. Invalid credentials are
    /// refreshed before the next request is sent.
    fn is_valid(&self, credential: &Self::Credential) -> bool {
        let _ = credential;
        true
    }
}

/// The object-safe face of an auth coordinator, as stored in configuration.
pub trait AuthInterceptor: Send + Sync + 'static {
    /// Make sure a valid credential is installed, refreshing if needed.
    fn ensure_valid<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, Result<(), Error>>;

    /// Apply the current credential. Returns the generation applied, or
    /// `None` if there is no credential yet.
    fn apply(&self, request: &mut WireRequest) -> Result<Option<u64>, Error>;

    /// Refresh after an unauthorized response to a request sent with
    /// `stale_generation`. Skipped when a newer credential is already
    /// installed.
    fn refresh<'a>(
        &'a self,
        session: &'a Session,
        stale_generation: Option<u64>,
    ) -> BoxFuture<'a, Result<(), Error>>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<u64, Error>>>;

struct AuthState<C> {
    credential: Option<C>,
    generation: u64,
    in_flight: Option<RefreshFuture>,
}

/// Single-flight coordinator around an [`Authenticator`].
///
/// Clones share state.
pub struct AuthCoordinator<A: Authenticator> {
    authenticator: Arc<A>,
    state: Arc<Mutex<AuthState<A::Credential>>>,
}

impl<A: Authenticator> Clone for AuthCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
            state: self.state.clone(),
        }
    }
}

impl<A: Authenticator> AuthCoordinator<A> {
    /// Start without a credential; the first request triggers a refresh.
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            state: Arc::new(Mutex::new(AuthState {
                credential: None,
                generation: 0,
                in_flight: None,
            })),
        }
    }

    /// Start with a known credential as generation 1.
    pub fn with_credential(authenticator: A, credential: A::Credential) -> Self {
        let coordinator = Self::new(authenticator);
        {
            let mut state = coordinator.lock();
            state.credential = Some(credential);
            state.generation = 1;
        }
        coordinator
    }

    pub fn credential(&self) -> Option<A::Credential> {
        self.lock().credential.clone()
    }

    /// Number of credentials installed so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Return the generation of a usable credential, refreshing first if
    /// there is none.
    pub async fn ensure_valid(&self, session: &Session) -> Result<u64, Error> {
        {
            let state = self.lock();
            if let Some(credential) = &state.credential {
                if self.authenticator.is_valid(credential) {
                    return Ok(state.generation);
                }
            }
        }
        self.refresh(session, None).await
    }

    /// Refresh the credential, joining a refresh already in flight.
    ///
    /// When `stale_generation` is given and a newer credential has been
    /// installed since, no refresh happens.
    pub async fn refresh(
        &self,
        session: &Session,
        stale_generation: Option<u64>,
    ) -> Result<u64, Error> {
        let refresh = {
            let mut state = self.lock();
            if let Some(stale) = stale_generation {
                if state.generation > stale && state.credential.is_some() {
                    return Ok(state.generation);
                }
            }
            match state.in_flight.clone() {
                Some(refresh) => refresh,
                None => {
                    let refresh = self.start_refresh(state.credential.clone(), session);
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    fn start_refresh(&self, current: Option<A::Credential>, session: &Session) -> RefreshFuture {
        #[cfg(feature = "tracing")]
        tracing::debug!("refreshing credentials");

        let authenticator = self.authenticator.clone();
        let session = session.without_authorization();
        let state = self.state.clone();
        // Built on first poll, after the caller has released the state lock.
        async move {
            let result = authenticator.refresh(current, session).await;
            let mut state = lock(&state);
            state.in_flight = None;
            match result {
                Ok(credential) => {
                    state.credential = Some(credential);
                    state.generation += 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(generation = state.generation, "credentials refreshed");
                    Ok(state.generation)
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(%error, "credential refresh failed");
                    Err(match error {
                        Error::AuthRefresh(_) | Error::Cancelled => error,
                        other => Error::AuthRefresh(other.to_string()),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> MutexGuard<'_, AuthState<A::Credential>> {
        lock(&self.state)
    }
}

fn lock<C>(state: &Mutex<AuthState<C>>) -> MutexGuard<'_, AuthState<C>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<A: Authenticator> AuthInterceptor for AuthCoordinator<A> {
    fn ensure_valid<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move { AuthCoordinator::ensure_valid(self, session).await.map(|_| ()) })
    }

    fn apply(&self, request: &mut WireRequest) -> Result<Option<u64>, Error> {
        let (credential, generation) = {
            let state = self.lock();
            match &state.credential {
                Some(credential) => (credential.clone(), state.generation),
                None => return Ok(None),
            }
        };
        self.authenticator.apply(&credential, request)?;
        Ok(Some(generation))
    }

    fn refresh<'a>(
        &'a self,
        session: &'a Session,
        stale_generation: Option<u64>,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            AuthCoordinator::refresh(self, session, stale_generation)
                .await
                .map(|_| ())
        })
    }
}

impl<A: Authenticator> std::fmt::Debug for AuthCoordinator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AuthCoordinator")
            .field("generation", &state.generation)
            .field("has_credential", &state.credential.is_some())
            .field("refreshing", &state.in_flight.is_some())
            .finish()
    }
}

/// HTTP basic authentication with fixed credentials.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn header_value(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for BasicAuth {
    type Credential = String;

    fn apply(&self, credential: &String, request: &mut WireRequest) -> Result<(), Error> {
        set_authorization(request, credential)
    }

    fn refresh(&self, _: Option<String>, _: Session) -> BoxFuture<'static, Result<String, Error>> {
        Box::pin(std::future::ready(Ok(self.header_value())))
    }
}

/// Bearer token authentication with a caller-supplied refresh.
///
/// The closure receives the current token (if any) and a session without
/// authorization, and returns the new token.
pub struct BearerAuth<F> {
    refresh: F,
}

impl<F, Fut> BearerAuth<F>
where
    F: Fn(Option<String>, Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, Error>> + Send + 'static,
{
    pub fn new(refresh: F) -> Self {
        Self { refresh }
    }
}

impl<F, Fut> Authenticator for BearerAuth<F>
where
    F: Fn(Option<String>, Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, Error>> + Send + 'static,
{
    type Credential = String;

    fn apply(&self, token: &String, request: &mut WireRequest) -> Result<(), Error> {
        set_authorization(request, &format!("Bearer {token}"))
    }

    fn refresh(
        &self,
        current: Option<String>,
        session: Session,
    ) -> BoxFuture<'static, Result<String, Error>> {
        Box::pin((self.refresh)(current, session))
    }
}

impl<F> std::fmt::Debug for BearerAuth<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

fn set_authorization(request: &mut WireRequest, value: &str) -> Result<(), Error> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Error::Build(format!("invalid authorization header: {e}")))?;
    value.set_sensitive(true);
    request.headers.insert(header::AUTHORIZATION, value);
    Ok(())
}
