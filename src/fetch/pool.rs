//! Reusable HTTP session pool
//!
//! Sessions wrap a `reqwest::Client` with a cookie store, so a session
//! that is reused across requests looks like one continuous browsing
//! visit. Ownership of a session is exclusive between `acquire` and
//! `release`; the pool only bounds the idle set, never construction.

use crate::identity::Fingerprint;
use reqwest::{Client, Response};
use std::sync::Mutex;
use std::time::Duration;

/// One pooled HTTP session: a cookie-carrying client plus the
/// fingerprint applied to its outbound requests
pub struct Session {
    client: Client,
    fingerprint: Fingerprint,
}

impl Session {
    fn build(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            fingerprint: Fingerprint::random(),
        })
    }

    /// Replaces the session's fingerprint with a fresh random one
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = Fingerprint::random();
    }

    /// Issues a GET request with the session's current fingerprint
    pub async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        self.client
            .get(url)
            .headers(self.fingerprint.header_map())
            .send()
            .await
    }

    /// The user agent this session currently presents
    pub fn user_agent(&self) -> &str {
        &self.fingerprint.user_agent
    }
}

/// Bounded pool of reusable sessions
pub struct SessionPool {
    idle: Mutex<Vec<Session>>,
    max_idle: usize,
    request_timeout: Duration,
}

impl SessionPool {
    /// Creates a pool keeping at most `max_idle` idle sessions
    pub fn new(max_idle: usize, request_timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            request_timeout,
        }
    }

    /// Lends out a session
    ///
    /// Pops an idle session and refreshes its fingerprint, or builds a
    /// new one if none is idle. Client construction failures propagate
    /// to the caller.
    pub fn acquire(&self) -> Result<Session, reqwest::Error> {
        let pooled = self.idle.lock().unwrap().pop();
        match pooled {
            Some(mut session) => {
                session.refresh_fingerprint();
                Ok(session)
            }
            None => Session::build(self.request_timeout),
        }
    }

    /// Returns a session to the idle set, discarding it if the set is
    /// already at capacity
    pub fn release(&self, session: Session) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.max_idle {
            idle.push(session);
        }
    }

    /// Number of sessions currently idle
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_idle: usize) -> SessionPool {
        SessionPool::new(max_idle, Duration::from_secs(5))
    }

    #[test]
    fn test_acquire_builds_when_empty() {
        let pool = pool(2);
        assert_eq!(pool.idle_count(), 0);
        let session = pool.acquire().unwrap();
        assert!(!session.user_agent().is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_release_keeps_up_to_capacity() {
        let pool = pool(1);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();

        pool.release(a);
        assert_eq!(pool.idle_count(), 1);

        // Second release exceeds capacity and is discarded
        pool.release(b);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_reacquire_reuses_idle_session() {
        let pool = pool(4);
        let session = pool.acquire().unwrap();
        pool.release(session);
        assert_eq!(pool.idle_count(), 1);

        let _session = pool.acquire().unwrap();
        assert_eq!(pool.idle_count(), 0);
    }
}
