use super::{BackendAuth, BackendError, BackendLogin, BackendLoginResponse, BackendSignup, BackendUser};
use async_trait::async_trait;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredUser {
    id: u64,
    password: String,
    name: String,
    roles: Vec<String>,
}

#[derive(Debug, Default)]
struct BackendState {
    users: HashMap<String, StoredUser>,
    next_id: u64,
    tokens_issued: u64,
}

/// In-process Backend Auth Service
///
/// Behaves like the real backend: numeric user ids, 409 on a duplicate
/// email, 401 on bad credentials. Counts calls so tests can assert that a
/// request never reached the backend.
#[derive(Debug, Default)]
pub struct MemoryBackendAuth {
    state: RwLock<BackendState>,
    signup_calls: AtomicUsize,
    login_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryBackendAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call answer 503 until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn signup_calls(&self) -> usize {
        self.signup_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.signup_calls() + self.login_calls()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                status: 503,
                body: json!({"message": "Service unavailable"}),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BackendAuth for MemoryBackendAuth {
    async fn signup(&self, request: &BackendSignup) -> Result<BackendUser, BackendError> {
        self.signup_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state.write().await;
        if state.users.contains_key(&request.email) {
            return Err(BackendError::Rejected {
                status: 409,
                body: json!({"message": "User already exists"}),
            });
        }

        state.next_id += 1;
        let user = StoredUser {
            id: state.next_id,
            password: request.password.clone(),
            name: request.name.clone(),
            roles: request.roles.clone(),
        };
        state.users.insert(request.email.clone(), user.clone());

        let mut extra = Map::new();
        extra.insert("name".to_string(), json!(user.name));

        Ok(BackendUser {
            id: user.id.to_string(),
            email: Some(request.email.clone()),
            roles: user.roles,
            extra,
        })
    }

    async fn login(&self, request: &BackendLogin) -> Result<BackendLoginResponse, BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state.write().await;
        let user_id = match state.users.get(&request.email) {
            Some(user) if user.password == request.password => user.id,
            _ => {
                return Err(BackendError::Rejected {
                    status: 401,
                    body: json!({"message": "Invalid credentials"}),
                })
            }
        };

        state.tokens_issued += 1;
        Ok(BackendLoginResponse {
            access_token: format!("backend-{}-{}", user_id, state.tokens_issued),
            extra: Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signup_then_login() {
        let backend = MemoryBackendAuth::new();
        let user = backend
            .signup(&BackendSignup::new("a@b.com", "pw1", None, None))
            .await
            .unwrap();
        assert_eq!(user.id, "1");

        let login = BackendLogin {
            email: "a@b.com".to_string(),
            password: "pw1".to_string(),
        };
        assert!(backend.login(&login).await.is_ok());

        let wrong = BackendLogin {
            password: "nope".to_string(),
            ..login
        };
        let err = backend.login(&wrong).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(backend.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let backend = MemoryBackendAuth::new();
        let signup = BackendSignup::new("a@b.com", "pw1", None, None);
        backend.signup(&signup).await.unwrap();

        let err = backend.signup(&signup).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(backend.user_count().await, 1);
    }
}
