use std::sync::Arc;

use tracing::warn;
use tradepost_core::TokenStore;
use tradepost_domain::constants::{ACCESS_TOKEN_KEYS, REFRESH_TOKEN_KEYS, USER_KEYS};
use tradepost_domain::{Result, Session, UserProfile};

use super::backend::{KeyOp, KeyValueBackend, MemoryBackend};

/// Token store over string keys, compatible with legacy key names
///
/// Reads try every alias in order; `session` resolves all of them from one
/// backend snapshot. Writes set the primary access-token key
/// and its first alias, the primary refresh and user keys, and remove every
/// other alias, all in one batch.
#[derive(Debug)]
pub struct KeyValueTokenStore<B> {
    backend: Arc<B>,
}

impl KeyValueTokenStore<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }
}

impl<B: KeyValueBackend> KeyValueTokenStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.backend.get(key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(err) => {
                warn!(key, error = %err, "failed to read session key");
                None
            }
        })
    }
}

fn first_present(values: &[Option<String>]) -> Option<String> {
    values.iter().flatten().find(|value| !value.is_empty()).cloned()
}

fn parse_user(raw: &str) -> Option<UserProfile> {
    match serde_json::from_str(raw) {
        Ok(user) => Some(user),
        Err(err) => {
            warn!(error = %err, "stored user payload is not a profile");
            None
        }
    }
}

fn remove_all(ops: &mut Vec<KeyOp>, keys: &[&str]) {
    ops.extend(keys.iter().map(|key| KeyOp::Remove((*key).to_string())));
}

impl<B: KeyValueBackend> TokenStore for KeyValueTokenStore<B> {
    fn access_token(&self) -> Option<String> {
        self.first_of(ACCESS_TOKEN_KEYS)
    }

    fn refresh_token(&self) -> Option<String> {
        self.first_of(REFRESH_TOKEN_KEYS)
    }

    fn user(&self) -> Option<UserProfile> {
        parse_user(&self.first_of(USER_KEYS)?)
    }

    fn session(&self) -> Option<Session> {
        let keys: Vec<&str> =
            ACCESS_TOKEN_KEYS.iter().chain(REFRESH_TOKEN_KEYS).chain(USER_KEYS).copied().collect();
        let values = match self.backend.get_many(&keys) {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "failed to read session");
                return None;
            }
        };

        let (access, rest) = values.split_at(ACCESS_TOKEN_KEYS.len());
        let (refresh, user) = rest.split_at(REFRESH_TOKEN_KEYS.len());
        Some(Session {
            access_token: first_present(access)?,
            refresh_token: first_present(refresh),
            user: first_present(user).as_deref().and_then(parse_user),
        })
    }

    fn set_session(&self, session: &Session) -> Result<()> {
        let mut ops = Vec::new();

        // Primary access key plus its alias; older readers use either.
        let (written, rest) = ACCESS_TOKEN_KEYS.split_at(ACCESS_TOKEN_KEYS.len().min(2));
        ops.extend(
            written
                .iter()
                .map(|key| KeyOp::Set((*key).to_string(), session.access_token.clone())),
        );
        remove_all(&mut ops, rest);

        remove_all(&mut ops, REFRESH_TOKEN_KEYS);
        if let (Some(refresh), Some(key)) = (&session.refresh_token, REFRESH_TOKEN_KEYS.first()) {
            ops.push(KeyOp::Set((*key).to_string(), refresh.clone()));
        }

        remove_all(&mut ops, USER_KEYS);
        if let (Some(user), Some(key)) = (&session.user, USER_KEYS.first()) {
            ops.push(KeyOp::Set((*key).to_string(), serde_json::to_string(user)?));
        }

        self.backend.apply(&ops)
    }

    fn clear(&self) -> Result<()> {
        let mut ops = Vec::new();
        remove_all(&mut ops, ACCESS_TOKEN_KEYS);
        remove_all(&mut ops, REFRESH_TOKEN_KEYS);
        remove_all(&mut ops, USER_KEYS);
        self.backend.apply(&ops)
    }
}
