//! UserDirectory - account registration and password login
//!
//! Passwords are stored as Argon2id PHC strings. Hashing runs on the blocking
//! pool so it never stalls the async workers.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::entities::{User, UserId};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::UserRepository;

const MIN_PASSWORD_LENGTH: usize = 8;

pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    params: Params,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self::with_params(users, Params::default())
    }

    /// Use explicit Argon2 cost parameters (cheap ones in tests)
    pub fn with_params(users: Arc<dyn UserRepository>, params: Params) -> Self {
        Self { users, params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> LedgerResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("name must not be empty".to_string()));
        }
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(LedgerError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(LedgerError::conflict("User", &email));
        }

        let hasher = self.hasher();
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| LedgerError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| LedgerError::Internal(format!("password hashing failed: {}", e)))?;

        // The unique index still decides if two registrations race.
        let user = User::new(name.to_string(), email, password_hash);
        self.users.insert(&user).await?;

        info!("Registered user {} <{}>", user.id, user.email);
        Ok(user)
    }

    /// Unknown email and wrong password are indistinguishable to the caller
    pub async fn login(&self, email: &str, password: &str) -> LedgerResult<User> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!("Login attempt for unknown email");
            return Err(LedgerError::InvalidCredentials);
        };

        let hasher = self.hasher();
        let stored = user.password_hash.clone();
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || match PasswordHash::new(&stored) {
            Ok(parsed) => hasher.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        })
        .await
        .map_err(|e| LedgerError::Internal(format!("password check task failed: {}", e)))?;

        if !verified {
            warn!("Failed login for {}", user.id);
            return Err(LedgerError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> LedgerResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("User", id))
    }

    pub async fn list_users(&self) -> LedgerResult<Vec<User>> {
        self.users.list().await
    }
}

fn normalize_email(raw: &str) -> LedgerResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(LedgerError::InvalidInput(format!(
            "'{}' is not a valid email address",
            raw.trim()
        )));
    }
    Ok(email)
}
