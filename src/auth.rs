use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use model::entities::user;
use once_cell::sync::Lazy;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, trace, warn};

use crate::error::{ApiError, ApiResult};
use crate::permissions::{Actor, Principal};
use crate::schemas::AppState;

pub const INVALID_CREDENTIALS: &str = "Invalid username/password.";
pub const INACTIVE_ACCOUNT: &str = "User inactive or deleted.";
pub const INVALID_HEADER: &str = "Invalid basic header.";

/// Hash a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| ApiError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash on the blocking pool; argon2 is too slow for a runtime worker.
pub async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::PasswordHash(e.to_string()))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::PasswordHash(e.to_string()))?
}

/// Verified against when the username is unknown, so both failure paths
/// cost one argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("useradmin-dummy-password").ok());

/// Resolve Basic credentials to an active account.
pub async fn authenticate(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> ApiResult<Actor> {
    trace!("Authenticating principal {}", username);

    let account = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;

    let Some(account) = account else {
        warn!("Authentication failed: unknown username {}", username);
        if let Some(dummy) = DUMMY_HASH.as_ref() {
            verify_password_blocking(password.to_string(), dummy.clone()).await?;
        }
        return Err(ApiError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password_blocking(password.to_string(), account.password_hash.clone()).await? {
        warn!("Authentication failed: wrong password for {}", username);
        return Err(ApiError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
    }

    if !account.is_active {
        warn!("Authentication refused: account {} is inactive", username);
        return Err(ApiError::InvalidCredentials(INACTIVE_ACCOUNT.to_string()));
    }

    debug!(
        "Authenticated {} (id {}, staff: {})",
        account.username, account.id, account.is_staff
    );
    Ok(Actor {
        id: account.id,
        username: account.username,
        is_staff: account.is_staff,
    })
}

/// Requests without an `Authorization` header resolve to
/// [`Principal::Anonymous`]; the permission gate decides what they may do.
#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials =
            match TypedHeader::<Authorization<Basic>>::from_request_parts(parts, state).await {
                Ok(TypedHeader(Authorization(credentials))) => credentials,
                Err(rejection) if rejection.is_missing() => {
                    trace!("No credentials supplied, treating request as anonymous");
                    return Ok(Principal::Anonymous);
                }
                Err(rejection) => {
                    warn!("Rejected authorization header: {}", rejection);
                    return Err(ApiError::InvalidCredentials(INVALID_HEADER.to_string()));
                }
            };

        authenticate(&state.db, credentials.username(), credentials.password())
            .await
            .map(Principal::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("Xk9#mP2qLw").unwrap();
        let second = hash_password("Xk9#mP2qLw").unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2"));
        assert!(!first.contains("Xk9#mP2qLw"));
        assert!(verify_password("Xk9#mP2qLw", &first).unwrap());
        assert!(!verify_password("wrong-password", &first).unwrap());
    }

    #[tokio::test]
    async fn blocking_pool_helpers_hash_and_verify() {
        let hash = hash_password_blocking("Zq7!vB3nRt".to_string()).await.unwrap();
        assert!(verify_password_blocking("Zq7!vB3nRt".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("Xk9#mP2qLw".to_string(), hash)
            .await
            .unwrap());
    }

    #[test]
    fn dummy_hash_never_matches_caller_passwords() {
        let dummy = DUMMY_HASH.as_ref().expect("dummy hash is generated");
        assert!(!verify_password("testpassword", dummy).unwrap());
        assert!(!verify_password("", dummy).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(ApiError::PasswordHash(_))
        ));
    }
}
