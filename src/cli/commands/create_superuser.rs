use anyhow::{bail, Result};
use chrono::Utc;
use model::entities::user;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, error, info, trace};

use crate::auth::hash_password_blocking;
use crate::cli::commands::initdb::migrate;
use crate::config::Settings;
use crate::validation::{Mode, UserPayload, ValidationPolicy, USERNAME_TAKEN};

pub struct SuperuserArgs {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn create_superuser(
    settings: &Settings,
    database_url: &str,
    args: SuperuserArgs,
) -> Result<()> {
    trace!("Entering create_superuser function");
    let db = migrate(database_url).await?;
    let policy = settings.validation_policy()?;

    let created = insert_superuser(&db, &policy, args).await?;
    info!(
        "Superuser {} created with ID {}",
        created.username, created.id
    );
    Ok(())
}

/// Validate and store an admin account.
pub async fn insert_superuser<C: ConnectionTrait>(
    db: &C,
    policy: &ValidationPolicy,
    args: SuperuserArgs,
) -> Result<user::Model> {
    let payload = UserPayload {
        username: Some(args.username),
        email: Some(args.email),
        password: Some(args.password),
        ..Default::default()
    };

    let changes = match policy.validate(&payload, Mode::Create, None) {
        Ok(changes) => changes,
        Err(errors) => {
            for field in errors.fields() {
                for message in errors.get(field).unwrap_or_default() {
                    error!("{}: {}", field, message);
                }
            }
            bail!("superuser account failed validation");
        }
    };

    let username = changes.username.unwrap_or_default();
    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(db)
        .await?
        .is_some();
    if taken {
        error!("username: {}", USERNAME_TAKEN);
        bail!("username {} is already taken", username);
    }

    debug!("Hashing password for superuser {}", username);
    let password_hash = hash_password_blocking(changes.password.unwrap_or_default()).await?;

    let account = user::ActiveModel {
        username: Set(username),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        email: Set(changes.email.unwrap_or_default()),
        password_hash: Set(password_hash),
        is_staff: Set(true),
        is_superuser: Set(true),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    Ok(account.insert(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::setup_test_db;

    fn args(username: &str, password: &str) -> SuperuserArgs {
        SuperuserArgs {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_superuser_creates_admin() {
        let db = setup_test_db().await;
        let policy = ValidationPolicy::default();

        let created = insert_superuser(&db, &policy, args("rootadmin", "Xk9#mP2qLw"))
            .await
            .expect("superuser should be created");

        assert!(created.is_staff);
        assert!(created.is_superuser);
        assert!(created.is_active);
        assert_ne!(created.password_hash, "Xk9#mP2qLw");
    }

    #[tokio::test]
    async fn test_insert_superuser_applies_password_policy() {
        let db = setup_test_db().await;
        let policy = ValidationPolicy::default();

        let result = insert_superuser(&db, &policy, args("rootadmin", "password")).await;
        assert!(result.is_err());
        assert!(user::Entity::find().one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_superuser_rejects_taken_username() {
        let db = setup_test_db().await;
        let policy = ValidationPolicy::default();

        insert_superuser(&db, &policy, args("rootadmin", "Xk9#mP2qLw"))
            .await
            .expect("first superuser should be created");
        let second = insert_superuser(&db, &policy, args("rootadmin", "Zq7!vB3nRt")).await;
        assert!(second.is_err());
    }
}
