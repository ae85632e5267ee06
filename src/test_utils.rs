#[cfg(test)]
pub mod test_utils {
    use crate::auth::hash_password;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use crate::validation::ValidationPolicy;
    use axum::http::HeaderValue;
    use axum::Router;
    use axum_extra::headers::{Authorization, Header};
    use axum_test::TestServer;
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use model::entities::user;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    pub const ADMIN_USERNAME: &str = "testadminuser";
    pub const ADMIN_PASSWORD: &str = "testadminpassword";
    pub const USER_USERNAME: &str = "testuser";
    pub const USER_PASSWORD: &str = "testpassword";
    pub const USER2_USERNAME: &str = "testuser2";
    pub const USER2_PASSWORD: &str = "testpassword2";

    /// IDs of the accounts every test starts with.
    #[derive(Debug, Clone, Copy)]
    pub struct TestUsers {
        pub admin_id: i32,
        pub user_id: i32,
        pub user2_id: i32,
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Insert an account directly, bypassing the API's validation.
    pub async fn insert_account(
        db: &DatabaseConnection,
        username: &str,
        password: &str,
        is_staff: bool,
        is_active: bool,
    ) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            email: Set("test@example.com".to_string()),
            password_hash: Set(hash_password(password).expect("Failed to hash password")),
            is_staff: Set(is_staff),
            is_superuser: Set(is_staff),
            is_active: Set(is_active),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create test user")
    }

    /// Create AppState for testing with one admin and two regular users.
    pub async fn setup_test_app_state() -> (AppState, TestUsers) {
        let db = setup_test_db().await;

        let admin = insert_account(&db, ADMIN_USERNAME, ADMIN_PASSWORD, true, true).await;
        let user = insert_account(&db, USER_USERNAME, USER_PASSWORD, false, true).await;
        let user2 = insert_account(&db, USER2_USERNAME, USER2_PASSWORD, false, true).await;

        let state = AppState {
            db,
            policy: Arc::new(ValidationPolicy::default()),
        };
        let users = TestUsers {
            admin_id: admin.id,
            user_id: user.id,
            user2_id: user2.id,
        };
        (state, users)
    }

    /// Send log output to the test harness; level comes from RUST_LOG.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> (Router, AppState, TestUsers) {
        init_test_tracing();

        let (state, users) = setup_test_app_state().await;
        let router = create_router(state.clone(), Duration::from_secs(30));
        (router, state, users)
    }

    pub async fn setup_test_server() -> (TestServer, AppState, TestUsers) {
        let (router, state, users) = setup_test_app().await;
        let server = TestServer::new(router).expect("Failed to start test server");
        (server, state, users)
    }

    /// `Authorization: Basic ...` header value for the given credentials.
    pub fn basic_auth(username: &str, password: &str) -> HeaderValue {
        let mut values = Vec::new();
        Authorization::basic(username, password).encode(&mut values);
        values.pop().expect("Authorization encodes one header value")
    }
}
