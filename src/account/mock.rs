//! Mock account directory
//!
//! Fixed demo accounts used in mock mode in place of the backend's auth
//! endpoints. Every demo account shares the password `123456`.

use super::error::{AuthError, AuthResult};
use super::types::*;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use std::time::Duration;
use tokio::sync::RwLock;

/// Password accepted for every demo account
pub const DEMO_PASSWORD: &str = "123456";

const MOCK_EXPIRES_IN: u64 = 86_400;

/// Token issued for a mock account id
pub fn mock_token(account_id: &str) -> String {
    format!("mock_token_{}", account_id)
}

fn role(id: &str, label: &str, description: &str, permissions: &[&str]) -> Role {
    Role {
        id: id.to_string(),
        name: id.to_string(),
        label: label.to_string(),
        description: Some(description.to_string()),
        permissions: permissions.iter().map(|p| Permission::from(*p)).collect(),
    }
}

/// Built-in demo roles: admin, manager, editor, viewer
pub fn demo_roles() -> Vec<Role> {
    vec![
        role(
            "admin",
            "Super Administrator",
            "Full access to the system",
            &[
                "dashboard:view",
                "users:view",
                "users:create",
                "users:edit",
                "users:delete",
                "analytics:view",
                "analytics:export",
                "settings:view",
                "settings:edit",
                "documents:view",
                "documents:create",
                "documents:edit",
                "documents:delete",
                "files:view",
                "files:upload",
                "files:delete",
                "messages:view",
                "messages:send",
                "calendar:view",
                "calendar:edit",
                "notifications:view",
                "notifications:manage",
            ],
        ),
        role(
            "manager",
            "Administrator",
            "Day-to-day operations",
            &[
                "dashboard:view",
                "users:view",
                "users:create",
                "users:edit",
                "analytics:view",
                "analytics:export",
                "documents:view",
                "documents:create",
                "documents:edit",
                "files:view",
                "files:upload",
                "messages:view",
                "messages:send",
                "calendar:view",
                "calendar:edit",
                "notifications:view",
            ],
        ),
        role(
            "editor",
            "Editor",
            "Content management",
            &[
                "dashboard:view",
                "documents:view",
                "documents:create",
                "documents:edit",
                "files:view",
                "files:upload",
                "messages:view",
                "calendar:view",
            ],
        ),
        role(
            "viewer",
            "Viewer",
            "Read-only access",
            &["dashboard:view", "documents:view", "files:view", "calendar:view"],
        ),
    ]
}

fn timestamp(hours_ago: i64) -> String {
    (Utc::now() - ChronoDuration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn demo_account(
    id: &str,
    email: &str,
    name: &str,
    avatar: u8,
    role: Role,
    last_login_hours_ago: i64,
) -> Account {
    Account {
        user: User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            avatar: Some(format!("/avatars/{}.png", avatar)),
            role,
            status: UserStatus::Active,
            department: None,
            position: None,
            bio: None,
            created_at: timestamp(0),
            last_login_at: Some(timestamp(last_login_hours_ago)),
        },
        token: mock_token(id),
    }
}

/// In-memory directory of demo accounts
pub struct MockDirectory {
    accounts: RwLock<Vec<Account>>,
    latency: Duration,
}

impl MockDirectory {
    /// Directory seeded with the admin, ops and editor demo accounts
    pub fn new(latency: Duration) -> Self {
        let roles = demo_roles();
        let accounts = vec![
            demo_account(
                "acc-admin",
                "admin@halolight.h7ml.cn",
                "Primary Account (Admin)",
                1,
                roles[0].clone(),
                0,
            ),
            demo_account(
                "acc-ops",
                "ops@halolight.h7ml.cn",
                "Operations Account",
                2,
                roles[1].clone(),
                6,
            ),
            demo_account(
                "acc-editor",
                "editor@halolight.h7ml.cn",
                "Content Editor Account",
                3,
                roles[2].clone(),
                24,
            ),
        ];

        Self {
            accounts: RwLock::new(accounts),
            latency,
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> AuthResult<LoginResponse> {
        self.simulate_latency().await;

        let accounts = self.accounts.read().await;
        let account = accounts
            .iter()
            .find(|a| a.user.email == request.email)
            .filter(|_| request.password == DEMO_PASSWORD)
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(LoginResponse {
            user: account.clone(),
            token: account.token.clone(),
            refresh_token: None,
            expires_in: MOCK_EXPIRES_IN,
            accounts: accounts.clone(),
        })
    }

    pub async fn register(&self, request: &RegisterRequest) -> AuthResult<LoginResponse> {
        self.simulate_latency().await;

        if request.password != request.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let id = format!("acc-{}", Utc::now().timestamp_millis());
        let viewer = demo_roles()
            .into_iter()
            .find(|r| r.id == "viewer")
            .unwrap_or_else(Role::guest);

        let account = demo_account(&id, &request.email, &request.name, 4, viewer, 0);

        let mut accounts = self.accounts.write().await;
        accounts.push(account.clone());

        Ok(LoginResponse {
            token: account.token.clone(),
            user: account,
            refresh_token: None,
            expires_in: MOCK_EXPIRES_IN,
            accounts: accounts.clone(),
        })
    }

    /// Account authenticated by a mock token
    pub async fn find_by_token(&self, token: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|a| a.token == token)
            .cloned()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }
}
