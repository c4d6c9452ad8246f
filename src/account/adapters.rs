//! Backend → frontend model adapters

use super::types::*;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashSet;

/// Access token lifetime assumed when the token carries no usable claims
pub const DEFAULT_EXPIRES_IN: u64 = 86_400;

pub fn adapt_user_status(status: BackendUserStatus) -> UserStatus {
    match status {
        BackendUserStatus::Active => UserStatus::Active,
        BackendUserStatus::Inactive => UserStatus::Inactive,
        BackendUserStatus::Suspended => UserStatus::Suspended,
    }
}

pub fn to_backend_user_status(status: UserStatus) -> BackendUserStatus {
    match status {
        UserStatus::Active => BackendUserStatus::Active,
        UserStatus::Inactive => BackendUserStatus::Inactive,
        UserStatus::Suspended => BackendUserStatus::Suspended,
    }
}

pub fn adapt_permissions(permissions: &[BackendPermission]) -> Vec<Permission> {
    permissions
        .iter()
        .map(|p| Permission::new(&p.resource, &p.action))
        .collect()
}

pub fn adapt_role(role: &BackendRole) -> Role {
    Role {
        id: role.id.clone(),
        name: role.name.clone(),
        label: role.label.clone(),
        description: role.description.clone(),
        permissions: adapt_permissions(&role.permissions),
    }
}

/// Adapt a backend user. The first role becomes the primary role; users
/// without roles get the guest role.
pub fn adapt_user(user: &BackendUser) -> User {
    let role = user.roles.first().map(adapt_role).unwrap_or_else(Role::guest);

    User {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
        avatar: user.avatar.clone(),
        role,
        status: adapt_user_status(user.status),
        department: user.department.clone(),
        position: user.position.clone(),
        bio: user.bio.clone(),
        created_at: user
            .created_at
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(now_rfc3339),
        last_login_at: user.last_login_at.clone(),
    }
}

pub fn adapt_paginated<B, F, T>(response: &BackendPaginatedResponse<B>, adapter: F) -> ListData<T>
where
    F: Fn(&B) -> T,
{
    ListData {
        list: response.data.iter().map(adapter).collect(),
        total: response.meta.total,
    }
}

pub fn adapt_user_list(response: &BackendPaginatedResponse<BackendUser>) -> ListData<User> {
    adapt_paginated(response, adapt_user)
}

/// Union of the permissions of several roles, de-duplicated in first-seen order
pub fn merge_role_permissions(roles: &[BackendRole]) -> Vec<Permission> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .flat_map(|r| adapt_permissions(&r.permissions))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

pub fn has_permission(user: &User, permission: &Permission) -> bool {
    user.role.permissions.contains(permission)
}

pub fn has_any_permission(user: &User, permissions: &[Permission]) -> bool {
    permissions.iter().any(|p| has_permission(user, p))
}

pub fn has_all_permissions(user: &User, permissions: &[Permission]) -> bool {
    permissions.iter().all(|p| has_permission(user, p))
}

/// Lifetime in seconds encoded in a JWT's `exp` and `iat` claims
pub fn jwt_lifetime(token: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<i64>,
        iat: Option<i64>,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    u64::try_from(claims.exp?.checked_sub(claims.iat?)?).ok()
}

/// Adapt a login/register response. Multi-account needs backend support, so
/// the account list holds only the logged-in user.
pub fn adapt_login_response(response: &BackendLoginResponse) -> LoginResponse {
    let account = Account {
        user: adapt_user(&response.user),
        token: response.access_token.clone(),
    };

    LoginResponse {
        user: account.clone(),
        token: response.access_token.clone(),
        refresh_token: Some(response.refresh_token.clone()),
        expires_in: jwt_lifetime(&response.access_token).unwrap_or(DEFAULT_EXPIRES_IN),
        accounts: vec![account],
    }
}

/// Adapt `/auth/me`. Credentials live in the token store, so the account
/// token is left empty.
pub fn adapt_current_user_response(user: &BackendUser) -> CurrentUserResponse {
    let account = Account {
        user: adapt_user(user),
        token: String::new(),
    };

    CurrentUserResponse {
        user: account.clone(),
        accounts: vec![account],
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
