use uuid::Uuid;

use crate::{
    access::{Principal, require},
    error::{AppError, AppResult},
    models::{User, UserProfile},
    repository::Repository,
    roles::{Capability, Role, RoleSet, capabilities_of, highest_role},
};

/// profile_of
///
/// Display view of a profile: roles highest first, the highest role as a badge, and the
/// capabilities the role set grants.
pub fn profile_of(user: &User) -> UserProfile {
    let roles = user.role_set();
    UserProfile {
        id: user.id,
        email: user.email.clone(),
        roles: roles.to_vec(),
        highest_role: highest_role(&roles),
        capabilities: capabilities_of(&roles).into_iter().collect(),
        is_active: user.is_active,
    }
}

/// register_member
///
/// Creates the local profile for a new sign-up. Everyone starts as `{member}`.
pub async fn register_member(repo: &dyn Repository, id: Uuid, email: String) -> AppResult<User> {
    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::Validation("`email` must not be empty".to_string()));
    }
    let user = repo.create_user(User::new_member(id, email)).await?;
    tracing::info!(user = %user.id, "member registered");
    Ok(user)
}

/// set_roles
///
/// Replaces `target`'s role set. Only a holder of `users.manageRoles` may do this. The change
/// applies to the target's next authorization check; past decisions are not revisited.
pub async fn set_roles(
    repo: &dyn Repository,
    target: Uuid,
    new_roles: &[Role],
    acting: &Principal,
) -> AppResult<User> {
    require(acting, Capability::ManageRoles)?;
    if new_roles.is_empty() {
        return Err(AppError::Validation(
            "a user must hold at least one role".to_string(),
        ));
    }

    let roles = RoleSet::new(new_roles.iter().copied());
    let user = repo
        .update_roles(target, &roles)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        user = %target,
        by = %acting.id,
        roles = ?roles.names(),
        "roles updated"
    );
    Ok(user)
}

/// set_active
///
/// Deactivates or reactivates an account. Deactivation keeps the row; the principal is simply
/// denied every capability until reactivated.
pub async fn set_active(
    repo: &dyn Repository,
    target: Uuid,
    is_active: bool,
    acting: &Principal,
) -> AppResult<User> {
    require(acting, Capability::DeactivateUsers)?;
    let user = repo
        .set_user_active(target, is_active)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user = %target, by = %acting.id, is_active, "activation changed");
    Ok(user)
}

/// delete_user
///
/// Hard delete, reserved for `users.delete`.
pub async fn delete_user(repo: &dyn Repository, target: Uuid, acting: &Principal) -> AppResult<()> {
    require(acting, Capability::DeleteUsers)?;
    if !repo.delete_user(target).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(user = %target, by = %acting.id, "user deleted");
    Ok(())
}

pub async fn list_users(repo: &dyn Repository, acting: &Principal) -> AppResult<Vec<UserProfile>> {
    require(acting, Capability::ViewUsers)?;
    let users = repo.list_users().await?;
    Ok(users.iter().map(profile_of).collect())
}
