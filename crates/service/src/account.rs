//! Accounts: registration, login, profiles and roles.

use std::sync::Arc;

use auth::{hash_password, verify_password, TokenService};
use model::{NewUser, Profile, ProfileUpdate, Role, RoleMap, User};
use repository::prelude::*;
use repository::RepositoryError;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{missing, ServiceError};

const BAD_CREDENTIALS: &str = "invalid email or password";
const MAX_EMAIL: usize = 50;
const MAX_BIO: usize = 700;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Registered {
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoginOutput {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoleChange {
    pub user_id: i64,
    pub role: Role,
}

fn validate_username(username: &str) -> Result<(), ServiceError> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(ServiceError::Validation("username must be 3 to 20 characters".into()));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ServiceError::Validation("username must not contain spaces".into()));
    }
    if username.chars().any(char::is_uppercase) {
        return Err(ServiceError::Validation("username must be lowercase".into()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ServiceError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.chars().count() > MAX_EMAIL {
        return Err(ServiceError::Validation("email is not valid".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < 8 {
        return Err(ServiceError::Validation("password must be at least 8 characters".into()));
    }
    if password.chars().any(char::is_whitespace) {
        return Err(ServiceError::Validation("password must not contain spaces".into()));
    }
    Ok(())
}

fn validate_profile(update: &ProfileUpdate) -> Result<(), ServiceError> {
    validate_username(&update.username)?;
    validate_email(&update.email)?;
    if let Some(name) = &update.name {
        if !(3..=150).contains(&name.chars().count()) {
            return Err(ServiceError::Validation("name must be 3 to 150 characters".into()));
        }
    }
    if update.bio.as_ref().is_some_and(|bio| bio.chars().count() > MAX_BIO) {
        return Err(ServiceError::Validation(format!("bio must be at most {MAX_BIO} characters")));
    }
    if update.age.is_some_and(|age| age < 0) {
        return Err(ServiceError::Validation("age cannot be negative".into()));
    }
    Ok(())
}

pub struct AccountService {
    store: Arc<dyn Store>,
    tokens: TokenService,
    roles: RoleMap,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService, roles: RoleMap) -> Self {
        Self { store, tokens, roles }
    }

    fn role_of(&self, user: &User) -> Result<Role, ServiceError> {
        self.roles.role_of(user.role_id).ok_or_else(|| {
            warn!(user_id = user.id, role_id = user.role_id, "User has an unknown role id");
            ServiceError::Forbidden("account role is not recognized".into())
        })
    }

    /// Creates a user with the `User` role, an empty profile and an empty cart.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registered, ServiceError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;
        let password_hash =
            hash_password(password).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut tx = self.store.begin().await?;
        let user = tx
            .insert_user(&NewUser {
                role_id: self.roles.id_of(Role::User),
                username: username.to_owned(),
                email: email.to_owned(),
                password_hash,
            })
            .await?;
        tx.insert_profile(user.id).await?;
        tx.insert_cart(user.id).await?;
        tx.commit().await?;

        info!(user_id = user.id, "User registered");
        Ok(Registered {
            username: user.username,
            email: user.email,
            role: Role::User,
        })
    }

    /// Checks credentials and issues an access token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, ServiceError> {
        let mut tx = self.store.begin().await?;
        let user = match tx.find_user_by_email(email).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => {
                return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        if !verify_password(password, &user.password_hash) {
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        let role = self.role_of(&user)?;
        let token = self
            .tokens
            .issue(user.id, role)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        info!(user_id = user.id, "User logged in");
        Ok(LoginOutput {
            username: user.username,
            email: user.email,
            role,
            token,
        })
    }

    pub async fn current_user(&self, user_id: i64) -> Result<UserSummary, ServiceError> {
        let mut tx = self.store.begin().await?;
        let user = tx.find_user(user_id).await.map_err(missing("user"))?;
        tx.commit().await?;
        let role = self.role_of(&user)?;
        Ok(UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
        })
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<Profile, ServiceError> {
        let mut tx = self.store.begin().await?;
        let profile = tx.find_profile(user_id).await.map_err(missing("profile"))?;
        tx.commit().await?;
        Ok(profile)
    }

    /// Updates username, email and profile fields together.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdate,
    ) -> Result<Profile, ServiceError> {
        validate_profile(update)?;

        let mut tx = self.store.begin().await?;
        tx.update_user_identity(user_id, &update.username, &update.email)
            .await
            .map_err(missing("user"))?;
        let mut profile = tx.find_profile(user_id).await.map_err(missing("profile"))?;
        profile.name = update.name.clone();
        profile.bio = update.bio.clone();
        profile.age = update.age;
        profile.gender = update.gender;
        let profile = tx.update_profile(&profile).await?;
        tx.commit().await?;

        info!(user_id, "Profile updated");
        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<RoleChange, ServiceError> {
        let mut tx = self.store.begin().await?;
        tx.update_user_role(user_id, self.roles.id_of(role))
            .await
            .map_err(missing("user"))?;
        tx.commit().await?;

        info!(user_id, %role, "Role changed");
        Ok(RoleChange { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_short_lowercase_words() {
        assert!(validate_username("rider_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("Rider").is_err());
        assert!(validate_username("two words").is_err());
        assert!(validate_username("a_very_long_username_x").is_err());
    }

    #[test]
    fn emails_need_both_parts() {
        assert!(validate_email("rider@mail.test").is_ok());
        assert!(validate_email("rider").is_err());
        assert!(validate_email("@mail.test").is_err());
        assert!(validate_email("rider@").is_err());
    }

    #[test]
    fn passwords_are_long_without_spaces() {
        assert!(validate_password("hunter2hunter2").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("has space inside").is_err());
    }

    #[test]
    fn profile_limits_are_enforced() {
        let base = ProfileUpdate {
            username: "rider".into(),
            email: "rider@mail.test".into(),
            name: None,
            bio: None,
            age: None,
            gender: None,
        };
        assert!(validate_profile(&base).is_ok());
        assert!(validate_profile(&ProfileUpdate { age: Some(-1), ..base.clone() }).is_err());
        let long_bio = ProfileUpdate { bio: Some("x".repeat(701)), ..base.clone() };
        assert!(validate_profile(&long_bio).is_err());
        assert!(validate_profile(&ProfileUpdate { name: Some("Al".into()), ..base }).is_err());
    }
}
