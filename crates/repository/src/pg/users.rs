use async_trait::async_trait;
use model::{NewUser, Profile, User};
use tokio_postgres::Row;

use super::PgTx;
use crate::{RepositoryError, UsersRepository};

const USER_COLUMNS: &str = "id, role_id, username, email, password_hash, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, user_id, name, bio, age, gender";

fn user_from_row(row: &Row) -> Result<User, tokio_postgres::Error> {
    Ok(User {
        id: row.try_get("id")?,
        role_id: row.try_get("role_id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn profile_from_row(row: &Row) -> Result<Profile, tokio_postgres::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        bio: row.try_get("bio")?,
        age: row.try_get("age")?,
        gender: row.try_get("gender")?,
    })
}

#[async_trait]
impl UsersRepository for PgTx {
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO users (role_id, username, email, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );
        let row = self
            .query_one_opt(
                &query,
                &[&user.role_id, &user.username, &user.email, &user.password_hash],
            )
            .await?;
        Ok(user_from_row(&row)?)
    }

    async fn find_user(&mut self, id: i64) -> Result<User, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(user_from_row(&row)?)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<User, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = self.query_one_opt(&query, &[&email]).await?;
        Ok(user_from_row(&row)?)
    }

    async fn update_user_identity(
        &mut self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            "UPDATE users SET username = $2, email = $3, updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&id, &username, &email]).await?;
        Ok(user_from_row(&row)?)
    }

    async fn update_user_role(&mut self, id: i64, role_id: i32) -> Result<User, RepositoryError> {
        let query = format!(
            "UPDATE users SET role_id = $2, updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&id, &role_id]).await?;
        Ok(user_from_row(&row)?)
    }

    async fn insert_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError> {
        let query =
            format!("INSERT INTO profiles (user_id) VALUES ($1) RETURNING {PROFILE_COLUMNS}");
        let row = self.query_one_opt(&query, &[&user_id]).await?;
        Ok(profile_from_row(&row)?)
    }

    async fn find_profile(&mut self, user_id: i64) -> Result<Profile, RepositoryError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");
        let row = self.query_one_opt(&query, &[&user_id]).await?;
        Ok(profile_from_row(&row)?)
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<Profile, RepositoryError> {
        let query = format!(
            "UPDATE profiles SET name = $2, bio = $3, age = $4, gender = $5
             WHERE user_id = $1
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = self
            .query_one_opt(
                &query,
                &[&profile.user_id, &profile.name, &profile.bio, &profile.age, &profile.gender],
            )
            .await?;
        Ok(profile_from_row(&row)?)
    }
}
