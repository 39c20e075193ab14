// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserStore,
    models::auth::{Claims, User},
    services::login_attempts::LoginAttemptStore,
};

/// Validade do token do painel.
const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    attempts: Arc<dyn LoginAttemptStore>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, attempts: Arc<dyn LoginAttemptStore>, jwt_secret: String) -> Self {
        Self {
            users,
            attempts,
            jwt_secret,
        }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let key = normalize_email(email);
        if self.attempts.is_blocked(&key).await {
            tracing::warn!(email = %key, "Login bloqueado por excesso de tentativas");
            return Err(AppError::TooManyLoginAttempts);
        }

        let Some(user) = self.users.find_by_email(&key).await? else {
            self.attempts.record_failure(&key).await;
            return Err(AppError::InvalidCredentials);
        };

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            self.attempts.record_failure(&key).await;
            return Err(AppError::InvalidCredentials);
        }

        self.attempts.clear(&key).await;
        tracing::info!(user_id = %user.id, "Login do painel");
        issue_token(user.id, &self.jwt_secret, Utc::now())
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = decode_token(token, &self.jwt_secret)?;

        self.users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Cria o administrador inicial se o e-mail ainda não existir.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AppError> {
        let email = normalize_email(email);
        let password_clone = password.to_owned();
        let hashed_password = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let created = self.users.create_if_absent(&email, &hashed_password).await?;
        if created {
            tracing::info!(email = %email, "Administrador inicial criado");
        }
        Ok(created)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn issue_token(user_id: Uuid, secret: &str, now: DateTime<Utc>) -> Result<String, AppError> {
    let expires_at = now + chrono::Duration::days(TOKEN_TTL_DAYS);

    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub(crate) fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_subject() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "segredo", Utc::now()).unwrap();

        let claims = decode_token(&token, "segredo").unwrap();

        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), "segredo", Utc::now()).unwrap();
        assert!(matches!(decode_token(&token, "outro"), Err(AppError::InvalidToken)));

        let long_ago = Utc::now() - chrono::Duration::days(30);
        let expired = issue_token(Uuid::new_v4(), "segredo", long_ago).unwrap();
        assert!(matches!(decode_token(&expired, "segredo"), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn login_with_bootstrap_admin_then_lockout() {
        use std::time::Duration;

        use crate::{db::MemoryUserStore, services::login_attempts::InMemoryLoginAttempts};

        let service = AuthService::new(
            Arc::new(MemoryUserStore::default()),
            Arc::new(InMemoryLoginAttempts::new(2, Duration::from_secs(60))),
            "segredo".to_string(),
        );
        assert!(service.ensure_admin("Admin@Cardapio.bo", "senha-forte").await.unwrap());
        assert!(!service.ensure_admin("admin@cardapio.bo", "outra-senha").await.unwrap());

        let token = service.login_user("admin@cardapio.bo", "senha-forte").await.unwrap();
        let user = service.validate_token(&token).await.unwrap();
        assert_eq!(user.email, "admin@cardapio.bo");

        for _ in 0..2 {
            assert!(matches!(
                service.login_user("admin@cardapio.bo", "errada").await,
                Err(AppError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            service.login_user("admin@cardapio.bo", "senha-forte").await,
            Err(AppError::TooManyLoginAttempts)
        ));
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Admin@Cardapio.BO "), "admin@cardapio.bo");
    }
}
