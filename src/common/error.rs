use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// As cinco primeiras variantes são os erros de domínio do catálogo.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Registro não encontrado: {0}")]
    NotFound(String),

    #[error("Estado inválido: {0}")]
    InvalidState(String),

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Conflito de referência: {0}")]
    ReferentialConflict(String),

    #[error("Conflito de concorrência, tente novamente")]
    ConcurrencyConflict,

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Muitas tentativas de login")]
    TooManyLoginAttempts,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Conversão manual (e não #[from]) para separar corrida de transação,
// violação de FK e o resto.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if crate::common::db_utils::is_concurrency_conflict(&err) {
            return AppError::ConcurrencyConflict;
        }
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_foreign_key_violation() {
                return AppError::ReferentialConflict(
                    db_err.constraint().unwrap_or("foreign key").to_string(),
                );
            }
        }
        AppError::DatabaseError(err)
    }
}

impl AppError {
    /// Código estável enviado ao front-end junto da mensagem traduzida.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::ReferentialConflict(_) => "REFERENTIAL_CONFLICT",
            AppError::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TooManyLoginAttempts => "TOO_MANY_ATTEMPTS",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidState(_)
            | AppError::ReferentialConflict(_)
            | AppError::ConcurrencyConflict => StatusCode::CONFLICT,
            AppError::InvalidInput(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::TooManyLoginAttempts => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::NotFound(reason)
            | AppError::InvalidState(reason)
            | AppError::InvalidInput(reason)
            | AppError::ReferentialConflict(reason) => Some(json!({ "reason": reason })),
            _ => None,
        }
    }

    /// Converte o erro numa resposta traduzida para o idioma do cliente.
    /// Erros internos são logados aqui e nunca vazam detalhes.
    pub fn to_api_error(&self, locale: &Locale, i18n: &I18nStore) -> ApiError {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {:?}", self);
        }
        ApiError {
            status,
            code: self.code(),
            error: i18n.message(&locale.0, self.code()),
            details: self.details(),
        }
    }
}

// Resposta de erro já traduzida, pronta para o cliente.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// Usado pelo middleware de autenticação, onde ainda não temos o idioma.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::default())
            .into_response()
    }
}
