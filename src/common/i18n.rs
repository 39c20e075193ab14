// src/common/i18n.rs

use std::collections::HashMap;

pub const DEFAULT_LANG: &str = "en";

// (idioma, código do erro, mensagem)
const MESSAGES: &[(&str, &str, &str)] = &[
    // --- Português ---
    ("pt", "NOT_FOUND", "Registro não encontrado."),
    ("pt", "INVALID_STATE", "A operação não é permitida no estado atual do registro."),
    ("pt", "INVALID_INPUT", "Os dados enviados são inválidos."),
    ("pt", "REFERENTIAL_CONFLICT", "O registro ainda é usado por outros itens do cardápio."),
    ("pt", "CONCURRENCY_CONFLICT", "Outro administrador alterou o cardápio ao mesmo tempo. Tente novamente."),
    ("pt", "VALIDATION_ERROR", "Um ou mais campos são inválidos."),
    ("pt", "INVALID_CREDENTIALS", "E-mail ou senha inválidos."),
    ("pt", "TOO_MANY_ATTEMPTS", "Muitas tentativas de login. Aguarde alguns minutos."),
    ("pt", "INVALID_TOKEN", "Token de autenticação inválido ou ausente."),
    ("pt", "USER_NOT_FOUND", "Usuário não encontrado."),
    ("pt", "INTERNAL_ERROR", "Ocorreu um erro inesperado."),
    // --- Español ---
    ("es", "NOT_FOUND", "Registro no encontrado."),
    ("es", "INVALID_STATE", "La operación no está permitida en el estado actual del registro."),
    ("es", "INVALID_INPUT", "Los datos enviados no son válidos."),
    ("es", "REFERENTIAL_CONFLICT", "El registro todavía es usado por otros elementos del menú."),
    ("es", "CONCURRENCY_CONFLICT", "Otro administrador modificó el menú al mismo tiempo. Inténtelo de nuevo."),
    ("es", "VALIDATION_ERROR", "Uno o más campos no son válidos."),
    ("es", "INVALID_CREDENTIALS", "Correo o contraseña incorrectos."),
    ("es", "TOO_MANY_ATTEMPTS", "Demasiados intentos de inicio de sesión. Espere unos minutos."),
    ("es", "INVALID_TOKEN", "Token de autenticación inválido o ausente."),
    ("es", "USER_NOT_FOUND", "Usuario no encontrado."),
    ("es", "INTERNAL_ERROR", "Ocurrió un error inesperado."),
    // --- English ---
    ("en", "NOT_FOUND", "Record not found."),
    ("en", "INVALID_STATE", "The operation is not allowed in the record's current state."),
    ("en", "INVALID_INPUT", "The submitted data is invalid."),
    ("en", "REFERENTIAL_CONFLICT", "The record is still referenced by other menu items."),
    ("en", "CONCURRENCY_CONFLICT", "Another administrator changed the menu at the same time. Please retry."),
    ("en", "VALIDATION_ERROR", "One or more fields are invalid."),
    ("en", "INVALID_CREDENTIALS", "Invalid e-mail or password."),
    ("en", "TOO_MANY_ATTEMPTS", "Too many login attempts. Please wait a few minutes."),
    ("en", "INVALID_TOKEN", "Missing or invalid authentication token."),
    ("en", "USER_NOT_FOUND", "User not found."),
    ("en", "INTERNAL_ERROR", "An unexpected error occurred."),
];

/// Tabela de mensagens de erro do painel, por idioma.
#[derive(Debug, Clone)]
pub struct I18nStore {
    messages: HashMap<(String, String), String>,
}

impl Default for I18nStore {
    fn default() -> Self {
        let messages = MESSAGES
            .iter()
            .map(|(lang, code, msg)| ((lang.to_string(), code.to_string()), msg.to_string()))
            .collect();
        Self { messages }
    }
}

impl I18nStore {
    /// Busca a mensagem no idioma pedido, cai para o inglês e, por último, devolve o próprio código.
    pub fn message(&self, lang: &str, code: &str) -> String {
        self.messages
            .get(&(lang.to_string(), code.to_string()))
            .or_else(|| self.messages.get(&(DEFAULT_LANG.to_string(), code.to_string())))
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_english_then_code() {
        let store = I18nStore::default();
        assert_eq!(store.message("es", "NOT_FOUND"), "Registro no encontrado.");
        assert_eq!(store.message("fr", "NOT_FOUND"), "Record not found.");
        assert_eq!(store.message("pt", "SOMETHING_ELSE"), "SOMETHING_ELSE");
    }
}
