// src/models/exchange_rate.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::common::error::AppError;

/// Máximo de casas decimais aceitas no câmbio.
pub const RATE_MAX_SCALE: u32 = 6;

/// Teto de sanidade: 1 BOB nunca vale 100 BRL. Pega erro de digitação ("280" no lugar de "2.80").
pub const RATE_CEILING: Decimal = Decimal::ONE_HUNDRED;

/// Câmbio BOB -> BRL vigente. Só existe um, e ele é sempre substituído por inteiro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    #[schema(value_type = f64, example = 2.7)]
    pub value: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Valida o valor (positivo, no máximo 6 casas, abaixo do teto) antes de criar o câmbio.
    pub fn try_new(value: Decimal, updated_at: DateTime<Utc>) -> Result<Self, AppError> {
        let value = value.normalize();

        if value <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "O câmbio deve ser positivo (recebido {value})"
            )));
        }
        if value.scale() > RATE_MAX_SCALE {
            return Err(AppError::InvalidInput(format!(
                "O câmbio aceita no máximo {RATE_MAX_SCALE} casas decimais (recebido {value})"
            )));
        }
        if value > RATE_CEILING {
            return Err(AppError::InvalidInput(format!(
                "O câmbio {value} excede o teto de {RATE_CEILING}"
            )));
        }

        Ok(Self { value, updated_at })
    }
}

/// Resposta da troca de câmbio.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateUpdate {
    pub rate: ExchangeRate,
    /// Pratos com preço em reais alterado; `None` quando o recálculo não foi pedido.
    pub recalculated: Option<u64>,
}
