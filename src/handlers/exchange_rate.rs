// src/handlers/exchange_rate.rs

use axum::{extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::exchange_rate::{ExchangeRate, RateUpdate},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetExchangeRatePayload {
    /// Quantos reais vale 1 boliviano. Positivo, até 6 casas decimais.
    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "2.80")]
    pub value: Decimal,

    /// Recalcular o preço em reais de todos os pratos ativos na mesma operação
    #[serde(default)]
    pub recalculate: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecalculateResponse {
    pub recalculated: u64,
}

#[utoipa::path(
    get,
    path = "/api/menu/exchange-rate",
    tag = "Menu",
    responses(
        (status = 200, description = "Câmbio vigente (null se ainda não configurado)", body = Option<ExchangeRate>)
    )
)]
pub async fn get_exchange_rate(State(app_state): State<AppState>) -> Json<Option<ExchangeRate>> {
    Json(app_state.pricing_service.public_rate().await)
}

#[utoipa::path(
    put,
    path = "/api/admin/exchange-rate",
    tag = "Exchange Rate",
    request_body = SetExchangeRatePayload,
    responses(
        (status = 200, description = "Câmbio trocado", body = RateUpdate),
        (status = 400, description = "Câmbio inválido (nada foi gravado)")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_exchange_rate(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<SetExchangeRatePayload>,
) -> Result<impl IntoResponse, ApiError> {
    // Positividade e escala são regras de domínio: o serviço responde com InvalidInput
    let update = app_state
        .pricing_service
        .set_exchange_rate(payload.value, payload.recalculate)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(update))
}

#[utoipa::path(
    post,
    path = "/api/admin/exchange-rate/recalculate",
    tag = "Exchange Rate",
    responses(
        (status = 200, description = "Preços em reais recalculados com o câmbio vigente", body = RecalculateResponse),
        (status = 409, description = "Câmbio ainda não configurado")
    ),
    security(("api_jwt" = []))
)]
pub async fn recalculate_prices(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let recalculated = app_state
        .pricing_service
        .recalculate_prices()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(RecalculateResponse { recalculated }))
}
