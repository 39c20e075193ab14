// src/handlers/dishes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    catalog::ordering::{Direction, MoveOutcome},
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::catalog::{Dish, DishDraft, DishFilter, RecordState, TextInput},
};

// ---
// Validação Customizada
// ---
pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DishPayload {
    /// Texto simples (legado) ou objeto por idioma: { "es": "...", "pt": "..." }
    pub name: TextInput,

    #[serde(default)]
    pub description: Option<TextInput>,

    #[serde(with = "rust_decimal::serde::str")]
    #[schema(value_type = String, example = "10.00")]
    #[validate(custom(function = "validate_not_negative"))]
    pub price_bob: Decimal,

    pub category_id: Option<Uuid>,

    #[validate(length(max = 2048, message = "URL da imagem longa demais."))]
    pub image_url: Option<String>,

    pub is_featured: Option<bool>,
}

impl DishPayload {
    fn into_draft(self) -> DishDraft {
        DishDraft {
            name: self.name.normalize(),
            description: self.description.map(TextInput::normalize).unwrap_or_default(),
            price_bob: self.price_bob,
            category_id: self.category_id,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            is_featured: self.is_featured,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedPayload {
    pub is_featured: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListDishesQuery {
    /// active (padrão), trashed ou all
    pub state: Option<RecordState>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DishReorderResponse {
    /// `false` quando o prato já estava no limite da lista
    pub moved: bool,
    pub items: Vec<Dish>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub purged: u64,
}

// ---
// Handlers
// ---
#[utoipa::path(
    get,
    path = "/api/admin/dishes",
    tag = "Dishes",
    params(ListDishesQuery),
    responses(
        (status = 200, description = "Pratos do painel (inclui a lixeira se pedido)", body = Vec<Dish>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_dishes(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<ListDishesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = DishFilter::with_state(query.state.unwrap_or_default()).in_category(query.category_id);

    let dishes = app_state
        .catalog_service
        .list_dishes(&filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(dishes))
}

#[utoipa::path(
    post,
    path = "/api/admin/dishes",
    tag = "Dishes",
    request_body = DishPayload,
    responses(
        (status = 201, description = "Prato criado no fim da sua lista", body = Dish),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Câmbio ainda não configurado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_dish(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<DishPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let dish = app_state
        .catalog_service
        .create_dish(payload.into_draft())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(dish)))
}

#[utoipa::path(
    put,
    path = "/api/admin/dishes/{id}",
    tag = "Dishes",
    request_body = DishPayload,
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Prato atualizado", body = Dish),
        (status = 404, description = "Prato não encontrado"),
        (status = 409, description = "Prato na lixeira")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_dish(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<DishPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let dish = app_state
        .catalog_service
        .update_dish(id, payload.into_draft())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(dish))
}

#[utoipa::path(
    put,
    path = "/api/admin/dishes/{id}/featured",
    tag = "Dishes",
    request_body = FeaturedPayload,
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Destaque alterado", body = Dish),
        (status = 404, description = "Prato ativo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_featured(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeaturedPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let dish = app_state
        .catalog_service
        .set_featured(id, payload.is_featured)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(dish))
}

#[utoipa::path(
    post,
    path = "/api/admin/dishes/{id}/trash",
    tag = "Dishes",
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Prato na lixeira", body = Dish),
        (status = 404, description = "Prato ativo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn trash_dish(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let dish = app_state
        .catalog_service
        .trash_dish(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(dish))
}

#[utoipa::path(
    post,
    path = "/api/admin/dishes/{id}/restore",
    tag = "Dishes",
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Prato restaurado no fim da lista", body = Dish),
        (status = 404, description = "Prato não encontrado"),
        (status = 409, description = "Prato não está na lixeira")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_dish(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let dish = app_state
        .catalog_service
        .restore_dish(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(dish))
}

#[utoipa::path(
    delete,
    path = "/api/admin/dishes/{id}",
    tag = "Dishes",
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 204, description = "Prato apagado definitivamente"),
        (status = 404, description = "Prato não encontrado"),
        (status = 409, description = "Prato ainda ativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn purge_dish(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .catalog_service
        .purge_dish(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/admin/dishes/trash",
    tag = "Dishes",
    responses(
        (status = 200, description = "Lixeira de pratos esvaziada", body = PurgeResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn purge_trashed_dishes(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let purged = app_state
        .catalog_service
        .purge_trashed_dishes()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(PurgeResponse { purged }))
}

#[utoipa::path(
    post,
    path = "/api/admin/dishes/{id}/move-up",
    tag = "Dishes",
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Lista do prato depois da troca", body = DishReorderResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn move_dish_up(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_dish(app_state, locale, id, Direction::Up).await
}

#[utoipa::path(
    post,
    path = "/api/admin/dishes/{id}/move-down",
    tag = "Dishes",
    params(("id" = Uuid, Path, description = "ID do prato")),
    responses(
        (status = 200, description = "Lista do prato depois da troca", body = DishReorderResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn move_dish_down(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_dish(app_state, locale, id, Direction::Down).await
}

async fn move_dish(
    app_state: AppState,
    locale: Locale,
    id: Uuid,
    direction: Direction,
) -> Result<Json<DishReorderResponse>, ApiError> {
    let (outcome, items) = app_state
        .catalog_service
        .move_dish(id, direction)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(DishReorderResponse {
        moved: matches!(outcome, MoveOutcome::Swapped { .. }),
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_accepts_legacy_and_localized_names() {
        let legacy: DishPayload =
            serde_json::from_str(r#"{ "name": "Salteña", "priceBob": "12.50" }"#).unwrap();
        let localized: DishPayload = serde_json::from_str(
            r#"{ "name": { "es": "Salteña", "pt": "Empanada" }, "priceBob": "12.50", "isFeatured": true }"#,
        )
        .unwrap();

        let legacy = legacy.into_draft();
        let localized = localized.into_draft();

        assert_eq!(legacy.name.resolve("pt"), Some("Salteña"));
        assert_eq!(localized.name.resolve("pt"), Some("Empanada"));
        assert_eq!(localized.is_featured, Some(true));
        assert_eq!(legacy.price_bob, Decimal::new(1250, 2));
    }

    #[test]
    fn negative_price_fails_validation() {
        let payload: DishPayload = serde_json::from_str(r#"{ "name": "Api", "priceBob": "-0.50" }"#).unwrap();
        assert!(payload.validate().is_err());
    }
}
