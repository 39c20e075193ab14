// src/handlers/categories.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    catalog::ordering::{Direction, MoveOutcome},
    common::error::{ApiError, AppError},
    config::AppState,
    handlers::dishes::PurgeResponse,
    middleware::i18n::Locale,
    models::catalog::{Category, CategoryDraft, CategoryFilter, RecordState, TextInput},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    pub name: TextInput,

    #[validate(length(max = 2048, message = "URL da imagem longa demais."))]
    pub image_url: Option<String>,
}

impl CategoryPayload {
    fn into_draft(self) -> CategoryDraft {
        CategoryDraft {
            name: self.name.normalize(),
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCategoriesQuery {
    /// active (padrão), trashed ou all
    pub state: Option<RecordState>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryReorderResponse {
    pub moved: bool,
    pub items: Vec<Category>,
}

#[utoipa::path(
    get,
    path = "/api/admin/categories",
    tag = "Categories",
    params(ListCategoriesQuery),
    responses(
        (status = 200, description = "Categorias do painel", body = Vec<Category>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = CategoryFilter {
        state: query.state.unwrap_or_default(),
    };

    let categories = app_state
        .catalog_service
        .list_categories(&filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(categories))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    tag = "Categories",
    request_body = CategoryPayload,
    responses(
        (status = 201, description = "Categoria criada no fim da lista", body = Category),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_category(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let category = app_state
        .catalog_service
        .create_category(payload.into_draft())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    tag = "Categories",
    request_body = CategoryPayload,
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria atualizada", body = Category),
        (status = 404, description = "Categoria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_category(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let category = app_state
        .catalog_service
        .update_category(id, payload.into_draft())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/trash",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria na lixeira", body = Category),
        (status = 404, description = "Categoria ativa não encontrada"),
        (status = 409, description = "Categoria ainda tem pratos")
    ),
    security(("api_jwt" = []))
)]
pub async fn trash_category(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = app_state
        .catalog_service
        .trash_category(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(category))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/restore",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria restaurada no fim da lista", body = Category),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Categoria não está na lixeira")
    ),
    security(("api_jwt" = []))
)]
pub async fn restore_category(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = app_state
        .catalog_service
        .restore_category(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 204, description = "Categoria apagada definitivamente"),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Categoria ativa ou ainda com pratos")
    ),
    security(("api_jwt" = []))
)]
pub async fn purge_category(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .catalog_service
        .purge_category(id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/trash",
    tag = "Categories",
    responses(
        (status = 200, description = "Lixeira de categorias esvaziada", body = PurgeResponse),
        (status = 409, description = "Alguma categoria da lixeira ainda tem pratos")
    ),
    security(("api_jwt" = []))
)]
pub async fn purge_trashed_categories(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let purged = app_state
        .catalog_service
        .purge_trashed_categories()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(PurgeResponse { purged }))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/move-up",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categorias depois da troca", body = CategoryReorderResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn move_category_up(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_category(app_state, locale, id, Direction::Up).await
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/move-down",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categorias depois da troca", body = CategoryReorderResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn move_category_down(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    move_category(app_state, locale, id, Direction::Down).await
}

async fn move_category(
    app_state: AppState,
    locale: Locale,
    id: Uuid,
    direction: Direction,
) -> Result<Json<CategoryReorderResponse>, ApiError> {
    let (outcome, items) = app_state
        .catalog_service
        .move_category(id, direction)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(CategoryReorderResponse {
        moved: matches!(outcome, MoveOutcome::Swapped { .. }),
        items,
    }))
}
