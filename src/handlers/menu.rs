// src/handlers/menu.rs
//
// Cardápio público. Nenhuma rota daqui devolve erro de leitura: no pior caso,
// lista vazia (o serviço já registrou a falha no log).

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::catalog::{Category, Dish},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct MenuDishesQuery {
    pub category_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/menu/categories",
    tag = "Menu",
    responses((status = 200, description = "Categorias ativas, na ordem do cardápio", body = Vec<Category>))
)]
pub async fn list_categories(State(app_state): State<AppState>) -> Json<Vec<Category>> {
    Json(app_state.catalog_service.list_active_categories().await)
}

#[utoipa::path(
    get,
    path = "/api/menu/dishes",
    tag = "Menu",
    params(MenuDishesQuery),
    responses((status = 200, description = "Pratos ativos: destaques primeiro, depois a ordem da lista", body = Vec<Dish>))
)]
pub async fn list_dishes(
    State(app_state): State<AppState>,
    Query(query): Query<MenuDishesQuery>,
) -> Json<Vec<Dish>> {
    Json(app_state.catalog_service.list_active_dishes(query.category_id).await)
}

#[utoipa::path(
    get,
    path = "/api/menu/featured",
    tag = "Menu",
    responses((status = 200, description = "Pratos em destaque", body = Vec<Dish>))
)]
pub async fn list_featured(State(app_state): State<AppState>) -> Json<Vec<Dish>> {
    Json(app_state.catalog_service.list_featured_dishes().await)
}

#[utoipa::path(
    get,
    path = "/api/menu/pdf",
    tag = "Menu",
    responses(
        (status = 200, description = "Cardápio em PDF (application/pdf)"),
        (status = 500, description = "Fonte ausente ou falha ao montar o PDF")
    )
)]
pub async fn menu_pdf(State(app_state): State<AppState>, locale: Locale) -> Result<Response, ApiError> {
    let pdf_bytes = app_state
        .document_service
        .generate_menu_pdf(&locale.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf"),
        (header::CONTENT_DISPOSITION, "inline; filename=\"cardapio.pdf\""),
    ];

    Ok((headers, pdf_bytes).into_response())
}
