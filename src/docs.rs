// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Menu (público) ---
        handlers::menu::list_categories,
        handlers::menu::list_dishes,
        handlers::menu::list_featured,
        handlers::menu::menu_pdf,
        handlers::exchange_rate::get_exchange_rate,

        // --- Dishes ---
        handlers::dishes::list_dishes,
        handlers::dishes::create_dish,
        handlers::dishes::update_dish,
        handlers::dishes::set_featured,
        handlers::dishes::trash_dish,
        handlers::dishes::restore_dish,
        handlers::dishes::purge_dish,
        handlers::dishes::purge_trashed_dishes,
        handlers::dishes::move_dish_up,
        handlers::dishes::move_dish_down,

        // --- Categories ---
        handlers::categories::list_categories,
        handlers::categories::create_category,
        handlers::categories::update_category,
        handlers::categories::trash_category,
        handlers::categories::restore_category,
        handlers::categories::purge_category,
        handlers::categories::purge_trashed_categories,
        handlers::categories::move_category_up,
        handlers::categories::move_category_down,

        // --- Exchange Rate ---
        handlers::exchange_rate::set_exchange_rate,
        handlers::exchange_rate::recalculate_prices,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Catálogo ---
            models::catalog::LocalizedText,
            models::catalog::TextInput,
            models::catalog::RecordState,
            models::catalog::Dish,
            models::catalog::Category,
            models::exchange_rate::ExchangeRate,
            models::exchange_rate::RateUpdate,

            // --- Payloads ---
            handlers::dishes::DishPayload,
            handlers::dishes::FeaturedPayload,
            handlers::dishes::DishReorderResponse,
            handlers::dishes::PurgeResponse,
            handlers::categories::CategoryPayload,
            handlers::categories::CategoryReorderResponse,
            handlers::exchange_rate::SetExchangeRatePayload,
            handlers::exchange_rate::RecalculateResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Login do painel"),
        (name = "Users", description = "Administrador logado"),
        (name = "Menu", description = "Cardápio público (somente leitura)"),
        (name = "Dishes", description = "Pratos: cadastro, lixeira, destaque e ordem"),
        (name = "Categories", description = "Categorias: cadastro, lixeira e ordem"),
        (name = "Exchange Rate", description = "Câmbio BOB -> BRL e recálculo de preços")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
