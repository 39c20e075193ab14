//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod catalog;
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; sem ele, info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!().run(pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    bootstrap(&app_state).await?;

    // Log + auditoria a cada revisão publicada do cardápio
    tokio::spawn(app_state.catalog_service.clone().watch_published_menu());

    // Rotas de autenticação (públicas)
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    // Rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    // Cardápio público: só leitura, sem login
    let menu_routes = Router::new()
        .route("/categories", get(handlers::menu::list_categories))
        .route("/dishes", get(handlers::menu::list_dishes))
        .route("/featured", get(handlers::menu::list_featured))
        .route("/exchange-rate", get(handlers::exchange_rate::get_exchange_rate))
        .route("/pdf", get(handlers::menu::menu_pdf));

    let dish_routes = Router::new()
        .route(
            "/",
            get(handlers::dishes::list_dishes).post(handlers::dishes::create_dish),
        )
        .route("/trash", delete(handlers::dishes::purge_trashed_dishes))
        .route(
            "/{id}",
            put(handlers::dishes::update_dish).delete(handlers::dishes::purge_dish),
        )
        .route("/{id}/featured", put(handlers::dishes::set_featured))
        .route("/{id}/trash", post(handlers::dishes::trash_dish))
        .route("/{id}/restore", post(handlers::dishes::restore_dish))
        .route("/{id}/move-up", post(handlers::dishes::move_dish_up))
        .route("/{id}/move-down", post(handlers::dishes::move_dish_down));

    let category_routes = Router::new()
        .route(
            "/",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route("/trash", delete(handlers::categories::purge_trashed_categories))
        .route(
            "/{id}",
            put(handlers::categories::update_category).delete(handlers::categories::purge_category),
        )
        .route("/{id}/trash", post(handlers::categories::trash_category))
        .route("/{id}/restore", post(handlers::categories::restore_category))
        .route("/{id}/move-up", post(handlers::categories::move_category_up))
        .route("/{id}/move-down", post(handlers::categories::move_category_down));

    let exchange_rate_routes = Router::new()
        .route("/", put(handlers::exchange_rate::set_exchange_rate))
        .route("/recalculate", post(handlers::exchange_rate::recalculate_prices));

    // Painel administrativo: tudo atrás do JWT
    let admin_routes = Router::new()
        .nest("/dishes", dish_routes)
        .nest("/categories", category_routes)
        .nest("/exchange-rate", exchange_rate_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let bind_addr = app_state.config.bind_addr.clone();

    // Combina tudo no router principal
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/menu", menu_routes)
        .nest("/api/admin", admin_routes)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

// Câmbio inicial e administrador inicial; nenhum dos dois sobrescreve o que já existe
async fn bootstrap(app_state: &AppState) -> anyhow::Result<()> {
    if let Some(rate) = app_state.config.initial_exchange_rate {
        if app_state.pricing_service.seed_initial_rate(rate).await? {
            tracing::info!(%rate, "Câmbio inicial gravado");
        }
    }

    match (&app_state.config.admin_email, &app_state.config.admin_password) {
        (Some(email), Some(password)) => {
            app_state.auth_service.ensure_admin(email, password).await?;
        }
        _ => tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD ausentes: nenhum administrador inicial criado"),
    }

    Ok(())
}
