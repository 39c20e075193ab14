// src/config.rs

use std::{env, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{CatalogStore, MemoryCatalogStore, MemoryUserStore, PgCatalogStore, UserRepository, UserStore},
    services::{
        auth::AuthService, catalog_service::CatalogService, document_service::DocumentService,
        image_cleanup::FsImageCleanup, login_attempts::InMemoryLoginAttempts, pricing_service::PricingService,
    },
};

/// Onde o catálogo e os administradores ficam guardados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Tudo em memória: some quando o processo termina. Para demo e desenvolvimento.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("esperado 'postgres' ou 'memory', recebido '{other}'")),
        }
    }
}

/// Configuração lida do ambiente (.env em desenvolvimento).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    /// Obrigatória só com o backend Postgres
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub fonts_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub public_menu_url: Option<String>,
    /// Câmbio gravado no primeiro boot, se ainda não houver nenhum
    pub initial_exchange_rate: Option<Decimal>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub login_max_attempts: u32,
    pub login_window: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store_backend = parsed("CATALOG_STORE")?.unwrap_or(StoreBackend::Postgres);
        let database_url = match store_backend {
            StoreBackend::Postgres => Some(required("DATABASE_URL")?),
            StoreBackend::Memory => None,
        };

        Ok(Self {
            store_backend,
            database_url,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parsed("DB_MAX_CONNECTIONS")?.unwrap_or(5),
            fonts_dir: optional("FONTS_DIR").unwrap_or_else(|| "./fonts".to_string()).into(),
            uploads_dir: optional("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string()).into(),
            public_menu_url: optional("PUBLIC_MENU_URL"),
            initial_exchange_rate: parsed("INITIAL_EXCHANGE_RATE")?,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
            login_max_attempts: parsed("LOGIN_MAX_ATTEMPTS")?.unwrap_or(5),
            login_window: Duration::from_secs(parsed("LOGIN_WINDOW_SECS")?.unwrap_or(900)),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).with_context(|| format!("{key} deve ser definida"))
}

// Variável vazia conta como ausente
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key)
        .map(|raw| raw.parse::<T>().map_err(|e| anyhow::anyhow!("{key} inválida ({raw}): {e}")))
        .transpose()
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    /// `None` com o backend em memória
    pub db_pool: Option<PgPool>,
    pub config: Arc<AppConfig>,
    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub pricing_service: PricingService,
    pub document_service: DocumentService,
    pub i18n_store: Arc<I18nStore>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let (db_pool, store, users): (Option<PgPool>, Arc<dyn CatalogStore>, Arc<dyn UserStore>) =
            match &config.database_url {
                Some(database_url) => {
                    // Conecta ao banco de dados, usando '?' para propagar erros
                    let pool = PgPoolOptions::new()
                        .max_connections(config.db_max_connections)
                        .acquire_timeout(Duration::from_secs(3))
                        .connect(database_url)
                        .await
                        .context("Falha ao conectar no banco de dados")?;
                    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                    (
                        Some(pool.clone()),
                        Arc::new(PgCatalogStore::new(pool.clone())),
                        Arc::new(UserRepository::new(pool)),
                    )
                }
                None => {
                    tracing::warn!("CATALOG_STORE=memory: catálogo e administradores não sobrevivem a um restart");
                    (
                        None,
                        Arc::new(MemoryCatalogStore::new()),
                        Arc::new(MemoryUserStore::default()),
                    )
                }
            };

        // --- Monta o gráfico de dependências ---
        let images = Arc::new(FsImageCleanup::new(config.uploads_dir.clone()));
        let attempts = Arc::new(InMemoryLoginAttempts::new(config.login_max_attempts, config.login_window));

        let auth_service = AuthService::new(users, attempts, config.jwt_secret.clone());
        let catalog_service = CatalogService::new(store.clone(), images);
        let pricing_service = PricingService::new(store);
        let document_service = DocumentService::new(
            catalog_service.clone(),
            pricing_service.clone(),
            config.fonts_dir.clone(),
            config.public_menu_url.clone(),
        );

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            auth_service,
            catalog_service,
            pricing_service,
            document_service,
            i18n_store: Arc::new(I18nStore::default()),
        })
    }
}
