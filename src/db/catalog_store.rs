// src/db/catalog_store.rs

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        catalog::{Category, CategoryFilter, Dish, DishFilter},
        exchange_rate::ExchangeRate,
    },
};

/// Família de partições que um escritor trava durante a transação.
/// A ordem das variantes é a ordem de aquisição (evita deadlock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockScope {
    Categories,
    Dishes,
    ExchangeRate,
}

impl LockScope {
    /// Chave do advisory lock no Postgres.
    pub fn lock_key(self) -> i64 {
        match self {
            LockScope::Categories => 0x4341_5400_0001,
            LockScope::Dishes => 0x4341_5400_0002,
            LockScope::ExchangeRate => 0x4341_5400_0003,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogWrite {
    PutDish(Dish),
    PutCategory(Category),
    DeleteDish(Uuid),
    DeleteCategory(Uuid),
    PutExchangeRate(ExchangeRate),
}

/// Lote de escritas aplicado de forma atômica: ou tudo, ou nada.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<CatalogWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Se o prato já está no lote, a versão mais nova substitui a anterior.
    pub fn put_dish(&mut self, dish: Dish) -> &mut Self {
        match self
            .writes
            .iter_mut()
            .find(|w| matches!(w, CatalogWrite::PutDish(d) if d.id == dish.id))
        {
            Some(slot) => *slot = CatalogWrite::PutDish(dish),
            None => self.writes.push(CatalogWrite::PutDish(dish)),
        }
        self
    }

    pub fn put_category(&mut self, category: Category) -> &mut Self {
        match self
            .writes
            .iter_mut()
            .find(|w| matches!(w, CatalogWrite::PutCategory(c) if c.id == category.id))
        {
            Some(slot) => *slot = CatalogWrite::PutCategory(category),
            None => self.writes.push(CatalogWrite::PutCategory(category)),
        }
        self
    }

    pub fn delete_dish(&mut self, id: Uuid) -> &mut Self {
        self.writes.push(CatalogWrite::DeleteDish(id));
        self
    }

    pub fn delete_category(&mut self, id: Uuid) -> &mut Self {
        self.writes.push(CatalogWrite::DeleteCategory(id));
        self
    }

    pub fn put_exchange_rate(&mut self, rate: ExchangeRate) -> &mut Self {
        self.writes.push(CatalogWrite::PutExchangeRate(rate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogWrite> {
        self.writes.iter()
    }
}

/// Persistência do catálogo.
///
/// Leituras fora de transação sempre enxergam um snapshot já commitado;
/// escritas passam por [`CatalogStore::begin`].
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Resultado ordenado por [`Dish::display_key`].
    async fn list_dishes(&self, filter: &DishFilter) -> Result<Vec<Dish>, AppError>;

    /// Resultado ordenado por [`Category::display_key`].
    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError>;

    async fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, AppError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError>;

    async fn exchange_rate(&self) -> Result<Option<ExchangeRate>, AppError>;

    /// Abre uma transação já segurando as travas pedidas.
    async fn begin(&self, scopes: &[LockScope]) -> Result<Box<dyn CatalogTx>, AppError>;

    /// Revisão do catálogo, incrementada a cada commit que escreveu algo.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Transação de escrita. Sair de escopo sem `commit` descarta tudo.
#[async_trait]
pub trait CatalogTx: Send {
    async fn dish(&mut self, id: Uuid) -> Result<Option<Dish>, AppError>;

    async fn category(&mut self, id: Uuid) -> Result<Option<Category>, AppError>;

    async fn dishes(&mut self, filter: &DishFilter) -> Result<Vec<Dish>, AppError>;

    async fn categories(&mut self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError>;

    /// Pratos (ativos ou na lixeira) que apontam para qualquer uma das categorias.
    async fn count_dishes_in_categories(&mut self, category_ids: &[Uuid]) -> Result<i64, AppError>;

    async fn exchange_rate(&mut self) -> Result<Option<ExchangeRate>, AppError>;

    async fn apply(&mut self, batch: WriteBatch) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

pub(crate) fn sort_dishes(dishes: &mut [Dish]) {
    dishes.sort_by_key(Dish::display_key);
}

pub(crate) fn sort_categories(categories: &mut [Category]) {
    categories.sort_by_key(Category::display_key);
}
