// src/db/memory_store.rs
//
// Catálogo em memória. Escritores se enfileiram num Mutex e trabalham numa cópia
// privada; o commit publica um snapshot imutável novo. Leitores só clonam o Arc
// do snapshot corrente, então nunca veem uma partição pela metade.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::catalog_store::{
        sort_categories, sort_dishes, CatalogStore, CatalogTx, CatalogWrite, LockScope, WriteBatch,
    },
    models::{
        catalog::{Category, CategoryFilter, Dish, DishFilter},
        exchange_rate::ExchangeRate,
    },
};

#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    dishes: HashMap<Uuid, Dish>,
    categories: HashMap<Uuid, Category>,
    exchange_rate: Option<ExchangeRate>,
}

impl CatalogSnapshot {
    fn query_dishes(&self, filter: &DishFilter) -> Vec<Dish> {
        let mut dishes: Vec<Dish> = self.dishes.values().filter(|d| filter.matches(d)).cloned().collect();
        sort_dishes(&mut dishes);
        dishes
    }

    fn query_categories(&self, filter: &CategoryFilter) -> Vec<Category> {
        let mut categories: Vec<Category> =
            self.categories.values().filter(|c| filter.matches(c)).cloned().collect();
        sort_categories(&mut categories);
        categories
    }

    fn count_dishes_in_categories(&self, category_ids: &[Uuid]) -> i64 {
        self.dishes
            .values()
            .filter(|d| d.category_id.is_some_and(|id| category_ids.contains(&id)))
            .count() as i64
    }

    /// Aplica o lote respeitando as mesmas regras das constraints do Postgres.
    fn apply(&mut self, batch: &WriteBatch) -> Result<(), AppError> {
        for write in batch.iter() {
            match write {
                CatalogWrite::PutDish(dish) => {
                    if let Some(category_id) = dish.category_id {
                        if !self.categories.contains_key(&category_id) {
                            return Err(AppError::ReferentialConflict(format!(
                                "categoria {category_id} não existe"
                            )));
                        }
                    }
                    let mut dish = dish.clone();
                    // created_at é imutável depois da criação
                    if let Some(existing) = self.dishes.get(&dish.id) {
                        dish.created_at = existing.created_at;
                    }
                    self.dishes.insert(dish.id, dish);
                }
                CatalogWrite::PutCategory(category) => {
                    let mut category = category.clone();
                    if let Some(existing) = self.categories.get(&category.id) {
                        category.created_at = existing.created_at;
                    }
                    self.categories.insert(category.id, category);
                }
                CatalogWrite::DeleteDish(id) => {
                    self.dishes.remove(id);
                }
                CatalogWrite::DeleteCategory(id) => {
                    if self.count_dishes_in_categories(&[*id]) > 0 {
                        return Err(AppError::ReferentialConflict(format!(
                            "categoria {id} ainda tem pratos"
                        )));
                    }
                    self.categories.remove(id);
                }
                CatalogWrite::PutExchangeRate(rate) => {
                    self.exchange_rate = Some(rate.clone());
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryCatalogStore {
    writer: Arc<Mutex<()>>,
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for MemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            writer: Arc::new(Mutex::new(())),
            current: Arc::new(RwLock::new(Arc::new(CatalogSnapshot::default()))),
            revision: Arc::new(revision),
        }
    }

    /// Snapshot commitado mais recente. Lock envenenado = falha fechada.
    fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, AppError> {
        read_snapshot(&self.current)
    }
}

fn read_snapshot(current: &RwLock<Arc<CatalogSnapshot>>) -> Result<Arc<CatalogSnapshot>, AppError> {
    current
        .read()
        .map(|guard| Arc::clone(&guard))
        .map_err(|_| AppError::InternalServerError(anyhow!("snapshot do catálogo envenenado")))
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn list_dishes(&self, filter: &DishFilter) -> Result<Vec<Dish>, AppError> {
        Ok(self.snapshot()?.query_dishes(filter))
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError> {
        Ok(self.snapshot()?.query_categories(filter))
    }

    async fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, AppError> {
        Ok(self.snapshot()?.dishes.get(&id).cloned())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        Ok(self.snapshot()?.categories.get(&id).cloned())
    }

    async fn exchange_rate(&self) -> Result<Option<ExchangeRate>, AppError> {
        Ok(self.snapshot()?.exchange_rate.clone())
    }

    // Um único Mutex serializa todos os escritores, qualquer que seja o escopo.
    async fn begin(&self, _scopes: &[LockScope]) -> Result<Box<dyn CatalogTx>, AppError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let working = self.snapshot()?.as_ref().clone();
        Ok(Box::new(MemoryCatalogTx {
            _guard: guard,
            working,
            wrote: false,
            current: Arc::clone(&self.current),
            revision: Arc::clone(&self.revision),
        }))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

pub struct MemoryCatalogTx {
    _guard: OwnedMutexGuard<()>,
    working: CatalogSnapshot,
    wrote: bool,
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
    revision: Arc<watch::Sender<u64>>,
}

#[async_trait]
impl CatalogTx for MemoryCatalogTx {
    async fn dish(&mut self, id: Uuid) -> Result<Option<Dish>, AppError> {
        Ok(self.working.dishes.get(&id).cloned())
    }

    async fn category(&mut self, id: Uuid) -> Result<Option<Category>, AppError> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn dishes(&mut self, filter: &DishFilter) -> Result<Vec<Dish>, AppError> {
        Ok(self.working.query_dishes(filter))
    }

    async fn categories(&mut self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError> {
        Ok(self.working.query_categories(filter))
    }

    async fn count_dishes_in_categories(&mut self, category_ids: &[Uuid]) -> Result<i64, AppError> {
        Ok(self.working.count_dishes_in_categories(category_ids))
    }

    async fn exchange_rate(&mut self) -> Result<Option<ExchangeRate>, AppError> {
        Ok(self.working.exchange_rate.clone())
    }

    async fn apply(&mut self, batch: WriteBatch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }
        // Aplica numa cópia: se uma escrita falhar, nenhuma do lote fica.
        let mut staged = self.working.clone();
        staged.apply(&batch)?;
        self.working = staged;
        self.wrote = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let this = *self;
        if !this.wrote {
            return Ok(());
        }
        {
            let mut current = this
                .current
                .write()
                .map_err(|_| AppError::InternalServerError(anyhow!("snapshot do catálogo envenenado")))?;
            *current = Arc::new(this.working);
        }
        this.revision.send_modify(|rev| *rev += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::models::catalog::LocalizedText;

    fn category() -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: LocalizedText::single("es", "Postres"),
            image_url: None,
            order: 1,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn dish(category_id: Option<Uuid>) -> Dish {
        let now = Utc::now();
        Dish {
            id: Uuid::new_v4(),
            name: LocalizedText::single("es", "Helado de canela"),
            description: LocalizedText::default(),
            price_bob: Decimal::ONE,
            price_brl: Decimal::ONE,
            category_id,
            image_url: None,
            is_featured: false,
            order: 1,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = MemoryCatalogStore::new();
        let mut tx = store.begin(&[LockScope::Categories]).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.put_category(category());
        tx.apply(batch).await.unwrap();

        assert!(store.list_categories(&CategoryFilter::active()).await.unwrap().is_empty());
        drop(tx);
        assert!(store.list_categories(&CategoryFilter::active()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_publishes_and_bumps_revision() {
        let store = MemoryCatalogStore::new();
        let mut revisions = store.subscribe();
        let cat = category();

        let mut tx = store.begin(&[LockScope::Categories]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.put_category(cat.clone());
        tx.apply(batch).await.unwrap();
        tx.commit().await.unwrap();

        assert!(revisions.has_changed().unwrap());
        assert_eq!(*revisions.borrow_and_update(), 1);
        assert_eq!(store.find_category(cat.id).await.unwrap(), Some(cat));
    }

    #[tokio::test]
    async fn empty_commit_does_not_bump_revision() {
        let store = MemoryCatalogStore::new();
        let revisions = store.subscribe();

        let tx = store.begin(&[LockScope::Dishes]).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!revisions.has_changed().unwrap());
    }

    #[tokio::test]
    async fn failing_batch_leaves_nothing_behind() {
        let store = MemoryCatalogStore::new();
        let cat = category();

        let mut tx = store.begin(&[LockScope::Categories, LockScope::Dishes]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.put_category(cat.clone()).put_dish(dish(Some(cat.id)));
        tx.apply(batch).await.unwrap();

        let mut doomed = WriteBatch::new();
        doomed.put_dish(dish(None)).delete_category(cat.id);
        let result = tx.apply(doomed).await;
        assert!(matches!(result, Err(AppError::ReferentialConflict(_))));

        tx.commit().await.unwrap();
        assert_eq!(store.list_dishes(&DishFilter::active()).await.unwrap().len(), 1);
        assert!(store.find_category(cat.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn counts_references_across_several_categories() {
        let store = MemoryCatalogStore::new();
        let (sopas, postres, bebidas) = (category(), category(), category());

        let mut tx = store.begin(&[LockScope::Categories, LockScope::Dishes]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch
            .put_category(sopas.clone())
            .put_category(postres.clone())
            .put_category(bebidas.clone())
            .put_dish(dish(Some(sopas.id)))
            .put_dish(dish(Some(postres.id)))
            .put_dish(dish(None));
        tx.apply(batch).await.unwrap();

        assert_eq!(tx.count_dishes_in_categories(&[sopas.id, postres.id]).await.unwrap(), 2);
        assert_eq!(tx.count_dishes_in_categories(&[bebidas.id]).await.unwrap(), 0);
        assert_eq!(tx.count_dishes_in_categories(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn created_at_survives_overwrites() {
        let store = MemoryCatalogStore::new();
        let cat = category();

        let mut tx = store.begin(&[LockScope::Categories]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.put_category(cat.clone());
        tx.apply(batch).await.unwrap();

        let mut changed = cat.clone();
        changed.created_at = cat.created_at + chrono::Duration::days(1);
        let mut batch = WriteBatch::new();
        batch.put_category(changed);
        tx.apply(batch).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.find_category(cat.id).await.unwrap().unwrap();
        assert_eq!(stored.created_at, cat.created_at);
    }
}
