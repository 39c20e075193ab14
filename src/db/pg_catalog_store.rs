// src/db/pg_catalog_store.rs

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{types::Json, Executor, PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    common::{db_utils::advisory_xact_lock, error::AppError},
    db::catalog_store::{CatalogStore, CatalogTx, CatalogWrite, LockScope, WriteBatch},
    models::{
        catalog::{Category, CategoryFilter, Dish, DishFilter, RecordState},
        exchange_rate::ExchangeRate,
    },
};

// ---
// Consultas compartilhadas entre a pool (leitura pública) e a transação
// ---

fn push_state(qb: &mut QueryBuilder<'_, Postgres>, state: RecordState) {
    match state {
        RecordState::Active => {
            qb.push(" AND active = TRUE");
        }
        RecordState::Trashed => {
            qb.push(" AND active = FALSE");
        }
        RecordState::All => {}
    }
}

async fn fetch_dishes<'e, E>(executor: E, filter: &DishFilter) -> Result<Vec<Dish>, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM dishes WHERE TRUE");
    push_state(&mut qb, filter.state);
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(featured) = filter.featured {
        qb.push(" AND is_featured = ").push_bind(featured);
    }
    // Mesma ordem de Dish::display_key
    qb.push(" ORDER BY active DESC, is_featured DESC, sort_order ASC, id ASC");

    let dishes = qb.build_query_as::<Dish>().fetch_all(executor).await?;
    Ok(dishes)
}

async fn fetch_categories<'e, E>(executor: E, filter: &CategoryFilter) -> Result<Vec<Category>, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM categories WHERE TRUE");
    push_state(&mut qb, filter.state);
    qb.push(" ORDER BY active DESC, sort_order ASC, id ASC");

    let categories = qb.build_query_as::<Category>().fetch_all(executor).await?;
    Ok(categories)
}

async fn fetch_exchange_rate<'e, E>(executor: E) -> Result<Option<ExchangeRate>, AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rate = sqlx::query_as::<_, ExchangeRate>("SELECT value, updated_at FROM exchange_rate WHERE id = 1")
        .fetch_optional(executor)
        .await?;
    Ok(rate)
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
    revision: Arc<watch::Sender<u64>>,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            pool,
            revision: Arc::new(revision),
        }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_dishes(&self, filter: &DishFilter) -> Result<Vec<Dish>, AppError> {
        fetch_dishes(&self.pool, filter).await
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError> {
        fetch_categories(&self.pool, filter).await
    }

    async fn find_dish(&self, id: Uuid) -> Result<Option<Dish>, AppError> {
        let dish = sqlx::query_as::<_, Dish>("SELECT * FROM dishes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dish)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn exchange_rate(&self) -> Result<Option<ExchangeRate>, AppError> {
        fetch_exchange_rate(&self.pool).await
    }

    async fn begin(&self, scopes: &[LockScope]) -> Result<Box<dyn CatalogTx>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Sempre na mesma ordem, para dois escritores nunca se travarem em cruz
        let mut scopes = scopes.to_vec();
        scopes.sort();
        scopes.dedup();
        for scope in scopes {
            advisory_xact_lock(&mut *tx, scope.lock_key()).await?;
        }

        Ok(Box::new(PgCatalogTx {
            tx,
            wrote: false,
            revision: Arc::clone(&self.revision),
        }))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

pub struct PgCatalogTx {
    tx: Transaction<'static, Postgres>,
    wrote: bool,
    revision: Arc<watch::Sender<u64>>,
}

impl PgCatalogTx {
    async fn upsert_dish(&mut self, dish: &Dish) -> Result<(), AppError> {
        // created_at fica de fora do UPDATE: é imutável
        sqlx::query(
            r#"
            INSERT INTO dishes (
                id, name, description, price_bob, price_brl, category_id, image_url,
                is_featured, sort_order, active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price_bob = EXCLUDED.price_bob,
                price_brl = EXCLUDED.price_brl,
                category_id = EXCLUDED.category_id,
                image_url = EXCLUDED.image_url,
                is_featured = EXCLUDED.is_featured,
                sort_order = EXCLUDED.sort_order,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(dish.id)
        .bind(Json(&dish.name))
        .bind(Json(&dish.description))
        .bind(dish.price_bob)
        .bind(dish.price_brl)
        .bind(dish.category_id)
        .bind(dish.image_url.as_deref())
        .bind(dish.is_featured)
        .bind(dish.order)
        .bind(dish.active)
        .bind(dish.created_at)
        .bind(dish.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_category(&mut self, category: &Category) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, image_url, sort_order, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                image_url = EXCLUDED.image_url,
                sort_order = EXCLUDED.sort_order,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(category.id)
        .bind(Json(&category.name))
        .bind(category.image_url.as_deref())
        .bind(category.order)
        .bind(category.active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn put_exchange_rate(&mut self, rate: &ExchangeRate) -> Result<(), AppError> {
        // UPSERT da única linha: o valor inteiro é substituído de uma vez
        sqlx::query(
            r#"
            INSERT INTO exchange_rate (id, value, updated_at)
            VALUES (1, $1, $2)
            ON CONFLICT (id) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(rate.value)
        .bind(rate.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogTx for PgCatalogTx {
    async fn dish(&mut self, id: Uuid) -> Result<Option<Dish>, AppError> {
        let dish = sqlx::query_as::<_, Dish>("SELECT * FROM dishes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(dish)
    }

    async fn category(&mut self, id: Uuid) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(category)
    }

    async fn dishes(&mut self, filter: &DishFilter) -> Result<Vec<Dish>, AppError> {
        fetch_dishes(&mut *self.tx, filter).await
    }

    async fn categories(&mut self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError> {
        fetch_categories(&mut *self.tx, filter).await
    }

    async fn count_dishes_in_categories(&mut self, category_ids: &[Uuid]) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dishes WHERE category_id = ANY($1)")
            .bind(category_ids)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn exchange_rate(&mut self) -> Result<Option<ExchangeRate>, AppError> {
        fetch_exchange_rate(&mut *self.tx).await
    }

    async fn apply(&mut self, batch: WriteBatch) -> Result<(), AppError> {
        for write in batch.iter() {
            match write {
                CatalogWrite::PutDish(dish) => self.upsert_dish(dish).await?,
                CatalogWrite::PutCategory(category) => self.upsert_category(category).await?,
                CatalogWrite::DeleteDish(id) => {
                    sqlx::query("DELETE FROM dishes WHERE id = $1")
                        .bind(id)
                        .execute(&mut *self.tx)
                        .await?;
                }
                CatalogWrite::DeleteCategory(id) => {
                    sqlx::query("DELETE FROM categories WHERE id = $1")
                        .bind(id)
                        .execute(&mut *self.tx)
                        .await?;
                }
                CatalogWrite::PutExchangeRate(rate) => self.put_exchange_rate(rate).await?,
            }
        }
        self.wrote |= !batch.is_empty();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgCatalogTx { tx, wrote, revision } = *self;
        tx.commit().await?;
        if wrote {
            revision.send_modify(|rev| *rev += 1);
        }
        Ok(())
    }
}
