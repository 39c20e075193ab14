// src/services/catalog_service.rs
//
// Orquestra ciclo de vida, ordenação e preço dos pratos e categorias.
// Cada operação segue o mesmo roteiro: abre a transação com as travas da
// partição, lê o estado atual, monta o lote com as regras de `catalog::*`,
// confere a ordem densa e só então commita.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    catalog::{
        invariants,
        lifecycle::{self, SoftDelete},
        ordering::{self, Direction, MoveOutcome, Partition},
        pricing,
    },
    common::{db_utils::retry_on_conflict, error::AppError},
    db::{CatalogStore, CatalogTx, LockScope, WriteBatch},
    models::{
        catalog::{Category, CategoryDraft, CategoryFilter, Dish, DishDraft, DishFilter, RecordState},
        exchange_rate::ExchangeRate,
    },
    services::{image_cleanup::ImageCleanup, menu_subscription::MenuSubscription},
};

const DISHES: &[LockScope] = &[LockScope::Dishes];
const CATEGORIES: &[LockScope] = &[LockScope::Categories];
// Escritas que conferem categoria e prato juntas
const CATEGORIES_AND_DISHES: &[LockScope] = &[LockScope::Categories, LockScope::Dishes];

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    images: Arc<dyn ImageCleanup>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, images: Arc<dyn ImageCleanup>) -> Self {
        Self { store, images }
    }

    // ---
    // Leitura pública: nunca devolve erro, no máximo uma lista vazia
    // ---

    pub async fn list_active_dishes(&self, category_id: Option<Uuid>) -> Vec<Dish> {
        let filter = DishFilter::active().in_category(category_id);
        fail_closed("pratos", self.store.list_dishes(&filter).await)
    }

    pub async fn list_featured_dishes(&self) -> Vec<Dish> {
        let filter = DishFilter::active().featured(true);
        fail_closed("destaques", self.store.list_dishes(&filter).await)
    }

    pub async fn list_active_categories(&self) -> Vec<Category> {
        fail_closed("categorias", self.store.list_categories(&CategoryFilter::active()).await)
    }

    pub fn observe(&self, filter: DishFilter) -> MenuSubscription {
        MenuSubscription::new(Arc::clone(&self.store), filter)
    }

    /// Confere o catálogo inteiro (lixeira incluída) contra as regras de ordem,
    /// referência e preço. Lista vazia = tudo certo.
    pub async fn audit(&self) -> Result<Vec<String>, AppError> {
        let dishes = self.store.list_dishes(&DishFilter::with_state(RecordState::All)).await?;
        let categories = self
            .store
            .list_categories(&CategoryFilter { state: RecordState::All })
            .await?;
        let rate = self.store.exchange_rate().await?;
        Ok(invariants::check_catalog(&dishes, &categories, rate.as_ref()))
    }

    /// Registra cada revisão publicada do cardápio e audita o catálogo nela.
    /// Termina quando o store deixa de existir.
    pub async fn watch_published_menu(self) {
        let mut subscription = self.observe(DishFilter::active());
        while let Some(dishes) = subscription.next().await {
            let revision = subscription.revision();
            match self.audit().await {
                Ok(violations) if violations.is_empty() => {
                    tracing::info!(revision, dishes = dishes.len(), "Cardápio publicado");
                }
                Ok(violations) => {
                    tracing::warn!(revision, ?violations, "Cardápio publicado com inconsistências");
                }
                Err(e) => tracing::error!(revision, error = ?e, "Falha ao auditar o cardápio"),
            }
        }
    }

    // ---
    // Leitura do painel (inclui a lixeira)
    // ---

    pub async fn list_dishes(&self, filter: &DishFilter) -> Result<Vec<Dish>, AppError> {
        self.store.list_dishes(filter).await
    }

    pub async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>, AppError> {
        self.store.list_categories(filter).await
    }

    // ---
    // Pratos
    // ---

    pub async fn create_dish(&self, draft: DishDraft) -> Result<Dish, AppError> {
        validate_dish_draft(&draft)?;
        let draft = &draft;
        let dish = retry_on_conflict("create_dish", move || self.create_dish_once(draft)).await?;
        tracing::info!(dish_id = %dish.id, order = dish.order, featured = dish.is_featured, "Prato criado");
        Ok(dish)
    }

    async fn create_dish_once(&self, draft: &DishDraft) -> Result<Dish, AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        ensure_category_assignable(tx.as_mut(), draft.category_id).await?;
        let rate = require_rate(tx.as_mut()).await?;

        let now = Utc::now();
        let is_featured = draft.is_featured.unwrap_or(false);
        let mut members = tx.dishes(&DishFilter::active().featured(is_featured)).await?;

        let newcomer = Dish {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price_bob: draft.price_bob,
            price_brl: pricing::derive_brl(draft.price_bob, &rate)?,
            category_id: draft.category_id,
            image_url: draft.image_url.clone(),
            is_featured,
            order: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let dish = ordering::append_to_partition(&mut members, newcomer);
        invariants::ensure_dense(Partition::for_featured(is_featured), &members)?;

        let mut batch = WriteBatch::new();
        batch.put_dish(dish.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(dish)
    }

    /// Substitui os campos editáveis de um prato ativo e recalcula o preço em reais.
    pub async fn update_dish(&self, id: Uuid, draft: DishDraft) -> Result<Dish, AppError> {
        validate_dish_draft(&draft)?;
        let draft = &draft;
        let dish = retry_on_conflict("update_dish", move || self.update_dish_once(id, draft)).await?;
        tracing::info!(dish_id = %dish.id, "Prato atualizado");
        Ok(dish)
    }

    async fn update_dish_once(&self, id: Uuid, draft: &DishDraft) -> Result<Dish, AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        let current = match tx.dish(id).await? {
            Some(dish) if dish.active => dish,
            Some(_) => {
                return Err(AppError::InvalidState(format!(
                    "Prato {id} está na lixeira: restaure antes de editar"
                )));
            }
            None => return Err(AppError::NotFound(format!("Prato {id} não encontrado"))),
        };
        ensure_category_assignable(tx.as_mut(), draft.category_id).await?;
        let rate = require_rate(tx.as_mut()).await?;

        let now = Utc::now();
        let mut dish = current.clone();
        dish.name = draft.name.clone();
        dish.description = draft.description.clone();
        dish.price_bob = draft.price_bob;
        dish.category_id = draft.category_id;
        dish.image_url = draft.image_url.clone();
        pricing::resync(&mut dish, &rate)?;
        dish.touch(now);

        let mut batch = WriteBatch::new();
        let dish = match draft.is_featured {
            Some(featured) if featured != current.is_featured => {
                switch_partition(tx.as_mut(), dish, featured, now, &mut batch).await?
            }
            _ => {
                batch.put_dish(dish.clone());
                dish
            }
        };

        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(dish)
    }

    /// Liga/desliga o destaque. Ligar coloca o prato no topo dos destaques;
    /// desligar fecha o buraco nos destaques e manda o prato para o fim da lista comum.
    pub async fn set_featured(&self, id: Uuid, featured: bool) -> Result<Dish, AppError> {
        let dish = retry_on_conflict("set_featured", move || self.set_featured_once(id, featured)).await?;
        tracing::info!(dish_id = %dish.id, featured, order = dish.order, "Destaque do prato alterado");
        Ok(dish)
    }

    async fn set_featured_once(&self, id: Uuid, featured: bool) -> Result<Dish, AppError> {
        let mut tx = self.store.begin(DISHES).await?;
        let current = lifecycle::require_active(tx.dish(id).await?, id)?;
        if current.is_featured == featured {
            return Ok(current);
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let dish = switch_partition(tx.as_mut(), current, featured, now, &mut batch).await?;

        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(dish)
    }

    pub async fn trash_dish(&self, id: Uuid) -> Result<Dish, AppError> {
        let (dish, renumbered) = retry_on_conflict("trash_dish", move || self.trash_dish_once(id)).await?;
        tracing::info!(dish_id = %dish.id, renumbered, "Prato enviado para a lixeira");
        Ok(dish)
    }

    async fn trash_dish_once(&self, id: Uuid) -> Result<(Dish, usize), AppError> {
        let mut tx = self.store.begin(DISHES).await?;
        let now = Utc::now();
        let dish = lifecycle::trash(tx.dish(id).await?, id, now)?;

        let mut remaining = partition_without(tx.as_mut(), dish.is_featured, id).await?;
        let changed = ordering::renormalize(&mut remaining);
        invariants::ensure_dense(Partition::for_featured(dish.is_featured), &remaining)?;

        let mut batch = WriteBatch::new();
        batch.put_dish(dish.clone());
        stage_dishes(&mut remaining, &changed, now, &mut batch);

        tx.apply(batch).await?;
        tx.commit().await?;
        Ok((dish, changed.len()))
    }

    /// Tira da lixeira, com o preço já no câmbio vigente, no fim da sua partição.
    pub async fn restore_dish(&self, id: Uuid) -> Result<Dish, AppError> {
        let dish = retry_on_conflict("restore_dish", move || self.restore_dish_once(id)).await?;
        tracing::info!(dish_id = %dish.id, order = dish.order, "Prato restaurado");
        Ok(dish)
    }

    async fn restore_dish_once(&self, id: Uuid) -> Result<Dish, AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        let now = Utc::now();
        let mut dish = lifecycle::restore(tx.dish(id).await?, id, now)?;

        if let Some(category_id) = dish.category_id {
            if !tx.category(category_id).await?.is_some_and(|c| c.active) {
                return Err(AppError::InvalidState(format!(
                    "A categoria {category_id} do prato {id} não está ativa"
                )));
            }
        }
        let rate = require_rate(tx.as_mut()).await?;
        pricing::resync(&mut dish, &rate)?;

        let mut members = tx.dishes(&DishFilter::active().featured(dish.is_featured)).await?;
        let dish = ordering::append_to_partition(&mut members, dish);
        invariants::ensure_dense(Partition::for_featured(dish.is_featured), &members)?;

        let mut batch = WriteBatch::new();
        batch.put_dish(dish.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(dish)
    }

    pub async fn purge_dish(&self, id: Uuid) -> Result<(), AppError> {
        let image = retry_on_conflict("purge_dish", move || self.purge_dish_once(id)).await?;
        tracing::info!(dish_id = %id, "Prato apagado definitivamente");
        self.release_images(image.into_iter().collect()).await;
        Ok(())
    }

    async fn purge_dish_once(&self, id: Uuid) -> Result<Option<String>, AppError> {
        let mut tx = self.store.begin(DISHES).await?;
        let dish = tx.dish(id).await?;
        lifecycle::ensure_purgeable(dish.as_ref(), id)?;

        let mut batch = WriteBatch::new();
        batch.delete_dish(id);
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(dish.and_then(|d| d.image_url))
    }

    /// Esvazia a lixeira de pratos num único lote. Lixeira vazia devolve 0 sem escrever nada.
    pub async fn purge_trashed_dishes(&self) -> Result<u64, AppError> {
        let (count, images) =
            retry_on_conflict("purge_trashed_dishes", move || self.purge_trashed_dishes_once()).await?;
        if count > 0 {
            tracing::info!(count, "Lixeira de pratos esvaziada");
            self.release_images(images).await;
        }
        Ok(count)
    }

    async fn purge_trashed_dishes_once(&self) -> Result<(u64, Vec<String>), AppError> {
        let mut tx = self.store.begin(DISHES).await?;
        let trashed = tx.dishes(&DishFilter::trashed()).await?;
        if trashed.is_empty() {
            return Ok((0, Vec::new()));
        }

        let mut batch = WriteBatch::new();
        for dish in &trashed {
            batch.delete_dish(dish.id);
        }
        tx.apply(batch).await?;
        tx.commit().await?;

        let count = trashed.len() as u64;
        let images = trashed.into_iter().filter_map(|d| d.image_url).collect();
        Ok((count, images))
    }

    /// Troca o prato de lugar com o vizinho. Devolve a partição inteira já reordenada.
    pub async fn move_dish(&self, id: Uuid, direction: Direction) -> Result<(MoveOutcome, Vec<Dish>), AppError> {
        let (outcome, members) =
            retry_on_conflict("move_dish", move || self.move_dish_once(id, direction)).await?;
        log_move("Prato", id, direction, &outcome);
        Ok((outcome, members))
    }

    async fn move_dish_once(&self, id: Uuid, direction: Direction) -> Result<(MoveOutcome, Vec<Dish>), AppError> {
        let mut tx = self.store.begin(DISHES).await?;
        let dish = lifecycle::require_active(tx.dish(id).await?, id)?;
        let partition = Partition::for_featured(dish.is_featured);

        let mut members = tx.dishes(&DishFilter::active().featured(dish.is_featured)).await?;
        let (outcome, changed) = ordering::move_member(&mut members, id, direction)?;
        invariants::ensure_dense(partition, &members)?;

        let mut batch = WriteBatch::new();
        stage_dishes(&mut members, &changed, Utc::now(), &mut batch);
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok((outcome, members))
    }

    // ---
    // Categorias
    // ---

    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category, AppError> {
        validate_category_draft(&draft)?;
        let draft = &draft;
        let category = retry_on_conflict("create_category", move || self.create_category_once(draft)).await?;
        tracing::info!(category_id = %category.id, order = category.order, "Categoria criada");
        Ok(category)
    }

    async fn create_category_once(&self, draft: &CategoryDraft) -> Result<Category, AppError> {
        let mut tx = self.store.begin(CATEGORIES).await?;
        let now = Utc::now();
        let mut members = tx.categories(&CategoryFilter::active()).await?;

        let newcomer = Category {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            image_url: draft.image_url.clone(),
            order: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let category = ordering::append_to_partition(&mut members, newcomer);
        invariants::ensure_dense(Partition::Categories, &members)?;

        let mut batch = WriteBatch::new();
        batch.put_category(category.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, draft: CategoryDraft) -> Result<Category, AppError> {
        validate_category_draft(&draft)?;
        let draft = &draft;
        let category =
            retry_on_conflict("update_category", move || self.update_category_once(id, draft)).await?;
        tracing::info!(category_id = %category.id, "Categoria atualizada");
        Ok(category)
    }

    async fn update_category_once(&self, id: Uuid, draft: &CategoryDraft) -> Result<Category, AppError> {
        let mut tx = self.store.begin(CATEGORIES).await?;
        let mut category = match tx.category(id).await? {
            Some(category) if category.active => category,
            Some(_) => {
                return Err(AppError::InvalidState(format!(
                    "Categoria {id} está na lixeira: restaure antes de editar"
                )));
            }
            None => return Err(AppError::NotFound(format!("Categoria {id} não encontrada"))),
        };
        category.name = draft.name.clone();
        category.image_url = draft.image_url.clone();
        category.touch(Utc::now());

        let mut batch = WriteBatch::new();
        batch.put_category(category.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Só vai para a lixeira a categoria que nenhum prato (ativo ou na lixeira) usa.
    pub async fn trash_category(&self, id: Uuid) -> Result<Category, AppError> {
        let (category, renumbered) =
            retry_on_conflict("trash_category", move || self.trash_category_once(id)).await?;
        tracing::info!(category_id = %category.id, renumbered, "Categoria enviada para a lixeira");
        Ok(category)
    }

    async fn trash_category_once(&self, id: Uuid) -> Result<(Category, usize), AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        let now = Utc::now();
        let category = lifecycle::trash(tx.category(id).await?, id, now)?;
        ensure_unreferenced(tx.as_mut(), &[id]).await?;

        let mut remaining: Vec<Category> = tx
            .categories(&CategoryFilter::active())
            .await?
            .into_iter()
            .filter(|c| c.id != id)
            .collect();
        let changed = ordering::renormalize(&mut remaining);
        invariants::ensure_dense(Partition::Categories, &remaining)?;

        let mut batch = WriteBatch::new();
        batch.put_category(category.clone());
        stage_categories(&mut remaining, &changed, now, &mut batch);

        tx.apply(batch).await?;
        tx.commit().await?;
        Ok((category, changed.len()))
    }

    pub async fn restore_category(&self, id: Uuid) -> Result<Category, AppError> {
        let category = retry_on_conflict("restore_category", move || self.restore_category_once(id)).await?;
        tracing::info!(category_id = %category.id, order = category.order, "Categoria restaurada");
        Ok(category)
    }

    async fn restore_category_once(&self, id: Uuid) -> Result<Category, AppError> {
        let mut tx = self.store.begin(CATEGORIES).await?;
        let category = lifecycle::restore(tx.category(id).await?, id, Utc::now())?;

        let mut members = tx.categories(&CategoryFilter::active()).await?;
        let category = ordering::append_to_partition(&mut members, category);
        invariants::ensure_dense(Partition::Categories, &members)?;

        let mut batch = WriteBatch::new();
        batch.put_category(category.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(category)
    }

    pub async fn purge_category(&self, id: Uuid) -> Result<(), AppError> {
        let image = retry_on_conflict("purge_category", move || self.purge_category_once(id)).await?;
        tracing::info!(category_id = %id, "Categoria apagada definitivamente");
        self.release_images(image.into_iter().collect()).await;
        Ok(())
    }

    async fn purge_category_once(&self, id: Uuid) -> Result<Option<String>, AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        let category = tx.category(id).await?;
        lifecycle::ensure_purgeable(category.as_ref(), id)?;
        ensure_unreferenced(tx.as_mut(), &[id]).await?;

        let mut batch = WriteBatch::new();
        batch.delete_category(id);
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(category.and_then(|c| c.image_url))
    }

    /// Esvazia a lixeira de categorias. Se alguma ainda tiver pratos, nada é apagado.
    pub async fn purge_trashed_categories(&self) -> Result<u64, AppError> {
        let (count, images) =
            retry_on_conflict("purge_trashed_categories", move || self.purge_trashed_categories_once()).await?;
        if count > 0 {
            tracing::info!(count, "Lixeira de categorias esvaziada");
            self.release_images(images).await;
        }
        Ok(count)
    }

    async fn purge_trashed_categories_once(&self) -> Result<(u64, Vec<String>), AppError> {
        let mut tx = self.store.begin(CATEGORIES_AND_DISHES).await?;
        let trashed = tx.categories(&CategoryFilter::trashed()).await?;
        if trashed.is_empty() {
            return Ok((0, Vec::new()));
        }

        let ids: Vec<Uuid> = trashed.iter().map(|c| c.id).collect();
        ensure_unreferenced(tx.as_mut(), &ids).await?;

        let mut batch = WriteBatch::new();
        for id in ids {
            batch.delete_category(id);
        }
        tx.apply(batch).await?;
        tx.commit().await?;

        let count = trashed.len() as u64;
        let images = trashed.into_iter().filter_map(|c| c.image_url).collect();
        Ok((count, images))
    }

    pub async fn move_category(
        &self,
        id: Uuid,
        direction: Direction,
    ) -> Result<(MoveOutcome, Vec<Category>), AppError> {
        let (outcome, members) =
            retry_on_conflict("move_category", move || self.move_category_once(id, direction)).await?;
        log_move("Categoria", id, direction, &outcome);
        Ok((outcome, members))
    }

    async fn move_category_once(
        &self,
        id: Uuid,
        direction: Direction,
    ) -> Result<(MoveOutcome, Vec<Category>), AppError> {
        let mut tx = self.store.begin(CATEGORIES).await?;
        lifecycle::require_active(tx.category(id).await?, id)?;

        let mut members = tx.categories(&CategoryFilter::active()).await?;
        let (outcome, changed) = ordering::move_member(&mut members, id, direction)?;
        invariants::ensure_dense(Partition::Categories, &members)?;

        let mut batch = WriteBatch::new();
        stage_categories(&mut members, &changed, Utc::now(), &mut batch);
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok((outcome, members))
    }

    // ---
    // Depois do commit
    // ---

    async fn release_images(&self, image_refs: Vec<String>) {
        if image_refs.is_empty() {
            return;
        }
        let released = self.images.release(&image_refs).await;
        if released < image_refs.len() {
            tracing::warn!(
                expected = image_refs.len(),
                released,
                "Nem todas as imagens dos registros apagados foram liberadas"
            );
        }
    }
}

fn fail_closed<T>(what: &'static str, result: Result<Vec<T>, AppError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::error!(what, error = ?e, "Falha na leitura pública do cardápio");
        Vec::new()
    })
}

fn log_move(kind: &'static str, id: Uuid, direction: Direction, outcome: &MoveOutcome) {
    match outcome {
        MoveOutcome::Swapped { displaced, .. } => {
            tracing::info!(kind, %id, ?direction, %displaced, "Posição trocada com o vizinho");
        }
        MoveOutcome::AtBoundary => {
            tracing::warn!(kind, %id, ?direction, "Já está no limite da lista, nada a fazer");
        }
    }
}

fn validate_dish_draft(draft: &DishDraft) -> Result<(), AppError> {
    if !draft.name.has_text() {
        return Err(AppError::InvalidInput(
            "O prato precisa de nome em pelo menos um idioma".to_string(),
        ));
    }
    pricing::validate_price_bob(draft.price_bob)
}

fn validate_category_draft(draft: &CategoryDraft) -> Result<(), AppError> {
    if !draft.name.has_text() {
        return Err(AppError::InvalidInput(
            "A categoria precisa de nome em pelo menos um idioma".to_string(),
        ));
    }
    Ok(())
}

async fn require_rate(tx: &mut dyn CatalogTx) -> Result<ExchangeRate, AppError> {
    tx.exchange_rate()
        .await?
        .ok_or_else(|| AppError::InvalidState("O câmbio BOB -> BRL ainda não foi configurado".to_string()))
}

async fn ensure_category_assignable(tx: &mut dyn CatalogTx, category_id: Option<Uuid>) -> Result<(), AppError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    match tx.category(category_id).await? {
        Some(category) if category.active => Ok(()),
        _ => Err(AppError::InvalidInput(format!(
            "Categoria {category_id} não existe ou está na lixeira"
        ))),
    }
}

/// Uma consulta só, mesmo esvaziando a lixeira inteira.
async fn ensure_unreferenced(tx: &mut dyn CatalogTx, category_ids: &[Uuid]) -> Result<(), AppError> {
    let references = tx.count_dishes_in_categories(category_ids).await?;
    if references > 0 {
        return Err(AppError::ReferentialConflict(format!(
            "Ainda há {references} prato(s) nas categorias {category_ids:?}"
        )));
    }
    Ok(())
}

/// Membros ativos da partição, sem o próprio prato.
async fn partition_without(tx: &mut dyn CatalogTx, featured: bool, excluded: Uuid) -> Result<Vec<Dish>, AppError> {
    let members = tx.dishes(&DishFilter::active().featured(featured)).await?;
    Ok(members.into_iter().filter(|d| d.id != excluded).collect())
}

/// Fecha o buraco na partição de origem e coloca o prato na de destino:
/// no topo dos destaques, ou no fim da lista comum.
async fn switch_partition(
    tx: &mut dyn CatalogTx,
    mut dish: Dish,
    featured: bool,
    now: DateTime<Utc>,
    batch: &mut WriteBatch,
) -> Result<Dish, AppError> {
    let mut left_behind = partition_without(tx, dish.is_featured, dish.id).await?;
    let changed = ordering::renormalize(&mut left_behind);
    invariants::ensure_dense(Partition::for_featured(dish.is_featured), &left_behind)?;
    stage_dishes(&mut left_behind, &changed, now, batch);

    dish.is_featured = featured;
    dish.touch(now);
    let id = dish.id;
    let mut members = partition_without(tx, featured, id).await?;

    let dish = if featured {
        let changed = ordering::promote_to_top(&mut members, dish);
        stage_dishes(&mut members, &changed, now, batch);
        members
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| AppError::InternalServerError(anyhow!("prato {id} sumiu da partição de destaques")))?
    } else {
        let placed = ordering::append_to_partition(&mut members, dish);
        batch.put_dish(placed.clone());
        placed
    };
    invariants::ensure_dense(Partition::for_featured(featured), &members)?;
    Ok(dish)
}

/// Carimba `updated_at` em quem mudou de posição e coloca no lote.
fn stage_dishes(members: &mut [Dish], changed: &[Uuid], now: DateTime<Utc>, batch: &mut WriteBatch) {
    for dish in members.iter_mut().filter(|d| changed.contains(&d.id)) {
        dish.touch(now);
        batch.put_dish(dish.clone());
    }
}

fn stage_categories(members: &mut [Category], changed: &[Uuid], now: DateTime<Utc>, batch: &mut WriteBatch) {
    for category in members.iter_mut().filter(|c| changed.contains(&c.id)) {
        category.touch(now);
        batch.put_category(category.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::watch;

    use crate::{
        db::MemoryCatalogStore,
        models::catalog::LocalizedText,
    };

    #[derive(Default)]
    struct RecordingCleanup {
        released: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageCleanup for RecordingCleanup {
        async fn release(&self, image_refs: &[String]) -> usize {
            self.released.lock().unwrap().extend_from_slice(image_refs);
            image_refs.len()
        }
    }

    /// Store que falha em toda leitura, para exercitar o caminho público.
    struct BrokenStore {
        revision: watch::Sender<u64>,
    }

    #[async_trait]
    impl CatalogStore for BrokenStore {
        async fn list_dishes(&self, _: &DishFilter) -> Result<Vec<Dish>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        async fn list_categories(&self, _: &CategoryFilter) -> Result<Vec<Category>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        async fn find_dish(&self, _: Uuid) -> Result<Option<Dish>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        async fn find_category(&self, _: Uuid) -> Result<Option<Category>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        async fn exchange_rate(&self) -> Result<Option<ExchangeRate>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        async fn begin(&self, _: &[LockScope]) -> Result<Box<dyn CatalogTx>, AppError> {
            Err(AppError::InternalServerError(anyhow!("conexão perdida")))
        }
        fn subscribe(&self) -> watch::Receiver<u64> {
            self.revision.subscribe()
        }
    }

    struct Fixture {
        service: CatalogService,
        store: MemoryCatalogStore,
        cleanup: Arc<RecordingCleanup>,
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn fixture_with_rate(rate: &str) -> Fixture {
        let store = MemoryCatalogStore::new();
        let cleanup = Arc::new(RecordingCleanup::default());
        let service = CatalogService::new(Arc::new(store.clone()), cleanup.clone());
        put_rate(&store, rate).await;
        Fixture { service, store, cleanup }
    }

    async fn put_rate(store: &MemoryCatalogStore, value: &str) {
        let mut tx = store.begin(&[LockScope::ExchangeRate]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.put_exchange_rate(ExchangeRate::try_new(dec(value), Utc::now()).unwrap());
        tx.apply(batch).await.unwrap();
        tx.commit().await.unwrap();
    }

    fn draft(name: &str, price_bob: &str) -> DishDraft {
        DishDraft {
            name: LocalizedText::single("es", name),
            description: LocalizedText::default(),
            price_bob: dec(price_bob),
            category_id: None,
            image_url: None,
            is_featured: None,
        }
    }

    fn featured_draft(name: &str) -> DishDraft {
        DishDraft {
            is_featured: Some(true),
            ..draft(name, "10.00")
        }
    }

    fn category_draft(name: &str) -> CategoryDraft {
        CategoryDraft {
            name: LocalizedText::single("es", name),
            image_url: None,
        }
    }

    fn orders(dishes: &[Dish]) -> Vec<i32> {
        dishes.iter().map(|d| d.order).collect()
    }

    fn ids(dishes: &[Dish]) -> Vec<Uuid> {
        dishes.iter().map(|d| d.id).collect()
    }

    async fn assert_catalog_consistent(f: &Fixture) {
        let violations = f.service.audit().await.unwrap();
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[tokio::test]
    async fn create_dish_appends_and_derives_brl() {
        let f = fixture_with_rate("2.70").await;

        let first = f.service.create_dish(draft("Salteña", "10.00")).await.unwrap();
        let second = f.service.create_dish(draft("Sopa de maní", "15.50")).await.unwrap();

        assert_eq!(first.order, 1);
        assert_eq!(second.order, 2);
        assert_eq!(first.price_brl, dec("27.00"));
        assert_eq!(second.price_brl, dec("41.85"));
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn dish_writes_need_a_configured_rate() {
        let store = MemoryCatalogStore::new();
        let service = CatalogService::new(Arc::new(store), Arc::new(RecordingCleanup::default()));

        let result = service.create_dish(draft("Pique macho", "60")).await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected_before_writing() {
        let f = fixture_with_rate("2.70").await;
        let mut revision = f.store.subscribe();
        revision.borrow_and_update();

        let negative = f.service.create_dish(draft("Api", "-1")).await;
        let nameless = f.service.create_dish(draft("   ", "5")).await;
        let oversized = f.service.create_dish(draft("Parrillada", "10000000000")).await;
        let unknown_category = f
            .service
            .create_dish(DishDraft {
                category_id: Some(Uuid::new_v4()),
                ..draft("Tucumana", "8")
            })
            .await;

        assert!(matches!(negative, Err(AppError::InvalidInput(_))));
        assert!(matches!(nameless, Err(AppError::InvalidInput(_))));
        assert!(matches!(oversized, Err(AppError::InvalidInput(_))));
        assert!(matches!(unknown_category, Err(AppError::InvalidInput(_))));
        assert!(!revision.has_changed().unwrap());
    }

    #[tokio::test]
    async fn trashing_middle_featured_dish_closes_the_gap() {
        let f = fixture_with_rate("2.70").await;
        let a = f.service.create_dish(featured_draft("A")).await.unwrap();
        let b = f.service.create_dish(featured_draft("B")).await.unwrap();
        let c = f.service.create_dish(featured_draft("C")).await.unwrap();
        assert_eq!(orders(&[a.clone(), b.clone(), c.clone()]), vec![1, 2, 3]);

        let trashed = f.service.trash_dish(b.id).await.unwrap();

        assert!(!trashed.active);
        let featured = f.service.list_featured_dishes().await;
        assert_eq!(ids(&featured), vec![a.id, c.id]);
        assert_eq!(orders(&featured), vec![1, 2]);
        assert!(!ids(&f.service.list_active_dishes(None).await).contains(&b.id));
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn restore_appends_at_old_max_plus_one() {
        let f = fixture_with_rate("2.70").await;
        let a = f.service.create_dish(draft("A", "1")).await.unwrap();
        f.service.create_dish(draft("B", "1")).await.unwrap();
        f.service.create_dish(draft("C", "1")).await.unwrap();

        f.service.trash_dish(a.id).await.unwrap();
        let max_after_trash = f.service.list_active_dishes(None).await.iter().map(|d| d.order).max();
        let restored = f.service.restore_dish(a.id).await.unwrap();

        assert_eq!(max_after_trash, Some(2));
        assert_eq!(restored.order, 3);
        assert!(restored.active);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn restore_rederives_price_with_current_rate() {
        let f = fixture_with_rate("2.70").await;
        let dish = f.service.create_dish(draft("Silpancho", "10.00")).await.unwrap();
        f.service.trash_dish(dish.id).await.unwrap();

        put_rate(&f.store, "3.00").await;
        let restored = f.service.restore_dish(dish.id).await.unwrap();

        assert_eq!(restored.price_brl, dec("30.00"));
    }

    #[tokio::test]
    async fn lifecycle_errors_match_record_state() {
        let f = fixture_with_rate("2.70").await;
        let dish = f.service.create_dish(draft("Chairo", "12")).await.unwrap();

        assert!(matches!(f.service.restore_dish(dish.id).await, Err(AppError::InvalidState(_))));
        assert!(matches!(f.service.purge_dish(dish.id).await, Err(AppError::InvalidState(_))));
        assert!(matches!(f.service.restore_dish(Uuid::new_v4()).await, Err(AppError::NotFound(_))));

        f.service.trash_dish(dish.id).await.unwrap();
        assert!(matches!(f.service.trash_dish(dish.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            f.service.update_dish(dish.id, draft("Chairo", "13")).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            f.service.move_dish(dish.id, Direction::Up).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn moves_at_the_boundaries_change_nothing() {
        let f = fixture_with_rate("2.70").await;
        let a = f.service.create_dish(draft("A", "1")).await.unwrap();
        f.service.create_dish(draft("B", "1")).await.unwrap();
        let c = f.service.create_dish(draft("C", "1")).await.unwrap();
        let before = f.service.list_active_dishes(None).await;
        let mut revision = f.store.subscribe();
        revision.borrow_and_update();

        let (up, _) = f.service.move_dish(a.id, Direction::Up).await.unwrap();
        let (down, _) = f.service.move_dish(c.id, Direction::Down).await.unwrap();

        assert_eq!(up, MoveOutcome::AtBoundary);
        assert_eq!(down, MoveOutcome::AtBoundary);
        assert_eq!(f.service.list_active_dishes(None).await, before);
        assert!(!revision.has_changed().unwrap());
    }

    #[tokio::test]
    async fn move_down_swaps_with_next_neighbour() {
        let f = fixture_with_rate("2.70").await;
        let a = f.service.create_dish(draft("A", "1")).await.unwrap();
        let b = f.service.create_dish(draft("B", "1")).await.unwrap();

        let (outcome, partition) = f.service.move_dish(a.id, Direction::Down).await.unwrap();

        assert_eq!(outcome, MoveOutcome::Swapped { moved: a.id, displaced: b.id });
        assert_eq!(ids(&partition), vec![b.id, a.id]);
        assert_eq!(orders(&partition), vec![1, 2]);
        assert_eq!(ids(&f.service.list_active_dishes(None).await), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn featuring_a_dish_puts_it_on_top() {
        let f = fixture_with_rate("2.70").await;
        let first = f.service.create_dish(featured_draft("A")).await.unwrap();
        let second = f.service.create_dish(featured_draft("B")).await.unwrap();
        let regular = f.service.create_dish(draft("C", "5")).await.unwrap();
        let other = f.service.create_dish(draft("D", "5")).await.unwrap();

        let promoted = f.service.set_featured(regular.id, true).await.unwrap();

        assert_eq!(promoted.order, 1);
        let featured = f.service.list_featured_dishes().await;
        assert_eq!(ids(&featured), vec![regular.id, first.id, second.id]);
        assert_eq!(orders(&featured), vec![1, 2, 3]);

        let remaining = f.store.list_dishes(&DishFilter::active().featured(false)).await.unwrap();
        assert_eq!(ids(&remaining), vec![other.id]);
        assert_eq!(orders(&remaining), vec![1]);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn unfeaturing_moves_dish_to_end_of_regular_list() {
        let f = fixture_with_rate("2.70").await;
        let a = f.service.create_dish(featured_draft("A")).await.unwrap();
        let b = f.service.create_dish(featured_draft("B")).await.unwrap();
        let regular = f.service.create_dish(draft("C", "5")).await.unwrap();

        let demoted = f.service.set_featured(a.id, false).await.unwrap();

        assert!(!demoted.is_featured);
        assert_eq!(demoted.order, 2);
        let featured = f.service.list_featured_dishes().await;
        assert_eq!(ids(&featured), vec![b.id]);
        assert_eq!(orders(&featured), vec![1]);
        let plain = f.store.list_dishes(&DishFilter::active().featured(false)).await.unwrap();
        assert_eq!(ids(&plain), vec![regular.id, a.id]);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn featuring_to_the_same_value_is_a_no_op() {
        let f = fixture_with_rate("2.70").await;
        let dish = f.service.create_dish(featured_draft("A")).await.unwrap();
        let mut revision = f.store.subscribe();
        revision.borrow_and_update();

        let same = f.service.set_featured(dish.id, true).await.unwrap();

        assert_eq!(same, dish);
        assert!(!revision.has_changed().unwrap());
    }

    #[tokio::test]
    async fn update_rederives_price_and_can_switch_partition() {
        let f = fixture_with_rate("2.70").await;
        let dish = f.service.create_dish(draft("Majadito", "10.00")).await.unwrap();
        let top = f.service.create_dish(featured_draft("Top")).await.unwrap();

        let updated = f
            .service
            .update_dish(
                dish.id,
                DishDraft {
                    is_featured: Some(true),
                    ..draft("Majadito batido", "20.00")
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price_brl, dec("54.00"));
        assert_eq!(updated.name.resolve("es"), Some("Majadito batido"));
        assert_eq!(updated.created_at, dish.created_at);
        assert_eq!(ids(&f.service.list_featured_dishes().await), vec![dish.id, top.id]);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn purge_only_removes_trashed_and_releases_image() {
        let f = fixture_with_rate("2.70").await;
        let dish = f
            .service
            .create_dish(DishDraft {
                image_url: Some("/uploads/sopa.jpg".to_string()),
                ..draft("Sopa", "9")
            })
            .await
            .unwrap();

        f.service.trash_dish(dish.id).await.unwrap();
        f.service.purge_dish(dish.id).await.unwrap();

        assert_eq!(f.store.find_dish(dish.id).await.unwrap(), None);
        assert_eq!(*f.cleanup.released.lock().unwrap(), vec!["/uploads/sopa.jpg".to_string()]);
        assert!(matches!(f.service.purge_dish(dish.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn emptying_an_empty_trash_writes_nothing() {
        let f = fixture_with_rate("2.70").await;
        f.service.create_dish(draft("A", "1")).await.unwrap();
        let mut revision = f.store.subscribe();
        revision.borrow_and_update();

        let purged = f.service.purge_trashed_dishes().await.unwrap();

        assert_eq!(purged, 0);
        assert!(!revision.has_changed().unwrap());
        assert!(f.cleanup.released.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn emptying_the_trash_removes_exactly_the_trashed_dishes() {
        let f = fixture_with_rate("2.70").await;
        let mut created = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            created.push(f.service.create_dish(draft(name, "3")).await.unwrap());
        }
        for dish in &created[..3] {
            f.service.trash_dish(dish.id).await.unwrap();
        }
        let active_before = f.service.list_active_dishes(None).await;

        let purged = f.service.purge_trashed_dishes().await.unwrap();

        assert_eq!(purged, 3);
        assert_eq!(f.service.list_active_dishes(None).await, active_before);
        let all = f.store.list_dishes(&DishFilter::with_state(RecordState::All)).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn referenced_category_cannot_be_trashed_or_purged() {
        let f = fixture_with_rate("2.70").await;
        let category = f.service.create_category(category_draft("Sopas")).await.unwrap();
        let dish = f
            .service
            .create_dish(DishDraft {
                category_id: Some(category.id),
                ..draft("Chairo", "12")
            })
            .await
            .unwrap();

        let result = f.service.trash_category(category.id).await;

        assert!(matches!(result, Err(AppError::ReferentialConflict(_))));
        assert_eq!(f.store.find_category(category.id).await.unwrap(), Some(category.clone()));
        assert_eq!(f.store.find_dish(dish.id).await.unwrap(), Some(dish.clone()));

        // Prato na lixeira ainda conta como referência
        f.service.trash_dish(dish.id).await.unwrap();
        assert!(matches!(
            f.service.trash_category(category.id).await,
            Err(AppError::ReferentialConflict(_))
        ));
    }

    #[tokio::test]
    async fn dish_cannot_point_to_trashed_category() {
        let f = fixture_with_rate("2.70").await;
        let category = f.service.create_category(category_draft("Postres")).await.unwrap();
        f.service.trash_category(category.id).await.unwrap();

        let result = f
            .service
            .create_dish(DishDraft {
                category_id: Some(category.id),
                ..draft("Helado de canela", "7")
            })
            .await;

        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn category_lifecycle_keeps_order_dense() {
        let f = fixture_with_rate("2.70").await;
        let entradas = f.service.create_category(category_draft("Entradas")).await.unwrap();
        let sopas = f.service.create_category(category_draft("Sopas")).await.unwrap();
        let fondos = f
            .service
            .create_category(CategoryDraft {
                image_url: Some("/uploads/fondos.png".to_string()),
                ..category_draft("Fondos")
            })
            .await
            .unwrap();

        f.service.trash_category(sopas.id).await.unwrap();
        let visible = f.service.list_active_categories().await;
        assert_eq!(visible.iter().map(|c| (c.id, c.order)).collect::<Vec<_>>(), vec![
            (entradas.id, 1),
            (fondos.id, 2)
        ]);

        let restored = f.service.restore_category(sopas.id).await.unwrap();
        assert_eq!(restored.order, 3);

        let (outcome, members) = f.service.move_category(restored.id, Direction::Up).await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Swapped { .. }));
        assert_eq!(members.iter().map(|c| c.id).collect::<Vec<_>>(), vec![
            entradas.id,
            sopas.id,
            fondos.id
        ]);

        f.service.trash_category(fondos.id).await.unwrap();
        assert_eq!(f.service.purge_trashed_categories().await.unwrap(), 1);
        assert_eq!(*f.cleanup.released.lock().unwrap(), vec!["/uploads/fondos.png".to_string()]);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn emptying_category_trash_is_all_or_nothing() {
        let f = fixture_with_rate("2.70").await;
        let sopas = f.service.create_category(category_draft("Sopas")).await.unwrap();
        let postres = f.service.create_category(category_draft("Postres")).await.unwrap();
        let dish = f.service.create_dish(draft("Chairo", "12")).await.unwrap();
        f.service.trash_category(sopas.id).await.unwrap();
        f.service.trash_category(postres.id).await.unwrap();

        // Referência gravada direto no store, por fora das regras do serviço
        let mut tx = f.store.begin(&[LockScope::Dishes]).await.unwrap();
        let mut batch = WriteBatch::new();
        batch.put_dish(Dish {
            category_id: Some(postres.id),
            ..dish
        });
        tx.apply(batch).await.unwrap();
        tx.commit().await.unwrap();

        let result = f.service.purge_trashed_categories().await;

        assert!(matches!(result, Err(AppError::ReferentialConflict(_))));
        assert!(f.store.find_category(sopas.id).await.unwrap().is_some());
        assert!(f.store.find_category(postres.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_listing_filters_by_state() {
        let f = fixture_with_rate("2.70").await;
        let kept = f.service.create_dish(draft("A", "1")).await.unwrap();
        let gone = f.service.create_dish(draft("B", "1")).await.unwrap();
        f.service.trash_dish(gone.id).await.unwrap();

        let trashed = f.service.list_dishes(&DishFilter::trashed()).await.unwrap();
        let all = f.service.list_dishes(&DishFilter::with_state(RecordState::All)).await.unwrap();

        assert_eq!(ids(&trashed), vec![gone.id]);
        assert_eq!(ids(&all), vec![kept.id, gone.id]);
    }

    #[tokio::test]
    async fn public_reads_fail_closed() {
        let (revision, _) = watch::channel(0);
        let service = CatalogService::new(
            Arc::new(BrokenStore { revision }),
            Arc::new(RecordingCleanup::default()),
        );

        assert!(service.list_active_dishes(None).await.is_empty());
        assert!(service.list_featured_dishes().await.is_empty());
        assert!(service.list_active_categories().await.is_empty());
        assert!(matches!(
            service.create_category(category_draft("X")).await,
            Err(AppError::InternalServerError(_))
        ));
    }

    #[tokio::test]
    async fn subscription_sees_each_committed_change() {
        let f = fixture_with_rate("2.70").await;
        let mut subscription = f.service.observe(DishFilter::active());

        let initial = subscription.next().await.unwrap();
        assert!(initial.is_empty());

        let dish = f.service.create_dish(draft("Sonso", "6")).await.unwrap();
        let after_create = subscription.next().await.unwrap();
        assert_eq!(ids(&after_create), vec![dish.id]);

        f.service.trash_dish(dish.id).await.unwrap();
        let after_trash = subscription.next().await.unwrap();
        assert!(after_trash.is_empty());
    }

    #[tokio::test]
    async fn audit_flags_prices_left_behind_by_a_rate_change() {
        let f = fixture_with_rate("2.70").await;
        f.service.create_dish(draft("Majadito", "20")).await.unwrap();
        assert!(f.service.audit().await.unwrap().is_empty());

        // Câmbio trocado sem recálculo
        put_rate(&f.store, "2.80").await;

        assert_eq!(f.service.audit().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_keep_every_partition_dense() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let f = fixture_with_rate("2.70").await;
        let mut ids = Vec::new();
        for i in 0..8 {
            let dish = f
                .service
                .create_dish(DishDraft {
                    is_featured: Some(i % 2 == 0),
                    ..draft(&format!("Plato {i}"), "10")
                })
                .await
                .unwrap();
            ids.push(dish.id);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let service = f.service.clone();
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                let mut snapshots = 0u32;
                loop {
                    let done = stop.load(Ordering::Acquire);
                    let featured = service.list_featured_dishes().await;
                    assert!(invariants::is_dense(&featured), "{:?}", orders(&featured));
                    let regular: Vec<Dish> = service
                        .list_active_dishes(None)
                        .await
                        .into_iter()
                        .filter(|d| !d.is_featured)
                        .collect();
                    assert!(invariants::is_dense(&regular), "{:?}", orders(&regular));
                    snapshots += 1;
                    if done {
                        break snapshots;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut writers = Vec::new();
        for round in 0..40usize {
            let service = f.service.clone();
            let id = ids[round % ids.len()];
            writers.push(tokio::spawn(async move {
                let result = match round % 5 {
                    0 => service.move_dish(id, Direction::Up).await.map(drop),
                    1 => service.move_dish(id, Direction::Down).await.map(drop),
                    2 => service.trash_dish(id).await.map(drop),
                    3 => service.restore_dish(id).await.map(drop),
                    _ => service.set_featured(id, round % 2 == 0).await.map(drop),
                };
                // Quem chega depois pode achar o prato em outro estado, mas nunca quebra o catálogo
                match result {
                    Ok(()) | Err(AppError::NotFound(_)) | Err(AppError::InvalidState(_)) => {}
                    Err(e) => panic!("erro inesperado: {e:?}"),
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }
        stop.store(true, Ordering::Release);

        assert!(reader.await.unwrap() > 0);
        assert_catalog_consistent(&f).await;
    }

    #[tokio::test]
    async fn mixed_sequence_preserves_invariants() {
        let f = fixture_with_rate("2.70").await;
        let category = f.service.create_category(category_draft("Platos")).await.unwrap();
        let mut dishes = Vec::new();
        for (i, name) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            let dish = f
                .service
                .create_dish(DishDraft {
                    category_id: Some(category.id),
                    is_featured: Some(i % 2 == 0),
                    ..draft(name, "4.25")
                })
                .await
                .unwrap();
            dishes.push(dish);
        }

        f.service.trash_dish(dishes[0].id).await.unwrap();
        f.service.move_dish(dishes[3].id, Direction::Up).await.unwrap();
        f.service.set_featured(dishes[1].id, true).await.unwrap();
        f.service.set_featured(dishes[4].id, false).await.unwrap();
        f.service.restore_dish(dishes[0].id).await.unwrap();
        f.service.trash_dish(dishes[5].id).await.unwrap();
        f.service.move_dish(dishes[2].id, Direction::Down).await.unwrap();
        f.service.purge_trashed_dishes().await.unwrap();

        assert_catalog_consistent(&f).await;
        let visible = f.service.list_active_dishes(Some(category.id)).await;
        assert_eq!(visible.len(), 5);
        assert!(visible.iter().all(|d| d.active));
    }
}
