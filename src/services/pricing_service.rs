// src/services/pricing_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    catalog::{lifecycle::SoftDelete, pricing},
    common::{db_utils::retry_on_conflict, error::AppError},
    db::{CatalogStore, CatalogTx, LockScope, WriteBatch},
    models::{
        catalog::DishFilter,
        exchange_rate::{ExchangeRate, RateUpdate},
    },
};

const RATE_ONLY: &[LockScope] = &[LockScope::ExchangeRate];
const RATE_AND_DISHES: &[LockScope] = &[LockScope::Dishes, LockScope::ExchangeRate];

/// Dono do câmbio BOB -> BRL e do preço em reais derivado dele.
#[derive(Clone)]
pub struct PricingService {
    store: Arc<dyn CatalogStore>,
}

impl PricingService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn current_rate(&self) -> Result<Option<ExchangeRate>, AppError> {
        self.store.exchange_rate().await
    }

    /// Versão do cardápio público: erro de leitura vira "sem câmbio" e log.
    pub async fn public_rate(&self) -> Option<ExchangeRate> {
        self.current_rate().await.unwrap_or_else(|e| {
            tracing::error!(error = ?e, "Falha ao ler o câmbio para o cardápio público");
            None
        })
    }

    /// Troca o câmbio e, se pedido, recalcula o preço em reais de todos os pratos ativos
    /// na mesma transação. Valor inválido não grava nada.
    pub async fn set_exchange_rate(&self, value: Decimal, recalculate: bool) -> Result<RateUpdate, AppError> {
        let rate = ExchangeRate::try_new(value, Utc::now())?;
        let rate = &rate;

        let update =
            retry_on_conflict("set_exchange_rate", move || self.set_exchange_rate_once(rate, recalculate)).await?;
        tracing::info!(
            rate = %update.rate.value,
            recalculated = ?update.recalculated,
            "Câmbio BOB -> BRL atualizado"
        );
        Ok(update)
    }

    async fn set_exchange_rate_once(&self, rate: &ExchangeRate, recalculate: bool) -> Result<RateUpdate, AppError> {
        let scopes = if recalculate { RATE_AND_DISHES } else { RATE_ONLY };
        let mut tx = self.store.begin(scopes).await?;

        let mut batch = WriteBatch::new();
        batch.put_exchange_rate(rate.clone());
        let recalculated = if recalculate {
            Some(stage_recalculation(tx.as_mut(), rate, rate.updated_at, &mut batch).await?)
        } else {
            None
        };

        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(RateUpdate {
            rate: rate.clone(),
            recalculated,
        })
    }

    /// Só o câmbio. Os preços em reais ficam defasados até o próximo recálculo.
    pub async fn set_rate_without_recalc(&self, value: Decimal) -> Result<ExchangeRate, AppError> {
        Ok(self.set_exchange_rate(value, false).await?.rate)
    }

    /// Grava o câmbio novo e recalcula tudo. Devolve quantos pratos mudaram de preço.
    pub async fn recalculate_all(&self, value: Decimal) -> Result<u64, AppError> {
        let update = self.set_exchange_rate(value, true).await?;
        Ok(update.recalculated.unwrap_or(0))
    }

    /// Recalcula com o câmbio já gravado.
    pub async fn recalculate_prices(&self) -> Result<u64, AppError> {
        let count = retry_on_conflict("recalculate_prices", move || self.recalculate_prices_once()).await?;
        tracing::info!(count, "Preços em reais recalculados");
        Ok(count)
    }

    async fn recalculate_prices_once(&self) -> Result<u64, AppError> {
        let mut tx = self.store.begin(RATE_AND_DISHES).await?;
        let rate = tx
            .exchange_rate()
            .await?
            .ok_or_else(|| AppError::InvalidState("O câmbio BOB -> BRL ainda não foi configurado".to_string()))?;

        let mut batch = WriteBatch::new();
        let count = stage_recalculation(tx.as_mut(), &rate, Utc::now(), &mut batch).await?;
        tx.apply(batch).await?;
        tx.commit().await?;
        Ok(count)
    }

    /// Câmbio inicial vindo da configuração. Não sobrescreve um câmbio já gravado.
    pub async fn seed_initial_rate(&self, value: Decimal) -> Result<bool, AppError> {
        let rate = ExchangeRate::try_new(value, Utc::now())?;
        let mut tx = self.store.begin(RATE_ONLY).await?;
        if tx.exchange_rate().await?.is_some() {
            return Ok(false);
        }

        let mut batch = WriteBatch::new();
        batch.put_exchange_rate(rate.clone());
        tx.apply(batch).await?;
        tx.commit().await?;
        tracing::info!(rate = %rate.value, "Câmbio inicial gravado");
        Ok(true)
    }
}

/// Coloca no lote só os pratos ativos cujo preço em reais muda.
async fn stage_recalculation(
    tx: &mut dyn CatalogTx,
    rate: &ExchangeRate,
    now: DateTime<Utc>,
    batch: &mut WriteBatch,
) -> Result<u64, AppError> {
    let mut count = 0;
    for mut dish in tx.dishes(&DishFilter::active()).await? {
        if pricing::resync(&mut dish, rate)? {
            dish.touch(now);
            batch.put_dish(dish);
            count += 1;
        }
    }
    Ok(count)
}
