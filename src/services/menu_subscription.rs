// src/services/menu_subscription.rs

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    db::CatalogStore,
    models::catalog::{Dish, DishFilter},
};

/// Assinatura de mudanças do cardápio.
///
/// Não carrega dados junto com o aviso: a cada revisão nova a lista é lida
/// de novo do store, então quem assina sempre recebe um snapshot commitado inteiro.
pub struct MenuSubscription {
    store: Arc<dyn CatalogStore>,
    filter: DishFilter,
    revision: watch::Receiver<u64>,
    primed: bool,
}

impl MenuSubscription {
    pub(crate) fn new(store: Arc<dyn CatalogStore>, filter: DishFilter) -> Self {
        let revision = store.subscribe();
        Self {
            store,
            filter,
            revision,
            primed: false,
        }
    }

    /// A primeira chamada devolve o estado atual; as seguintes esperam o próximo commit.
    /// `None` quando o store foi descartado.
    pub async fn next(&mut self) -> Option<Vec<Dish>> {
        if self.primed {
            self.revision.changed().await.ok()?;
        } else {
            self.revision.borrow_and_update();
            self.primed = true;
        }

        match self.store.list_dishes(&self.filter).await {
            Ok(dishes) => Some(dishes),
            Err(e) => {
                tracing::error!(error = ?e, "Falha ao ler o cardápio para a assinatura");
                Some(Vec::new())
            }
        }
    }

    /// Revisão vista por último.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }
}
