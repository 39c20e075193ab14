// src/catalog/invariants.rs
//
// Verificações das regras que precisam valer depois de toda operação concluída.
// O serviço roda `ensure_dense` no plano de escrita antes do commit; os testes
// usam `check_catalog` sobre o catálogo inteiro.

use std::collections::HashSet;

use anyhow::anyhow;

use crate::{
    catalog::{
        ordering::{sort_members, Partition, Ranked},
        pricing,
    },
    common::error::AppError,
    models::{
        catalog::{Category, Dish},
        exchange_rate::ExchangeRate,
    },
};

/// Os `order` da partição são exatamente {1..N}.
pub fn is_dense<T: Ranked + Clone>(members: &[T]) -> bool {
    let mut sorted = members.to_vec();
    sort_members(&mut sorted);
    sorted
        .iter()
        .enumerate()
        .all(|(index, member)| member.order() == index as i32 + 1)
}

/// Recusa o plano de escrita se ele deixaria a partição com buracos ou repetidos.
pub fn ensure_dense<T: Ranked + Clone>(partition: Partition, members: &[T]) -> Result<(), AppError> {
    if is_dense(members) {
        return Ok(());
    }
    let mut orders: Vec<i32> = members.iter().map(Ranked::order).collect();
    orders.sort_unstable();
    tracing::error!(%partition, ?orders, "Plano de escrita quebraria a ordem densa");
    Err(AppError::InternalServerError(anyhow!(
        "ordem inválida na partição {partition}: {orders:?}"
    )))
}

/// Lista de violações encontradas num catálogo completo (vazia = tudo certo).
pub fn check_catalog(
    dishes: &[Dish],
    categories: &[Category],
    rate: Option<&ExchangeRate>,
) -> Vec<String> {
    let mut violations = Vec::new();

    for featured in [true, false] {
        let partition = Partition::for_featured(featured);
        let members: Vec<Dish> = dishes
            .iter()
            .filter(|d| Partition::of_dish(d) == Some(partition))
            .cloned()
            .collect();
        if !is_dense(&members) {
            violations.push(format!("partição '{partition}' não está densa"));
        }
    }

    let active_categories: Vec<Category> = categories.iter().filter(|c| c.active).cloned().collect();
    if !is_dense(&active_categories) {
        violations.push(format!("partição '{}' não está densa", Partition::Categories));
    }

    let category_ids: HashSet<_> = categories.iter().map(|c| c.id).collect();
    for dish in dishes {
        if let Some(category_id) = dish.category_id {
            if !category_ids.contains(&category_id) {
                violations.push(format!("prato {} aponta para categoria inexistente {category_id}", dish.id));
            }
        }
        if let Some(rate) = rate {
            if dish.active && !pricing::is_in_sync(dish, rate) {
                violations.push(format!("prato {} com preço BRL fora do câmbio", dish.id));
            }
        }
    }

    violations
}
