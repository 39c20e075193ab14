// src/catalog/ordering.rs
//
// Ordem densa (1..N, sem buracos nem repetidos) dentro de cada partição do cardápio.
// As funções aqui são puras: recebem os membros ativos da partição, mexem nos
// valores de `order` e devolvem os IDs alterados para o serviço persistir.

use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Category, Dish},
};

/// Conjunto de registros sobre o qual a ordem densa é mantida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    FeaturedDishes,
    RegularDishes,
    Categories,
}

impl Partition {
    pub fn for_featured(is_featured: bool) -> Self {
        if is_featured {
            Partition::FeaturedDishes
        } else {
            Partition::RegularDishes
        }
    }

    /// Partição atual do prato. Prato na lixeira não pertence a nenhuma.
    pub fn of_dish(dish: &Dish) -> Option<Self> {
        dish.active.then(|| Self::for_featured(dish.is_featured))
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Partition::FeaturedDishes => "pratos em destaque",
            Partition::RegularDishes => "pratos",
            Partition::Categories => "categorias",
        };
        f.write_str(name)
    }
}

/// Registro que ocupa uma posição numa partição.
pub trait Ranked {
    fn id(&self) -> Uuid;
    fn order(&self) -> i32;
    fn set_order(&mut self, order: i32);
}

impl Ranked for Dish {
    fn id(&self) -> Uuid {
        self.id
    }
    fn order(&self) -> i32 {
        self.order
    }
    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

impl Ranked for Category {
    fn id(&self) -> Uuid {
        self.id
    }
    fn order(&self) -> i32 {
        self.order
    }
    fn set_order(&mut self, order: i32) {
        self.order = order;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Swapped { moved: Uuid, displaced: Uuid },
    /// Primeiro subindo ou último descendo: nada a fazer, e não é erro.
    AtBoundary,
}

/// Ordena por `order` e usa o `id` como desempate determinístico.
pub fn sort_members<T: Ranked>(members: &mut [T]) {
    members.sort_by_key(|m| (m.order(), m.id()));
}

/// Próxima posição livre no fim da partição (max + 1).
pub fn next_order<T: Ranked>(members: &[T]) -> i32 {
    members.iter().map(Ranked::order).max().unwrap_or(0) + 1
}

/// Reatribui 1..N na ordem atual e devolve quem mudou de posição.
pub fn renormalize<T: Ranked>(members: &mut [T]) -> Vec<Uuid> {
    sort_members(members);

    let mut changed = Vec::new();
    for (index, member) in members.iter_mut().enumerate() {
        let expected = index as i32 + 1;
        if member.order() != expected {
            member.set_order(expected);
            changed.push(member.id());
        }
    }
    changed
}

/// Troca a posição do membro com o vizinho imediato.
///
/// Antes da troca a partição é normalizada, para que empates herdados
/// (estado de bug) não transformem a troca em no-op silencioso.
/// Devolve o resultado e todos os IDs cujo `order` mudou.
pub fn move_member<T: Ranked>(
    members: &mut [T],
    id: Uuid,
    direction: Direction,
) -> Result<(MoveOutcome, Vec<Uuid>), AppError> {
    let mut changed = renormalize(members);

    let position = members
        .iter()
        .position(|m| m.id() == id)
        .ok_or_else(|| AppError::NotFound(format!("Registro {id} não está na partição")))?;

    let neighbour = match direction {
        Direction::Up => position.checked_sub(1),
        Direction::Down => (position + 1 < members.len()).then_some(position + 1),
    };

    let Some(neighbour) = neighbour else {
        return Ok((MoveOutcome::AtBoundary, changed));
    };

    let own_order = members[position].order();
    let neighbour_order = members[neighbour].order();
    members[position].set_order(neighbour_order);
    members[neighbour].set_order(own_order);

    let displaced = members[neighbour].id();
    for touched in [id, displaced] {
        if !changed.contains(&touched) {
            changed.push(touched);
        }
    }
    sort_members(members);

    Ok((MoveOutcome::Swapped { moved: id, displaced }, changed))
}

/// Coloca o recém-chegado no topo (order = 1) e empurra todos os outros uma posição.
///
/// `members` não deve conter o recém-chegado. Ele é inserido aqui.
pub fn promote_to_top<T: Ranked>(members: &mut Vec<T>, mut newcomer: T) -> Vec<Uuid> {
    let mut changed = Vec::with_capacity(members.len() + 1);

    for member in members.iter_mut() {
        member.set_order(member.order() + 1);
        changed.push(member.id());
    }
    newcomer.set_order(1);
    changed.push(newcomer.id());
    members.push(newcomer);

    // Repara buracos que já existissem antes da promoção
    for id in renormalize(members) {
        if !changed.contains(&id) {
            changed.push(id);
        }
    }
    changed
}

/// Adiciona o registro no fim da partição (max + 1) e devolve a cópia já posicionada.
pub fn append_to_partition<T: Ranked + Clone>(members: &mut Vec<T>, mut newcomer: T) -> T {
    newcomer.set_order(next_order(members));
    members.push(newcomer.clone());
    newcomer
}
