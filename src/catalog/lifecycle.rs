// src/catalog/lifecycle.rs
//
// Ativo <-> Lixeira (trash/restore), Lixeira -> Apagado (purge).
// Não existe caminho direto de Ativo para Apagado.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Category, Dish},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Trashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Dish,
    Category,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Dish => "Prato",
            EntityKind::Category => "Categoria",
        })
    }
}

/// Registro com exclusão lógica.
pub trait SoftDelete {
    const KIND: EntityKind;

    fn record_id(&self) -> Uuid;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
    fn touch(&mut self, now: DateTime<Utc>);

    fn state(&self) -> LifecycleState {
        if self.is_active() {
            LifecycleState::Active
        } else {
            LifecycleState::Trashed
        }
    }
}

impl SoftDelete for Dish {
    const KIND: EntityKind = EntityKind::Dish;

    fn record_id(&self) -> Uuid {
        self.id
    }
    fn is_active(&self) -> bool {
        self.active
    }
    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl SoftDelete for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn record_id(&self) -> Uuid {
        self.id
    }
    fn is_active(&self) -> bool {
        self.active
    }
    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Exige um registro ativo (para editar, reordenar ou mandar para a lixeira).
pub fn require_active<T: SoftDelete>(record: Option<T>, id: Uuid) -> Result<T, AppError> {
    match record {
        Some(record) if record.is_active() => Ok(record),
        _ => Err(AppError::NotFound(format!("{} ativo {id} não encontrado", T::KIND))),
    }
}

/// Ativo -> Lixeira. O `order` antigo fica abandonado até a restauração.
pub fn trash<T: SoftDelete>(record: Option<T>, id: Uuid, now: DateTime<Utc>) -> Result<T, AppError> {
    let mut record = require_active(record, id)?;
    record.set_active(false);
    record.touch(now);
    Ok(record)
}

/// Lixeira -> Ativo. A posição nova é atribuída pelo chamador (fim da partição).
pub fn restore<T: SoftDelete>(record: Option<T>, id: Uuid, now: DateTime<Utc>) -> Result<T, AppError> {
    let mut record = record.ok_or_else(|| AppError::NotFound(format!("{} {id} não encontrado", T::KIND)))?;
    if record.state() == LifecycleState::Active {
        return Err(AppError::InvalidState(format!("{} {id} não está na lixeira", T::KIND)));
    }
    record.set_active(true);
    record.touch(now);
    Ok(record)
}

/// Só se apaga de vez o que já está na lixeira.
pub fn ensure_purgeable<T: SoftDelete>(record: Option<&T>, id: Uuid) -> Result<(), AppError> {
    match record.map(SoftDelete::state) {
        None => Err(AppError::NotFound(format!("{} {id} não encontrado", T::KIND))),
        Some(LifecycleState::Active) => Err(AppError::InvalidState(format!(
            "{} {id} está ativo: mande para a lixeira antes de apagar",
            T::KIND
        ))),
        Some(LifecycleState::Trashed) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::LocalizedText;

    fn category(active: bool) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: LocalizedText::single("es", "Sopas"),
            image_url: None,
            order: 3,
            active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn trash_deactivates_and_touches() {
        let record = category(true);
        let id = record.id;
        let later = record.updated_at + chrono::Duration::seconds(5);

        let trashed = trash(Some(record), id, later).unwrap();

        assert_eq!(trashed.state(), LifecycleState::Trashed);
        assert_eq!(trashed.updated_at, later);
    }

    #[test]
    fn trash_requires_an_active_record() {
        let id = Uuid::new_v4();
        assert!(matches!(trash::<Category>(None, id, Utc::now()), Err(AppError::NotFound(_))));

        let trashed = category(false);
        let id = trashed.id;
        assert!(matches!(trash(Some(trashed), id, Utc::now()), Err(AppError::NotFound(_))));
    }

    #[test]
    fn restore_only_from_trash() {
        let active = category(true);
        let id = active.id;
        assert!(matches!(restore(Some(active), id, Utc::now()), Err(AppError::InvalidState(_))));

        let trashed = category(false);
        let id = trashed.id;
        assert!(restore(Some(trashed), id, Utc::now()).unwrap().is_active());

        assert!(matches!(
            restore::<Category>(None, Uuid::new_v4(), Utc::now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn purge_refuses_active_records() {
        let active = category(true);
        assert!(matches!(
            ensure_purgeable(Some(&active), active.id),
            Err(AppError::InvalidState(_))
        ));

        let trashed = category(false);
        assert!(ensure_purgeable(Some(&trashed), trashed.id).is_ok());
        assert!(matches!(
            ensure_purgeable::<Category>(None, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }
}
