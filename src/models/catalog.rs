// src/models/catalog.rs

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Idioma de trabalho do cardápio: nomes legados (sem idioma) caem aqui.
pub const PRIMARY_LANG: &str = "es";

// --- 1. Texto por idioma ---
// Guardado como JSONB: { "es": "Salteña", "pt": "Empanada boliviana" }
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    pub fn single(lang: &str, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(lang.to_string(), text.into());
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pelo menos um idioma com texto que não seja só espaço.
    pub fn has_text(&self) -> bool {
        self.0.values().any(|t| !t.trim().is_empty())
    }

    /// Texto no idioma pedido, senão no idioma de trabalho, senão o primeiro disponível.
    pub fn resolve(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.get(PRIMARY_LANG))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    /// Remove espaços nas pontas e descarta idiomas vazios.
    pub fn trimmed(self) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(lang, text)| (lang.trim().to_lowercase(), text.trim().to_string()))
                .filter(|(lang, text)| !lang.is_empty() && !text.is_empty())
                .collect(),
        )
    }
}

// --- 2. Entrada de texto na fronteira de ingestão ---
// Registros antigos mandam só uma string; os novos mandam o objeto por idioma.
// Normalizamos uma única vez aqui, e o resto do sistema só enxerga LocalizedText.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TextInput {
    Legacy(String),
    Localized(LocalizedText),
}

impl TextInput {
    pub fn normalize(self) -> LocalizedText {
        match self {
            TextInput::Legacy(text) => LocalizedText::single(PRIMARY_LANG, text),
            TextInput::Localized(text) => text,
        }
        .trimmed()
    }
}

// --- 3. Estado do ciclo de vida usado nos filtros ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    #[default]
    Active,
    Trashed,
    All,
}

impl RecordState {
    pub fn matches(self, active: bool) -> bool {
        match self {
            RecordState::Active => active,
            RecordState::Trashed => !active,
            RecordState::All => true,
        }
    }
}

// --- 4. Pratos ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
    pub id: Uuid,
    #[sqlx(json)]
    pub name: LocalizedText,
    #[sqlx(json)]
    #[serde(default, skip_serializing_if = "LocalizedText::is_empty")]
    pub description: LocalizedText,
    /// Preço autoritativo em bolivianos.
    #[schema(value_type = f64, example = 10.0)]
    pub price_bob: Decimal,
    /// Derivado: round(price_bob * câmbio, 2).
    #[schema(value_type = f64, example = 27.0)]
    pub price_brl: Decimal,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub is_featured: bool,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dish {
    /// Ordem de exibição: ativos, destaques primeiro, depois `order` e `id` como desempate.
    pub fn display_key(&self) -> (Reverse<bool>, Reverse<bool>, i32, Uuid) {
        (Reverse(self.active), Reverse(self.is_featured), self.order, self.id)
    }
}

// --- 5. Categorias ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[sqlx(json)]
    pub name: LocalizedText,
    pub image_url: Option<String>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn display_key(&self) -> (Reverse<bool>, i32, Uuid) {
        (Reverse(self.active), self.order, self.id)
    }
}

// --- 6. Filtros de consulta ---
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DishFilter {
    pub state: RecordState,
    pub category_id: Option<Uuid>,
    pub featured: Option<bool>,
}

impl DishFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn trashed() -> Self {
        Self { state: RecordState::Trashed, ..Self::default() }
    }

    pub fn with_state(state: RecordState) -> Self {
        Self { state, ..Self::default() }
    }

    pub fn in_category(mut self, category_id: Option<Uuid>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    pub fn matches(&self, dish: &Dish) -> bool {
        self.state.matches(dish.active)
            && self.category_id.is_none_or(|id| dish.category_id == Some(id))
            && self.featured.is_none_or(|f| dish.is_featured == f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryFilter {
    pub state: RecordState,
}

impl CategoryFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn trashed() -> Self {
        Self { state: RecordState::Trashed }
    }

    pub fn matches(&self, category: &Category) -> bool {
        self.state.matches(category.active)
    }
}

// --- 7. Rascunhos de escrita (já normalizados) ---
#[derive(Debug, Clone, PartialEq)]
pub struct DishDraft {
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub price_bob: Decimal,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    /// None = manter o valor atual (na criação, vira `false`).
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDraft {
    pub name: LocalizedText,
    pub image_url: Option<String>,
}
