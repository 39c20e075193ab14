// src/services/document_service.rs

use std::path::PathBuf;

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        catalog::{Category, Dish},
        exchange_rate::ExchangeRate,
    },
    services::{catalog_service::CatalogService, pricing_service::PricingService},
};

/// Seção impressa do cardápio: um título e seus pratos, já na ordem de exibição.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSection {
    pub title: String,
    pub dishes: Vec<Dish>,
}

#[derive(Clone)]
pub struct DocumentService {
    catalog: CatalogService,
    pricing: PricingService,
    fonts_dir: PathBuf,
    public_menu_url: Option<String>,
}

impl DocumentService {
    pub fn new(
        catalog: CatalogService,
        pricing: PricingService,
        fonts_dir: PathBuf,
        public_menu_url: Option<String>,
    ) -> Self {
        Self {
            catalog,
            pricing,
            fonts_dir,
            public_menu_url,
        }
    }

    /// Cardápio público em PDF, no idioma pedido.
    pub async fn generate_menu_pdf(&self, lang: &str) -> Result<Vec<u8>, AppError> {
        // 1. Busca os dados (mesma leitura do cardápio público)
        let categories = self.catalog.list_active_categories().await;
        let dishes = self.catalog.list_active_dishes(None).await;
        let rate = self.pricing.public_rate().await;

        let sections = menu_sections(&categories, &dishes, lang);
        tracing::info!(sections = sections.len(), dishes = dishes.len(), lang, "Gerando cardápio em PDF");

        // 2. Monta e renderiza
        self.render(&sections, rate.as_ref(), lang)
    }

    fn render(&self, sections: &[MenuSection], rate: Option<&ExchangeRate>, lang: &str) -> Result<Vec<u8>, AppError> {
        let labels = Labels::for_lang(lang);

        // Carrega a fonte da pasta configurada
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None).map_err(|_| {
            AppError::FontNotFound(format!("Fonte Roboto não encontrada em {}", self.fonts_dir.display()))
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(labels.title);
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new(labels.title).styled(style::Style::new().bold().with_font_size(18)));
        if let Some(rate) = rate {
            doc.push(
                elements::Paragraph::new(format!("{}: 1 BOB = {} BRL", labels.rate, rate.value))
                    .styled(style::Style::new().with_font_size(9)),
            );
        }
        doc.push(elements::Break::new(1.5));

        // --- SEÇÕES ---
        let style_bold = style::Style::new().bold();
        for section in sections {
            doc.push(elements::Paragraph::new(section.title.clone()).styled(style::Style::new().bold().with_font_size(14)));

            // Pesos das colunas: Prato (5), BOB (2), BRL (2)
            let mut table = elements::TableLayout::new(vec![5, 2, 2]);
            table.set_cell_decorator(elements::FrameCellDecorator::new(false, true, false));
            table
                .row()
                .element(elements::Paragraph::new(labels.dish).styled(style_bold))
                .element(elements::Paragraph::new("Bs").styled(style_bold))
                .element(elements::Paragraph::new("R$").styled(style_bold))
                .push()
                .map_err(pdf_error)?;

            for dish in &section.dishes {
                let mut name = elements::LinearLayout::vertical();
                name.push(elements::Paragraph::new(dish.name.resolve(lang).unwrap_or_default()));
                if let Some(description) = dish.description.resolve(lang) {
                    name.push(
                        elements::Paragraph::new(description).styled(style::Style::new().italic().with_font_size(8)),
                    );
                }
                table
                    .row()
                    .element(name)
                    .element(elements::Paragraph::new(format!("{:.2}", dish.price_bob)))
                    .element(elements::Paragraph::new(format!("{:.2}", dish.price_brl)))
                    .push()
                    .map_err(pdf_error)?;
            }

            doc.push(table);
            doc.push(elements::Break::new(1));
        }

        // --- QR CODE DO CARDÁPIO ONLINE ---
        if let Some(url) = &self.public_menu_url {
            doc.push(elements::Break::new(1));
            doc.push(elements::Paragraph::new(labels.online).styled(style::Style::new().bold().with_font_size(10)));

            let code = QrCode::new(url.as_bytes()).map_err(pdf_error)?;
            let image_buffer = code.render::<Luma<u8>>().build();
            let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

            let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                .map_err(pdf_error)?
                .with_scale(genpdf::Scale::new(0.5, 0.5));
            doc.push(pdf_image);
            doc.push(elements::Paragraph::new(url.clone()).styled(style::Style::new().with_font_size(8)));
        }

        // Renderiza para buffer em memória
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(pdf_error)?;
        Ok(buffer)
    }
}

fn pdf_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::anyhow!("Falha ao montar o PDF: {e}"))
}

struct Labels {
    title: &'static str,
    featured: &'static str,
    others: &'static str,
    dish: &'static str,
    rate: &'static str,
    online: &'static str,
}

impl Labels {
    fn for_lang(lang: &str) -> Self {
        match lang {
            "pt" => Labels {
                title: "Cardápio",
                featured: "Destaques",
                others: "Outros",
                dish: "Prato",
                rate: "Câmbio",
                online: "Cardápio online",
            },
            "en" => Labels {
                title: "Menu",
                featured: "Featured",
                others: "Others",
                dish: "Dish",
                rate: "Exchange rate",
                online: "Online menu",
            },
            _ => Labels {
                title: "Menú",
                featured: "Destacados",
                others: "Otros",
                dish: "Plato",
                rate: "Tipo de cambio",
                online: "Menú en línea",
            },
        }
    }
}

/// Destaques primeiro, depois uma seção por categoria (na ordem das categorias)
/// e por fim os pratos sem categoria. Seções vazias não são impressas.
pub fn menu_sections(categories: &[Category], dishes: &[Dish], lang: &str) -> Vec<MenuSection> {
    let labels = Labels::for_lang(lang);
    let mut sections = Vec::new();

    let featured: Vec<Dish> = dishes.iter().filter(|d| d.is_featured).cloned().collect();
    if !featured.is_empty() {
        sections.push(MenuSection {
            title: labels.featured.to_string(),
            dishes: featured,
        });
    }

    let regular = |category_id: Option<Uuid>| -> Vec<Dish> {
        dishes
            .iter()
            .filter(|d| !d.is_featured && d.category_id == category_id)
            .cloned()
            .collect()
    };

    for category in categories {
        let members = regular(Some(category.id));
        if !members.is_empty() {
            sections.push(MenuSection {
                title: category.name.resolve(lang).unwrap_or_default().to_string(),
                dishes: members,
            });
        }
    }

    // Sem categoria, ou com categoria fora da lista ativa
    let known: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
    let orphans: Vec<Dish> = dishes
        .iter()
        .filter(|d| !d.is_featured && d.category_id.is_none_or(|id| !known.contains(&id)))
        .cloned()
        .collect();
    if !orphans.is_empty() {
        sections.push(MenuSection {
            title: labels.others.to_string(),
            dishes: orphans,
        });
    }

    sections
}
