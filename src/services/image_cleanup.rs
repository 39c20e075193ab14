// src/services/image_cleanup.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

/// Libera as imagens de registros apagados de vez.
///
/// Roda depois do commit: uma falha aqui não desfaz o purge, só gera log.
#[async_trait]
pub trait ImageCleanup: Send + Sync {
    /// Devolve quantas imagens foram removidas.
    async fn release(&self, image_refs: &[String]) -> usize;
}

/// Remove os arquivos da pasta de uploads.
#[derive(Clone)]
pub struct FsImageCleanup {
    uploads_dir: PathBuf,
}

impl FsImageCleanup {
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self { uploads_dir }
    }

    /// "/uploads/pratos/abc.jpg" -> "{uploads_dir}/abc.jpg".
    /// Só o nome do arquivo é aproveitado, então "../" nunca sai da pasta.
    fn resolve(&self, image_ref: &str) -> Option<PathBuf> {
        let path_part = image_ref.split(['?', '#']).next().unwrap_or(image_ref);
        let file_name = Path::new(path_part).file_name()?;
        Some(self.uploads_dir.join(file_name))
    }
}

#[async_trait]
impl ImageCleanup for FsImageCleanup {
    async fn release(&self, image_refs: &[String]) -> usize {
        let mut deleted_count = 0;

        for image_ref in image_refs {
            let Some(file_path) = self.resolve(image_ref) else {
                tracing::warn!(image_ref = %image_ref, "Referência de imagem sem nome de arquivo");
                continue;
            };

            match fs::remove_file(&file_path).await {
                Ok(()) => deleted_count += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %file_path.display(), "Imagem já não existia");
                }
                Err(e) => {
                    tracing::warn!(path = %file_path.display(), error = %e, "Falha ao apagar imagem");
                }
            }
        }

        if deleted_count > 0 {
            tracing::info!(count = deleted_count, "Imagens de registros apagados removidas");
        }
        deleted_count
    }
}
