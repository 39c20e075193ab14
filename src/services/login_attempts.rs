// src/services/login_attempts.rs

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

/// Contador de falhas de login por chave (e-mail normalizado).
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// `true` se a chave estourou o limite dentro da janela atual.
    async fn is_blocked(&self, key: &str) -> bool;

    async fn record_failure(&self, key: &str);

    async fn clear(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    failures: u32,
    started_at: Instant,
}

/// Guarda as tentativas em memória do processo. Reiniciar o servidor zera tudo.
pub struct InMemoryLoginAttempts {
    max_attempts: u32,
    window: Duration,
    entries: Mutex<HashMap<String, Window>>,
}

impl InMemoryLoginAttempts {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn expired(&self, entry: &Window, now: Instant) -> bool {
        now.duration_since(entry.started_at) >= self.window
    }
}

#[async_trait]
impl LoginAttemptStore for InMemoryLoginAttempts {
    async fn is_blocked(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if self.expired(entry, now) => {
                entries.remove(key);
                false
            }
            Some(entry) => entry.failures >= self.max_attempts,
            None => false,
        }
    }

    async fn record_failure(&self, key: &str) {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert(Window {
            failures: 0,
            started_at: now,
        });
        if self.expired(entry, now) {
            *entry = Window {
                failures: 0,
                started_at: now,
            };
        }
        entry.failures += 1;
    }

    async fn clear(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
