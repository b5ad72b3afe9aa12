// [libs/infra/remote/src/cache.rs]
/*!
 * =================================================================
 * APARATO: CONTENT-ADDRESSED RESPONSE CACHE (V4.2)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L4)
 * RESPONSABILIDAD: CACHÉ DE DISCO CON TTL Y CACHÉ LRU EN MEMORIA
 *
 * VISION HIPER-HOLÍSTICA:
 * Las respuestas costosas se direccionan por contenido: la llave es
 * el SHA-256 de los parámetros de la petición. La caché de disco
 * escribe por renombre atómico (lecturas concurrentes seguras,
 * escrituras serializadas); la LRU en memoria cubre respuestas
 * pequeñas de alta rotación.
 * =================================================================
 */

use crate::errors::RemoteError;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Llave direccionada por contenido: SHA-256 hexadecimal de los
/// parámetros estables de la petición, en orden.
pub fn content_address(request_parameters: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for parameter in request_parameters {
        hasher.update(parameter.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(hasher.finalize())
}

/// Caché de disco con TTL, una entrada por llave de contenido.
pub struct DiskResponseCache {
    cache_directory: PathBuf,
    time_to_live: Duration,
}

impl DiskResponseCache {
    pub fn new(cache_directory: PathBuf, time_to_live_days: u64) -> Self {
        Self {
            cache_directory,
            time_to_live: Duration::from_secs(time_to_live_days * 24 * 3_600),
        }
    }

    fn entry_path(&self, content_key: &str) -> PathBuf {
        self.cache_directory.join(format!("{content_key}.json"))
    }

    /// Lee una entrada si existe y su edad no supera el TTL.
    pub async fn read_fresh(&self, content_key: &str) -> Option<String> {
        let entry_path = self.entry_path(content_key);

        let metadata = tokio::fs::metadata(&entry_path).await.ok()?;
        let modified = metadata.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).ok()?;

        if age > self.time_to_live {
            debug!("🗑️ [CACHE]: Entry {} expired ({}h old).", content_key, age.as_secs() / 3_600);
            return None;
        }

        tokio::fs::read_to_string(&entry_path).await.ok()
    }

    /// Escribe una entrada por renombre atómico (tmp -> final).
    pub async fn write(&self, content_key: &str, payload: &str) -> Result<(), RemoteError> {
        tokio::fs::create_dir_all(&self.cache_directory).await?;

        let final_path = self.entry_path(content_key);
        let temporary_path = self.cache_directory.join(format!("{content_key}.tmp"));

        tokio::fs::write(&temporary_path, payload).await?;
        if let Err(rename_fault) = tokio::fs::rename(&temporary_path, &final_path).await {
            // Una escritura concurrente pudo ganar el renombre; la caché
            // sigue siendo válida con la entrada del ganador.
            warn!("⚠️ [CACHE]: Rename bypassed for {}: {}", content_key, rename_fault);
            let _ = tokio::fs::remove_file(&temporary_path).await;
        }
        Ok(())
    }
}

/// LRU en memoria con candado, compartible entre workers de un pase.
pub struct SharedLruCache<K: std::hash::Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: std::hash::Hash + Eq, V: Clone> SharedLruCache<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        let bounded = NonZeroUsize::new(capacity.max(1)).expect("capacity floor is 1");
        Self { inner: Mutex::new(LruCache::new(bounded)) }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.put(key, value);
        }
    }
}
