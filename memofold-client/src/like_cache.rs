use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Максимум записей на один вид кэша; при переполнении вытесняется
/// самая старая запись.
pub const MAX_ENTRIES_PER_KIND: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Вид кэшируемой сущности: пост или комментарий.
///
/// Каждому виду соответствует собственный ключ в персистентном
/// хранилище; записи разных видов независимы.
pub enum LikeKind {
    /// Лайки постов (ключ `postLikes`).
    Post,
    /// Лайки комментариев (ключ `commentLikes`).
    Comment,
}

impl LikeKind {
    /// Общеизвестный ключ хранилища для данного вида.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Post => "postLikes",
            Self::Comment => "commentLikes",
        }
    }
}

/// Байтовое key-value хранилище, переживающее перезапуск клиента.
///
/// Ошибки чтения схлопываются в `None`: кэш лайков сугубо
/// рекомендательный, и отсутствие данных эквивалентно пустому кэшу.
pub trait LikeStorage {
    /// Читает сырое значение по ключу; `None`, если записи нет
    /// или прочитать её не удалось.
    fn load(&self, key: &str) -> Option<String>;

    /// Записывает значение по ключу.
    fn save(&self, key: &str, value: &str) -> Result<(), String>;
}

#[derive(Debug)]
/// Файловое хранилище: по файлу `<key>.json` на ключ в заданном каталоге.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Создаёт хранилище в каталоге `dir`; сам каталог создаётся при записи.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl LikeStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| format!("failed to create cache dir: {err}"))?;
        fs::write(self.path_for(key), value)
            .map_err(|err| format!("failed to write cache file: {err}"))
    }
}

#[derive(Debug, Default)]
/// In-memory хранилище; используется в тестах вместо файловой системы.
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Создаёт пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LikeStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "memory storage is poisoned".to_string())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: LikeStorage + ?Sized> LikeStorage for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Option<String> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        (**self).save(key, value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LikeEntry {
    id: String,
    likers: Vec<String>,
}

/// Записи сериализуются списком в порядке вставки (это даёт порядок
/// вытеснения), но читается и унаследованный формат — плоский объект
/// `{id: [likers]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LikePayload {
    Entries(Vec<LikeEntry>),
    Legacy(HashMap<String, Vec<String>>),
}

#[derive(Debug)]
/// Локальный кэш лайков: по последней известной выборке лайкнувших
/// на каждую сущность.
///
/// Кэш никогда не авторитетен — серверные данные перезаписывают его
/// при каждой успешной выборке. Его единственная задача — не показывать
/// «не лайкнуто» сразу после перезапуска, пока выборка в пути.
pub struct LikeCache<S> {
    storage: S,
}

impl<S: LikeStorage> LikeCache<S> {
    /// Создаёт кэш поверх заданного хранилища.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Нижележащее хранилище.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Возвращает полное отображение `id -> лайкнувшие` для вида `kind`.
    ///
    /// Не падает никогда: отсутствующая запись или битый JSON дают
    /// пустое отображение (порча логируется).
    pub fn get(&self, kind: LikeKind) -> HashMap<String, Vec<String>> {
        self.load_entries(kind)
            .into_iter()
            .map(|entry| (entry.id, entry.likers))
            .collect()
    }

    /// Перезаписывает сохранённую выборку лайкнувших для `id` и
    /// персистирует всё отображение вида.
    pub fn set(&self, kind: LikeKind, id: &str, likers: &[String]) {
        let mut entries = self.load_entries(kind);
        entries.retain(|entry| entry.id != id);
        entries.push(LikeEntry {
            id: id.to_string(),
            likers: likers.to_vec(),
        });

        while entries.len() > MAX_ENTRIES_PER_KIND {
            entries.remove(0);
        }

        self.persist(kind, &entries);
    }

    /// Удаляет одну запись (используется при удалении комментария).
    pub fn remove(&self, kind: LikeKind, id: &str) {
        let mut entries = self.load_entries(kind);
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() != before {
            self.persist(kind, &entries);
        }
    }

    fn load_entries(&self, kind: LikeKind) -> Vec<LikeEntry> {
        let key = kind.storage_key();
        let Some(raw) = self.storage.load(key) else {
            return Vec::new();
        };

        match serde_json::from_str::<LikePayload>(&raw) {
            Ok(LikePayload::Entries(entries)) => entries,
            Ok(LikePayload::Legacy(map)) => map
                .into_iter()
                .map(|(id, likers)| LikeEntry { id, likers })
                .collect(),
            Err(err) => {
                tracing::warn!(%key, %err, "like cache is corrupted, treating as empty");
                Vec::new()
            }
        }
    }

    fn persist(&self, kind: LikeKind, entries: &[LikeEntry]) {
        let key = kind.storage_key();
        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%key, %err, "failed to serialize like cache");
                return;
            }
        };
        if let Err(err) = self.storage.save(key, &raw) {
            tracing::warn!(%key, %err, "failed to persist like cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> LikeCache<MemoryStorage> {
        LikeCache::new(MemoryStorage::new())
    }

    #[test]
    fn get_on_empty_storage_returns_empty_map() {
        let cache = cache();
        assert!(cache.get(LikeKind::Post).is_empty());
        assert!(cache.get(LikeKind::Comment).is_empty());
    }

    #[test]
    fn set_then_get_roundtrip() {
        let cache = cache();
        cache.set(LikeKind::Post, "p1", &["u9".to_string(), "u1".to_string()]);

        let map = cache.get(LikeKind::Post);
        assert_eq!(
            map.get("p1").map(Vec::as_slice),
            Some(["u9".to_string(), "u1".to_string()].as_slice())
        );
        // виды независимы
        assert!(cache.get(LikeKind::Comment).is_empty());
    }

    #[test]
    fn corrupted_payload_reads_as_empty() {
        let storage = MemoryStorage::new();
        storage
            .save("postLikes", "{not-json")
            .expect("save must succeed");

        let cache = LikeCache::new(storage);
        assert!(cache.get(LikeKind::Post).is_empty());
    }

    #[test]
    fn legacy_object_payload_is_readable() {
        let storage = MemoryStorage::new();
        storage
            .save("commentLikes", r#"{"c1": ["u1"], "c2": ["u2", "u3"]}"#)
            .expect("save must succeed");

        let cache = LikeCache::new(storage);
        let map = cache.get(LikeKind::Comment);
        assert_eq!(map.get("c1").map(Vec::as_slice), Some(["u1".to_string()].as_slice()));
        assert_eq!(map.get("c2").map(Vec::len), Some(2));
    }

    #[test]
    fn remove_deletes_single_entry() {
        let cache = cache();
        cache.set(LikeKind::Comment, "c1", &["u1".to_string()]);
        cache.set(LikeKind::Comment, "c2", &["u2".to_string()]);

        cache.remove(LikeKind::Comment, "c1");

        let map = cache.get(LikeKind::Comment);
        assert!(!map.contains_key("c1"));
        assert!(map.contains_key("c2"));
    }

    #[test]
    fn overflow_evicts_oldest_entries() {
        let cache = cache();
        for i in 0..(MAX_ENTRIES_PER_KIND + 10) {
            cache.set(LikeKind::Post, &format!("p{i}"), &["u1".to_string()]);
        }

        let map = cache.get(LikeKind::Post);
        assert_eq!(map.len(), MAX_ENTRIES_PER_KIND);
        assert!(!map.contains_key("p0"));
        assert!(map.contains_key(&format!("p{}", MAX_ENTRIES_PER_KIND + 9)));
    }

    #[test]
    fn rewriting_entry_refreshes_its_position() {
        let cache = cache();
        cache.set(LikeKind::Post, "p1", &["u1".to_string()]);
        for i in 0..MAX_ENTRIES_PER_KIND - 1 {
            cache.set(LikeKind::Post, &format!("x{i}"), &[]);
        }
        // повторная запись p1 делает её самой свежей
        cache.set(LikeKind::Post, "p1", &["u1".to_string(), "u2".to_string()]);
        cache.set(LikeKind::Post, "y", &[]);

        let map = cache.get(LikeKind::Post);
        assert_eq!(map.get("p1").map(Vec::len), Some(2));
    }

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir must be created");
        let cache = LikeCache::new(FileStorage::new(dir.path()));

        cache.set(LikeKind::Post, "p1", &["u1".to_string()]);

        let reopened = LikeCache::new(FileStorage::new(dir.path()));
        let map = reopened.get(LikeKind::Post);
        assert_eq!(map.get("p1").map(Vec::as_slice), Some(["u1".to_string()].as_slice()));
    }
}
