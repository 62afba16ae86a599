use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::{RngExt, distr::Alphanumeric};

use crate::api::{NewPost, PostsApi};
use crate::error::{MemoFoldError, MemoFoldResult};
use crate::like_cache::{LikeCache, LikeKind, LikeStorage};
use crate::models::{Comment, CurrentUser, Post};
use crate::reconcile::{decorate_comment, decorate_post};
use crate::store::{FeedStore, LikeTarget};

/// Окно подавления повторного лайка одной и той же сущности.
/// Чистый UX-троттлинг, не требование корректности.
pub const LIKE_COOLDOWN: Duration = Duration::from_millis(500);

/// Фаза взаимодействия для одной сущности.
///
/// Отсутствие записи во флагах — это Idle. Вторая попытка действия
/// над занятой сущностью отклоняется, а не ставится в очередь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InteractionPhase {
    Optimistic,
    RollingBack,
}

#[derive(Debug)]
struct ServiceState<S> {
    store: FeedStore,
    cache: LikeCache<S>,
    in_flight: HashMap<String, InteractionPhase>,
    last_like_at: HashMap<String, Instant>,
}

#[derive(Debug)]
/// Слой обработчиков действий: оркестрирует оптимистичные мутации,
/// запись в кэш, единственный сетевой вызов и откат-перевыборкой
/// при неудаче.
///
/// Машина состояний на сущность:
/// `Idle → Optimistic → Idle` (успех) или
/// `Idle → Optimistic → RollingBack → Idle` (неудача).
///
/// Состояние под мьютексом, который никогда не удерживается через
/// точку ожидания: сами мутации синхронны, сеть — между захватами.
pub struct FeedService<A, S> {
    api: A,
    current_user: CurrentUser,
    like_cooldown: Duration,
    state: Mutex<ServiceState<S>>,
}

impl<A: PostsApi, S: LikeStorage> FeedService<A, S> {
    /// Создаёт сервис с явным контекстом пользователя,
    /// API-коллаборатором и кэшем лайков.
    pub fn new(api: A, cache: LikeCache<S>, current_user: CurrentUser) -> Self {
        Self {
            api,
            current_user,
            like_cooldown: LIKE_COOLDOWN,
            state: Mutex::new(ServiceState {
                store: FeedStore::new(),
                cache,
                in_flight: HashMap::new(),
                last_like_at: HashMap::new(),
            }),
        }
    }

    /// Переопределяет окно подавления лайков (в тестах — ноль).
    pub fn set_like_cooldown(&mut self, cooldown: Duration) {
        self.like_cooldown = cooldown;
    }

    /// Контекст текущего пользователя.
    pub fn current_user(&self) -> &CurrentUser {
        &self.current_user
    }

    /// Нижележащий API-клиент.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Снимок текущей ленты.
    pub fn posts(&self) -> Vec<Post> {
        self.state().store.posts().to_vec()
    }

    /// Снимок одного поста.
    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.state().store.post(post_id).cloned()
    }

    /// Полная загрузка ленты: выборка, слияние с кэшем, замена
    /// хранилища и перезапись кэша серверными лайками. Идемпотентна.
    pub async fn refresh(&self) -> MemoFoldResult<()> {
        let fetched = self.api.list_posts().await?;

        let mut state = self.state();
        let cache_map = state.cache.get(LikeKind::Post);
        let posts: Vec<Post> = fetched
            .into_iter()
            .map(|post| decorate_post(post, &cache_map, &self.current_user))
            .collect();

        for post in &posts {
            state.cache.set(LikeKind::Post, &post.id, &post.likes);
        }
        state.store.load(posts);
        Ok(())
    }

    /// Загружает и реконсилирует комментарии ровно одного поста.
    pub async fn open_comments(&self, post_id: &str) -> MemoFoldResult<()> {
        let fetched = self.api.list_comments(post_id).await?;

        let mut state = self.state();
        let cache_map = state.cache.get(LikeKind::Comment);
        let comments: Vec<Comment> = fetched
            .into_iter()
            .map(|comment| decorate_comment(comment, &cache_map, &self.current_user))
            .collect();

        for comment in &comments {
            state
                .cache
                .set(LikeKind::Comment, &comment.id, &comment.likes);
        }
        if !state.store.replace_comments(post_id, comments) {
            return Err(MemoFoldError::NotFound);
        }
        Ok(())
    }

    /// Переключает лайк поста. Возвращает новое значение
    /// `has_user_liked`; при сетевой неудаче состояние поста
    /// восстанавливается перевыборкой и возвращается ошибка.
    pub async fn toggle_post_like(&self, post_id: &str) -> MemoFoldResult<bool> {
        let key = like_key(post_id);

        let liked = {
            let mut state = self.state();
            self.check_like_cooldown(&state, post_id)?;
            check_idle(&state, &key)?;

            let toggle = state
                .store
                .apply_like_toggle(LikeTarget::Post(post_id), &self.current_user.id)
                .ok_or(MemoFoldError::NotFound)?;
            state.cache.set(LikeKind::Post, post_id, &toggle.likes);
            state
                .in_flight
                .insert(key.clone(), InteractionPhase::Optimistic);
            state
                .last_like_at
                .insert(post_id.to_string(), Instant::now());
            toggle.has_user_liked
        };

        match self.api.like_post(post_id, &self.current_user.id).await {
            Ok(()) => {
                self.finish(&key);
                Ok(liked)
            }
            Err(err) => {
                tracing::warn!(%post_id, %err, "post like failed, rolling back");
                self.set_phase(&key, InteractionPhase::RollingBack);
                self.rollback_post(post_id).await;
                self.finish(&key);
                Err(err)
            }
        }
    }

    /// Переключает лайк комментария, см. [`Self::toggle_post_like`].
    pub async fn toggle_comment_like(
        &self,
        post_id: &str,
        comment_id: &str,
    ) -> MemoFoldResult<bool> {
        let key = like_key(comment_id);

        let liked = {
            let mut state = self.state();
            self.check_like_cooldown(&state, comment_id)?;
            check_idle(&state, &key)?;

            let toggle = state
                .store
                .apply_like_toggle(
                    LikeTarget::Comment {
                        post_id,
                        comment_id,
                    },
                    &self.current_user.id,
                )
                .ok_or(MemoFoldError::NotFound)?;
            state.cache.set(LikeKind::Comment, comment_id, &toggle.likes);
            state
                .in_flight
                .insert(key.clone(), InteractionPhase::Optimistic);
            state
                .last_like_at
                .insert(comment_id.to_string(), Instant::now());
            toggle.has_user_liked
        };

        match self
            .api
            .like_comment(comment_id, &self.current_user.id)
            .await
        {
            Ok(()) => {
                self.finish(&key);
                Ok(liked)
            }
            Err(err) => {
                tracing::warn!(%comment_id, %err, "comment like failed, rolling back");
                self.set_phase(&key, InteractionPhase::RollingBack);
                self.rollback_comments(post_id).await;
                self.finish(&key);
                Err(err)
            }
        }
    }

    /// Отправляет комментарий: локальная валидация, оптимистичный
    /// черновик с корреляционным идентификатором, затем замена
    /// серверно-подтверждённым комментарием.
    pub async fn submit_comment(&self, post_id: &str, content: &str) -> MemoFoldResult<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MemoFoldError::Validation(
                "comment content must not be blank".to_string(),
            ));
        }

        let key = comment_key(post_id);
        let draft_id = draft_id();

        {
            let mut state = self.state();
            check_idle(&state, &key)?;

            let draft = Comment {
                id: draft_id.clone(),
                author: self.current_user.as_author(),
                content: content.to_string(),
                created_at: Utc::now(),
                likes: Vec::new(),
                has_user_liked: false,
            };
            if !state.store.apply_comment_insert(post_id, draft) {
                return Err(MemoFoldError::NotFound);
            }
            state
                .in_flight
                .insert(key.clone(), InteractionPhase::Optimistic);
        }

        match self.api.create_comment(post_id, content).await {
            Ok(fetched) => {
                let confirmed = {
                    let mut state = self.state();
                    let cache_map = state.cache.get(LikeKind::Comment);
                    let confirmed = decorate_comment(fetched, &cache_map, &self.current_user);
                    state
                        .cache
                        .set(LikeKind::Comment, &confirmed.id, &confirmed.likes);
                    state.store.confirm_comment(post_id, &draft_id, confirmed.clone());
                    confirmed
                };
                self.finish(&key);
                Ok(confirmed)
            }
            Err(err) => {
                tracing::warn!(%post_id, %err, "comment submit failed, rolling back");
                self.set_phase(&key, InteractionPhase::RollingBack);
                self.rollback_comments(post_id).await;
                self.finish(&key);
                Err(err)
            }
        }
    }

    /// Удаляет комментарий. Разрешено автору комментария и автору
    /// поста; проверка выполняется до мутаций и сетевого вызова
    /// (и повторно валидируется сервером).
    pub async fn delete_comment(&self, post_id: &str, comment_id: &str) -> MemoFoldResult<()> {
        let key = delete_key(comment_id);

        {
            let mut state = self.state();

            let post = state.store.post(post_id).ok_or(MemoFoldError::NotFound)?;
            let comment = post
                .comments
                .iter()
                .find(|comment| comment.id == comment_id)
                .ok_or(MemoFoldError::NotFound)?;

            let acting = &self.current_user.username;
            if *acting != comment.author.username && *acting != post.author.username {
                return Err(MemoFoldError::Forbidden);
            }

            check_idle(&state, &key)?;

            state.store.apply_comment_remove(comment_id, post_id);
            state.cache.remove(LikeKind::Comment, comment_id);
            state
                .in_flight
                .insert(key.clone(), InteractionPhase::Optimistic);
        }

        match self.api.delete_comment(comment_id, post_id).await {
            Ok(()) => {
                self.finish(&key);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%comment_id, %err, "comment delete failed, rolling back");
                self.set_phase(&key, InteractionPhase::RollingBack);
                self.rollback_comments(post_id).await;
                self.finish(&key);
                Err(err)
            }
        }
    }

    /// Создаёт пост: оптимистичный черновик в начале ленты, затем
    /// замена серверно-подтверждённым постом; при неудаче черновик
    /// просто убирается.
    pub async fn create_post(&self, content: &str, image: Option<String>) -> MemoFoldResult<Post> {
        let content = content.trim();
        if content.is_empty() && image.is_none() {
            return Err(MemoFoldError::Validation(
                "post must have content or an image".to_string(),
            ));
        }

        let key = "post:new".to_string();
        let draft_id = draft_id();

        {
            let mut state = self.state();
            check_idle(&state, &key)?;

            let draft = Post {
                id: draft_id.clone(),
                author: self.current_user.as_author(),
                content: content.to_string(),
                image: image.clone(),
                created_at: Utc::now(),
                likes: Vec::new(),
                has_user_liked: false,
                comments: Vec::new(),
                comment_count: 0,
                comments_loaded: true,
            };
            state.store.insert_post_front(draft);
            state
                .in_flight
                .insert(key.clone(), InteractionPhase::Optimistic);
        }

        let input = NewPost {
            content: content.to_string(),
            image,
        };
        match self.api.create_post(input).await {
            Ok(fetched) => {
                let confirmed = {
                    let mut state = self.state();
                    let cache_map = state.cache.get(LikeKind::Post);
                    let confirmed = decorate_post(fetched, &cache_map, &self.current_user);
                    state
                        .cache
                        .set(LikeKind::Post, &confirmed.id, &confirmed.likes);
                    state.store.confirm_post(&draft_id, confirmed.clone());
                    confirmed
                };
                self.finish(&key);
                Ok(confirmed)
            }
            Err(err) => {
                tracing::warn!(%err, "post create failed, removing draft");
                self.state().store.remove_post(&draft_id);
                self.finish(&key);
                Err(err)
            }
        }
    }

    /// Откат одного поста: точечная перевыборка; если сервер её не
    /// поддерживает или она не удалась — полная перезагрузка ленты.
    async fn rollback_post(&self, post_id: &str) {
        match self.api.get_post(post_id).await {
            Ok(fetched) => {
                let mut state = self.state();
                let cache_map = state.cache.get(LikeKind::Post);
                let post = decorate_post(fetched, &cache_map, &self.current_user);
                state.cache.set(LikeKind::Post, &post.id, &post.likes);
                state.store.replace_post(post);
            }
            Err(err) => {
                tracing::warn!(%post_id, %err, "single-post refetch failed, reloading feed");
                if let Err(err) = self.refresh().await {
                    tracing::warn!(%err, "rollback refetch failed, keeping local state");
                }
            }
        }
    }

    /// Откат комментариев поста перевыборкой.
    async fn rollback_comments(&self, post_id: &str) {
        if let Err(err) = self.open_comments(post_id).await {
            tracing::warn!(%post_id, %err, "comment refetch failed, keeping local state");
        }
    }

    fn state(&self) -> MutexGuard<'_, ServiceState<S>> {
        self.state.lock().expect("service state mutex poisoned")
    }

    fn check_like_cooldown(
        &self,
        state: &ServiceState<S>,
        entity_id: &str,
    ) -> MemoFoldResult<()> {
        if let Some(last) = state.last_like_at.get(entity_id)
            && last.elapsed() < self.like_cooldown
        {
            return Err(MemoFoldError::Validation(
                "like toggled too recently".to_string(),
            ));
        }
        Ok(())
    }

    fn set_phase(&self, key: &str, phase: InteractionPhase) {
        self.state().in_flight.insert(key.to_string(), phase);
    }

    fn finish(&self, key: &str) {
        self.state().in_flight.remove(key);
    }
}

fn check_idle<S>(state: &ServiceState<S>, key: &str) -> MemoFoldResult<()> {
    if state.in_flight.contains_key(key) {
        return Err(MemoFoldError::Validation(
            "action already in progress for this entity".to_string(),
        ));
    }
    Ok(())
}

fn like_key(entity_id: &str) -> String {
    format!("like:{entity_id}")
}

fn comment_key(post_id: &str) -> String {
    format!("comment:{post_id}")
}

fn delete_key(comment_id: &str) -> String {
    format!("delete:{comment_id}")
}

fn draft_id() -> String {
    let token: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("draft-{token}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::like_cache::MemoryStorage;
    use crate::models::{FetchedComment, FetchedPost, User};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn author(id: &str, username: &str) -> User {
        User {
            id: id.to_string(),
            username: username.to_string(),
            realname: None,
            profile_pic: None,
        }
    }

    fn user(id: &str, username: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: username.to_string(),
            realname: None,
            profile_pic: None,
        }
    }

    fn fetched_post(id: &str, author_id: &str, author_name: &str, ts: i64, likes: &[&str]) -> FetchedPost {
        FetchedPost {
            id: id.to_string(),
            author: author(author_id, author_name),
            content: format!("post {id}"),
            image: None,
            created_at: Utc.timestamp_opt(ts, 0).single().expect("valid ts"),
            likes: Some(likes.iter().map(|s| s.to_string()).collect()),
            comment_count: None,
        }
    }

    fn fetched_comment(id: &str, author_id: &str, author_name: &str, content: &str) -> FetchedComment {
        FetchedComment {
            id: id.to_string(),
            author: author(author_id, author_name),
            content: content.to_string(),
            created_at: Utc.timestamp_opt(60, 0).single().expect("valid ts"),
            likes: Some(Vec::new()),
        }
    }

    #[derive(Default)]
    struct FakeApi {
        posts: Mutex<Vec<FetchedPost>>,
        comments: Mutex<HashMap<String, Vec<FetchedComment>>>,
        fail_like: AtomicBool,
        fail_create_comment: AtomicBool,
        fail_delete: AtomicBool,
        fail_create_post: AtomicBool,
        calls: AtomicUsize,
        next_id: AtomicUsize,
        like_gate: Option<Semaphore>,
    }

    impl FakeApi {
        fn with_posts(posts: Vec<FetchedPost>) -> Self {
            Self {
                posts: Mutex::new(posts),
                ..Self::default()
            }
        }

        fn set_comments(&self, post_id: &str, comments: Vec<FetchedComment>) {
            self.comments
                .lock()
                .expect("comments mutex")
                .insert(post_id.to_string(), comments);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fresh_id(&self, prefix: &str) -> String {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            format!("{prefix}{n}")
        }

        fn injected() -> MemoFoldError {
            MemoFoldError::InvalidRequest("injected failure".to_string())
        }
    }

    #[async_trait]
    impl PostsApi for FakeApi {
        async fn list_posts(&self) -> MemoFoldResult<Vec<FetchedPost>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.posts.lock().expect("posts mutex").clone())
        }

        async fn get_post(&self, post_id: &str) -> MemoFoldResult<FetchedPost> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.posts
                .lock()
                .expect("posts mutex")
                .iter()
                .find(|post| post.id == post_id)
                .cloned()
                .ok_or(MemoFoldError::NotFound)
        }

        async fn create_post(&self, input: NewPost) -> MemoFoldResult<FetchedPost> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create_post.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let post = FetchedPost {
                id: self.fresh_id("p"),
                author: author("u1", "alice"),
                content: input.content,
                image: input.image,
                created_at: Utc.timestamp_opt(1000, 0).single().expect("valid ts"),
                likes: Some(Vec::new()),
                comment_count: Some(0),
            };
            self.posts.lock().expect("posts mutex").push(post.clone());
            Ok(post)
        }

        async fn list_comments(&self, post_id: &str) -> MemoFoldResult<Vec<FetchedComment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .comments
                .lock()
                .expect("comments mutex")
                .get(post_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn create_comment(
            &self,
            post_id: &str,
            content: &str,
        ) -> MemoFoldResult<FetchedComment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create_comment.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let comment = fetched_comment(&self.fresh_id("c"), "u1", "alice", content);
            self.comments
                .lock()
                .expect("comments mutex")
                .entry(post_id.to_string())
                .or_default()
                .push(comment.clone());
            Ok(comment)
        }

        async fn delete_comment(&self, comment_id: &str, post_id: &str) -> MemoFoldResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            if let Some(comments) = self
                .comments
                .lock()
                .expect("comments mutex")
                .get_mut(post_id)
            {
                comments.retain(|comment| comment.id != comment_id);
            }
            Ok(())
        }

        async fn like_post(&self, post_id: &str, user_id: &str) -> MemoFoldResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.like_gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }
            if self.fail_like.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let mut posts = self.posts.lock().expect("posts mutex");
            if let Some(post) = posts.iter_mut().find(|post| post.id == post_id) {
                let likes = post.likes.get_or_insert_with(Vec::new);
                if let Some(pos) = likes.iter().position(|liker| liker == user_id) {
                    likes.remove(pos);
                } else {
                    likes.push(user_id.to_string());
                }
            }
            Ok(())
        }

        async fn like_comment(&self, comment_id: &str, user_id: &str) -> MemoFoldResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_like.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            let mut comments = self.comments.lock().expect("comments mutex");
            for list in comments.values_mut() {
                if let Some(comment) = list.iter_mut().find(|comment| comment.id == comment_id) {
                    let likes = comment.likes.get_or_insert_with(Vec::new);
                    if let Some(pos) = likes.iter().position(|liker| liker == user_id) {
                        likes.remove(pos);
                    } else {
                        likes.push(user_id.to_string());
                    }
                }
            }
            Ok(())
        }
    }

    fn service_for(
        api: FakeApi,
        current: CurrentUser,
    ) -> FeedService<FakeApi, Arc<MemoryStorage>> {
        let storage = Arc::new(MemoryStorage::new());
        let mut service = FeedService::new(api, LikeCache::new(storage), current);
        service.set_like_cooldown(Duration::ZERO);
        service
    }

    /// Отдельный кэш поверх того же хранилища — для ассертов.
    fn cache_view<A>(service: &FeedService<A, Arc<MemoryStorage>>) -> LikeCache<Arc<MemoryStorage>>
    where
        A: PostsApi,
    {
        let storage = Arc::clone(service.state().cache.storage());
        LikeCache::new(storage)
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let api = FakeApi::with_posts(vec![
            fetched_post("p1", "u9", "ivan", 10, &["u9"]),
            fetched_post("p2", "u9", "ivan", 20, &[]),
        ]);
        let service = service_for(api, user("u1", "alice"));

        service.refresh().await.expect("refresh must succeed");
        let first = service.posts();
        service.refresh().await.expect("refresh must succeed");
        assert_eq!(service.posts(), first);
        assert_eq!(first[0].id, "p2");
    }

    #[tokio::test]
    async fn like_toggle_applies_optimistically_and_persists_cache() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &["u9"])]);
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        let before = service.post("p1").expect("post must exist");
        assert!(!before.has_user_liked);

        let liked = service
            .toggle_post_like("p1")
            .await
            .expect("like must succeed");
        assert!(liked);

        let after = service.post("p1").expect("post must exist");
        assert!(after.has_user_liked);
        assert_eq!(after.likes, vec!["u9".to_string(), "u1".to_string()]);

        let cache = cache_view(&service);
        assert_eq!(
            cache.get(LikeKind::Post).get("p1").cloned(),
            Some(vec!["u9".to_string(), "u1".to_string()])
        );
    }

    #[tokio::test]
    async fn like_toggle_twice_restores_original_state() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &["u9"])]);
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        let original = service.post("p1").expect("post must exist");
        service.toggle_post_like("p1").await.expect("first toggle");
        service.toggle_post_like("p1").await.expect("second toggle");

        let restored = service.post("p1").expect("post must exist");
        assert_eq!(restored.likes, original.likes);
        assert_eq!(restored.has_user_liked, original.has_user_liked);
    }

    #[tokio::test]
    async fn failed_like_rolls_back_to_server_truth() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &["u9"])]);
        api.fail_like.store(true, Ordering::SeqCst);
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        let err = service
            .toggle_post_like("p1")
            .await
            .expect_err("like must fail");
        assert!(matches!(err, MemoFoldError::InvalidRequest(_)));

        // откат вернул ровно то, что дала бы свежая выборка
        let post = service.post("p1").expect("post must exist");
        assert!(!post.has_user_liked);
        assert_eq!(post.likes, vec!["u9".to_string()]);

        // флаг снят: повторная попытка снова доходит до сети
        let calls_before = service.api().calls();
        let _ = service.toggle_post_like("p1").await;
        assert!(service.api().calls() > calls_before);
    }

    #[tokio::test]
    async fn like_cooldown_rejects_rapid_retoggle() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &[])]);
        let storage = Arc::new(MemoryStorage::new());
        let service = FeedService::new(api, LikeCache::new(storage), user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        service.toggle_post_like("p1").await.expect("first toggle");
        let err = service
            .toggle_post_like("p1")
            .await
            .expect_err("cooldown must reject");
        assert!(matches!(err, MemoFoldError::Validation(_)));

        // оптимистичное состояние первого лайка не тронуто
        let post = service.post("p1").expect("post must exist");
        assert!(post.has_user_liked);
    }

    #[tokio::test]
    async fn busy_entity_rejects_second_action() {
        let mut api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &[])]);
        api.like_gate = Some(Semaphore::new(0));
        let service = Arc::new(service_for(api, user("u1", "alice")));
        service.refresh().await.expect("refresh must succeed");

        let background = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.toggle_post_like("p1").await })
        };
        tokio::task::yield_now().await;

        let err = service
            .toggle_post_like("p1")
            .await
            .expect_err("busy entity must reject");
        assert!(matches!(err, MemoFoldError::Validation(_)));

        service
            .api()
            .like_gate
            .as_ref()
            .expect("gate present")
            .add_permits(1);
        background
            .await
            .expect("task must join")
            .expect("first like must succeed");
    }

    #[tokio::test]
    async fn submit_comment_confirms_draft_in_place() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &[])]);
        api.set_comments("p1", Vec::new());
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");
        service.open_comments("p1").await.expect("comments load");

        let confirmed = service
            .submit_comment("p1", "hello there")
            .await
            .expect("submit must succeed");
        assert!(confirmed.id.starts_with('c'));

        let post = service.post("p1").expect("post must exist");
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].id, confirmed.id);
        assert_eq!(post.comment_count, 1);
        // черновиков не осталось
        assert!(!post.comments.iter().any(|c| c.id.starts_with("draft-")));
    }

    #[tokio::test]
    async fn blank_comment_is_rejected_without_side_effects() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &[])]);
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        let calls_before = service.api().calls();
        let err = service
            .submit_comment("p1", "  ")
            .await
            .expect_err("blank comment must be rejected");
        assert!(matches!(err, MemoFoldError::Validation(_)));

        assert_eq!(service.api().calls(), calls_before);
        let post = service.post("p1").expect("post must exist");
        assert!(post.comments.is_empty());
        assert_eq!(post.comment_count, 0);
    }

    #[tokio::test]
    async fn failed_comment_submit_discards_draft() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "u9", "ivan", 10, &[])]);
        api.set_comments("p1", Vec::new());
        api.fail_create_comment.store(true, Ordering::SeqCst);
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");
        service.open_comments("p1").await.expect("comments load");

        let err = service
            .submit_comment("p1", "hello")
            .await
            .expect_err("submit must fail");
        assert!(!err.is_local());

        let post = service.post("p1").expect("post must exist");
        assert!(post.comments.is_empty());
        assert_eq!(post.comment_count, 0);
    }

    #[tokio::test]
    async fn delete_is_allowed_for_comment_author_and_post_author_only() {
        // пост автора A с комментарием автора B
        let make_api = || {
            let api = FakeApi::with_posts(vec![fetched_post("p1", "ua", "anna", 10, &[])]);
            api.set_comments("p1", vec![fetched_comment("c1", "ub", "boris", "hi")]);
            api
        };

        for acting in [user("ua", "anna"), user("ub", "boris")] {
            let service = service_for(make_api(), acting);
            service.refresh().await.expect("refresh must succeed");
            service.open_comments("p1").await.expect("comments load");

            service
                .delete_comment("p1", "c1")
                .await
                .expect("author or post owner may delete");
            let post = service.post("p1").expect("post must exist");
            assert!(post.comments.is_empty());
        }

        let service = service_for(make_api(), user("uc", "carol"));
        service.refresh().await.expect("refresh must succeed");
        service.open_comments("p1").await.expect("comments load");

        let calls_before = service.api().calls();
        let err = service
            .delete_comment("p1", "c1")
            .await
            .expect_err("third user must be rejected");
        assert!(matches!(err, MemoFoldError::Forbidden));
        // отклонено до сети и без мутаций
        assert_eq!(service.api().calls(), calls_before);
        let post = service.post("p1").expect("post must exist");
        assert_eq!(post.comments.len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_restores_comment_by_refetch() {
        let api = FakeApi::with_posts(vec![fetched_post("p1", "ua", "anna", 10, &[])]);
        api.set_comments("p1", vec![fetched_comment("c1", "ua", "anna", "hi")]);
        api.fail_delete.store(true, Ordering::SeqCst);
        let service = service_for(api, user("ua", "anna"));
        service.refresh().await.expect("refresh must succeed");
        service.open_comments("p1").await.expect("comments load");

        service
            .delete_comment("p1", "c1")
            .await
            .expect_err("delete must fail");

        let post = service.post("p1").expect("post must exist");
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].id, "c1");
        assert_eq!(post.comment_count, 1);
    }

    #[tokio::test]
    async fn create_post_confirms_draft_and_rolls_back_on_failure() {
        let api = FakeApi::with_posts(Vec::new());
        let service = service_for(api, user("u1", "alice"));
        service.refresh().await.expect("refresh must succeed");

        let created = service
            .create_post("first!", None)
            .await
            .expect("create must succeed");
        assert!(!created.id.starts_with("draft-"));
        assert_eq!(service.posts().len(), 1);
        assert_eq!(service.posts()[0].id, created.id);

        service
            .api()
            .fail_create_post
            .store(true, Ordering::SeqCst);
        service
            .create_post("second", None)
            .await
            .expect_err("create must fail");
        assert_eq!(service.posts().len(), 1);
    }

    #[tokio::test]
    async fn blank_post_without_image_is_rejected() {
        let api = FakeApi::with_posts(Vec::new());
        let service = service_for(api, user("u1", "alice"));

        let err = service
            .create_post("   ", None)
            .await
            .expect_err("blank post must be rejected");
        assert!(matches!(err, MemoFoldError::Validation(_)));

        // но пост из одного изображения допустим
        service
            .create_post("", Some("data:image/png;base64,xyz".to_string()))
            .await
            .expect("image-only post must be accepted");
    }
}
