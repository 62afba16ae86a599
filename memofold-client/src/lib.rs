//! Клиентское ядро MemoFold: оптимистичные взаимодействия с постами,
//! комментариями и лайками поверх REST API.
//!
//! Состав:
//! - `FeedStore` — in-memory состояние ленты, источник истины для рендера;
//! - `LikeCache` — локальный персистентный кэш лайков, переживающий
//!   перезапуск клиента;
//! - функции реконсиляции (`merge_likes`, `decorate_post`) — чистое
//!   слияние серверных данных с кэшем;
//! - `FeedService` — обработчики действий: оптимистичная мутация,
//!   единственный сетевой вызов, откат-перевыборкой при неудаче.
//!
//! Сетевые вызовы идут через трейт `PostsApi`; боевая реализация —
//! `HttpClient` (`reqwest`). Контекст пользователя (`CurrentUser`)
//! и токен выдаются коллаборатором аутентификации и передаются явно.
#![warn(missing_docs)]

mod api;
mod error;
mod http_client;
mod like_cache;
mod models;
mod reconcile;
mod service;
mod store;

pub use api::{NewPost, PostsApi};
pub use error::{MemoFoldError, MemoFoldResult};
pub use http_client::HttpClient;
pub use like_cache::{
    FileStorage, LikeCache, LikeKind, LikeStorage, MAX_ENTRIES_PER_KIND, MemoryStorage,
};
pub use models::{Comment, CurrentUser, FetchedComment, FetchedPost, Post, User};
pub use reconcile::{MergedLikes, decorate_comment, decorate_post, merge_likes};
pub use service::{FeedService, LIKE_COOLDOWN};
pub use store::{FeedStore, LikeTarget, LikeToggle};
