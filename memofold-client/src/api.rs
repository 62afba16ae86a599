use async_trait::async_trait;

use crate::error::MemoFoldResult;
use crate::models::{FetchedComment, FetchedPost};

#[derive(Debug, Clone)]
/// Данные нового поста.
pub struct NewPost {
    /// Текст поста; может быть пустым при наличии изображения.
    pub content: String,
    /// URL или data-URI изображения.
    pub image: Option<String>,
}

#[async_trait]
/// Шов между обработчиками действий и REST API MemoFold.
///
/// Обработчики (`FeedService`) зависят только от этого трейта, поэтому
/// вся оптимистичная машинерия тестируется на in-memory реализации
/// без сети. Боевая реализация — `HttpClient`.
pub trait PostsApi: Send + Sync {
    /// `GET /posts` — лента постов.
    async fn list_posts(&self) -> MemoFoldResult<Vec<FetchedPost>>;

    /// `GET /posts/:id` — один пост; используется точечным откатом.
    async fn get_post(&self, post_id: &str) -> MemoFoldResult<FetchedPost>;

    /// `POST /posts` — создание поста.
    async fn create_post(&self, input: NewPost) -> MemoFoldResult<FetchedPost>;

    /// `GET /posts/:id/comments` — комментарии одного поста.
    async fn list_comments(&self, post_id: &str) -> MemoFoldResult<Vec<FetchedComment>>;

    /// `POST /posts/:id/comments` — создание комментария.
    async fn create_comment(&self, post_id: &str, content: &str)
    -> MemoFoldResult<FetchedComment>;

    /// `DELETE /posts/comments/:id` (тело: `{postId}`) — удаление комментария.
    async fn delete_comment(&self, comment_id: &str, post_id: &str) -> MemoFoldResult<()>;

    /// `POST /posts/like/:id` (тело: `{userId}`) — переключение лайка поста.
    async fn like_post(&self, post_id: &str, user_id: &str) -> MemoFoldResult<()>;

    /// `POST /posts/comments/:id/like` (тело: `{userId}`) — переключение
    /// лайка комментария.
    async fn like_comment(&self, comment_id: &str, user_id: &str) -> MemoFoldResult<()>;
}
