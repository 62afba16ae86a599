//! Чистые функции реконсиляции: слияние серверных данных с локальным
//! кэшем лайков и вычисление производных полей. Без I/O, аргументы
//! не мутируются.

use std::collections::HashMap;

use crate::models::{Comment, CurrentUser, FetchedComment, FetchedPost, Post};

#[derive(Debug, Clone, PartialEq)]
/// Результат слияния лайков.
pub struct MergedLikes {
    /// Канонический список лайкнувших (идентификаторы пользователей).
    pub likes: Vec<String>,
    /// Лайкнул ли текущий пользователь.
    pub has_user_liked: bool,
}

/// Сливает серверный список лайков с кэшированным.
///
/// Сервер всегда выигрывает: кэш подставляется только если сервер
/// вообще не прислал поле `likes` (защита от мигания «не лайкнуто»
/// сразу после перезапуска). Унаследованные записи в форме логина
/// текущего пользователя мигрируются в его идентификатор; список
/// дедуплицируется с сохранением порядка.
pub fn merge_likes(
    server_likes: Option<&[String]>,
    cached_likes: Option<&[String]>,
    current_user: &CurrentUser,
) -> MergedLikes {
    let base = server_likes.or(cached_likes).unwrap_or_default();

    let mut likes: Vec<String> = Vec::with_capacity(base.len());
    for raw in base {
        let identity = if *raw == current_user.username {
            current_user.id.clone()
        } else {
            raw.clone()
        };
        if !likes.contains(&identity) {
            likes.push(identity);
        }
    }

    let has_user_liked = likes.iter().any(|liker| *liker == current_user.id);
    MergedLikes {
        likes,
        has_user_liked,
    }
}

/// Декорирует серверный пост: сливает лайки с кэшем и заполняет
/// производные поля. Комментарии поста загружаются лениво и до
/// загрузки остаются пустыми; `comment_count` берётся серверный.
pub fn decorate_post(
    fetched: FetchedPost,
    cache: &HashMap<String, Vec<String>>,
    current_user: &CurrentUser,
) -> Post {
    let cached = cache.get(&fetched.id).map(Vec::as_slice);
    let merged = merge_likes(fetched.likes.as_deref(), cached, current_user);

    Post {
        id: fetched.id,
        author: fetched.author,
        content: fetched.content,
        image: fetched.image,
        created_at: fetched.created_at,
        likes: merged.likes,
        has_user_liked: merged.has_user_liked,
        comments: Vec::new(),
        comment_count: fetched.comment_count.unwrap_or(0),
        comments_loaded: false,
    }
}

/// Декорирует серверный комментарий, см. [`decorate_post`].
pub fn decorate_comment(
    fetched: FetchedComment,
    cache: &HashMap<String, Vec<String>>,
    current_user: &CurrentUser,
) -> Comment {
    let cached = cache.get(&fetched.id).map(Vec::as_slice);
    let merged = merge_likes(fetched.likes.as_deref(), cached, current_user);

    Comment {
        id: fetched.id,
        author: fetched.author,
        content: fetched.content,
        created_at: fetched.created_at,
        likes: merged.likes,
        has_user_liked: merged.has_user_liked,
    }
}
