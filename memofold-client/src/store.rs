use crate::models::{Comment, Post};

#[derive(Debug, Clone, Copy)]
/// Адресат переключения лайка.
pub enum LikeTarget<'a> {
    /// Лайк поста.
    Post(&'a str),
    /// Лайк комментария внутри поста.
    Comment {
        /// Идентификатор поста-владельца.
        post_id: &'a str,
        /// Идентификатор комментария.
        comment_id: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq)]
/// Результат синхронного переключения лайка.
pub struct LikeToggle {
    /// Новое значение `has_user_liked`.
    pub has_user_liked: bool,
    /// Новый список лайкнувших (для записи в кэш).
    pub likes: Vec<String>,
}

#[derive(Debug, Default)]
/// Хранилище состояния ленты — канонический in-memory список постов
/// с вложенными комментариями; единственный источник того, что рендерится.
///
/// Все мутации синхронны и не делают I/O: сетевые вызовы — забота
/// слоя обработчиков (`FeedService`), никогда самого хранилища.
pub struct FeedStore {
    posts: Vec<Post>,
}

impl FeedStore {
    /// Создаёт пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущая лента (новые посты первыми).
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Находит пост по идентификатору.
    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == post_id)
    }

    /// Полностью заменяет ленту свежевыбранной; посты упорядочиваются
    /// новыми вперёд. Идемпотентна: повторная загрузка тех же данных
    /// даёт то же видимое состояние.
    pub fn load(&mut self, mut posts: Vec<Post>) {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.posts = posts;
    }

    /// Заменяет один пост на свежую серверную версию, не трогая остальные.
    pub fn replace_post(&mut self, post: Post) -> bool {
        match self.posts.iter_mut().find(|existing| existing.id == post.id) {
            Some(existing) => {
                *existing = post;
                true
            }
            None => false,
        }
    }

    /// Вставляет оптимистичный черновик поста в начало ленты.
    pub fn insert_post_front(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    /// Удаляет пост (откат несозданного черновика).
    pub fn remove_post(&mut self, post_id: &str) -> bool {
        let before = self.posts.len();
        self.posts.retain(|post| post.id != post_id);
        self.posts.len() != before
    }

    /// Заменяет черновик поста серверно-подтверждённым, сопоставляя
    /// по корреляционному идентификатору черновика.
    pub fn confirm_post(&mut self, draft_id: &str, confirmed: Post) -> bool {
        match self.posts.iter_mut().find(|post| post.id == draft_id) {
            Some(draft) => {
                *draft = confirmed;
                true
            }
            None => false,
        }
    }

    /// Заменяет комментарии ровно одного поста; `comment_count`
    /// становится точным, остальные посты не затрагиваются.
    pub fn replace_comments(&mut self, post_id: &str, comments: Vec<Comment>) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        post.comment_count = comments.len() as u32;
        post.comments = comments;
        post.comments_loaded = true;
        true
    }

    /// Синхронно переключает лайк: добавляет/убирает `user_id` из
    /// списка лайкнувших и перещёлкивает `has_user_liked`.
    ///
    /// `None`, если адресат не найден.
    pub fn apply_like_toggle(&mut self, target: LikeTarget<'_>, user_id: &str) -> Option<LikeToggle> {
        match target {
            LikeTarget::Post(post_id) => {
                let post = self.posts.iter_mut().find(|post| post.id == post_id)?;
                let liked = toggle_identity(&mut post.likes, user_id);
                post.has_user_liked = liked;
                Some(LikeToggle {
                    has_user_liked: liked,
                    likes: post.likes.clone(),
                })
            }
            LikeTarget::Comment { post_id, comment_id } => {
                let post = self.posts.iter_mut().find(|post| post.id == post_id)?;
                let comment = post
                    .comments
                    .iter_mut()
                    .find(|comment| comment.id == comment_id)?;
                let liked = toggle_identity(&mut comment.likes, user_id);
                comment.has_user_liked = liked;
                Some(LikeToggle {
                    has_user_liked: liked,
                    likes: comment.likes.clone(),
                })
            }
        }
    }

    /// Немедленно добавляет клиентский комментарий в конец списка.
    pub fn apply_comment_insert(&mut self, post_id: &str, comment: Comment) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        post.comments.push(comment);
        post.comment_count = post.comment_count.saturating_add(1);
        true
    }

    /// Немедленно убирает комментарий из поста.
    pub fn apply_comment_remove(&mut self, comment_id: &str, post_id: &str) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        let before = post.comments.len();
        post.comments.retain(|comment| comment.id != comment_id);
        if post.comments.len() == before {
            return false;
        }
        post.comment_count = post.comment_count.saturating_sub(1);
        true
    }

    /// Заменяет оптимистичный черновик комментария серверно-подтверждённым.
    ///
    /// Сопоставление — по корреляционному идентификатору черновика;
    /// если черновика уже нет (лента перезагружена), запасной вариант —
    /// последний комментарий с тем же текстом, иначе подтверждённый
    /// комментарий просто дописывается.
    pub fn confirm_comment(&mut self, post_id: &str, draft_id: &str, confirmed: Comment) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };

        if let Some(draft) = post.comments.iter_mut().find(|c| c.id == draft_id) {
            *draft = confirmed;
            return true;
        }

        if let Some(by_content) = post
            .comments
            .iter_mut()
            .rev()
            .find(|c| c.content == confirmed.content)
        {
            *by_content = confirmed;
            return true;
        }

        post.comments.push(confirmed);
        post.comment_count = post.comment_count.saturating_add(1);
        true
    }
}

fn toggle_identity(likes: &mut Vec<String>, user_id: &str) -> bool {
    if let Some(pos) = likes.iter().position(|liker| liker == user_id) {
        likes.remove(pos);
        false
    } else {
        likes.push(user_id.to_string());
        true
    }
}
