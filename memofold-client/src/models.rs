use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Публичная модель пользователя (автор поста или комментария).
pub struct User {
    /// Идентификатор пользователя.
    pub id: String,
    /// Логин.
    pub username: String,
    /// Отображаемое имя.
    pub realname: Option<String>,
    /// URL аватара.
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone)]
/// Контекст текущего пользователя, выданный коллаборатором аутентификации.
///
/// Передаётся явно в `FeedService` и функции реконсиляции вместо
/// глобального синглтона. Ядро никогда не изменяет эти данные.
pub struct CurrentUser {
    /// Идентификатор пользователя — каноническая форма идентичности в лайках.
    pub id: String,
    /// Логин; используется для клиентской проверки прав на удаление.
    pub username: String,
    /// Отображаемое имя.
    pub realname: Option<String>,
    /// URL аватара.
    pub profile_pic: Option<String>,
}

impl CurrentUser {
    /// Представление текущего пользователя как автора оптимистичных черновиков.
    pub fn as_author(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            realname: self.realname.clone(),
            profile_pic: self.profile_pic.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Декорированный пост — то, что рендерится.
///
/// `has_user_liked` и `comment_count` — производные поля: вычисляются
/// при реконсиляции и не хранятся на сервере в таком виде.
pub struct Post {
    /// Идентификатор поста (назначается сервером).
    pub id: String,
    /// Автор поста.
    pub author: User,
    /// Текст поста; может быть пустым, если приложено изображение.
    pub content: String,
    /// URL или data-URI изображения.
    pub image: Option<String>,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Идентификаторы лайкнувших пользователей.
    pub likes: Vec<String>,
    /// Лайкнул ли текущий пользователь.
    pub has_user_liked: bool,
    /// Комментарии; пусты до первого открытия панели комментариев.
    pub comments: Vec<Comment>,
    /// Число комментариев; до загрузки — приблизительное серверное значение.
    pub comment_count: u32,
    /// Загружены ли комментарии с сервера.
    pub comments_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Декорированный комментарий.
pub struct Comment {
    /// Идентификатор комментария.
    pub id: String,
    /// Автор комментария.
    pub author: User,
    /// Текст комментария, непустой.
    pub content: String,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Идентификаторы лайкнувших пользователей.
    pub likes: Vec<String>,
    /// Лайкнул ли текущий пользователь.
    pub has_user_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Пост в серверной форме, до реконсиляции.
///
/// `likes` может отсутствовать в ответе; тогда при декорировании
/// подставляется локальный кэш (см. `merge_likes`).
pub struct FetchedPost {
    /// Идентификатор поста.
    pub id: String,
    /// Автор поста.
    pub author: User,
    /// Текст поста.
    pub content: String,
    /// URL или data-URI изображения.
    pub image: Option<String>,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Идентичности лайкнувших; `None`, если сервер не прислал поле.
    pub likes: Option<Vec<String>>,
    /// Серверное число комментариев, если прислано.
    pub comment_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Комментарий в серверной форме, до реконсиляции.
pub struct FetchedComment {
    /// Идентификатор комментария.
    pub id: String,
    /// Автор комментария.
    pub author: User,
    /// Текст комментария.
    pub content: String,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Идентичности лайкнувших; `None`, если сервер не прислал поле.
    pub likes: Option<Vec<String>>,
}
