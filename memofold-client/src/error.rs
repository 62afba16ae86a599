use thiserror::Error;

#[derive(Debug, Error)]
/// Ошибки клиентского ядра MemoFold.
pub enum MemoFoldError {
    /// Ошибка HTTP-транспорта (`reqwest`).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Требуется авторизация (отсутствует/некорректен токен).
    #[error("unauthorized")]
    Unauthorized,

    /// Операция запрещена клиентской проверкой прав
    /// (например, удаление чужого комментария).
    #[error("forbidden")]
    Forbidden,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Некорректный запрос или бизнес-ошибка на стороне сервера.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Локальная ошибка валидации; отклоняется до сетевого вызова
    /// и не изменяет состояние.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Результат операций клиентского ядра.
pub type MemoFoldResult<T> = Result<T, MemoFoldError>;

impl MemoFoldError {
    /// Локальные ошибки не доходят до сети и не требуют отката.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Forbidden)
    }

    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            _ => {
                let message = message.unwrap_or_else(|| format!("http status {status}"));
                Self::InvalidRequest(message)
            }
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }
}
