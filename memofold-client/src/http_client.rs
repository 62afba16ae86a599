use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::api::{NewPost, PostsApi};
use crate::error::{MemoFoldError, MemoFoldResult};
use crate::models::{FetchedComment, FetchedPost, User};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequestDto<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequestDto<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentRequestDto<'a> {
    post_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeRequestDto<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorDto {
    id: String,
    username: String,
    realname: Option<String>,
    profile_pic: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDto {
    id: String,
    author: AuthorDto,
    #[serde(default)]
    content: String,
    image: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    likes: Option<Vec<String>>,
    comment_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentDto {
    id: String,
    author: AuthorDto,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
    likes: Option<Vec<String>>,
}

impl From<AuthorDto> for User {
    fn from(value: AuthorDto) -> Self {
        Self {
            id: value.id,
            username: value.username,
            realname: value.realname,
            profile_pic: value.profile_pic,
        }
    }
}

impl From<PostDto> for FetchedPost {
    fn from(value: PostDto) -> Self {
        Self {
            id: value.id,
            author: value.author.into(),
            content: value.content,
            image: value.image,
            created_at: value.created_at,
            likes: value.likes,
            comment_count: value.comment_count,
        }
    }
}

impl From<CommentDto> for FetchedComment {
    fn from(value: CommentDto) -> Self {
        Self {
            id: value.id,
            author: value.author.into(),
            content: value.content,
            created_at: value.created_at,
            likes: value.likes,
        }
    }
}

#[derive(Debug, Clone)]
/// HTTP-клиент для REST API MemoFold.
///
/// Токен выдаётся коллаборатором аутентификации и подставляется
/// в каждый запрос как bearer-учётные данные.
pub struct HttpClient {
    base_url: String,
    token: String,
    client: Client,
}

impl HttpClient {
    /// Создаёт новый HTTP-клиент с базовым URL сервера и bearer-токеном.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
        }
    }

    /// Заменяет bearer-токен (например, после обновления сессии).
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn decode_error(response: reqwest::Response) -> MemoFoldError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body
                .error
                .unwrap_or_else(|| format!("http status {status}")),
            Err(_) => format!("http status {status}"),
        };
        MemoFoldError::from_http_status(status, Some(message))
    }

    /// универсальный helper для запросов с json-payload
    async fn send_json<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: &TReq,
    ) -> MemoFoldResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "memofold api request");

        let request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .json(body);

        let response = request.send().await.map_err(MemoFoldError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<TRes>()
            .await
            .map_err(MemoFoldError::from_reqwest)
    }

    /// GET-запросы без тела
    async fn send_get<TRes>(&self, path: &str) -> MemoFoldResult<TRes>
    where
        TRes: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "memofold api request");

        let request = self
            .client
            .request(Method::GET, url)
            .bearer_auth(&self.token);

        let response = request.send().await.map_err(MemoFoldError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<TRes>()
            .await
            .map_err(MemoFoldError::from_reqwest)
    }

    /// запросы, где тело ответа не интересует (лайки, удаление)
    async fn send_json_no_response<TReq>(
        &self,
        method: Method,
        path: &str,
        body: &TReq,
    ) -> MemoFoldResult<()>
    where
        TReq: Serialize,
    {
        let url = self.endpoint(path);
        tracing::debug!(%url, "memofold api request");

        let request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .json(body);

        let response = request.send().await.map_err(MemoFoldError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        Ok(())
    }
}

#[async_trait]
impl PostsApi for HttpClient {
    async fn list_posts(&self) -> MemoFoldResult<Vec<FetchedPost>> {
        let dtos: Vec<PostDto> = self.send_get("/posts").await?;
        Ok(dtos.into_iter().map(FetchedPost::from).collect())
    }

    async fn get_post(&self, post_id: &str) -> MemoFoldResult<FetchedPost> {
        let dto: PostDto = self.send_get(&format!("/posts/{post_id}")).await?;
        Ok(dto.into())
    }

    async fn create_post(&self, input: NewPost) -> MemoFoldResult<FetchedPost> {
        let payload = CreatePostRequestDto {
            content: &input.content,
            image: input.image.as_deref(),
        };
        let dto: PostDto = self.send_json(Method::POST, "/posts", &payload).await?;
        Ok(dto.into())
    }

    async fn list_comments(&self, post_id: &str) -> MemoFoldResult<Vec<FetchedComment>> {
        let dtos: Vec<CommentDto> = self.send_get(&format!("/posts/{post_id}/comments")).await?;
        Ok(dtos.into_iter().map(FetchedComment::from).collect())
    }

    async fn create_comment(
        &self,
        post_id: &str,
        content: &str,
    ) -> MemoFoldResult<FetchedComment> {
        let payload = CreateCommentRequestDto { content };
        let dto: CommentDto = self
            .send_json(Method::POST, &format!("/posts/{post_id}/comments"), &payload)
            .await?;
        Ok(dto.into())
    }

    async fn delete_comment(&self, comment_id: &str, post_id: &str) -> MemoFoldResult<()> {
        let payload = DeleteCommentRequestDto { post_id };
        self.send_json_no_response(
            Method::DELETE,
            &format!("/posts/comments/{comment_id}"),
            &payload,
        )
        .await
    }

    async fn like_post(&self, post_id: &str, user_id: &str) -> MemoFoldResult<()> {
        let payload = LikeRequestDto { user_id };
        self.send_json_no_response(Method::POST, &format!("/posts/like/{post_id}"), &payload)
            .await
    }

    async fn like_comment(&self, comment_id: &str, user_id: &str) -> MemoFoldResult<()> {
        let payload = LikeRequestDto { user_id };
        self.send_json_no_response(
            Method::POST,
            &format!("/posts/comments/{comment_id}/like"),
            &payload,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_slashes() {
        let client = HttpClient::new("http://localhost:4000/", "token");
        let full = client.endpoint("/posts");
        assert_eq!(full, "http://localhost:4000/posts");
    }

    #[test]
    fn post_dto_maps_missing_likes_to_none() {
        let raw = r#"{
            "id": "p1",
            "author": {"id": "u1", "username": "alice"},
            "content": "hello",
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;
        let dto: PostDto = serde_json::from_str(raw).expect("post dto should parse");
        let fetched = FetchedPost::from(dto);
        assert_eq!(fetched.id, "p1");
        assert_eq!(fetched.author.username, "alice");
        assert!(fetched.likes.is_none());
        assert!(fetched.comment_count.is_none());
    }

    #[test]
    fn comment_dto_keeps_like_identities() {
        let raw = r#"{
            "id": "c1",
            "author": {"id": "u2", "username": "bob", "profilePic": "http://x/y.png"},
            "content": "nice",
            "createdAt": "2026-01-02T10:30:00Z",
            "likes": ["u1", "u9"]
        }"#;
        let dto: CommentDto = serde_json::from_str(raw).expect("comment dto should parse");
        let fetched = FetchedComment::from(dto);
        assert_eq!(fetched.likes.as_deref(), Some(["u1".to_string(), "u9".to_string()].as_slice()));
        assert_eq!(fetched.author.profile_pic.as_deref(), Some("http://x/y.png"));
    }
}
