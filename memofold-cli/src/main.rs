use std::fs;
use std::io;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use memofold_client::{
    CurrentUser, FeedService, FileStorage, HttpClient, LikeCache, MemoFoldError, Post,
};
use serde::{Deserialize, Serialize};

const SESSION_FILE: &str = ".memofold_session";
const CACHE_DIR: &str = ".memofold_cache";
const DEFAULT_API_URL: &str = "http://127.0.0.1:4000";

#[derive(Debug, Parser)]
#[command(name = "memofold-cli", version, about = "Терминальный клиент MemoFold")]
struct Cli {
    /// Базовый URL API (или переменная MEMOFOLD_API_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Сохранение сессии, выданной сервисом аутентификации.
    Session {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        realname: Option<String>,
    },
    /// Лента постов.
    Feed,
    /// Комментарии поста.
    Comments {
        #[arg(long)]
        post: String,
    },
    /// Переключение лайка поста.
    Like {
        #[arg(long)]
        post: String,
    },
    /// Переключение лайка комментария.
    LikeComment {
        #[arg(long)]
        post: String,
        #[arg(long)]
        comment: String,
    },
    /// Создание поста.
    Post {
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        image: Option<String>,
    },
    /// Комментарий к посту.
    Comment {
        #[arg(long)]
        post: String,
        #[arg(long)]
        text: String,
    },
    /// Удаление комментария (доступно автору комментария и автору поста).
    DeleteComment {
        #[arg(long)]
        post: String,
        #[arg(long)]
        comment: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Session {
    token: String,
    user_id: String,
    username: String,
    realname: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).compact().try_init();
}

async fn run() -> Result<()> {
    let Cli { server, command } = Cli::parse();

    if let Command::Session {
        token,
        user_id,
        username,
        realname,
    } = &command
    {
        let session = Session {
            token: token.clone(),
            user_id: user_id.clone(),
            username: username.clone(),
            realname: realname.clone(),
        };
        save_session(&session).context("не удалось сохранить сессию")?;
        println!("Сессия сохранена: {}", session.username);
        return Ok(());
    }

    let session = load_session()
        .context("не удалось прочитать .memofold_session")?
        .context("сессия не найдена: выполните `memofold-cli session ...`")?;

    let server = server
        .or_else(|| std::env::var("MEMOFOLD_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let current_user = CurrentUser {
        id: session.user_id,
        username: session.username,
        realname: session.realname,
        profile_pic: None,
    };
    let service = FeedService::new(
        HttpClient::new(normalize_server(server), session.token),
        LikeCache::new(FileStorage::new(CACHE_DIR)),
        current_user,
    );

    match command {
        Command::Session { .. } => unreachable!("handled above"),
        Command::Feed => {
            service.refresh().await.map_err(map_client_error)?;
            print_feed(&service.posts());
        }
        Command::Comments { post } => {
            service.refresh().await.map_err(map_client_error)?;
            service.open_comments(&post).await.map_err(map_client_error)?;
            let post = service
                .post(&post)
                .context("пост пропал из ленты после загрузки")?;
            print_comments(&post);
        }
        Command::Like { post } => {
            service.refresh().await.map_err(map_client_error)?;
            let liked = service
                .toggle_post_like(&post)
                .await
                .map_err(map_client_error)?;
            println!("{}", if liked { "Лайк поставлен" } else { "Лайк снят" });
        }
        Command::LikeComment { post, comment } => {
            service.refresh().await.map_err(map_client_error)?;
            service.open_comments(&post).await.map_err(map_client_error)?;
            let liked = service
                .toggle_comment_like(&post, &comment)
                .await
                .map_err(map_client_error)?;
            println!("{}", if liked { "Лайк поставлен" } else { "Лайк снят" });
        }
        Command::Post { content, image } => {
            service.refresh().await.map_err(map_client_error)?;
            let post = service
                .create_post(&content, image)
                .await
                .map_err(map_client_error)?;
            println!("Пост создан: id={}", post.id);
        }
        Command::Comment { post, text } => {
            service.refresh().await.map_err(map_client_error)?;
            service.open_comments(&post).await.map_err(map_client_error)?;
            let comment = service
                .submit_comment(&post, &text)
                .await
                .map_err(map_client_error)?;
            println!("Комментарий добавлен: id={}", comment.id);
        }
        Command::DeleteComment { post, comment } => {
            service.refresh().await.map_err(map_client_error)?;
            service.open_comments(&post).await.map_err(map_client_error)?;
            service
                .delete_comment(&post, &comment)
                .await
                .map_err(map_client_error)?;
            println!("Комментарий удалён: id={comment}");
        }
    }

    Ok(())
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn load_session() -> io::Result<Option<Session>> {
    if !Path::new(SESSION_FILE).exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(SESSION_FILE)?;
    Ok(serde_json::from_str(&raw).ok())
}

fn save_session(session: &Session) -> Result<()> {
    let raw = serde_json::to_string_pretty(session)?;
    fs::write(SESSION_FILE, raw)?;
    Ok(())
}

fn map_client_error(err: MemoFoldError) -> anyhow::Error {
    let message = match err {
        MemoFoldError::Unauthorized => {
            "требуется авторизация: обновите сессию через `memofold-cli session ...`".to_string()
        }
        MemoFoldError::Forbidden => "операция запрещена".to_string(),
        MemoFoldError::NotFound => "ресурс не найден".to_string(),
        MemoFoldError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
        MemoFoldError::Validation(message) => format!("ошибка валидации: {message}"),
        MemoFoldError::Http(err) => format!("ошибка HTTP: {err}"),
    };
    anyhow::anyhow!(message)
}

fn print_feed(posts: &[Post]) {
    println!("Постов: {}", posts.len());
    for post in posts {
        println!("---");
        println!("id: {}", post.id);
        println!(
            "автор: {} (@{})",
            post.author.realname.as_deref().unwrap_or(&post.author.username),
            post.author.username
        );
        println!("когда: {}", relative_time(post.created_at, Utc::now()));
        if !post.content.is_empty() {
            println!("{}", post.content);
        }
        if let Some(image) = &post.image {
            println!("изображение: {image}");
        }
        println!(
            "лайков: {}{}  комментариев: {}",
            post.likes.len(),
            if post.has_user_liked { " (вы)" } else { "" },
            post.comment_count
        );
    }
}

fn print_comments(post: &Post) {
    println!("Комментариев к {}: {}", post.id, post.comments.len());
    for comment in &post.comments {
        println!("---");
        println!("id: {}", comment.id);
        println!(
            "@{} · {}",
            comment.author.username,
            relative_time(comment.created_at, Utc::now())
        );
        println!("{}", comment.content);
        println!(
            "лайков: {}{}",
            comment.likes.len(),
            if comment.has_user_liked { " (вы)" } else { "" }
        );
    }
}

/// Относительное время в духе ленты: "только что", "5м", "3ч", "2д",
/// дальше — календарная дата.
fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let seconds = elapsed.num_seconds();

    if seconds < 60 {
        return "только что".to_string();
    }
    if seconds < 3600 {
        return format!("{}м", elapsed.num_minutes());
    }
    if seconds < 86_400 {
        return format!("{}ч", elapsed.num_hours());
    }
    if seconds < 7 * 86_400 {
        return format!("{}д", elapsed.num_days());
    }
    at.format("%d.%m.%Y").to_string()
}
