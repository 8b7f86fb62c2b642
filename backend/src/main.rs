// main.rs

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use dashmap::DashMap;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use tokio::{
    fs,
    signal::{self, ctrl_c},
    sync::{Mutex, OwnedMutexGuard},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// --- Local modules ---
mod student_operations;
use student_operations::config::Config;
use student_operations::student_handlers::{
    delete_student, filter_students, insert_student, update_student, view_all,
};
use student_operations::student_models::initialize_database;

// --- Per-course async locks ---
#[derive(Default)]
pub struct CourseLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds one course exclusively. Dropping it releases the course and forgets the
/// map entry once nobody else holds or waits on it.
pub struct CourseGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    course: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CourseGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Every holder and waiter owns a clone of the Arc; one means only the map is left.
        self.locks
            .remove_if(&self.course, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl CourseLocks {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub async fn lock(&self, course: &str) -> CourseGuard<'_> {
        // Declared first so a cancelled wait still cleans up after the Arc is gone.
        let mut held = CourseGuard {
            locks: &self.locks,
            course: course.to_string(),
            guard: None,
        };
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(course.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Locks every distinct course in sorted order so overlapping callers cannot deadlock.
    pub async fn lock_all(&self, courses: &[&str]) -> Vec<CourseGuard<'_>> {
        let mut ordered = courses.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for course in ordered {
            guards.push(self.lock(course).await);
        }
        guards
    }

    /// Number of courses currently locked or waited on.
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

// --- Application State ---
pub struct AppState {
    pub pool: SqlitePool,
    pub course_locks: Arc<CourseLocks>,
}

/// The student record endpoints, without static assets or outer layers.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/insert/", post(insert_student))
        .route("/view/", get(view_all))
        .route("/update/", put(update_student))
        .route("/delete/", delete(delete_student))
        .route("/students/filter", get(filter_students))
        .with_state(state)
}

fn app(state: Arc<AppState>, config: &Config) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    api_router(state)
        .route_service("/", ServeFile::new(config.templates_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors)
}

async fn connect_database(config: &Config) -> Result<SqlitePool> {
    if let Some(db_file) = config.database_file() {
        if let Some(db_dir) = db_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(db_dir)
                .await
                .context(format!("Failed to create database directory: {}", db_dir.display()))?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context(format!("Invalid DATABASE_URL: {}", config.database_url))?
        .create_if_missing(true)
        .busy_timeout(config.db_busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_conn)
        .connect_with(options)
        .await
        .context(format!("Failed to connect to database at: {}", config.database_url))?;

    initialize_database(&pool).await?;
    Ok(pool)
}

// --- Main Entry Point ---
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting student records server...");

    let config = Config::from_env()?;
    let pool = connect_database(&config).await?;

    let state = Arc::new(AppState {
        pool,
        course_locks: Arc::new(CourseLocks::new()),
    });

    let router = app(state.clone(), &config);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind TCP listener")?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Axum server failed")?;

    state.pool.close().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
