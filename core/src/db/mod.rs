use std::{fs, fs::File, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use self::{
    project_repo::ProjectRepositoryRef,
    sqlite::{
        connection as sqlite_connection, project_repo::SqliteProjectRepository,
        task_repo::SqliteTaskRepository, workspace_repo::SqliteWorkspaceRepository,
    },
    task_repo::TaskRepositoryRef,
    workspace_repo::WorkspaceRepositoryRef,
};
use crate::config::{self, AppConfig};

pub mod project_repo;
pub mod sqlite;
pub mod task_repo;
pub mod workspace_repo;

#[derive(Clone)]
pub struct RepositoryRegistry {
    workspace_repo: WorkspaceRepositoryRef,
    project_repo: ProjectRepositoryRef,
    task_repo: TaskRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        workspace_repo: WorkspaceRepositoryRef,
        project_repo: ProjectRepositoryRef,
        task_repo: TaskRepositoryRef,
    ) -> Self {
        Self {
            workspace_repo,
            project_repo,
            task_repo,
        }
    }

    pub fn workspace_repo(&self) -> WorkspaceRepositoryRef {
        self.workspace_repo.clone()
    }

    pub fn project_repo(&self) -> ProjectRepositoryRef {
        self.project_repo.clone()
    }

    pub fn task_repo(&self) -> TaskRepositoryRef {
        self.task_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: sqlite_connection::SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    const SQLITE_FILE_NAME: &'static str = "crewspace.db";

    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let (data_dir, db_file) = Self::resolve_database_paths(&config.database_path)?;
        fs::create_dir_all(&data_dir).with_context(|| {
            format!(
                "failed to create database directory: {}",
                data_dir.display()
            )
        })?;

        if !db_file.exists() {
            File::create(&db_file).with_context(|| {
                format!("failed to create database file: {}", db_file.display())
            })?;
        }

        let pool =
            sqlite_connection::create_pool(&db_file, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        let workspace_repo =
            Arc::new(SqliteWorkspaceRepository::new(pool.clone())) as WorkspaceRepositoryRef;
        let project_repo =
            Arc::new(SqliteProjectRepository::new(pool.clone())) as ProjectRepositoryRef;
        let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone())) as TaskRepositoryRef;
        let repositories = Arc::new(RepositoryRegistry::new(
            workspace_repo,
            project_repo,
            task_repo,
        ));

        Ok(Self {
            pool,
            path: data_dir,
            repositories,
        })
    }

    pub fn pool(&self) -> &sqlite_connection::SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    fn resolve_database_paths(path: &str) -> Result<(PathBuf, PathBuf)> {
        if config::database_path_is_file(path) {
            let db_file = Self::resolve_db_path(path)?;
            let dir = if let Some(parent) = db_file.parent() {
                parent.to_path_buf()
            } else {
                std::env::current_dir().context("failed to obtain current directory")?
            };
            Ok((dir, db_file))
        } else {
            let data_dir = Self::resolve_db_path(path)?;
            Ok((data_dir.clone(), data_dir.join(Self::SQLITE_FILE_NAME)))
        }
    }

    fn resolve_db_path(path: &str) -> Result<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            Ok(path)
        } else {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            Ok(cwd.join(path))
        }
    }
}
