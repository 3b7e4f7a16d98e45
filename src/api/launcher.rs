//! Crawl launchers
//!
//! The crawl trigger hands accepted requests to a [`CrawlLauncher`]. Launching never waits
//! for the crawl to finish.

use crate::config::Config;
use crate::crawler::{run_crawl_with, CrawlOptions, Fetch, HttpFetcher};
use crate::storage::SqliteStorage;
use crate::Result;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

/// A crawl accepted by the trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub store: String,
    pub query: String,
    pub max_products: usize,
}

/// Starts crawls in the background
pub trait CrawlLauncher: Send + Sync {
    fn launch(&self, job: CrawlJob) -> Result<()>;
}

/// Runs each crawl as a child process of the current binary
///
/// Arguments are passed as a vector; nothing goes through a shell.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            program,
            config_path,
        }
    }

    /// Launcher re-invoking the running executable
    pub fn current_exe(config_path: Option<PathBuf>) -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config_path))
    }

    /// Command-line arguments of the child process
    ///
    /// Values are attached with `=` so that a query starting with `-` is never read as a flag.
    pub fn arguments(&self, job: &CrawlJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if let Some(config) = &self.config_path {
            args.push(option("--config", config.as_os_str()));
        }

        args.extend([
            OsString::from("crawl"),
            option("--store", job.store.as_ref()),
            option("--query", job.query.as_ref()),
            option("--max-products", job.max_products.to_string().as_ref()),
        ]);

        args
    }
}

/// `--name=value` as a single argument
fn option(name: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(name);
    arg.push("=");
    arg.push(value);
    arg
}

impl CrawlLauncher for ProcessLauncher {
    fn launch(&self, job: CrawlJob) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(self.arguments(&job))
            .stdin(Stdio::null())
            .spawn()?;

        tracing::info!(
            "Launched crawl process {:?} for {} '{}'",
            child.id(),
            job.store,
            job.query
        );

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!("Crawl process for {} finished", job.store)
                }
                Ok(status) => tracing::warn!("Crawl process for {} exited with {}", job.store, status),
                Err(e) => tracing::error!("Failed to wait for crawl process: {}", e),
            }
        });

        Ok(())
    }
}

/// Runs each crawl as a task on the current runtime
pub struct TaskLauncher {
    config: Arc<Config>,
    config_hash: String,
    storage: Arc<Mutex<SqliteStorage>>,
}

impl TaskLauncher {
    pub fn new(config: Arc<Config>, config_hash: String, storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self {
            config,
            config_hash,
            storage,
        }
    }
}

impl CrawlLauncher for TaskLauncher {
    fn launch(&self, job: CrawlJob) -> Result<()> {
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&self.config)?);
        let config = Arc::clone(&self.config);
        let config_hash = self.config_hash.clone();
        let storage = Arc::clone(&self.storage);

        let options = CrawlOptions {
            store: job.store.clone(),
            query: Some(job.query.clone()),
            max_products: Some(job.max_products),
            ..CrawlOptions::default()
        };

        tokio::spawn(async move {
            match run_crawl_with(fetcher, storage, &config, &config_hash, options).await {
                Ok(summary) => tracing::info!(
                    "Crawl session {} for {} finished: {} emitted",
                    summary.session_id,
                    summary.store,
                    summary.report.emitted
                ),
                Err(e) => tracing::error!("Crawl for {} failed: {}", job.store, e),
            }
        });

        Ok(())
    }
}
