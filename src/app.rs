use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{io::BufReader, task::JoinHandle, time::timeout};

use crate::{
    classifier::{ApiClient, Classifier, HttpClassifier},
    config::AppConfig,
    console::Console,
    dom::{Document, NodeId, SharedDocument},
    feed::FeedReplayer,
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    pipeline::{spawn_mutation_watcher, Pipeline},
    relay::{spawn_relay, RelayClassifier},
    settings::{spawn_settings_watcher, FileSettings, SettingsStore},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FeedGuardApp {
    config: Arc<AppConfig>,
    paths: ResolvedPaths,
    document: SharedDocument,
    feed_root: NodeId,
    pipeline: Arc<Pipeline>,
    settings: Arc<SettingsStore>,
    settings_backend: FileSettings,
    relay_handle: JoinHandle<()>,
    settings_handle: JoinHandle<()>,
    shutdown: Shutdown,
}

impl FeedGuardApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let http_client = Client::builder()
            .user_agent(format!("feedguard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let api = ApiClient::new(http_client, &config.classifier.api_base)
            .context("invalid classifier endpoint")?;
        let backend: Arc<dyn Classifier> = Arc::new(HttpClassifier::new(api));
        let (relay, relay_handle) = spawn_relay(
            backend,
            config.relay.queue_capacity,
            shutdown.subscribe(),
        );
        let classifier: Arc<dyn Classifier> = Arc::new(RelayClassifier::new(relay));

        let settings = Arc::new(SettingsStore::new());
        let settings_backend = FileSettings::new(&paths.settings_path);
        let settings_handle = spawn_settings_watcher(
            settings.clone(),
            settings_backend.clone(),
            config.settings.poll_interval,
            shutdown.subscribe(),
        );

        let mut page = Document::new();
        let body = page.root();
        let feed_root = page.append_element(body, "main", &["feed"]);
        let document = SharedDocument::new(page);

        let pipeline = Pipeline::new(
            document.clone(),
            classifier,
            settings.clone(),
            &config.pipeline,
        );

        Ok(Self {
            config,
            paths,
            document,
            feed_root,
            pipeline,
            settings,
            settings_backend,
            relay_handle,
            settings_handle,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FeedGuardApp {
            config,
            paths,
            document,
            feed_root,
            pipeline,
            settings,
            settings_backend,
            relay_handle,
            settings_handle,
            shutdown,
        } = self;

        tracing::info!(
            api_base = %config.classifier.api_base,
            data_dir = %paths.data_dir.display(),
            settings = %paths.settings_path.display(),
            "feedguard started"
        );

        let initial = pipeline.scan();
        tracing::info!(target: "scanner", units = initial.seen, "initial scan dispatched");
        let watcher_handle = spawn_mutation_watcher(pipeline.clone(), shutdown.subscribe());

        let feed_handle = match &config.feed.path {
            Some(path) => {
                let replayer =
                    FeedReplayer::load(path, config.feed.batch_size, config.feed.interval).await?;
                Some(replayer.spawn(document.clone(), feed_root, shutdown.subscribe()))
            }
            None => {
                tracing::info!(target: "feed", "FEED_PATH not set; page starts empty");
                None
            }
        };

        let console = Console::new(
            pipeline.clone(),
            settings,
            settings_backend,
            shutdown.clone(),
        );
        let console_shutdown = shutdown.clone();
        let console_handle = tokio::spawn(async move {
            let input = BufReader::new(tokio::io::stdin());
            if let Err(err) = console.run(input, tokio::io::stdout()).await {
                tracing::warn!(target: "console", error = %err, "console stopped");
            } else if !console_shutdown.is_triggered() {
                tracing::info!(target: "console", "stdin closed; page keeps running until a signal");
            }
        });

        shutdown.subscribe().notified().await;
        tracing::info!("shutdown signal received");
        shutdown.trigger();

        // Blocked on stdin; nothing to wait for.
        console_handle.abort();

        let mut tasks = vec![
            ("scanner", watcher_handle),
            ("settings", settings_handle),
            ("relay", relay_handle),
        ];
        if let Some(handle) = feed_handle {
            tasks.push(("feed", handle));
        }
        for (name, handle) in tasks {
            join_with_timeout(name, handle).await;
        }

        if let Some(path) = &config.feed.output_path {
            let html = document.read(|doc| doc.outer_html(doc.root()));
            match tokio::fs::write(path, html).await {
                Ok(()) => tracing::info!(path = %path.display(), "page snapshot written"),
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "failed to write page snapshot")
                }
            }
        }

        let counts = pipeline.tracker().counts();
        tracing::info!(
            units = pipeline.tracker().len(),
            evicted = counts.evicted,
            classified = counts.classified,
            hidden = counts.hidden,
            visible = counts.visible,
            corrected = counts.corrected,
            empty = counts.empty,
            pending = counts.pending,
            "feedguard stopped"
        );
        Ok(())
    }
}

async fn join_with_timeout(name: &'static str, mut handle: JoinHandle<()>) {
    match timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if err.is_panic() {
                tracing::error!(target: "app", task = name, "task panicked");
            }
        }
        Err(_) => {
            tracing::warn!(
                target: "app",
                task = name,
                "task did not stop within {:?}; aborting",
                SHUTDOWN_TIMEOUT
            );
            handle.abort();
        }
    }
}
