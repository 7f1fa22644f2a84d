use std::sync::Arc;

use tokio::task::JoinHandle;

use super::Pipeline;
use crate::infrastructure::shutdown::ShutdownListener;

/// Rescans on every observed document mutation until shutdown.
///
/// Rescans are edge-triggered and not time-debounced. Several mutations
/// that land before the watcher wakes collapse into one scan, which is fine
/// because the tracker makes scans idempotent.
pub fn spawn_mutation_watcher(pipeline: Arc<Pipeline>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
    let mut changes = pipeline.document().subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let generation = *changes.borrow_and_update();
                    let report = pipeline.scan();
                    if !report.dispatched.is_empty() {
                        tracing::debug!(
                            target: "scanner",
                            generation,
                            dispatched = report.dispatched.len(),
                            "mutation rescan"
                        );
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
        tracing::info!(target: "scanner", "mutation watcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::PipelineConfig,
        dom::{Document, SharedDocument},
        domain::{HideReason, Label, UnitState},
        infrastructure::shutdown::Shutdown,
        settings::SettingsStore,
        test_support::ScriptedClassifier,
    };

    #[tokio::test]
    async fn inserted_units_are_processed_without_explicit_scans() {
        let classifier = Arc::new(ScriptedClassifier::new().with_label("awful", Label::Hate));
        let pipeline = Pipeline::new(
            SharedDocument::new(Document::new()),
            classifier.clone(),
            Arc::new(SettingsStore::new()),
            &PipelineConfig {
                unit_selectors: "article, div.narrow".parse().unwrap(),
                text_selector: r#"div[data-testid="tweetText"]"#.parse().unwrap(),
                ack_delay: Duration::from_millis(50),
                evict_detached: false,
            },
        );
        let (shutdown, _) = Shutdown::new();
        let watcher = spawn_mutation_watcher(pipeline.clone(), shutdown.subscribe());

        let unit = pipeline.document().write(|doc| {
            let root = doc.root();
            let narrow = doc.append_element(root, "div", &["narrow"]);
            doc.append_text(narrow, "awful");
            narrow
        });

        for _ in 0..200 {
            if pipeline.tracker().state(unit) == Some(UnitState::Hidden(HideReason::Policy)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            pipeline.tracker().state(unit),
            Some(UnitState::Hidden(HideReason::Policy))
        );
        // Rendering the overlay mutated the document again; that rescan
        // must not have classified anything a second time.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(classifier.calls().len(), 1);

        shutdown.trigger();
        watcher.await.unwrap();
    }
}
