//! Incremental processing pipeline: scan → extract → classify → present.

pub mod extractor;
pub mod presenter;
pub mod tracker;
pub mod watcher;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    classifier::Classifier,
    config::PipelineConfig,
    dom::{NodeId, SelectorList, SharedDocument},
    domain::UnitState,
    settings::SettingsStore,
};

pub use extractor::TextExtractor;
pub use presenter::PresentationController;
pub use tracker::UnitTracker;
pub use watcher::spawn_mutation_watcher;

/// Result of one scan over the document.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub seen: usize,
    pub skipped: usize,
    pub empty: usize,
    pub dispatched: Vec<JoinHandle<()>>,
}

#[cfg(test)]
impl ScanReport {
    /// Waits for every unit dispatched by this scan to be presented.
    pub async fn finish(self) {
        for task in self.dispatched {
            if let Err(err) = task.await {
                tracing::error!(target: "scanner", error = %err, "unit task failed");
            }
        }
    }
}

pub struct Pipeline {
    document: SharedDocument,
    tracker: Arc<UnitTracker>,
    extractor: TextExtractor,
    classifier: Arc<dyn Classifier>,
    settings: Arc<SettingsStore>,
    presenter: Arc<PresentationController>,
    unit_selectors: SelectorList,
    evict_detached: bool,
}

impl Pipeline {
    pub fn new(
        document: SharedDocument,
        classifier: Arc<dyn Classifier>,
        settings: Arc<SettingsStore>,
        config: &PipelineConfig,
    ) -> Arc<Self> {
        let tracker = Arc::new(UnitTracker::new());
        let presenter = PresentationController::new(
            document.clone(),
            tracker.clone(),
            classifier.clone(),
            config.ack_delay,
        );
        Arc::new(Self {
            document,
            tracker,
            extractor: TextExtractor::new(config.text_selector.clone()),
            classifier,
            settings,
            presenter,
            unit_selectors: config.unit_selectors.clone(),
            evict_detached: config.evict_detached,
        })
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn tracker(&self) -> &Arc<UnitTracker> {
        &self.tracker
    }

    #[cfg(test)]
    pub fn presenter(&self) -> &Arc<PresentationController> {
        &self.presenter
    }

    /// Enumerates candidate units and dispatches every untracked one.
    ///
    /// Claiming and extraction happen synchronously under the document lock,
    /// before any task is spawned, so overlapping scans can never dispatch
    /// the same unit twice. Classification then runs on one task per unit.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let claimed: Vec<(NodeId, String)> = self.document.read(|doc| {
            if self.evict_detached {
                let evicted = self.tracker.evict(|unit| doc.is_attached(unit));
                if evicted > 0 {
                    tracing::debug!(target: "scanner", evicted, "dropped detached units");
                }
            }

            let mut claimed = Vec::new();
            for unit in doc.query_all(doc.root(), &self.unit_selectors) {
                report.seen += 1;
                if !self.tracker.try_claim(unit) {
                    report.skipped += 1;
                    continue;
                }
                match self.extractor.extract(doc, unit) {
                    Some(text) => claimed.push((unit, text)),
                    None => {
                        self.tracker.set_state(unit, UnitState::Empty);
                        report.empty += 1;
                    }
                }
            }
            claimed
        });

        for (unit, text) in claimed {
            report.dispatched.push(self.dispatch(unit, text));
        }
        if !report.dispatched.is_empty() || report.empty > 0 {
            tracing::debug!(
                target: "scanner",
                seen = report.seen,
                dispatched = report.dispatched.len(),
                empty = report.empty,
                "scan complete"
            );
        }
        report
    }

    fn dispatch(&self, unit: NodeId, text: String) -> JoinHandle<()> {
        let classifier = self.classifier.clone();
        let settings = self.settings.clone();
        let presenter = self.presenter.clone();
        let text: Arc<str> = Arc::from(text);
        tokio::spawn(async move {
            let label = classifier.classify(&text).await;
            let policy = settings.current_policy();
            presenter.present(unit, text, label, &policy);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dom::Document,
        domain::{FilterSetting, HideReason, Label},
        test_support::ScriptedClassifier,
    };

    fn config() -> PipelineConfig {
        PipelineConfig {
            unit_selectors: "article, div.narrow".parse().unwrap(),
            text_selector: r#"div[data-testid="tweetText"]"#.parse().unwrap(),
            ack_delay: Duration::from_millis(50),
            evict_detached: false,
        }
    }

    fn add_article(document: &SharedDocument, text: &str) -> NodeId {
        document.write(|doc| {
            let root = doc.root();
            let article = doc.append_element(root, "article", &[]);
            let body = doc.append_element(article, "div", &[]);
            doc.set_attr(body, "data-testid", "tweetText");
            doc.append_text(body, text);
            article
        })
    }

    fn pipeline_with(classifier: Arc<ScriptedClassifier>) -> (Arc<Pipeline>, Arc<SettingsStore>) {
        let settings = Arc::new(SettingsStore::new());
        let pipeline = Pipeline::new(
            SharedDocument::new(Document::new()),
            classifier,
            settings.clone(),
            &config(),
        );
        (pipeline, settings)
    }

    #[tokio::test]
    async fn overlapping_scans_classify_each_unit_once() {
        let classifier = Arc::new(ScriptedClassifier::new().with_delay(Duration::from_millis(20)));
        let (pipeline, _) = pipeline_with(classifier.clone());
        for i in 0..5 {
            add_article(pipeline.document(), &format!("post {i}"));
        }

        let mut reports = Vec::new();
        for _ in 0..4 {
            reports.push(pipeline.scan());
        }
        add_article(pipeline.document(), "late post");
        reports.push(pipeline.scan());

        let dispatched: usize = reports.iter().map(|r| r.dispatched.len()).sum();
        assert_eq!(dispatched, 6);
        for report in reports {
            report.finish().await;
        }
        pipeline.scan().finish().await;

        let mut calls = classifier.calls();
        calls.sort();
        calls.dedup();
        assert_eq!(calls.len(), 6);
        assert_eq!(classifier.calls().len(), 6);
        assert_eq!(pipeline.tracker().counts().visible, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_scans_from_many_tasks_do_not_double_dispatch() {
        let classifier = Arc::new(ScriptedClassifier::new().with_delay(Duration::from_millis(5)));
        let (pipeline, _) = pipeline_with(classifier.clone());
        for i in 0..20 {
            add_article(pipeline.document(), &format!("post {i}"));
        }

        let scans: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.scan().finish().await })
            })
            .collect();
        for scan in scans {
            scan.await.unwrap();
        }

        assert_eq!(classifier.calls().len(), 20);
        assert_eq!(pipeline.tracker().len(), 20);
    }

    #[tokio::test]
    async fn empty_units_are_tracked_but_never_classified_or_rendered() {
        let classifier = Arc::new(ScriptedClassifier::new());
        let (pipeline, _) = pipeline_with(classifier.clone());
        let (image_only, blank_narrow) = pipeline.document().write(|doc| {
            let root = doc.root();
            let article = doc.append_element(root, "article", &[]);
            doc.append_element(article, "img", &[]);
            let narrow = doc.append_element(root, "div", &["narrow"]);
            doc.append_text(narrow, "   ");
            (article, narrow)
        });

        let report = pipeline.scan();
        assert_eq!(report.empty, 2);
        report.finish().await;

        assert!(classifier.calls().is_empty());
        for unit in [image_only, blank_narrow] {
            assert_eq!(pipeline.tracker().state(unit), Some(UnitState::Empty));
            assert_eq!(pipeline.presenter().control_of(unit), None);
            let children = pipeline.document().read(|doc| doc.children(unit).len());
            assert_eq!(children, 1);
        }
        assert_eq!(pipeline.scan().skipped, 2);
    }

    #[tokio::test]
    async fn label_and_policy_decide_hidden_or_visible() {
        let labels = [
            ("hate text", Label::Hate),
            ("abuse text", Label::Abuse),
            ("neutral text", Label::Neutral),
            ("other text", Label::Other("SPAM".into())),
        ];
        let cases = [
            (FilterSetting::Both, [true, true, false, false]),
            (FilterSetting::Hate, [true, false, false, false]),
            (FilterSetting::Abuse, [false, true, false, false]),
        ];

        for (setting, expected) in cases {
            let mut scripted = ScriptedClassifier::new();
            for (text, label) in &labels {
                scripted = scripted.with_label(text, label.clone());
            }
            let (pipeline, settings) = pipeline_with(Arc::new(scripted));
            settings.set(setting);
            let units: Vec<_> = labels
                .iter()
                .map(|(text, _)| add_article(pipeline.document(), text))
                .collect();

            pipeline.scan().finish().await;

            for ((unit, hidden), (text, _)) in units.iter().zip(expected).zip(&labels) {
                let state = pipeline.tracker().state(*unit);
                let want = if hidden {
                    UnitState::Hidden(HideReason::Policy)
                } else {
                    UnitState::Visible
                };
                assert_eq!(state, Some(want), "{setting} / {text}");
            }
        }
    }

    #[tokio::test]
    async fn policy_change_only_affects_later_units() {
        let classifier = Arc::new(
            ScriptedClassifier::new()
                .with_label("first hate", Label::Hate)
                .with_label("first abuse", Label::Abuse)
                .with_label("second hate", Label::Hate),
        );
        let (pipeline, settings) = pipeline_with(classifier);
        let first_hate = add_article(pipeline.document(), "first hate");
        let first_abuse = add_article(pipeline.document(), "first abuse");
        pipeline.scan().finish().await;

        settings.apply_change("ABUSE");
        let second_hate = add_article(pipeline.document(), "second hate");
        pipeline.scan().finish().await;

        assert_eq!(
            pipeline.tracker().state(first_hate),
            Some(UnitState::Hidden(HideReason::Policy))
        );
        assert_eq!(
            pipeline.tracker().state(first_abuse),
            Some(UnitState::Hidden(HideReason::Policy))
        );
        assert_eq!(pipeline.tracker().state(second_hate), Some(UnitState::Visible));
    }

    #[tokio::test]
    async fn detached_units_are_evicted_when_enabled() {
        let settings = Arc::new(SettingsStore::new());
        let mut cfg = config();
        cfg.evict_detached = true;
        let pipeline = Pipeline::new(
            SharedDocument::new(Document::new()),
            Arc::new(ScriptedClassifier::new()),
            settings,
            &cfg,
        );
        let gone = add_article(pipeline.document(), "short-lived");
        let kept = add_article(pipeline.document(), "stays");
        pipeline.scan().finish().await;
        assert_eq!(pipeline.tracker().len(), 2);

        pipeline.document().write(|doc| doc.remove(gone));
        let report = pipeline.scan();
        assert_eq!(report.skipped, 1);
        assert_eq!(pipeline.tracker().state(gone), None);
        assert_eq!(pipeline.tracker().state(kept), Some(UnitState::Visible));
    }

    #[tokio::test]
    async fn reattached_unit_is_not_classified_again_after_eviction() {
        let classifier = Arc::new(ScriptedClassifier::new());
        let mut cfg = config();
        cfg.evict_detached = true;
        let pipeline = Pipeline::new(
            SharedDocument::new(Document::new()),
            classifier.clone(),
            Arc::new(SettingsStore::new()),
            &cfg,
        );
        let unit = add_article(pipeline.document(), "scrolled away and back");
        pipeline.scan().finish().await;

        pipeline.document().write(|doc| doc.remove(unit));
        pipeline.scan().finish().await;
        assert_eq!(pipeline.tracker().counts().evicted, 1);

        pipeline.document().write(|doc| {
            let root = doc.root();
            doc.append_child(root, unit);
        });
        let report = pipeline.scan();
        assert!(report.dispatched.is_empty());
        assert_eq!(report.skipped, 1);
        report.finish().await;

        assert_eq!(classifier.calls().len(), 1);
        let toolbars = pipeline.document().read(|doc| {
            doc.children(unit)
                .iter()
                .filter(|child| doc.has_class(**child, presenter::TOOLBAR_CLASS))
                .count()
        });
        assert_eq!(toolbars, 1);
    }
}
