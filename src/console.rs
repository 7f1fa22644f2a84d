//! Line-oriented operator console over stdin.

use std::{str::FromStr, sync::Arc};

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    dom::NodeId,
    domain::{FilterSetting, ParseSettingError},
    infrastructure::shutdown::Shutdown,
    pipeline::Pipeline,
    settings::{FileSettings, SettingsStore},
};

const HELP: &str = "commands: units | show [node-id] | click <node-id> | filter <BOTH|HATE|ABUSE> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Units,
    Show(Option<NodeId>),
    Click(NodeId),
    Filter(FilterSetting),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid node id `{0}`")]
    InvalidNode(String),
    #[error(transparent)]
    InvalidSetting(#[from] ParseSettingError),
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("help");
        let arg = parts.next();
        let node = |raw: &str| {
            raw.parse::<NodeId>()
                .map_err(|_| CommandError::InvalidNode(raw.to_string()))
        };
        match command.to_ascii_lowercase().as_str() {
            "units" => Ok(Self::Units),
            "show" => arg.map(node).transpose().map(Self::Show),
            "click" => node(arg.ok_or(CommandError::MissingArgument("click"))?).map(Self::Click),
            "filter" => {
                let raw = arg.ok_or(CommandError::MissingArgument("filter"))?;
                Ok(Self::Filter(raw.to_ascii_uppercase().parse()?))
            }
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub struct Console {
    pipeline: Arc<Pipeline>,
    settings: Arc<SettingsStore>,
    backend: FileSettings,
    shutdown: Shutdown,
}

impl Console {
    pub fn new(
        pipeline: Arc<Pipeline>,
        settings: Arc<SettingsStore>,
        backend: FileSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            pipeline,
            settings,
            backend,
            shutdown,
        }
    }

    /// Reads commands until `quit`, end of input or shutdown.
    pub async fn run<R, W>(self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut stop = self.shutdown.subscribe();
        output.write_all(format!("{HELP}\n").as_bytes()).await?;
        output.flush().await?;
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = stop.notified() => break,
            };
            let Some(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            let reply = match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => {
                    tracing::info!(target: "console", "quit requested");
                    self.shutdown.trigger();
                    break;
                }
                Ok(command) => self.execute(command).await,
                Err(err) => format!("error: {err}\n{HELP}"),
            };
            output.write_all(reply.as_bytes()).await?;
            if !reply.ends_with('\n') {
                output.write_all(b"\n").await?;
            }
            output.flush().await?;
        }
        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Units => self.describe_units(),
            ConsoleCommand::Show(node) => self.pipeline.document().read(|doc| {
                let node = node.unwrap_or_else(|| doc.root());
                if doc.contains(node) {
                    doc.annotated_html(node)
                } else {
                    format!("no node {node}")
                }
            }),
            ConsoleCommand::Click(node) => {
                let outcome = self.pipeline.document().click(node);
                let mut reply = format!(
                    "clicked {node}: listeners={} default_prevented={} propagation_stopped={}",
                    outcome.listeners_invoked, outcome.default_prevented, outcome.propagation_stopped
                );
                if let Some(href) = outcome.navigated_to {
                    reply.push_str(&format!("\nnavigate -> {href}"));
                }
                reply
            }
            ConsoleCommand::Filter(setting) => {
                self.settings.set(setting);
                match self.backend.save(setting).await {
                    Ok(()) => format!("filter set to {setting}"),
                    Err(err) => {
                        tracing::warn!(target: "console", error = %err, "failed to persist filter setting");
                        format!("filter set to {setting} (not saved: {err})")
                    }
                }
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => String::new(),
        }
    }

    fn describe_units(&self) -> String {
        let tracker = self.pipeline.tracker();
        let counts = tracker.counts();
        let mut out = format!(
            "{} units (pending {}, empty {}, classified {}, hidden {}, visible {}, corrected {}, evicted {})\n",
            tracker.len(),
            counts.pending,
            counts.empty,
            counts.classified,
            counts.hidden,
            counts.visible,
            counts.corrected,
            counts.evicted
        );
        let now = Utc::now();
        for (unit, record) in tracker.snapshot() {
            let label = record.label.as_ref().map(|l| l.as_str()).unwrap_or("-");
            let control = record
                .control
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let age = (now - record.first_seen).num_seconds().max(0);
            out.push_str(&format!(
                "{unit}\t{:<10}\t{label}\tcontrol={control}\tage={age}s\n",
                record.state.name()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::PipelineConfig,
        dom::{Document, SelectorList, SharedDocument},
        domain::{HideReason, Label, UnitState},
        pipeline::presenter::OVERLAY_CLASS,
        test_support::ScriptedClassifier,
    };

    #[test]
    fn parses_commands() {
        assert_eq!("units".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Units));
        assert_eq!("show".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Show(None)));
        assert_eq!(
            "show 12".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Show(Some("12".parse().unwrap())))
        );
        assert_eq!("CLICK 3".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Click("3".parse().unwrap())));
        assert_eq!("filter hate".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Filter(FilterSetting::Hate)));
        assert_eq!("quit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!(
            "click".parse::<ConsoleCommand>(),
            Err(CommandError::MissingArgument("click"))
        );
        assert_eq!(
            "click abc".parse::<ConsoleCommand>(),
            Err(CommandError::InvalidNode("abc".into()))
        );
        assert!(matches!(
            "filter everything".parse::<ConsoleCommand>(),
            Err(CommandError::InvalidSetting(_))
        ));
        assert_eq!(
            "dance".parse::<ConsoleCommand>(),
            Err(CommandError::Unknown("dance".into()))
        );
    }

    #[tokio::test]
    async fn drives_the_page_from_commands() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileSettings::new(dir.path().join("settings.json"));
        let settings = Arc::new(SettingsStore::new());
        let pipeline = Pipeline::new(
            SharedDocument::new(Document::new()),
            Arc::new(ScriptedClassifier::new().with_label("vile", Label::Hate)),
            settings.clone(),
            &PipelineConfig {
                unit_selectors: "article, div.narrow".parse().unwrap(),
                text_selector: r#"div[data-testid="tweetText"]"#.parse().unwrap(),
                ack_delay: Duration::from_millis(50),
                evict_detached: false,
            },
        );
        let unit = pipeline.document().write(|doc| {
            let root = doc.root();
            let narrow = doc.append_element(root, "div", &["narrow"]);
            doc.append_text(narrow, "vile");
            narrow
        });
        pipeline.scan().finish().await;
        assert_eq!(
            pipeline.tracker().state(unit),
            Some(UnitState::Hidden(HideReason::Policy))
        );

        let overlay: SelectorList = format!("div.{OVERLAY_CLASS}").parse().unwrap();
        let button = pipeline.document().read(|doc| {
            let overlay = doc.query_first(unit, &overlay).unwrap();
            let buttons: SelectorList = "button".parse().unwrap();
            doc.query_first(overlay, &buttons).unwrap()
        });

        let (shutdown, _) = Shutdown::new();
        let console = Console::new(pipeline.clone(), settings.clone(), backend.clone(), shutdown.clone());
        let script = format!("units\nclick {button}\nfilter abuse\nbogus\nquit\nunits\n");
        let mut output = Vec::new();
        console.run(script.as_bytes(), &mut output).await.unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains(&format!("{unit}\thidden")), "{output}");
        assert!(output.contains("age=0s"), "{output}");
        assert!(output.contains(&format!("clicked {button}")), "{output}");
        assert!(output.contains("error: unknown command `bogus`"), "{output}");
        assert_eq!(output.matches("units (").count(), 1);
        assert!(matches!(
            pipeline.tracker().state(unit),
            Some(UnitState::Corrected(_))
        ));
        assert_eq!(settings.current_setting(), FilterSetting::Abuse);
        assert_eq!(backend.load().await.unwrap().as_deref(), Some("ABUSE"));
        assert!(shutdown.is_triggered());
    }
}
