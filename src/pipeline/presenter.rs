//! Per-unit UI state machine.
//!
//! Each classified unit owns exactly one control element at a time: the
//! hidden overlay, the pass-through toolbar, or a correction prompt (which
//! also hosts the short-lived acknowledgement). Original children are never
//! removed while hidden; they only get [`SUPPRESSED_CLASS`], so restoring
//! them is a class toggle.
//!
//! All transitions run under the document lock and check the tracked state
//! first, so a stale or repeated click is ignored.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use crate::{
    classifier::Classifier,
    dom::{ClickEvent, Document, NodeId, SharedDocument},
    domain::{Correction, HidePolicy, HideReason, Label, UnitState},
};

use super::tracker::UnitTracker;

pub const OVERLAY_CLASS: &str = "cf-overlay";
pub const TOOLBAR_CLASS: &str = "cf-toolbar";
pub const PROMPT_CLASS: &str = "cf-prompt";
pub const SUPPRESSED_CLASS: &str = "cf-hidden-content";
const BUTTON_CLASS: &str = "cf-btn";
const OUTLINE_BUTTON_CLASS: &str = "cf-btn-outline";
const USER_HIDDEN_REASON: &str = "HIDDEN BY USER";
const ACK_TEXT: &str = "Saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    ViewAnyway,
    Hide,
    Report,
    ConfirmSafe,
    DeclineSafe,
    ReportAs(Label),
}

#[derive(Debug, Clone, Copy)]
enum AfterAck {
    Clear,
    RestoreToolbar,
}

pub struct PresentationController {
    document: SharedDocument,
    tracker: Arc<UnitTracker>,
    classifier: Arc<dyn Classifier>,
    ack_delay: Duration,
}

impl PresentationController {
    pub fn new(
        document: SharedDocument,
        tracker: Arc<UnitTracker>,
        classifier: Arc<dyn Classifier>,
        ack_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            document,
            tracker,
            classifier,
            ack_delay,
        })
    }

    /// Renders the initial presentation for a freshly classified unit.
    pub fn present(self: &Arc<Self>, unit: NodeId, text: Arc<str>, label: Label, policy: &HidePolicy) {
        let hide = policy.hides(&label);
        self.document.write(|doc| {
            self.tracker.update(unit, |record| {
                record.label = Some(label.clone());
                record.state = UnitState::Classified(label.clone());
            });
            if hide {
                self.render_overlay(doc, unit, &text, label.as_str(), HideReason::Policy);
            } else {
                self.render_toolbar(doc, unit, &text);
            }
        });
        tracing::info!(
            target: "presenter",
            unit = %unit,
            %label,
            hidden = hide,
            "unit presented"
        );
    }

    /// Applies a user action. Returns false when the action does not apply
    /// to the unit's current state.
    pub fn handle(self: &Arc<Self>, unit: NodeId, text: Arc<str>, action: UserAction) -> bool {
        let mut feedback = None;
        let mut ack = None;
        let applied = self.document.write(|doc| {
            let Some(state) = self.tracker.state(unit) else {
                return false;
            };
            match (&state, &action) {
                (UnitState::Hidden(_), UserAction::ViewAnyway) => {
                    self.take_control(doc, unit);
                    for child in doc.children(unit).to_vec() {
                        doc.remove_class(child, SUPPRESSED_CLASS);
                    }
                    self.render_prompt(
                        doc,
                        unit,
                        &text,
                        "Safe?",
                        &[("Yes", UserAction::ConfirmSafe), ("No", UserAction::DeclineSafe)],
                        Correction::ConfirmSafe,
                    );
                    true
                }
                (UnitState::Visible, UserAction::Hide) => {
                    feedback = Some(Label::ManualHide);
                    self.render_overlay(doc, unit, &text, USER_HIDDEN_REASON, HideReason::User);
                    true
                }
                (UnitState::Visible, UserAction::Report) => {
                    let [hate, abuse] = HidePolicy::REPORTABLE;
                    self.render_prompt(
                        doc,
                        unit,
                        &text,
                        "Report:",
                        &[("Hate", UserAction::ReportAs(hate)), ("Abuse", UserAction::ReportAs(abuse))],
                        Correction::Report,
                    );
                    true
                }
                (UnitState::Corrected(Correction::ConfirmSafe), UserAction::ConfirmSafe) => {
                    feedback = Some(Label::Neutral);
                    ack = self
                        .acknowledge(doc, unit, Label::Neutral)
                        .map(|prompt| (prompt, AfterAck::Clear));
                    true
                }
                (UnitState::Corrected(Correction::ConfirmSafe), UserAction::DeclineSafe) => {
                    self.take_control(doc, unit);
                    self.tracker
                        .set_state(unit, UnitState::Corrected(Correction::Dismissed));
                    true
                }
                (UnitState::Corrected(Correction::Report), UserAction::ReportAs(label))
                    if HidePolicy::REPORTABLE.contains(label) =>
                {
                    feedback = Some(label.clone());
                    ack = self
                        .acknowledge(doc, unit, label.clone())
                        .map(|prompt| (prompt, AfterAck::RestoreToolbar));
                    true
                }
                _ => false,
            }
        });

        if !applied {
            tracing::debug!(target: "presenter", unit = %unit, ?action, "action ignored in current state");
            return false;
        }
        tracing::info!(target: "presenter", unit = %unit, ?action, "user action applied");

        if let Some(label) = feedback {
            self.classifier.submit_feedback(&text, label);
        }
        if let Some((prompt, after)) = ack {
            self.schedule_ack_expiry(unit, prompt, text, after);
        }
        true
    }

    /// Control element currently rendered for `unit`.
    #[cfg(test)]
    pub fn control_of(&self, unit: NodeId) -> Option<NodeId> {
        self.tracker.record(unit).and_then(|record| record.control)
    }

    fn render_overlay(
        self: &Arc<Self>,
        doc: &mut Document,
        unit: NodeId,
        text: &Arc<str>,
        shown_label: &str,
        reason: HideReason,
    ) {
        self.take_control(doc, unit);
        for child in doc.children(unit).to_vec() {
            doc.add_class(child, SUPPRESSED_CLASS);
        }

        let overlay = doc.create_element("div");
        doc.add_class(overlay, OVERLAY_CLASS);
        let summary = doc.append_element(overlay, "p", &[]);
        doc.append_text(summary, "Hidden: ");
        let strong = doc.append_element(summary, "strong", &[]);
        doc.append_text(strong, shown_label);
        self.button(doc, overlay, "View Anyway", BUTTON_CLASS, unit, text, UserAction::ViewAnyway);

        self.install_control(doc, unit, overlay, UnitState::Hidden(reason));
    }

    fn render_toolbar(self: &Arc<Self>, doc: &mut Document, unit: NodeId, text: &Arc<str>) {
        self.take_control(doc, unit);
        let toolbar = doc.create_element("div");
        doc.add_class(toolbar, TOOLBAR_CLASS);
        self.button(doc, toolbar, "Hide", OUTLINE_BUTTON_CLASS, unit, text, UserAction::Hide);
        self.button(doc, toolbar, "Report", OUTLINE_BUTTON_CLASS, unit, text, UserAction::Report);
        self.install_control(doc, unit, toolbar, UnitState::Visible);
    }

    fn render_prompt(
        self: &Arc<Self>,
        doc: &mut Document,
        unit: NodeId,
        text: &Arc<str>,
        question: &str,
        choices: &[(&str, UserAction)],
        correction: Correction,
    ) {
        self.take_control(doc, unit);
        let prompt = doc.create_element("div");
        doc.add_class(prompt, TOOLBAR_CLASS);
        doc.add_class(prompt, PROMPT_CLASS);
        let label = doc.append_element(prompt, "span", &[]);
        doc.append_text(label, question);
        for (caption, action) in choices {
            self.button(doc, prompt, caption, BUTTON_CLASS, unit, text, action.clone());
        }
        self.install_control(doc, unit, prompt, UnitState::Corrected(correction));
    }

    /// Replaces the prompt's contents with the acknowledgement text.
    fn acknowledge(&self, doc: &mut Document, unit: NodeId, label: Label) -> Option<NodeId> {
        let prompt = self.tracker.update(unit, |record| {
            record.state = UnitState::Corrected(Correction::Acknowledged(label));
            record.control
        })??;
        doc.clear_children(prompt);
        doc.append_text(prompt, ACK_TEXT);
        Some(prompt)
    }

    fn schedule_ack_expiry(self: &Arc<Self>, unit: NodeId, prompt: NodeId, text: Arc<str>, after: AfterAck) {
        let controller: Weak<Self> = Arc::downgrade(self);
        let delay = self.ack_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(controller) = controller.upgrade() {
                controller.expire_ack(unit, prompt, &text, after);
            }
        });
    }

    fn expire_ack(self: &Arc<Self>, unit: NodeId, prompt: NodeId, text: &Arc<str>, after: AfterAck) {
        self.document.write(|doc| {
            let showing_ack = self
                .tracker
                .update(unit, |record| {
                    record.control == Some(prompt)
                        && matches!(record.state, UnitState::Corrected(Correction::Acknowledged(_)))
                })
                .unwrap_or(false);
            if !showing_ack {
                return;
            }
            match after {
                AfterAck::Clear => self.take_control(doc, unit),
                AfterAck::RestoreToolbar => self.render_toolbar(doc, unit, text),
            }
        });
    }

    fn take_control(&self, doc: &mut Document, unit: NodeId) {
        if let Some(control) = self.tracker.update(unit, |record| record.control.take()).flatten() {
            doc.remove(control);
        }
    }

    fn install_control(&self, doc: &mut Document, unit: NodeId, control: NodeId, state: UnitState) {
        doc.append_child(unit, control);
        self.tracker.update(unit, |record| {
            record.control = Some(control);
            record.state = state;
        });
    }

    /// Every control button swallows the click so the enclosing post link
    /// never sees it.
    #[allow(clippy::too_many_arguments)]
    fn button(
        self: &Arc<Self>,
        doc: &mut Document,
        parent: NodeId,
        caption: &str,
        class: &str,
        unit: NodeId,
        text: &Arc<str>,
        action: UserAction,
    ) -> NodeId {
        let button = doc.append_element(parent, "button", &[class]);
        doc.set_attr(button, "type", "button");
        doc.append_text(button, caption);

        let controller = Arc::downgrade(self);
        let text = text.clone();
        doc.add_listener(
            button,
            Arc::new(move |event: &mut ClickEvent| {
                event.prevent_default();
                event.stop_propagation();
                if let Some(controller) = controller.upgrade() {
                    controller.handle(unit, text.clone(), action.clone());
                }
            }),
        );
        button
    }
}
