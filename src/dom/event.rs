use std::sync::Arc;

/// Click handler attached to a node. Runs without the document lock held.
pub type Listener = Arc<dyn Fn(&mut ClickEvent) + Send + Sync>;

/// Per-dispatch flags a listener can set while a click bubbles.
#[derive(Debug, Clone, Default)]
pub struct ClickEvent {
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ClickEvent {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// What happened after a click finished bubbling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    pub listeners_invoked: usize,
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    /// Set when the default action ran on an enclosing link.
    pub navigated_to: Option<String>,
}
