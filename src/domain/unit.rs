use super::Label;

/// Per-unit processing state, as tracked by the pipeline.
///
/// `Pending` is entered synchronously when a unit is first seen; everything
/// after that is driven by the classifier result and user actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    /// No classifiable text was found. Terminal, nothing is rendered.
    Empty,
    Classified(Label),
    Hidden(HideReason),
    Visible,
    Corrected(Correction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    Policy,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    /// Content restored, asking whether it was safe.
    ConfirmSafe,
    /// Asking which label the visible unit deserves.
    Report,
    Acknowledged(Label),
    /// The safety prompt was declined; nothing was sent.
    Dismissed,
}

impl UnitState {
    pub fn name(&self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Empty => "empty",
            UnitState::Classified(_) => "classified",
            UnitState::Hidden(_) => "hidden",
            UnitState::Visible => "visible",
            UnitState::Corrected(_) => "corrected",
        }
    }
}
