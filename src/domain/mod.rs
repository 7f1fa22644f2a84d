pub mod label;
pub mod policy;
pub mod unit;

pub use label::Label;
pub use policy::{FilterSetting, HidePolicy, ParseSettingError};
pub use unit::{Correction, HideReason, UnitState};
