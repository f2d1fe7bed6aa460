//! Slip editing engine: the builder wizard and the line adjustment
//! coordinator it delegates remote recomputes to.

pub mod adjust;
pub mod wizard;

pub use adjust::{LineAdjustment, LineAdjustmentCoordinator};
pub use wizard::{AdjustmentTicket, ParlayWizard, SetupDetails, WizardStep};
