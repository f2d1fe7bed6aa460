//! Parlay builder wizard.
//!
//! Drives the linear Setup → Selection → Review → Saved flow and owns the
//! in-progress slip. Nothing is durable until `save` succeeds; `cancel`
//! throws the in-progress data away.
//!
//! Remote calls that may outlive the step they started on (line
//! adjustments) are split into `begin_*` / `complete_*`. The ticket from
//! `begin_*` records the navigation epoch, and any step change or cancel
//! advances that epoch so a late result is discarded instead of landing
//! on a superseded slip.

use std::fmt;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisService, CorrelationScore, DfsPick, FlexPick};
use crate::config::LimitsConfig;
use crate::engine::adjust::{validate_new_line, LineAdjustment, LineAdjustmentCoordinator};
use crate::slip::normalize::{self, RawAnalysis};
use crate::slip::{PickSet, SlipSummary};
use crate::storage::ParlayRepository;
use crate::types::{IdentityKey, Leg, Parlay, ParlayError, ParlayGrade, ParlayStatus, Sportsbook};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Setup,
    Selection,
    Review,
    Saved,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStep::Setup => write!(f, "Setup"),
            WizardStep::Selection => write!(f, "Selection"),
            WizardStep::Review => write!(f, "Review"),
            WizardStep::Saved => write!(f, "Saved"),
        }
    }
}

/// Details entered on the Setup step.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupDetails {
    pub name: String,
    pub week: u32,
    pub sportsbook: Option<Sportsbook>,
}

impl Default for SetupDetails {
    fn default() -> Self {
        Self {
            name: String::new(),
            week: 1,
            sportsbook: None,
        }
    }
}

/// An in-flight line adjustment. Hand it back to
/// `complete_line_adjustment` together with the coordinator's outcome.
#[derive(Debug, Clone)]
pub struct AdjustmentTicket {
    key: IdentityKey,
    leg: Leg,
    new_line: f64,
    week: u32,
    epoch: u64,
}

impl AdjustmentTicket {
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Snapshot of the leg when the adjustment started.
    pub fn leg(&self) -> &Leg {
        &self.leg
    }

    pub fn new_line(&self) -> f64 {
        self.new_line
    }

    pub fn week(&self) -> u32 {
        self.week
    }
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

pub struct ParlayWizard {
    step: WizardStep,
    details: SetupDetails,
    picks: PickSet,
    min_legs: usize,
    grade: Option<ParlayGrade>,
    epoch: u64,
    in_flight: Option<IdentityKey>,
    last_error: Option<String>,
    saved: Option<Parlay>,
}

impl Default for ParlayWizard {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}

impl ParlayWizard {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            step: WizardStep::Setup,
            details: SetupDetails::default(),
            picks: PickSet::new(limits.max_legs),
            min_legs: limits.min_legs,
            grade: None,
            epoch: 0,
            in_flight: None,
            last_error: None,
            saved: None,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn details(&self) -> &SetupDetails {
        &self.details
    }

    pub fn picks(&self) -> &PickSet {
        &self.picks
    }

    pub fn summary(&self) -> &SlipSummary {
        self.picks.summary()
    }

    pub fn grade(&self) -> Option<&ParlayGrade> {
        self.grade.as_ref()
    }

    /// Reason the last save, grade, or adjustment failed, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a line adjustment is awaiting its result.
    pub fn adjustment_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The parlay written by a successful save.
    pub fn saved_parlay(&self) -> Option<&Parlay> {
        self.saved.as_ref()
    }

    // -- Setup ---------------------------------------------------------------

    pub fn set_name(&mut self, name: &str) -> Result<(), ParlayError> {
        self.ensure_editable()?;
        self.details.name = name.to_string();
        Ok(())
    }

    pub fn set_week(&mut self, week: u32) -> Result<(), ParlayError> {
        self.ensure_editable()?;
        self.details.week = week;
        Ok(())
    }

    pub fn set_sportsbook(&mut self, book: Sportsbook) -> Result<(), ParlayError> {
        self.ensure_editable()?;
        self.details.sportsbook = Some(book);
        Ok(())
    }

    // -- Selection -----------------------------------------------------------

    pub fn add_leg(&mut self, leg: Leg) -> Result<&SlipSummary, ParlayError> {
        self.ensure_step(&[WizardStep::Selection], "add a leg")?;
        let summary = self.picks.add(leg)?;
        self.grade = None;
        Ok(summary)
    }

    /// Normalize a raw analysis result and add it.
    pub fn add_analysis(&mut self, raw: &RawAnalysis) -> Result<&SlipSummary, ParlayError> {
        let leg = normalize::normalize(raw)?;
        self.add_leg(leg)
    }

    pub fn remove_leg(&mut self, key: &IdentityKey) -> Result<bool, ParlayError> {
        self.ensure_step(&[WizardStep::Selection, WizardStep::Review], "remove a leg")?;
        let removed = self.picks.remove(key);
        if removed {
            self.grade = None;
        }
        Ok(removed)
    }

    // -- Navigation ----------------------------------------------------------

    /// Move forward one step, enforcing that step's gate. Review moves
    /// forward only through `save`.
    pub fn advance(&mut self) -> Result<WizardStep, ParlayError> {
        let next = match self.step {
            WizardStep::Setup => {
                if self.details.name.trim().is_empty() {
                    return Err(ParlayError::StepValidation(
                        "Please enter a name for your parlay".to_string(),
                    ));
                }
                if self.details.sportsbook.is_none() {
                    return Err(ParlayError::StepValidation(
                        "Please select a sportsbook".to_string(),
                    ));
                }
                WizardStep::Selection
            }
            WizardStep::Selection => {
                let n = self.picks.len();
                if n < self.min_legs || n > self.picks.capacity() {
                    return Err(ParlayError::StepValidation(format!(
                        "Select between {} and {} legs (currently {n})",
                        self.min_legs,
                        self.picks.capacity()
                    )));
                }
                WizardStep::Review
            }
            WizardStep::Review | WizardStep::Saved => {
                return Err(self.transition_error(WizardStep::Saved));
            }
        };
        self.go_to(next);
        Ok(next)
    }

    /// Move back one step. Entered data is kept.
    pub fn back(&mut self) -> Result<WizardStep, ParlayError> {
        let prev = match self.step {
            WizardStep::Review => WizardStep::Selection,
            WizardStep::Selection => WizardStep::Setup,
            WizardStep::Setup | WizardStep::Saved => {
                return Err(ParlayError::InvalidTransition {
                    from: self.step.to_string(),
                    to: "previous step".to_string(),
                });
            }
        };
        self.go_to(prev);
        Ok(prev)
    }

    /// Discard everything and start over at Setup. Never persists.
    pub fn cancel(&mut self) {
        info!(step = %self.step, legs = self.picks.len(), "Parlay builder cancelled");
        let epoch = self.epoch + 1;
        let capacity = self.picks.capacity();
        *self = Self {
            step: WizardStep::Setup,
            details: SetupDetails::default(),
            picks: PickSet::new(capacity),
            min_legs: self.min_legs,
            grade: None,
            epoch,
            in_flight: None,
            last_error: None,
            saved: None,
        };
    }

    fn go_to(&mut self, step: WizardStep) {
        debug!(from = %self.step, to = %step, "Wizard step change");
        self.step = step;
        self.epoch += 1;
        self.in_flight = None;
    }

    // -- Review --------------------------------------------------------------

    /// Draft parlay as it would be saved right now.
    pub fn preview(&self) -> Result<Parlay, ParlayError> {
        let mut parlay = Parlay::new(
            &self.details.name,
            self.details.week,
            self.picks.legs().to_vec(),
            self.details.sportsbook,
        )?;
        parlay.grade = self.grade.clone();
        Ok(parlay)
    }

    /// Start a line adjustment on the Review step.
    ///
    /// Only one adjustment may be pending at a time.
    pub fn begin_line_adjustment(
        &mut self,
        key: &IdentityKey,
        new_line: f64,
    ) -> Result<AdjustmentTicket, ParlayError> {
        self.ensure_step(&[WizardStep::Review], "adjust a line")?;
        if let Some(pending) = &self.in_flight {
            return Err(ParlayError::AdjustmentInFlight(pending.clone()));
        }
        let leg = self
            .picks
            .get(key)
            .cloned()
            .ok_or_else(|| ParlayError::LegNotFound(key.clone()))?;
        validate_new_line(&leg, new_line)?;

        self.in_flight = Some(key.clone());
        Ok(AdjustmentTicket {
            key: key.clone(),
            leg,
            new_line,
            week: self.details.week,
            epoch: self.epoch,
        })
    }

    /// Merge (or reject) the outcome of an adjustment started with
    /// `begin_line_adjustment`.
    ///
    /// Results that arrive after the user navigated away, or after the leg
    /// itself changed, are dropped with `StaleResult`.
    pub fn complete_line_adjustment(
        &mut self,
        ticket: AdjustmentTicket,
        outcome: Result<LineAdjustment, ParlayError>,
    ) -> Result<&SlipSummary, ParlayError> {
        if ticket.epoch != self.epoch {
            info!(leg = %ticket.key, "Discarding line adjustment for a superseded slip");
            return Err(ParlayError::StaleResult);
        }
        self.in_flight = None;

        let adjustment = match outcome {
            Ok(adj) => adj,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let current = match self.picks.get(&ticket.key) {
            Some(leg) if leg.line == ticket.leg.line => leg.clone(),
            _ => {
                info!(leg = %ticket.key, "Discarding line adjustment: leg changed or removed");
                return Err(ParlayError::StaleResult);
            }
        };

        self.grade = None;
        self.last_error = None;
        self.picks.replace(&ticket.key, adjustment.apply_to(&current))
    }

    /// Begin, recompute, and complete an adjustment in one call.
    pub async fn adjust_line(
        &mut self,
        coordinator: &LineAdjustmentCoordinator,
        key: &IdentityKey,
        new_line: f64,
    ) -> Result<&SlipSummary, ParlayError> {
        let ticket = self.begin_line_adjustment(key, new_line)?;
        let outcome = coordinator
            .recompute(ticket.leg(), ticket.new_line(), ticket.week())
            .await;
        self.complete_line_adjustment(ticket, outcome)
    }

    /// Ask the grading service for a verdict on the current slip. The
    /// grade's adjusted confidence becomes the displayed confidence until
    /// the legs change.
    pub async fn request_grade(
        &mut self,
        service: &dyn AnalysisService,
    ) -> Result<&ParlayGrade, ParlayError> {
        self.ensure_step(&[WizardStep::Review], "grade the parlay")?;
        let legs = self.picks.legs().to_vec();
        match service.grade_parlay(&legs).await {
            Ok(grade) => {
                info!(
                    grade = %grade.grade,
                    adjusted_confidence = grade.adjusted_confidence,
                    combined_confidence = self.picks.summary().combined_confidence,
                    "Parlay graded"
                );
                self.last_error = None;
                Ok(&*self.grade.insert(grade))
            }
            Err(e) => {
                warn!(service = service.name(), error = %e, "Parlay grading failed");
                let err = ParlayError::GradingFailed(format!("{e:#}"));
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Server-side correlation scoring. Advisory: failures are logged
    /// and yield `None`.
    pub async fn remote_correlation(
        &self,
        service: &dyn AnalysisService,
    ) -> Option<CorrelationScore> {
        if self.picks.len() < 2 {
            return None;
        }
        let picks: Vec<DfsPick> = self.picks.legs().iter().map(DfsPick::from).collect();
        match service.score_correlation(&picks).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!(service = service.name(), error = %e, "Correlation scoring unavailable");
                None
            }
        }
    }

    /// Flex pick suggestion. Advisory: failures are logged and yield `None`.
    pub async fn flex_pick(&self, service: &dyn AnalysisService) -> Option<FlexPick> {
        if self.picks.is_empty() {
            return None;
        }
        let picks: Vec<DfsPick> = self.picks.legs().iter().map(DfsPick::from).collect();
        match service.flex_pick(&picks).await {
            Ok(pick) => Some(pick),
            Err(e) => {
                warn!(service = service.name(), error = %e, "Flex pick unavailable");
                None
            }
        }
    }

    // -- Save ----------------------------------------------------------------

    /// Persist the slip and finish the wizard.
    ///
    /// With `place_now` the parlay is stored as already placed. On any
    /// rejection the wizard stays on Review with the slip intact and the
    /// reason available from `last_error`.
    pub async fn save(
        &mut self,
        repo: &ParlayRepository,
        place_now: bool,
    ) -> Result<Parlay, ParlayError> {
        self.ensure_step(&[WizardStep::Review], "save")?;
        if self.picks.len() < self.min_legs {
            let err = ParlayError::StepValidation(format!(
                "A parlay needs at least {} legs",
                self.min_legs
            ));
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let mut parlay = self.preview()?;
        if place_now {
            parlay.status = ParlayStatus::Placed;
            parlay.placed_at = Some(parlay.created_at);
        }

        match repo.save_parlay(parlay).await {
            Ok(saved) => {
                self.go_to(WizardStep::Saved);
                self.picks.clear();
                self.grade = None;
                self.last_error = None;
                self.saved = Some(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!(error = %e, "Save rejected; staying on Review");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // -- Guards --------------------------------------------------------------

    fn ensure_editable(&self) -> Result<(), ParlayError> {
        if self.step == WizardStep::Saved {
            return Err(ParlayError::InvalidTransition {
                from: self.step.to_string(),
                to: "edit".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_step(&self, allowed: &[WizardStep], action: &str) -> Result<(), ParlayError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(ParlayError::InvalidTransition {
                from: self.step.to_string(),
                to: action.to_string(),
            })
        }
    }

    fn transition_error(&self, to: WizardStep) -> ParlayError {
        ParlayError::InvalidTransition {
            from: self.step.to_string(),
            to: to.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
