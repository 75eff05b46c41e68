//! Descriptive run metadata. Only used for labels in the output bundle, but
//! every group must be supplied before initialisation.

use serde::{Deserialize, Serialize};

/// Collision system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Beam {
    /// Proton-proton.
    Pp,
    /// Gold-gold.
    AuAu,
}

/// Trigger species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Direct-photon enriched.
    GammaDir,
    /// Photon-rich.
    GammaRich,
    /// Neutral pion.
    Pi0,
}

/// Jet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JetKind {
    /// Charged-particle jets.
    Charged,
    /// Full (charged + neutral) jets.
    Full,
}

/// Beam and energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Collision system.
    pub beam: Beam,
    /// Centre-of-mass energy per nucleon pair (GeV).
    pub energy_gev: f64,
}

/// Trigger selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerInfo {
    /// Trigger species.
    pub kind: TriggerKind,
    /// Lower trigger E_T (GeV).
    pub et_min: f64,
    /// Upper trigger E_T (GeV).
    pub et_max: f64,
    /// Maximum |η| of the trigger.
    pub eta_max: f64,
}

/// Jet definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetInfo {
    /// Jet type.
    pub kind: JetKind,
    /// Number of leading jets removed from the background estimate.
    pub n_removed: u32,
    /// Resolution parameter R.
    pub radius: f64,
    /// Minimum jet area.
    pub area_min: f64,
    /// Minimum constituent pT (GeV/c).
    pub constituent_pt_min: f64,
}

impl EventInfo {
    /// One-line label.
    pub fn label(&self) -> String {
        let system = match self.beam {
            Beam::Pp => "pp collisions, sqrt(s) = ",
            Beam::AuAu => "AuAu collisions, sqrt(s_NN) = ",
        };
        format!("{}{:.1} GeV", system, self.energy_gev)
    }
}

impl TriggerInfo {
    /// One-line label.
    pub fn label(&self) -> String {
        let kind = match self.kind {
            TriggerKind::GammaDir => "gamma-dir trigger",
            TriggerKind::GammaRich => "gamma-rich trigger",
            TriggerKind::Pi0 => "pi0 trigger",
        };
        format!(
            "{}, E_T^trg in ({:.1}, {:.1}) GeV, |eta^trg| < {:.1}",
            kind, self.et_min, self.et_max, self.eta_max
        )
    }
}

impl JetInfo {
    /// Label lines: algorithm and radius, cuts, jet type.
    pub fn label_lines(&self) -> [String; 3] {
        let kind = match self.kind {
            JetKind::Charged => "charged jets",
            JetKind::Full => "full jets",
        };
        [
            format!("anti-kT, R = {:.1}", self.radius),
            format!(
                "A_jet > {:.2}, pT^cst > {:.1}, N_rm = {}",
                self.area_min, self.constituent_pt_min, self.n_removed
            ),
            kind.to_string(),
        ]
    }
}

/// Label text attached to the output bundle.
pub(crate) fn build_labels(
    event: Option<&EventInfo>,
    trigger: Option<&TriggerInfo>,
    jet: Option<&JetInfo>,
) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(e) = event {
        lines.push(e.label());
    }
    if let Some(t) = trigger {
        lines.push(t.label());
    }
    if let Some(j) = jet {
        lines.extend(j.label_lines());
    }
    lines
}
