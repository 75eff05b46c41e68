//! Required-input checklist consulted once by `JetFolder::init`.

use bf_core::{Error, InputGroup, Result};

/// One required input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Particle-level prior.
    Prior,
    /// Detector-level prior.
    Smeared,
    /// Measured spectrum.
    Measured,
    /// Response matrix.
    Response,
    /// Efficiency curve.
    Efficiency,
    /// Beam and energy.
    EventInfo,
    /// Trigger selection.
    TriggerInfo,
    /// Jet definition.
    JetInfo,
    /// Prior parameters.
    PriorParameters,
    /// Unfolding parameters.
    UnfoldParameters,
}

impl Requirement {
    /// All requirements in checklist order.
    pub const ALL: [Requirement; 10] = [
        Requirement::Prior,
        Requirement::Smeared,
        Requirement::Measured,
        Requirement::Response,
        Requirement::Efficiency,
        Requirement::EventInfo,
        Requirement::TriggerInfo,
        Requirement::JetInfo,
        Requirement::PriorParameters,
        Requirement::UnfoldParameters,
    ];

    /// Checklist group.
    pub fn group(self) -> InputGroup {
        match self {
            Requirement::Prior
            | Requirement::Smeared
            | Requirement::Measured
            | Requirement::Response
            | Requirement::Efficiency => InputGroup::Spectra,
            Requirement::EventInfo | Requirement::TriggerInfo | Requirement::JetInfo => InputGroup::Info,
            Requirement::PriorParameters | Requirement::UnfoldParameters => InputGroup::Parameters,
        }
    }

    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Requirement::Prior => "prior",
            Requirement::Smeared => "smeared",
            Requirement::Measured => "measured",
            Requirement::Response => "response",
            Requirement::Efficiency => "efficiency",
            Requirement::EventInfo => "event info",
            Requirement::TriggerInfo => "trigger info",
            Requirement::JetInfo => "jet info",
            Requirement::PriorParameters => "prior parameters",
            Requirement::UnfoldParameters => "unfold parameters",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Ten completion flags.
#[derive(Debug, Clone, Default)]
pub struct RequiredInputChecklist {
    flags: [bool; 10],
}

impl RequiredInputChecklist {
    /// Empty checklist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one input as supplied.
    pub fn mark(&mut self, req: Requirement) {
        self.flags[req.index()] = true;
    }

    /// Whether `req` has been supplied.
    pub fn is_set(&self, req: Requirement) -> bool {
        self.flags[req.index()]
    }

    /// Inputs still missing, in checklist order.
    pub fn missing(&self) -> Vec<Requirement> {
        Requirement::ALL.into_iter().filter(|r| !self.is_set(*r)).collect()
    }

    /// Ok when every flag is set; otherwise `MissingInput` naming the
    /// incomplete groups and inputs.
    pub fn verify(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        let mut groups: Vec<InputGroup> = Vec::new();
        for r in &missing {
            if !groups.contains(&r.group()) {
                groups.push(r.group());
            }
        }
        Err(Error::MissingInput { groups, missing: missing.iter().map(|r| r.name().to_string()).collect() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_checklist_passes() {
        let mut c = RequiredInputChecklist::new();
        for r in Requirement::ALL {
            c.mark(r);
        }
        c.verify().unwrap();
    }

    #[test]
    fn test_missing_groups_reported() {
        let mut c = RequiredInputChecklist::new();
        for r in Requirement::ALL {
            if r != Requirement::Response && r != Requirement::JetInfo {
                c.mark(r);
            }
        }
        match c.verify() {
            Err(Error::MissingInput { groups, missing }) => {
                assert_eq!(groups, vec![InputGroup::Spectra, InputGroup::Info]);
                assert_eq!(missing, vec!["response".to_string(), "jet info".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_lists_all_three_groups() {
        let err = RequiredInputChecklist::new().verify().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("spectra") && msg.contains("info") && msg.contains("parameters"), "{msg}");
    }
}
