//! Uniaxial material laws used by simulated specimens.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Stress-strain law of one simulated specimen channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaterialLaw {
    /// Linear elastic with optional viscous term: `stress = e * strain + eta * rate`.
    Elastic {
        e: f64,
        #[serde(default)]
        eta: f64,
    },
    /// Elastic-perfectly-plastic with symmetric yield stress `fy`.
    ElasticPerfectlyPlastic { e: f64, fy: f64 },
}

impl MaterialLaw {
    pub fn validate(&self) -> ControlResult<()> {
        match *self {
            MaterialLaw::Elastic { e, eta } => {
                if !(e.is_finite() && eta.is_finite()) {
                    return Err(ControlError::InvalidArg {
                        what: "elastic material needs finite e and eta",
                    });
                }
            }
            MaterialLaw::ElasticPerfectlyPlastic { e, fy } => {
                if !(e.is_finite() && e > 0.0 && fy.is_finite() && fy > 0.0) {
                    return Err(ControlError::InvalidArg {
                        what: "elastic-perfectly-plastic material needs positive e and fy",
                    });
                }
            }
        }
        Ok(())
    }

    /// Initial tangent.
    pub fn initial_stiffness(&self) -> f64 {
        match *self {
            MaterialLaw::Elastic { e, .. } | MaterialLaw::ElasticPerfectlyPlastic { e, .. } => e,
        }
    }
}

/// Path-dependent state of one material point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MaterialState {
    pub strain: f64,
    pub strain_rate: f64,
    pub stress: f64,
    pub plastic_strain: f64,
}

/// A material point with trial, committed and previously committed state.
///
/// Keeping the previously committed state lets a commit be undone once.
#[derive(Clone, Debug)]
pub struct SimMaterial {
    law: MaterialLaw,
    trial: MaterialState,
    committed: MaterialState,
    previous: MaterialState,
}

impl SimMaterial {
    pub fn new(law: MaterialLaw) -> ControlResult<Self> {
        law.validate()?;
        Ok(Self {
            law,
            trial: MaterialState::default(),
            committed: MaterialState::default(),
            previous: MaterialState::default(),
        })
    }

    pub fn law(&self) -> &MaterialLaw {
        &self.law
    }

    pub fn trial(&self) -> &MaterialState {
        &self.trial
    }

    pub fn committed(&self) -> &MaterialState {
        &self.committed
    }

    /// Computes the trial state from the committed one.
    pub fn set_trial_strain(&mut self, strain: f64, strain_rate: f64) {
        let ep = self.committed.plastic_strain;
        let (stress, plastic_strain) = match self.law {
            MaterialLaw::Elastic { e, eta } => (e * strain + eta * strain_rate, 0.0),
            MaterialLaw::ElasticPerfectlyPlastic { e, fy } => {
                let sigma = e * (strain - ep);
                if sigma > fy {
                    (fy, strain - fy / e)
                } else if sigma < -fy {
                    (-fy, strain + fy / e)
                } else {
                    (sigma, ep)
                }
            }
        };
        self.trial = MaterialState {
            strain,
            strain_rate,
            stress,
            plastic_strain,
        };
    }

    pub fn commit(&mut self) {
        self.previous = self.committed;
        self.committed = self.trial;
    }

    /// Undoes the last commit.
    pub fn revert_commit(&mut self) {
        self.committed = self.previous;
        self.trial = self.previous;
    }

    /// Drops the trial state.
    pub fn revert_to_last_commit(&mut self) {
        self.trial = self.committed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elastic_includes_viscous_term() {
        let mut m = SimMaterial::new(MaterialLaw::Elastic { e: 2.0, eta: 0.5 }).unwrap();
        m.set_trial_strain(0.1, 2.0);
        assert!((m.trial().stress - 1.2).abs() < 1e-12);
    }

    #[test]
    fn plastic_flow_is_remembered_after_commit() {
        let mut m = SimMaterial::new(MaterialLaw::ElasticPerfectlyPlastic { e: 100.0, fy: 1.0 })
            .unwrap();
        m.set_trial_strain(0.02, 0.0);
        assert_eq!(m.trial().stress, 1.0);
        m.commit();
        assert!((m.committed().plastic_strain - 0.01).abs() < 1e-12);

        // unloading to zero strain leaves residual compressive stress
        m.set_trial_strain(0.0, 0.0);
        assert!((m.trial().stress + 1.0).abs() < 1e-12);
    }

    #[test]
    fn uncommitted_trial_does_not_move_plastic_strain() {
        let mut m = SimMaterial::new(MaterialLaw::ElasticPerfectlyPlastic { e: 100.0, fy: 1.0 })
            .unwrap();
        m.set_trial_strain(0.05, 0.0);
        m.set_trial_strain(0.005, 0.0);
        assert!((m.trial().stress - 0.5).abs() < 1e-12);
    }

    #[test]
    fn revert_commit_restores_previous_state() {
        let mut m = SimMaterial::new(MaterialLaw::ElasticPerfectlyPlastic { e: 100.0, fy: 1.0 })
            .unwrap();
        m.set_trial_strain(0.02, 0.0);
        m.commit();
        m.revert_commit();
        assert_eq!(*m.committed(), MaterialState::default());
    }

    #[test]
    fn invalid_laws_are_rejected() {
        assert!(SimMaterial::new(MaterialLaw::ElasticPerfectlyPlastic { e: 1.0, fy: 0.0 }).is_err());
        assert!(SimMaterial::new(MaterialLaw::Elastic { e: f64::NAN, eta: 0.0 }).is_err());
    }
}
