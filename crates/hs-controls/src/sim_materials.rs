//! Simulated specimen made of independent uniaxial materials.

use hs_core::{DVector, Response, ResponseKind, SizeSpec};

use crate::control::ControlBackend;
use crate::error::{ControlError, ControlResult};
use crate::material::{MaterialLaw, SimMaterial};

/// One material per channel. Commands are displacements (and optionally
/// velocities); measurements are displacement, velocity and force.
#[derive(Debug, Clone)]
pub struct SimUniaxialMaterials {
    materials: Vec<SimMaterial>,
    size_daq: SizeSpec,
}

impl SimUniaxialMaterials {
    pub fn new(laws: Vec<MaterialLaw>) -> ControlResult<Self> {
        if laws.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "simulated specimen needs at least one material",
            });
        }
        let materials = laws
            .into_iter()
            .map(SimMaterial::new)
            .collect::<ControlResult<Vec<_>>>()?;
        Ok(Self {
            materials,
            size_daq: SizeSpec::default(),
        })
    }

    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn materials(&self) -> &[SimMaterial] {
        &self.materials
    }

    fn unsupported(&self, kind: ResponseKind, what: String) -> ControlError {
        ControlError::Unsupported {
            control: self.name().to_string(),
            op: "set_size",
            kind,
            what,
        }
    }
}

impl ControlBackend for SimUniaxialMaterials {
    fn name(&self) -> &'static str {
        "sim_uniaxial_materials"
    }

    fn setup(&mut self, size_ctrl: &SizeSpec, size_daq: &SizeSpec) -> ControlResult<()> {
        let n = self.num_materials();
        if size_ctrl.get(ResponseKind::Disp) != n {
            return Err(self.unsupported(
                ResponseKind::Disp,
                format!("ctrl size must equal the {n} materials"),
            ));
        }
        for kind in [ResponseKind::Accel, ResponseKind::Force, ResponseKind::Time] {
            if size_ctrl.has(kind) {
                return Err(self.unsupported(kind, "not a ctrl channel".to_string()));
            }
        }
        for kind in [ResponseKind::Accel, ResponseKind::Time] {
            if size_daq.has(kind) {
                return Err(self.unsupported(kind, "not a daq channel".to_string()));
            }
        }
        for (size, side) in [(size_ctrl, "ctrl"), (size_daq, "daq")] {
            for kind in [ResponseKind::Vel, ResponseKind::Disp, ResponseKind::Force] {
                let c = size.get(kind);
                if c != 0 && c != n {
                    return Err(self.unsupported(
                        kind,
                        format!("{side} size must be 0 or the {n} materials"),
                    ));
                }
            }
        }
        if size_daq.is_empty() {
            return Err(ControlError::InvalidArg {
                what: "simulated specimen needs at least one daq kind",
            });
        }
        self.size_daq = *size_daq;
        for m in &mut self.materials {
            m.set_trial_strain(0.0, 0.0);
        }
        Ok(())
    }

    fn control(&mut self, ctrl: &Response) -> ControlResult<()> {
        let Some(disp) = ctrl.get(ResponseKind::Disp) else {
            // no displacement this step: hold the current trial state
            return Ok(());
        };
        let vel = ctrl.get(ResponseKind::Vel);
        for (i, m) in self.materials.iter_mut().enumerate() {
            let rate = vel.map_or(0.0, |v| v[i]);
            m.set_trial_strain(disp[i], rate);
        }
        Ok(())
    }

    fn acquire(&mut self) -> ControlResult<Response> {
        let pick = |f: fn(&SimMaterial) -> f64| {
            DVector::from_iterator(self.materials.len(), self.materials.iter().map(f))
        };
        let mut daq = Response::new();
        if self.size_daq.has(ResponseKind::Disp) {
            daq.set(ResponseKind::Disp, Some(pick(|m| m.trial().strain)));
        }
        if self.size_daq.has(ResponseKind::Vel) {
            daq.set(ResponseKind::Vel, Some(pick(|m| m.trial().strain_rate)));
        }
        if self.size_daq.has(ResponseKind::Force) {
            daq.set(ResponseKind::Force, Some(pick(|m| m.trial().stress)));
        }
        Ok(daq)
    }

    fn commit(&mut self) -> ControlResult<()> {
        for m in &mut self.materials {
            m.commit();
        }
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn rollback(&mut self) -> ControlResult<()> {
        for m in &mut self.materials {
            m.revert_commit();
        }
        tracing::debug!(materials = self.materials.len(), "simulated specimen commit undone");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specimen() -> SimUniaxialMaterials {
        SimUniaxialMaterials::new(vec![
            MaterialLaw::Elastic { e: 10.0, eta: 0.0 },
            MaterialLaw::ElasticPerfectlyPlastic { e: 10.0, fy: 1.0 },
        ])
        .unwrap()
    }

    fn sizes() -> (SizeSpec, SizeSpec) {
        let ctrl = SizeSpec::default().with(ResponseKind::Disp, 2);
        let daq = ctrl.with(ResponseKind::Force, 2);
        (ctrl, daq)
    }

    #[test]
    fn sizes_must_match_material_count() {
        let mut s = specimen();
        let ctrl = SizeSpec::default().with(ResponseKind::Disp, 3);
        assert!(s.setup(&ctrl, &ctrl).is_err());
        let (ctrl, _) = sizes();
        let daq = ctrl.with(ResponseKind::Time, 1);
        assert!(s.setup(&ctrl, &daq).is_err());
    }

    #[test]
    fn forces_follow_material_laws() {
        let mut s = specimen();
        let (ctrl, daq) = sizes();
        s.setup(&ctrl, &daq).unwrap();
        s.control(&Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![0.2, 0.2])))
            .unwrap();
        let out = s.acquire().unwrap();
        assert_eq!(out.get(ResponseKind::Force).unwrap().as_slice(), &[2.0, 1.0]);
        assert_eq!(out.get(ResponseKind::Disp).unwrap().as_slice(), &[0.2, 0.2]);
        assert!(!out.has(ResponseKind::Vel));
    }

    #[test]
    fn rollback_undoes_plastic_commit() {
        let mut s = specimen();
        let (ctrl, daq) = sizes();
        s.setup(&ctrl, &daq).unwrap();
        s.control(&Response::new().with(ResponseKind::Disp, DVector::from_vec(vec![0.0, 0.5])))
            .unwrap();
        s.commit().unwrap();
        assert!(s.materials()[1].committed().plastic_strain > 0.0);
        s.rollback().unwrap();
        assert_eq!(s.materials()[1].committed().plastic_strain, 0.0);
    }
}
