//! Pass-through backend: the measurement is the last command.

use hs_core::{Response, SizeSpec};

use crate::control::{ControlBackend, resized};
use crate::error::{ControlError, ControlResult};

/// Echoes each commanded kind back as its measurement.
///
/// A kind missing from a command keeps its previous value. Used for
/// dry runs of a site without hardware and for protocol tests.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    size_daq: SizeSpec,
    current: Response,
    committed: Response,
    previous: Response,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &Response {
        &self.committed
    }
}

impl ControlBackend for Loopback {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn setup(&mut self, size_ctrl: &SizeSpec, size_daq: &SizeSpec) -> ControlResult<()> {
        for kind in size_daq.used_kinds() {
            if size_ctrl.get(kind) != size_daq.get(kind) {
                return Err(ControlError::Unsupported {
                    control: self.name().to_string(),
                    op: "set_size",
                    kind,
                    what: format!(
                        "daq size {} must equal ctrl size {}",
                        size_daq.get(kind),
                        size_ctrl.get(kind)
                    ),
                });
            }
        }
        self.size_daq = *size_daq;
        self.current = Response::zeros(size_ctrl);
        self.committed = self.current.clone();
        self.previous = self.current.clone();
        Ok(())
    }

    fn control(&mut self, ctrl: &Response) -> ControlResult<()> {
        for (kind, values) in ctrl.iter() {
            self.current.set(kind, Some(values.clone()));
        }
        Ok(())
    }

    fn acquire(&mut self) -> ControlResult<Response> {
        let mut daq = Response::new();
        for kind in self.size_daq.used_kinds() {
            let len = self.size_daq.get(kind);
            daq.set(kind, Some(resized(self.current.get(kind), len)));
        }
        Ok(daq)
    }

    fn commit(&mut self) -> ControlResult<()> {
        self.previous = std::mem::replace(&mut self.committed, self.current.clone());
        Ok(())
    }

    fn supports_rollback(&self) -> bool {
        true
    }

    fn rollback(&mut self) -> ControlResult<()> {
        self.committed = self.previous.clone();
        self.current = self.previous.clone();
        Ok(())
    }
}
