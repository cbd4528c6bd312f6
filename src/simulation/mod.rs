//! Simulation driver: owns the world and runs the per-tick systems

pub mod tick;

pub use tick::{run_simulation_tick, SimulationEvent};

use crate::core::config::SurgeryConfig;
use crate::core::error::Result;
use crate::ecs::world::World;
use crate::surgery::catalog::SurgeryCatalog;
use crate::surgery::do_after::{DoAfterId, DoAfterQueue};
use crate::surgery::execution::{StepRequest, SurgerySystem};
use crate::surgery::reject::RejectReason;
use crate::surgery::ui::SurgeryUi;

/// Everything one running simulation needs
pub struct Simulation {
    pub world: World,
    pub surgery: SurgerySystem,
    pub do_afters: DoAfterQueue,
    pub ui: SurgeryUi,
}

impl Simulation {
    pub fn new(catalog: SurgeryCatalog, config: SurgeryConfig) -> Self {
        Self {
            world: World::new(),
            surgery: SurgerySystem::new(catalog, config),
            do_afters: DoAfterQueue::new(),
            ui: SurgeryUi::new(),
        }
    }

    /// Built-in catalog and default tuning
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(SurgeryCatalog::with_defaults()?, SurgeryConfig::default()))
    }

    pub fn config(&self) -> &SurgeryConfig {
        self.surgery.config()
    }

    /// Validate a step and start its timed interaction
    pub fn request_step(
        &mut self,
        request: StepRequest,
    ) -> std::result::Result<DoAfterId, RejectReason> {
        self.surgery.request_step(&self.world, &mut self.do_afters, request)
    }

    /// Stop a running step; nothing is applied
    pub fn abort_step(&mut self, id: DoAfterId) -> bool {
        self.surgery.abort(&mut self.do_afters, id)
    }
}
