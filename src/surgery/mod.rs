//! Surgery: catalog, layer state, tool eligibility, step execution and UI

pub mod catalog;
pub mod do_after;
pub mod eligibility;
pub mod execution;
pub mod layer;
pub mod reject;
pub mod tools;
pub mod ui;

pub use catalog::{Layer, StepAction, SurgeryCatalog, SurgeryOperation, SurgeryStep};
pub use do_after::{DoAfterEvent, DoAfterId, DoAfterQueue, DoAfterScheduler};
pub use eligibility::{can_use_operation, select_method, Eligibility, MethodKind, ToolRules};
pub use execution::{StepOutcome, StepRequest, SurgerySystem};
pub use layer::{available_steps, layer_state, AvailableStep, BodyPartLayerState};
pub use reject::RejectReason;
pub use tools::{CapabilityAllowList, ToolEvaluator, ToolEvaluators, ToolQuality};
pub use ui::{SurgeryUi, SurgeryUiState, UiSessionId};
