pub mod observer;
pub mod screening_flow;
pub mod screening_graph;
pub mod screening_state;
pub mod stages;

pub use observer::{StepEvent, StepObserver};
pub use screening_flow::{RejectReason, ScreeningFlow, ScreeningReport, Verdict};
pub use screening_graph::{GraphNode, GraphRun, ScreeningGraph, StageOrder};
pub use screening_state::{DecisionField, ScreeningState};
pub use stages::{OriginalityStage, RelevanceStage, ScreeningStage, StageOutcome};
