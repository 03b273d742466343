//! Implementation-plan generation

pub mod assembler;
pub mod prompt;
pub mod sections;
pub mod service;

pub use assembler::{GeneratedPlan, PlanAssembler};
pub use prompt::{fit_to_budget, PromptBuilder, PromptContext};
pub use sections::{parse_plan_sections, CodeBlock, FileChange, PlanSections};
pub use service::{ImplementationPlan, PlanRequest, PlanningService};
