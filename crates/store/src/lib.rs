//! Persistence collaborators for Disclaude.
//!
//! - [`FilePlanStore`]: writes each extracted plan to `<tasks_dir>/<task_id>/plan.json`
//! - [`InMemoryPlanStore`]: keeps plans in memory (tests, `--no-plan` dry runs)
//! - [`SessionStore`]: chat id to dialogue session id, persisted as JSON

pub mod in_memory;
pub mod plan_store;
pub mod session_store;

pub use in_memory::InMemoryPlanStore;
pub use plan_store::FilePlanStore;
pub use session_store::SessionStore;
