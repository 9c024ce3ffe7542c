pub mod component;
pub mod config;
pub mod job;
pub mod schema_catalog;
pub mod scheduler;
pub mod snapshot;
pub mod ticket;

pub use component::Component;
pub use scheduler::{NodeState, ScheduleResult};
pub use snapshot::{Snapshot, TaskDescriptor};
