pub mod item;

pub use item::{AnnotatedItem, Hierarchy, TeamMember, WorkItem};
