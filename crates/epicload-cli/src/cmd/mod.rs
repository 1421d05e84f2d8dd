pub mod completions;
pub mod diagnose;
pub mod export;
pub mod inputs;
pub mod load;
pub mod show;
pub mod unassigned;
