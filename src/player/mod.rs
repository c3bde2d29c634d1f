pub mod audio;
pub mod queue;
