pub mod chapter;
pub mod state;
