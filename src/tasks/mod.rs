mod token_sweep;

pub use token_sweep::TokenSweepTask;
