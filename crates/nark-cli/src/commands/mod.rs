//! CLI subcommand implementations.

pub mod add;
pub mod cancel;
pub mod check;
pub mod current;
pub mod remove;
pub mod start;
pub mod stop;
mod util;
