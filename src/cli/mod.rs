mod ask;
mod root;
mod serve;

pub use root::Cli;
