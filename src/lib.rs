pub mod cli;
pub mod config;
pub mod fetch;
pub mod load;
pub mod parse;
pub mod pipeline;
pub mod window;
