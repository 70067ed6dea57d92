pub mod config;
pub mod model;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod processing;
pub mod quarantine;
pub mod reference;
pub mod resolver;
pub mod stats;
