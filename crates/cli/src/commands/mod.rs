pub mod config_cmd;
pub mod plan;
pub mod run;
pub mod tools;
