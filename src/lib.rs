pub mod boundary;
pub mod composition;
pub mod config;
pub mod constants;
pub mod equilibrium;
pub mod error;
pub mod json_parser;
pub mod logging;
pub mod math_utils;
pub mod relax;
