pub mod pde_parser;

pub use pde_parser::PdeParser;

use crate::error::Result;
use crate::model::SolverModel;

pub fn parse_string(text: &str) -> Result<SolverModel> {
    pde_parser::parse_string(text)
}
