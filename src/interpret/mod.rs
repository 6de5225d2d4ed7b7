mod client;
mod types;

pub use client::{Interpreter, InterpreterClient};
pub use types::{InterpretationResult, SpokenCommand};
