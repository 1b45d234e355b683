use clap::Args;
use serde_json::Value;

use markowitz_core::optimization::{self, OptimizationRequest};

use crate::input;

/// Arguments for a full optimization request
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a JSON or YAML request (assets, expected_returns,
    /// covariance_matrix, policy, optional initial_weights and solver)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: OptimizationRequest = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json|file.yaml> or stdin required for optimize".into());
    };
    let result = optimization::optimize(&request)?;
    Ok(serde_json::to_value(result)?)
}
