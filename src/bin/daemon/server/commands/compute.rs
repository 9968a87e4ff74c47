use tracing::debug;

use super::expression;
use crate::error::{CommandError, CommandResult};
use crate::server::response_handler::Response;

/// An arithmetic expression to evaluate with the restricted grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeCommand {
    expression: String,
}

impl ComputeCommand {
    pub fn new(expression: String) -> Self {
        Self { expression }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Parse and evaluate the expression
    pub fn execute(&self) -> CommandResult<Response> {
        debug!("Evaluating expression: {}", self.expression);
        match expression::evaluate(&self.expression) {
            Ok(value) => Ok(Response::MathExpression {
                given_math_expression: self.expression.clone(),
                result: value.to_string(),
            }),
            Err(err) => Err(CommandError::execution(
                format!("Expression evaluation failed: {}", err),
                self.expression.clone(),
            )),
        }
    }
}
