//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus and decimal numbers.
//! `^` is right-associative and binds tighter than unary minus, so
//! `-2^2 = -4`.

use async_trait::async_trait;
use reagent_core::error::ToolError;
use reagent_core::tool::{Tool, ToolExecutionContext, ToolParameter, ToolResult};
use reagent_core::value::Parameters;
use std::iter::Peekable;
use std::str::Chars;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn id(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports +, -, *, /, %, ^, parentheses and decimal numbers."
    }

    fn category(&self) -> &str {
        "math"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "expression",
            "string",
            "The expression to evaluate, e.g. '(2 + 3) * 4'",
        )]
    }

    async fn execute(
        &self,
        parameters: &Parameters,
        _context: &ToolExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        // Coerced numbers render back to their literal form.
        let expr = parameters
            .get("expression")
            .map(|v| v.to_string())
            .ok_or_else(|| ToolError::InvalidParameters {
                tool_name: self.id().into(),
                reason: "missing 'expression'".into(),
            })?;

        match evaluate(&expr) {
            Ok(value) => Ok(ToolResult::success(format_number(value))
                .and_data(serde_json::json!({ "expression": expr, "result": value }))),
            Err(reason) => Ok(ToolResult::failure(ToolError::ExecutionFailed {
                tool_name: self.id().into(),
                reason,
            })),
        }
    }
}

/// Integers print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Precedence-climbing evaluator ──

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut eval = Evaluator {
        chars: expr.chars().peekable(),
    };
    let value = eval.expr(0)?;
    eval.skip_ws();
    match eval.chars.peek() {
        None => Ok(value),
        Some(c) => Err(format!("Unexpected character: '{c}'")),
    }
}

struct Evaluator<'a> {
    chars: Peekable<Chars<'a>>,
}

/// Left and right binding power of a binary operator.
fn binding_power(op: char) -> Option<(u8, u8)> {
    match op {
        '+' | '-' => Some((1, 2)),
        '*' | '/' | '%' => Some((3, 4)),
        '^' => Some((6, 5)),
        _ => None,
    }
}

const UNARY_MINUS_BP: u8 = 5;

impl Evaluator<'_> {
    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<f64, String> {
        let mut lhs = self.operand()?;
        loop {
            self.skip_ws();
            let Some(&op) = self.chars.peek() else { break };
            if op == ')' {
                break;
            }
            let Some((l_bp, r_bp)) = binding_power(op) else {
                return Err(format!("Unexpected character: '{op}'"));
            };
            if l_bp < min_bp {
                break;
            }
            self.chars.next();
            let rhs = self.expr(r_bp)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, String> {
        self.skip_ws();
        match self.chars.peek().copied() {
            Some('-') => {
                self.chars.next();
                Ok(-self.expr(UNARY_MINUS_BP)?)
            }
            Some('+') => {
                self.chars.next();
                self.expr(UNARY_MINUS_BP)
            }
            Some('(') => {
                self.chars.next();
                let value = self.expr(0)?;
                self.skip_ws();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("Unexpected character: '{c}'")),
            None => Err("Unexpected end of expression".into()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let mut literal = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                literal.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        literal
            .parse()
            .map_err(|_| format!("Invalid number: {literal}"))
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' | '%' if rhs == 0.0 => Err("Division by zero".into()),
        '/' => Ok(lhs / rhs),
        '%' => Ok(lhs % rhs),
        '^' => Ok(lhs.powf(rhs)),
        _ => Err(format!("Unknown operator: '{op}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::value::ParamValue;

    fn params(expr: impl Into<ParamValue>) -> Parameters {
        let mut p = Parameters::new();
        p.insert("expression".into(), expr.into());
        p
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn left_associative_subtraction() {
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("100 / 10 / 5").unwrap(), 2.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
    }

    #[test]
    fn modulo_and_unary() {
        assert_eq!(evaluate("10 % 4").unwrap(), 2.0);
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2 $ 3").is_err());
    }

    #[tokio::test]
    async fn tool_formats_integers() {
        let result = CalculatorTool
            .execute(&params("2 + 2"), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert!(result.is_success);
        assert_eq!(result.summary.as_deref(), Some("4"));
        assert_eq!(result.data.unwrap()["result"], 4.0);
    }

    #[tokio::test]
    async fn tool_accepts_numeric_parameter() {
        let result = CalculatorTool
            .execute(&params(ParamValue::Int(42)), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(result.summary.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn tool_reports_evaluation_failure() {
        let result = CalculatorTool
            .execute(&params("1 / 0"), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert!(!result.is_success);
        assert!(result.error_message().unwrap().contains("Division by zero"));
    }

    #[tokio::test]
    async fn tool_missing_expression() {
        let err = CalculatorTool
            .execute(&Parameters::new(), &ToolExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }
}
