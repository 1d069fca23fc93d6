//! Capture transforms.
//!
//! A transform is written as `lambda <param>: <expression>` and turns the text captured from a
//! command's output into a typed value. The expression is evaluated by `evalexpr`, which cannot
//! reach the host: the only variable in scope is the parameter and the only functions are the
//! evalexpr built-ins plus the helpers registered here.

use evalexpr::{
    build_operator_tree, ContextWithMutableFunctions, ContextWithMutableVariables,
    EvalexprError, EvalexprResult, Function, HashMapContext, Node, Operator,
    Value as ExprValue,
};
use serde_json::Value;

use crate::template::is_identifier;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    #[error("must be a lambda expression")]
    NotALambda,
    #[error("lambda must receive a single argument")]
    ArgumentCount,
    #[error("only one expression is allowed")]
    MultipleExpressions,
    #[error("assignments are not allowed")]
    Assignment,
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A compiled single-argument transform.
#[derive(Debug, Clone)]
pub struct Transform {
    source: String,
    parameter: String,
    body: Node,
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Transform {
    pub fn parse(source: &str) -> Result<Self, TransformError> {
        let source = source.trim();
        let rest = source
            .strip_prefix("lambda")
            .filter(|rest| rest.starts_with(char::is_whitespace) || rest.starts_with(':'))
            .ok_or(TransformError::NotALambda)?;
        let (parameters, body) = rest.split_once(':').ok_or(TransformError::NotALambda)?;

        let parameters = parameters
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>();
        let [parameter] = parameters.as_slice() else {
            return Err(TransformError::ArgumentCount);
        };
        if !is_identifier(parameter) {
            return Err(TransformError::Syntax(format!(
                "invalid parameter name '{parameter}'"
            )));
        }

        let body = body.trim();
        if body.is_empty() {
            return Err(TransformError::Syntax("empty lambda body".to_string()));
        }
        let tree = build_operator_tree(body).map_err(|e| TransformError::Syntax(e.to_string()))?;

        for node in tree.iter() {
            match node.operator() {
                Operator::Chain => return Err(TransformError::MultipleExpressions),
                Operator::Assign
                | Operator::AddAssign
                | Operator::SubAssign
                | Operator::MulAssign
                | Operator::DivAssign
                | Operator::ModAssign
                | Operator::ExpAssign
                | Operator::AndAssign
                | Operator::OrAssign => return Err(TransformError::Assignment),
                _ => {}
            }
        }
        if let Some(unknown) = tree
            .iter_variable_identifiers()
            .find(|identifier| identifier != parameter)
        {
            return Err(TransformError::UndefinedVariable(unknown.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            parameter: parameter.to_string(),
            body: tree,
        })
    }

    /// The transform as written in the configuration.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the transform with `input` bound to its parameter.
    pub fn apply(&self, input: &str) -> Result<Value, TransformError> {
        let mut context = helper_context().map_err(evaluation_error)?;
        context
            .set_value(self.parameter.clone(), ExprValue::String(input.to_string()))
            .map_err(evaluation_error)?;

        let result = self
            .body
            .eval_with_context(&context)
            .map_err(evaluation_error)?;
        Ok(to_json(result))
    }
}

fn evaluation_error(e: EvalexprError) -> TransformError {
    TransformError::Evaluation(e.to_string())
}

fn custom(message: String) -> EvalexprError {
    EvalexprError::CustomMessage(message)
}

fn helper_context() -> EvalexprResult<HashMapContext> {
    let mut context = HashMapContext::new();

    context.set_function(
        "float".to_string(),
        Function::new(|argument| match argument {
            ExprValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(ExprValue::Float)
                .map_err(|e| custom(format!("cannot convert '{s}' to float: {e}"))),
            ExprValue::Int(i) => Ok(ExprValue::Float(*i as f64)),
            ExprValue::Float(f) => Ok(ExprValue::Float(*f)),
            other => Err(custom(format!("cannot convert {other:?} to float"))),
        }),
    )?;

    context.set_function(
        "int".to_string(),
        Function::new(|argument| match argument {
            ExprValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(ExprValue::Int)
                    .or_else(|_| s.parse::<f64>().map(|f| ExprValue::Int(f.trunc() as i64)))
                    .map_err(|e| custom(format!("cannot convert '{s}' to int: {e}")))
            }
            ExprValue::Int(i) => Ok(ExprValue::Int(*i)),
            ExprValue::Float(f) => Ok(ExprValue::Int(f.trunc() as i64)),
            other => Err(custom(format!("cannot convert {other:?} to int"))),
        }),
    )?;

    context.set_function(
        "field".to_string(),
        Function::new(|argument| {
            let arguments = argument.as_fixed_len_tuple(2)?;
            let text = arguments[0].as_string()?;
            let index = arguments[1].as_int()?;
            let tokens = text.split_whitespace().collect::<Vec<_>>();
            pick(&tokens, index).map(|token| ExprValue::String(token.to_string()))
        }),
    )?;

    context.set_function(
        "split".to_string(),
        Function::new(|argument| {
            let arguments = argument.as_fixed_len_tuple(3)?;
            let text = arguments[0].as_string()?;
            let separator = arguments[1].as_string()?;
            let index = arguments[2].as_int()?;
            let tokens = text.split(separator.as_str()).collect::<Vec<_>>();
            pick(&tokens, index).map(|token| ExprValue::String(token.to_string()))
        }),
    )?;

    Ok(context)
}

/// Index into `tokens`, counting from the end for negative indexes.
fn pick<'a>(tokens: &[&'a str], index: i64) -> EvalexprResult<&'a str> {
    let len = tokens.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        Ok(tokens[resolved as usize])
    } else {
        Err(custom(format!(
            "index {index} out of range for {len} fields"
        )))
    }
}

fn to_json(value: ExprValue) -> Value {
    #[allow(unreachable_patterns)]
    match value {
        ExprValue::String(s) => Value::String(s),
        ExprValue::Int(i) => Value::from(i),
        ExprValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ExprValue::Boolean(b) => Value::Bool(b),
        ExprValue::Tuple(items) => Value::Array(items.into_iter().map(to_json).collect()),
        ExprValue::Empty => Value::Null,
        _ => Value::Null,
    }
}
