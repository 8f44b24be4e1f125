//! Logic expressions: compilation and evaluation.
//!
//! Expressions are JSON S-expressions: `[operator, ...operands]`. They are
//! compiled once, at schema load, into a typed [`Expr`] so that an unknown
//! operator or a malformed `$data` reference is reported before any data is
//! processed, and evaluation never dispatches on operator strings.
//!
//! Compilation rules:
//!
//! - a non-array JSON value is a literal;
//! - `[]` and arrays whose head is not a string are literal lists whose
//!   elements are themselves compiled;
//! - any other array is an operator call; the head must name a built-in or a
//!   registered custom operator. A list of strings is written with `$lit`:
//!   `["$lit", ["male", "female"]]`.
//!
//! | operator | operands | result |
//! |---|---|---|
//! | `$ref` | none | value at the validated node (absent = `null`) |
//! | `$data` | literal dotted path | value at that absolute path |
//! | `$lit` | 1, any | the operand, unevaluated |
//! | `===`, `!==` | 2, any | strict deep (in)equality |
//! | `>=`, `<=`, `>`, `<` | 2, both numbers or both strings | boolean |
//! | `and`, `or` | n, booleans | boolean, short-circuit |
//! | `not` | 1, boolean | boolean |
//! | `if` | boolean, then, else? | selected branch |
//! | `in` | needle, list or string | membership |
//! | `str:len`, `str:trim`, `str:lower`, `str:upper` | 1, string | number / string |
//! | `str:regex` | string, literal pattern | boolean |
//! | `arr:len` | 1, array | number |
//! | `+`, `-` | numbers | number |
//!
//! No implicit coercion happens: operands of the wrong type fail with
//! [`LogicError::TypeMismatch`].

use crate::error::{LogicError, json_type_name};
use crate::path::Path;
use crate::tree::get_at;
use regex::Regex;
use serde_json::{Number, Value, json};
use std::collections::HashMap;

/// Host-provided operator. Receives already-evaluated operands.
pub type CustomOperator = fn(&[Value]) -> Result<Value, LogicError>;

/// Registry of custom operators available to expressions.
///
/// Built-in operators are not stored here; they are variants of [`Expr`].
/// Registering a name that collides with a built-in has no effect on
/// compilation, the built-in wins.
#[derive(Debug, Clone, Default)]
pub struct Operators {
    custom: HashMap<String, CustomOperator>,
}

impl Operators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a custom operator.
    pub fn register(&mut self, name: impl Into<String>, operator: CustomOperator) -> Option<CustomOperator> {
        self.custom.insert(name.into(), operator)
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.custom.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<CustomOperator> {
        self.custom.get(name).copied()
    }

    pub fn is_known(&self, name: &str) -> bool {
        is_builtin(name) || self.custom.contains_key(name)
    }
}

const BUILTINS: &[&str] = &[
    "$ref", "$data", "$lit", "===", "!==", ">=", "<=", ">", "<", "and", "or", "not", "if", "in", "str:len",
    "str:trim", "str:lower", "str:upper", "str:regex", "arr:len", "+", "-",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Cmp {
    fn symbol(self) -> &'static str {
        match self {
            Cmp::Gt => ">",
            Cmp::Lt => "<",
            Cmp::Gte => ">=",
            Cmp::Lte => "<=",
        }
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        match self {
            Cmp::Gt => ordering.is_gt(),
            Cmp::Lt => ordering.is_lt(),
            Cmp::Gte => !ordering.is_lt(),
            Cmp::Lte => !ordering.is_gt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Len,
    Trim,
    Lower,
    Upper,
}

impl StrOp {
    fn name(self) -> &'static str {
        match self {
            StrOp::Len => "str:len",
            StrOp::Trim => "str:trim",
            StrOp::Lower => "str:lower",
            StrOp::Upper => "str:upper",
        }
    }
}

/// Compiled expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),

    // === Lookups ===
    Ref,
    Data(Path),

    // === Comparison ===
    StrictEq(Box<Expr>, Box<Expr>),
    StrictNe(Box<Expr>, Box<Expr>),
    Compare(Cmp, Box<Expr>, Box<Expr>),

    // === Boolean ===
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    If(Box<Expr>, Box<Expr>, Option<Box<Expr>>),
    In(Box<Expr>, Box<Expr>),

    // === Domain ===
    Str(StrOp, Box<Expr>),
    Regex(Box<Expr>, Regex),
    ArrLen(Box<Expr>),
    Add(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),

    // === Extension ===
    Custom {
        name: String,
        op: CustomOperator,
        args: Vec<Expr>,
    },
}

/// Compile a JSON expression against `operators`. `$data` strings are read
/// as plain dotted paths, digit-only parts becoming indices.
pub fn compile(value: &Value, operators: &Operators) -> Result<Expr, LogicError> {
    compile_with(value, operators, &|raw: &str| raw.parse::<Path>())
}

/// Like [`compile`], with `data_path` turning each `$data` string into a
/// path. Schema loading passes one that knows which segments address
/// object keys and which address array indices.
pub fn compile_with(
    value: &Value,
    operators: &Operators,
    data_path: &dyn Fn(&str) -> Result<Path, String>,
) -> Result<Expr, LogicError> {
    match value {
        Value::Array(arr) => match arr.split_first() {
            Some((Value::String(op), args)) => compile_op(op, args, operators, data_path),
            _ => Ok(Expr::List(
                arr.iter()
                    .map(|v| compile_with(v, operators, data_path))
                    .collect::<Result<_, _>>()?,
            )),
        },
        other => Ok(Expr::Literal(other.clone())),
    }
}

fn compile_op(
    op: &str,
    args: &[Value],
    operators: &Operators,
    data_path: &dyn Fn(&str) -> Result<Path, String>,
) -> Result<Expr, LogicError> {
    let arity = |expected: &'static str, ok: bool| -> Result<(), LogicError> {
        if ok {
            Ok(())
        } else {
            Err(LogicError::Arity {
                op: op.to_string(),
                expected,
                got: args.len(),
            })
        }
    };
    let c = |idx: usize| -> Result<Box<Expr>, LogicError> {
        Ok(Box::new(compile_with(&args[idx], operators, data_path)?))
    };
    let all = || -> Result<Vec<Expr>, LogicError> {
        args.iter().map(|v| compile_with(v, operators, data_path)).collect()
    };

    match op {
        "$ref" => {
            arity("0", args.is_empty())?;
            Ok(Expr::Ref)
        }
        "$data" => {
            arity("1", args.len() == 1)?;
            let raw = args[0]
                .as_str()
                .ok_or_else(|| LogicError::InvalidDataPath(args[0].to_string()))?;
            let path = data_path(raw).map_err(|_| LogicError::InvalidDataPath(raw.to_string()))?;
            Ok(Expr::Data(path))
        }
        "$lit" => {
            arity("1", args.len() == 1)?;
            Ok(Expr::Literal(args[0].clone()))
        }
        "===" => {
            arity("2", args.len() == 2)?;
            Ok(Expr::StrictEq(c(0)?, c(1)?))
        }
        "!==" => {
            arity("2", args.len() == 2)?;
            Ok(Expr::StrictNe(c(0)?, c(1)?))
        }
        ">" | "<" | ">=" | "<=" => {
            arity("2", args.len() == 2)?;
            let cmp = match op {
                ">" => Cmp::Gt,
                "<" => Cmp::Lt,
                ">=" => Cmp::Gte,
                _ => Cmp::Lte,
            };
            Ok(Expr::Compare(cmp, c(0)?, c(1)?))
        }
        "and" => Ok(Expr::And(all()?)),
        "or" => Ok(Expr::Or(all()?)),
        "not" => {
            arity("1", args.len() == 1)?;
            Ok(Expr::Not(c(0)?))
        }
        "if" => {
            arity("2 or 3", matches!(args.len(), 2 | 3))?;
            let otherwise = if args.len() == 3 { Some(c(2)?) } else { None };
            Ok(Expr::If(c(0)?, c(1)?, otherwise))
        }
        "in" => {
            arity("2", args.len() == 2)?;
            Ok(Expr::In(c(0)?, c(1)?))
        }
        "str:len" | "str:trim" | "str:lower" | "str:upper" => {
            arity("1", args.len() == 1)?;
            let str_op = match op {
                "str:len" => StrOp::Len,
                "str:trim" => StrOp::Trim,
                "str:lower" => StrOp::Lower,
                _ => StrOp::Upper,
            };
            Ok(Expr::Str(str_op, c(0)?))
        }
        "str:regex" => {
            arity("2", args.len() == 2)?;
            let pattern = args[1]
                .as_str()
                .ok_or_else(|| LogicError::type_mismatch("str:regex", "literal pattern string", &args[1]))?;
            let regex = Regex::new(pattern).map_err(|err| LogicError::InvalidRegex {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?;
            Ok(Expr::Regex(c(0)?, regex))
        }
        "arr:len" => {
            arity("1", args.len() == 1)?;
            Ok(Expr::ArrLen(c(0)?))
        }
        "+" => Ok(Expr::Add(all()?)),
        "-" => {
            arity("2", args.len() == 2)?;
            Ok(Expr::Sub(c(0)?, c(1)?))
        }
        custom => match operators.get(custom) {
            Some(func) => Ok(Expr::Custom {
                name: custom.to_string(),
                op: func,
                args: all()?,
            }),
            None => Err(LogicError::UnknownOperator(custom.to_string())),
        },
    }
}

impl Expr {
    /// Collect every `$data` target referenced by this expression.
    pub fn data_refs(&self, out: &mut Vec<Path>) {
        match self {
            Expr::Literal(_) | Expr::Ref => {}
            Expr::Data(path) => out.push(path.clone()),
            Expr::List(items) | Expr::And(items) | Expr::Or(items) | Expr::Add(items) => {
                items.iter().for_each(|e| e.data_refs(out));
            }
            Expr::Custom { args, .. } => args.iter().for_each(|e| e.data_refs(out)),
            Expr::StrictEq(a, b) | Expr::StrictNe(a, b) | Expr::Compare(_, a, b) | Expr::In(a, b) | Expr::Sub(a, b) => {
                a.data_refs(out);
                b.data_refs(out);
            }
            Expr::Not(a) | Expr::Str(_, a) | Expr::Regex(a, _) | Expr::ArrLen(a) => a.data_refs(out),
            Expr::If(cond, then, otherwise) => {
                cond.data_refs(out);
                then.data_refs(out);
                if let Some(e) = otherwise {
                    e.data_refs(out);
                }
            }
        }
    }
}

/// Evaluation inputs: the validated node's own value and the whole tree.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub current: Option<&'a Value>,
    pub data: &'a Value,
}

impl<'a> EvalContext<'a> {
    pub fn new(current: Option<&'a Value>, data: &'a Value) -> Self {
        Self { current, data }
    }
}

/// Evaluate a compiled expression. Absent values evaluate to `null`.
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Result<Value, LogicError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::List(items) => Ok(Value::Array(
            items.iter().map(|e| evaluate(e, ctx)).collect::<Result<_, _>>()?,
        )),

        Expr::Ref => Ok(ctx.current.cloned().unwrap_or(Value::Null)),
        Expr::Data(path) => Ok(get_at(ctx.data, path).cloned().unwrap_or(Value::Null)),

        Expr::StrictEq(a, b) => Ok(Value::Bool(strict_eq(&evaluate(a, ctx)?, &evaluate(b, ctx)?))),
        Expr::StrictNe(a, b) => Ok(Value::Bool(!strict_eq(&evaluate(a, ctx)?, &evaluate(b, ctx)?))),
        Expr::Compare(cmp, a, b) => {
            let av = evaluate(a, ctx)?;
            let bv = evaluate(b, ctx)?;
            let ordering = match (&av, &bv) {
                (Value::Number(x), Value::Number(y)) => as_f64(x).partial_cmp(&as_f64(y)),
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => {
                    return Err(LogicError::TypeMismatch {
                        op: cmp.symbol().to_string(),
                        expected: "two numbers or two strings",
                        got: format!("{} and {}", json_type_name(&av), json_type_name(&bv)),
                    });
                }
            };
            Ok(Value::Bool(ordering.is_some_and(|o| cmp.holds(o))))
        }

        Expr::And(items) => {
            for item in items {
                if !expect_bool("and", evaluate(item, ctx)?)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Expr::Or(items) => {
            for item in items {
                if expect_bool("or", evaluate(item, ctx)?)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Expr::Not(a) => Ok(Value::Bool(!expect_bool("not", evaluate(a, ctx)?)?)),
        Expr::If(cond, then, otherwise) => {
            if expect_bool("if", evaluate(cond, ctx)?)? {
                evaluate(then, ctx)
            } else if let Some(e) = otherwise {
                evaluate(e, ctx)
            } else {
                Ok(Value::Null)
            }
        }
        Expr::In(needle, haystack) => {
            let needle = evaluate(needle, ctx)?;
            match evaluate(haystack, ctx)? {
                Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| strict_eq(v, &needle)))),
                Value::String(s) => match &needle {
                    Value::String(n) => Ok(Value::Bool(s.contains(n.as_str()))),
                    other => Err(LogicError::type_mismatch("in", "string needle", other)),
                },
                other => Err(LogicError::type_mismatch("in", "array or string", &other)),
            }
        }

        Expr::Str(op, a) => {
            let v = evaluate(a, ctx)?;
            let Value::String(s) = &v else {
                return Err(LogicError::type_mismatch(op.name(), "string", &v));
            };
            Ok(match op {
                StrOp::Len => json!(s.chars().count()),
                StrOp::Trim => Value::String(s.trim().to_string()),
                StrOp::Lower => Value::String(s.to_lowercase()),
                StrOp::Upper => Value::String(s.to_uppercase()),
            })
        }
        Expr::Regex(a, regex) => match evaluate(a, ctx)? {
            Value::String(s) => Ok(Value::Bool(regex.is_match(&s))),
            other => Err(LogicError::type_mismatch("str:regex", "string", &other)),
        },
        Expr::ArrLen(a) => match evaluate(a, ctx)? {
            Value::Array(items) => Ok(json!(items.len())),
            other => Err(LogicError::type_mismatch("arr:len", "array", &other)),
        },
        Expr::Add(items) => {
            let mut numbers = Vec::with_capacity(items.len());
            for item in items {
                numbers.push(expect_number("+", evaluate(item, ctx)?)?);
            }
            Ok(sum_numbers(&numbers))
        }
        Expr::Sub(a, b) => {
            let x = expect_number("-", evaluate(a, ctx)?)?;
            let y = expect_number("-", evaluate(b, ctx)?)?;
            match (x.as_i64(), y.as_i64()) {
                (Some(i), Some(j)) if i.checked_sub(j).is_some() => Ok(json!(i - j)),
                _ => Ok(float_value(as_f64(&x) - as_f64(&y))),
            }
        }

        Expr::Custom { name, op, args } => {
            let evaluated = args.iter().map(|e| evaluate(e, ctx)).collect::<Result<Vec<_>, _>>()?;
            op(&evaluated).map_err(|err| match err {
                LogicError::TypeMismatch { .. } | LogicError::Custom { .. } => err,
                other => LogicError::Custom {
                    op: name.clone(),
                    message: other.to_string(),
                },
            })
        }
    }
}

/// A rule passes only when its expression yields boolean `true`.
pub fn passes(expr: &Expr, ctx: &EvalContext) -> Result<bool, LogicError> {
    Ok(evaluate(expr, ctx)? == Value::Bool(true))
}

/// Deep equality where numbers compare by numeric value (`1 === 1.0`).
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => as_f64(x) == as_f64(y),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len() && xs.iter().all(|(k, x)| ys.get(k).is_some_and(|y| strict_eq(x, y)))
        }
        _ => a == b,
    }
}

fn expect_bool(op: &str, value: Value) -> Result<bool, LogicError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(LogicError::type_mismatch(op, "boolean", &other)),
    }
}

fn expect_number(op: &str, value: Value) -> Result<Number, LogicError> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(LogicError::type_mismatch(op, "number", &other)),
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn sum_numbers(numbers: &[Number]) -> Value {
    let mut total: i64 = 0;
    for n in numbers {
        match n.as_i64().and_then(|i| total.checked_add(i)) {
            Some(next) => total = next,
            None => return float_value(numbers.iter().map(as_f64).sum()),
        }
    }
    json!(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    fn eval_with(expr: Value, current: Option<Value>, data: Value) -> Result<Value, LogicError> {
        let compiled = compile(&expr, &Operators::new())?;
        evaluate(&compiled, &EvalContext::new(current.as_ref(), &data))
    }

    fn eval(expr: Value, current: Value) -> Result<Value, LogicError> {
        eval_with(expr, Some(current), json!({}))
    }

    #[test]
    fn min_length_rule() {
        let rule = json!([">=", ["str:len", ["$ref"]], 3]);
        assert_eq!(eval(rule.clone(), json!("Kishore")), Ok(json!(true)));
        assert_eq!(eval(rule, json!("ab")), Ok(json!(false)));
    }

    #[test]
    fn str_len_counts_chars_not_bytes() {
        assert_eq!(eval(json!(["str:len", ["$ref"]]), json!("héllo")), Ok(json!(5)));
    }

    #[test]
    fn data_reference_reads_absolute_path() {
        let rule = json!(["===", ["$ref"], ["$data", "personalDetails.password"]]);
        let data = json!({"personalDetails": {"password": "hello"}});
        assert_eq!(eval_with(rule.clone(), Some(json!("hello")), data.clone()), Ok(json!(true)));
        assert_eq!(eval_with(rule, Some(json!("hell")), data), Ok(json!(false)));
    }

    #[test]
    fn absent_ref_is_null() {
        assert_eq!(eval_with(json!(["===", ["$ref"], true]), None, json!({})), Ok(json!(false)));
        assert_eq!(eval_with(json!(["===", ["$ref"], null]), None, json!({})), Ok(json!(true)));
    }

    #[test]
    fn unknown_operator_fails_at_compile_time() {
        let err = compile(&json!(["and", ["str:length", ["$ref"]]]), &Operators::new()).unwrap_err();
        assert_eq!(err, LogicError::UnknownOperator("str:length".to_string()));
        assert_eq!(err.code(), "FLOWJV_E_UNKNOWN_OPERATOR");
    }

    #[test]
    fn arity_is_checked_at_compile_time() {
        let err = compile(&json!(["===", 1]), &Operators::new()).unwrap_err();
        assert!(matches!(err, LogicError::Arity { got: 1, .. }));
        let err = compile(&json!(["$data", ["$ref"]]), &Operators::new()).unwrap_err();
        assert!(matches!(err, LogicError::InvalidDataPath(_)));
    }

    #[test]
    fn ordering_refuses_mixed_types() {
        let err = eval(json!([">", ["$ref"], 3]), json!("10")).unwrap_err();
        assert_eq!(
            err,
            LogicError::TypeMismatch {
                op: ">".to_string(),
                expected: "two numbers or two strings",
                got: "string and number".to_string(),
            }
        );
        assert_eq!(eval(json!(["<", "abc", "abd"]), json!(null)), Ok(json!(true)));
        assert_eq!(eval(json!(["<=", 2, 2.0]), json!(null)), Ok(json!(true)));
    }

    #[test]
    fn boolean_combinators_need_booleans_and_short_circuit() {
        assert_eq!(eval(json!(["and", true, ["not", false]]), json!(null)), Ok(json!(true)));
        assert_eq!(eval(json!(["or", false, false]), json!(null)), Ok(json!(false)));
        // second operand would mismatch but is never evaluated
        assert_eq!(eval(json!(["and", false, ["str:len", 1]]), json!(null)), Ok(json!(false)));
        assert!(matches!(
            eval(json!(["not", "yes"]), json!(null)),
            Err(LogicError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn strict_equality_is_deep_and_numeric() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(strict_eq(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1.0, {"b": 2}]})));
        assert!(!strict_eq(&json!("1"), &json!(1)));
        assert_eq!(eval(json!(["!==", ["$ref"], "x"]), json!("y")), Ok(json!(true)));
        assert_eq!(eval(json!(["!==", ["$ref"], 2]), json!(2.0)), Ok(json!(false)));
        assert_eq!(eval(json!(["!==", ["$ref"], ["$lit", {"a": [1]}]]), json!({"a": [1]})), Ok(json!(false)));
    }

    #[test]
    fn domain_operators() {
        assert_eq!(eval(json!(["arr:len", ["$ref"]]), json!([1, 2])), Ok(json!(2)));
        assert_eq!(eval(json!(["str:trim", ["$ref"]]), json!("  a ")), Ok(json!("a")));
        assert_eq!(eval(json!(["str:lower", ["$ref"]]), json!("MiXeD Ünï")), Ok(json!("mixed ünï")));
        assert_eq!(eval(json!(["str:upper", ["$ref"]]), json!("straße")), Ok(json!("STRASSE")));
        assert!(matches!(
            eval(json!(["str:upper", ["$ref"]]), json!(3)),
            Err(LogicError::TypeMismatch { .. })
        ));
        assert_eq!(eval(json!(["in", ["$ref"], ["$lit", ["a", "b"]]]), json!("b")), Ok(json!(true)));
        assert_eq!(eval(json!(["in", "ell", ["$ref"]]), json!("hello")), Ok(json!(true)));
        assert_eq!(
            eval(json!(["str:regex", ["$ref"], "^[a-z]+@[a-z]+\\.com$"]), json!("me@site.com")),
            Ok(json!(true))
        );
        assert_eq!(eval(json!(["+", 1, 2, ["$ref"]]), json!(3)), Ok(json!(6)));
        assert_eq!(eval(json!(["-", ["$ref"], 0.5]), json!(2)), Ok(json!(1.5)));
        assert_eq!(eval(json!(["if", ["$ref"], "on", "off"]), json!(false)), Ok(json!("off")));
    }

    #[test]
    fn invalid_regex_is_a_compile_error() {
        let err = compile(&json!(["str:regex", ["$ref"], "("]), &Operators::new()).unwrap_err();
        assert_eq!(err.code(), "FLOWJV_E_REGEX");
    }

    fn op_is_even(args: &[Value]) -> Result<Value, LogicError> {
        match args.first() {
            Some(Value::Number(n)) if n.is_i64() => Ok(json!(n.as_i64().unwrap_or(1) % 2 == 0)),
            Some(other) => Err(LogicError::type_mismatch("x:even", "integer", other)),
            None => Ok(json!(false)),
        }
    }

    #[test]
    fn custom_operator_extension_point() {
        let mut operators = Operators::new();
        assert!(!operators.is_known("x:even"));
        operators.register("x:even", op_is_even);
        assert!(operators.is_known("x:even"));

        let compiled = compile(&json!(["x:even", ["$ref"]]), &operators).unwrap();
        let data = json!({});
        let four = json!(4);
        assert_eq!(evaluate(&compiled, &EvalContext::new(Some(&four), &data)), Ok(json!(true)));
        assert!(operators.unregister("x:even"));
        assert!(compile(&json!(["x:even", 1]), &operators).is_err());
    }

    #[test]
    fn collects_data_refs() {
        let compiled = compile(
            &json!(["and", ["===", ["$ref"], ["$data", "a.b"]], ["if", true, ["$data", "c.0"], false]]),
            &Operators::new(),
        )
        .unwrap();
        let mut refs = Vec::new();
        compiled.data_refs(&mut refs);
        assert_eq!(refs, vec![path!["a", "b"], path!["c", 0]]);
    }

    #[test]
    fn non_operator_arrays_are_literal_lists() {
        assert_eq!(eval(json!([1, ["$ref"]]), json!("x")), Ok(json!([1, "x"])));
        assert_eq!(eval(json!([]), json!(null)), Ok(json!([])));
    }
}
