//! Request body templates.
//!
//! Bodies are rendered with a loader-less minijinja environment: templates
//! see only the probe's inbound query parameters and the helpers registered
//! here. There is no filesystem, include, or process access.
//!
//! Helpers on top of minijinja's builtins:
//! - filters: `b64enc`, `b64dec`, `quote`, `squote`, `trunc(n)`,
//!   `add(n)`, `sub(n)`, `mul(n)`, `div(n)`
//! - functions: `now()`, `max(a, b)`, `min(a, b)`

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};

/// Render `source` against `params` (first value wins per name).
pub fn render_body(source: &str, params: &[(String, String)]) -> Result<String, Error> {
    let mut ctx: BTreeMap<&str, &str> = BTreeMap::new();
    for (k, v) in params {
        ctx.entry(k.as_str()).or_insert(v.as_str());
    }
    environment().render_str(source, ctx)
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);

    env.add_filter("b64enc", b64enc);
    env.add_filter("b64dec", b64dec);
    env.add_filter("quote", quote);
    env.add_filter("squote", squote);
    env.add_filter("trunc", trunc);
    env.add_filter("add", |a: Value, b: Value| arith(Op::Add, &a, &b));
    env.add_filter("sub", |a: Value, b: Value| arith(Op::Sub, &a, &b));
    env.add_filter("mul", |a: Value, b: Value| arith(Op::Mul, &a, &b));
    env.add_filter("div", |a: Value, b: Value| arith(Op::Div, &a, &b));

    env.add_function("now", now);
    env.add_function("max", |a: Value, b: Value| pick(&a, &b, true));
    env.add_function("min", |a: Value, b: Value| pick(&a, &b, false));
    env
}

fn b64enc(value: Value) -> String {
    STANDARD.encode(value.to_string())
}

fn b64dec(value: Value) -> Result<String, Error> {
    let raw = STANDARD
        .decode(value.to_string())
        .map_err(|e| invalid(format!("b64dec: {e}")))?;
    String::from_utf8(raw).map_err(|e| invalid(format!("b64dec: {e}")))
}

// Escapes backslashes, quotes and control characters, so the output is
// always a valid JSON string literal.
fn quote(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value.to_string()).map_err(|e| invalid(format!("quote: {e}")))
}

fn squote(value: Value) -> String {
    format!("'{value}'")
}

/// Keep the first `n` characters, or the last `-n` when `n` is negative.
fn trunc(value: Value, n: i64) -> String {
    let s = value.to_string();
    let len = s.chars().count();
    let keep = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX).min(len);
    if n < 0 {
        s.chars().skip(len - keep).collect()
    } else {
        s.chars().take(keep).collect()
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

// Query parameters arrive as strings, so numeric strings count as numbers.
fn num(v: &Value) -> Result<Num, Error> {
    if let Some(s) = v.as_str() {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Num::Int(i));
        }
        return s
            .parse::<f64>()
            .map(Num::Float)
            .map_err(|_| invalid(format!("not a number: {s:?}")));
    }
    if let Ok(i) = i64::try_from(v.clone()) {
        return Ok(Num::Int(i));
    }
    f64::try_from(v.clone())
        .map(Num::Float)
        .map_err(|_| invalid(format!("not a number: {v}")))
}

fn arith(op: Op, a: &Value, b: &Value) -> Result<Value, Error> {
    match (num(a)?, num(b)?) {
        (Num::Int(x), Num::Int(y)) => {
            let r = match op {
                Op::Add => x.checked_add(y),
                Op::Sub => x.checked_sub(y),
                Op::Mul => x.checked_mul(y),
                Op::Div => x.checked_div(y),
            };
            r.map(Value::from)
                .ok_or_else(|| invalid(format!("integer overflow or division by zero ({x}, {y})")))
        }
        (x, y) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            let r = match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                Op::Div => x / y,
            };
            Ok(Value::from(r))
        }
    }
}

fn pick(a: &Value, b: &Value, max: bool) -> Result<Value, Error> {
    let (x, y) = (num(a)?.as_f64(), num(b)?.as_f64());
    let first = if max { x >= y } else { x <= y };
    Ok(if first { a.clone() } else { b.clone() })
}

fn invalid(msg: String) -> Error {
    Error::new(ErrorKind::InvalidOperation, msg)
}
