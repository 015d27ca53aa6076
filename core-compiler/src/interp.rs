// Tree-walking interpreter over the lowered IR.
// Integer arithmetic runs in i128 and is range-checked against the static type
// of the expression, so overflow surfaces as a fault instead of wrapping.

use crate::ast::{BinaryOp, UnaryOp};
use crate::fault::{INDEX_OUT_OF_RANGE, RuntimeFault};
use crate::ir::{Callee, Expr, ExprKind, Function, Stmt};
use crate::types::Type;
use crate::value::{StructValue, Value};
use chrono::Duration;
use std::cmp::Ordering;

enum Flow {
    Next,
    Return(Value),
}

pub(crate) struct Interpreter<'u> {
    functions: &'u [Function],
    max_depth: usize,
    depth: usize,
}

impl<'u> Interpreter<'u> {
    pub fn new(functions: &'u [Function], max_depth: usize) -> Self {
        Self {
            functions,
            max_depth,
            depth: 0,
        }
    }

    pub fn call(&mut self, index: usize, args: Vec<Value>) -> Result<Value, RuntimeFault> {
        if self.depth >= self.max_depth {
            return Err(RuntimeFault::new(format!(
                "Call depth exceeded the limit of {} frames.",
                self.max_depth
            )));
        }
        let functions = self.functions;
        let function = functions
            .get(index)
            .ok_or_else(|| RuntimeFault::new(format!("No function at index {}.", index)))?;

        let mut frame = args;
        frame.resize(function.slots.max(frame.len()), Value::Unit);

        self.depth += 1;
        let flow = self.block(&function.body, &mut frame);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Unit),
        }
    }

    fn block(&mut self, stmts: &[Stmt], frame: &mut [Value]) -> Result<Flow, RuntimeFault> {
        for stmt in stmts {
            if let Flow::Return(value) = self.stmt(stmt, frame)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn stmt(&mut self, stmt: &Stmt, frame: &mut [Value]) -> Result<Flow, RuntimeFault> {
        match stmt {
            Stmt::Store { slot, value } => {
                frame[*slot] = self.eval(value, frame)?;
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let body = if self.condition(cond, frame)? {
                    then_body
                } else {
                    else_body
                };
                return self.block(body, frame);
            }
            Stmt::While { cond, body } => {
                while self.condition(cond, frame)? {
                    if let Flow::Return(value) = self.block(body, frame)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Throw(message) => {
                let message = self.eval(message, frame)?;
                return Err(RuntimeFault::new(message.to_string()));
            }
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
            }
        }
        Ok(Flow::Next)
    }

    fn condition(&mut self, cond: &Expr, frame: &mut [Value]) -> Result<bool, RuntimeFault> {
        let value = self.eval(cond, frame)?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeFault::new(format!("Condition of type '{}' is not a bool.", value.type_of())))
    }

    fn eval(&mut self, expr: &Expr, frame: &mut [Value]) -> Result<Value, RuntimeFault> {
        match &expr.kind {
            ExprKind::Const(value) => Ok(value.clone()),
            ExprKind::Local(slot) => Ok(frame[*slot].clone()),
            ExprKind::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, frame)?);
                }
                match callee {
                    Callee::User(index) => self.call(*index, values),
                    Callee::Native(native) => native.call(&values),
                }
            }
            ExprKind::Field { base, index } => match self.eval(base, frame)? {
                Value::Struct(StructValue { mut fields, .. }) if *index < fields.len() => {
                    Ok(fields.swap_remove(*index).1)
                }
                other => Err(RuntimeFault::new(format!(
                    "Value of type '{}' has no field {}.",
                    other.type_of(),
                    index
                ))),
            },
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                unary(*op, value, &expr.ty)
            }
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let lhs = self.condition(lhs, frame)?;
                    Ok(Value::Bool(lhs && self.condition(rhs, frame)?))
                }
                BinaryOp::Or => {
                    let lhs = self.condition(lhs, frame)?;
                    Ok(Value::Bool(lhs || self.condition(rhs, frame)?))
                }
                _ => {
                    let lhs = self.eval(lhs, frame)?;
                    let rhs = self.eval(rhs, frame)?;
                    binary(*op, lhs, rhs, &expr.ty)
                }
            },
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, frame)?);
                }
                Ok(Value::List(values))
            }
            ExprKind::Index { base, index } => {
                let base = self.eval(base, frame)?;
                let index = self.eval(index, frame)?;
                let position = index
                    .as_i128()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| RuntimeFault::new(INDEX_OUT_OF_RANGE))?;
                let element = match base {
                    Value::List(mut items) if position < items.len() => Some(items.swap_remove(position)),
                    Value::Str(s) => s.chars().nth(position).map(Value::Char),
                    _ => None,
                };
                element.ok_or_else(|| RuntimeFault::new(INDEX_OUT_OF_RANGE))
            }
            ExprKind::Cast { expr: inner, to } => {
                let value = self.eval(inner, frame)?;
                cast(value, to)
            }
            ExprKind::Struct { name, fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for (field, value) in fields {
                    values.push((field.clone(), self.eval(value, frame)?));
                }
                Ok(Value::Struct(StructValue {
                    name: name.clone(),
                    fields: values,
                }))
            }
        }
    }
}

fn unary(op: UnaryOp, value: Value, ty: &Type) -> Result<Value, RuntimeFault> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::F32(x)) => Ok(Value::F32(-x)),
        (UnaryOp::Neg, Value::F64(x)) => Ok(Value::F64(-x)),
        (UnaryOp::Neg, Value::Duration(d)) => Duration::zero()
            .checked_sub(&d)
            .map(Value::Duration)
            .ok_or_else(RuntimeFault::overflow),
        (UnaryOp::Neg, value) => value
            .as_i128()
            .and_then(|n| Value::from_i128(ty, -n))
            .ok_or_else(RuntimeFault::overflow),
        (UnaryOp::Not, value) => Err(RuntimeFault::new(format!(
            "Operator '!' cannot be applied to '{}'.",
            value.type_of()
        ))),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, ty: &Type) -> Result<Value, RuntimeFault> {
    if op.is_comparison() {
        return Ok(Value::Bool(compare(op, &lhs, &rhs)));
    }

    if *ty == Type::Str {
        return Ok(Value::Str(format!("{}{}", lhs, rhs)));
    }

    match (op, &lhs, &rhs) {
        (BinaryOp::Add, Value::Duration(a), Value::Duration(b)) => {
            return a.checked_add(b).map(Value::Duration).ok_or_else(RuntimeFault::overflow);
        }
        (BinaryOp::Sub, Value::Duration(a), Value::Duration(b)) => {
            return a.checked_sub(b).map(Value::Duration).ok_or_else(RuntimeFault::overflow);
        }
        (BinaryOp::Add, Value::DateTime(t), Value::Duration(d)) => {
            return t.checked_add_signed(*d).map(Value::DateTime).ok_or_else(RuntimeFault::overflow);
        }
        (BinaryOp::Sub, Value::DateTime(t), Value::Duration(d)) => {
            return t.checked_sub_signed(*d).map(Value::DateTime).ok_or_else(RuntimeFault::overflow);
        }
        (BinaryOp::Sub, Value::DateTime(a), Value::DateTime(b)) => {
            return Ok(Value::Duration(a.signed_duration_since(*b)));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(RuntimeFault::divide_by_zero()),
            BinaryOp::Div => a.checked_div(b),
            // The remainder faults wherever the matching quotient would
            BinaryOp::Rem => a
                .checked_div(b)
                .and_then(|q| Value::from_i128(ty, q))
                .and_then(|_| a.checked_rem(b)),
            _ => None,
        };
        return result
            .and_then(|n| Value::from_i128(ty, n))
            .ok_or_else(RuntimeFault::overflow);
    }

    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => f64::NAN,
        };
        if let Some(value) = Value::from_f64(ty, result) {
            return Ok(value);
        }
    }

    Err(RuntimeFault::new(format!(
        "Operator '{}' cannot be applied to '{}' and '{}'.",
        op.symbol(),
        lhs.type_of(),
        rhs.type_of()
    )))
}

fn ordering(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::F32(_) | Value::F64(_), _) => lhs.as_f64()?.partial_cmp(&rhs.as_f64()?),
        _ => Some(lhs.as_i128()?.cmp(&rhs.as_i128()?)),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        BinaryOp::Eq => lhs == rhs,
        BinaryOp::Ne => lhs != rhs,
        _ => ordering(lhs, rhs).is_some_and(|o| match op {
            BinaryOp::Lt => o.is_lt(),
            BinaryOp::Le => o.is_le(),
            BinaryOp::Gt => o.is_gt(),
            BinaryOp::Ge => o.is_ge(),
            _ => false,
        }),
    }
}

fn cast(value: Value, to: &Type) -> Result<Value, RuntimeFault> {
    if value.type_of() == *to {
        return Ok(value);
    }

    if let Value::Char(c) = value {
        return Value::from_i128(to, c as u32 as i128).ok_or_else(RuntimeFault::overflow);
    }

    if let Some(n) = value.as_i128() {
        if *to == Type::Char {
            return u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or_else(|| RuntimeFault::new("Value was either too large or too small for a character."));
        }
        if to.is_float() {
            return Value::from_f64(to, n as f64).ok_or_else(RuntimeFault::overflow);
        }
        return Value::from_i128(to, n).ok_or_else(RuntimeFault::overflow);
    }

    if let Some(x) = value.as_f64() {
        if to.is_float() {
            return Value::from_f64(to, x).ok_or_else(RuntimeFault::overflow);
        }
        if to.is_integer() && x.is_finite() {
            return Value::from_i128(to, x.trunc() as i128).ok_or_else(RuntimeFault::overflow);
        }
        return Err(RuntimeFault::overflow());
    }

    Err(RuntimeFault::new(format!(
        "Invalid cast from '{}' to '{}'.",
        value.type_of(),
        to
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{DIVIDE_BY_ZERO, OVERFLOW};

    #[test]
    fn integer_arithmetic_is_checked_against_the_result_type() {
        let sum = binary(BinaryOp::Add, Value::U8(200), Value::U8(55), &Type::U8).unwrap();
        assert_eq!(sum, Value::U8(255));
        let fault = binary(BinaryOp::Add, Value::U8(200), Value::U8(56), &Type::U8).unwrap_err();
        assert_eq!(fault.message(), OVERFLOW);
        let fault = binary(BinaryOp::Rem, Value::I64(7), Value::I64(0), &Type::I64).unwrap_err();
        assert_eq!(fault.message(), DIVIDE_BY_ZERO);
    }

    #[test]
    fn remainder_overflows_where_division_does() {
        let quotient = binary(BinaryOp::Div, Value::I32(i32::MIN), Value::I32(-1), &Type::I32).unwrap_err();
        let remainder = binary(BinaryOp::Rem, Value::I32(i32::MIN), Value::I32(-1), &Type::I32).unwrap_err();
        assert_eq!(quotient.message(), OVERFLOW);
        assert_eq!(remainder.message(), OVERFLOW);
        let r = binary(BinaryOp::Rem, Value::I64(i64::MIN), Value::I64(-1), &Type::I64).unwrap_err();
        assert_eq!(r.message(), OVERFLOW);
        assert_eq!(
            binary(BinaryOp::Rem, Value::I32(-7), Value::I32(2), &Type::I32).unwrap(),
            Value::I32(-1)
        );
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let q = binary(BinaryOp::Div, Value::F64(1.0), Value::F64(0.0), &Type::F64).unwrap();
        assert_eq!(q, Value::F64(f64::INFINITY));
    }

    #[test]
    fn casts_truncate_floats_and_check_ranges() {
        assert_eq!(cast(Value::F64(3.9), &Type::I32).unwrap(), Value::I32(3));
        assert!(cast(Value::I32(300), &Type::U8).is_err());
        assert_eq!(cast(Value::Char('A'), &Type::U32).unwrap(), Value::U32(65));
        assert_eq!(cast(Value::I32(97), &Type::Char).unwrap(), Value::Char('a'));
        assert!(cast(Value::F64(f64::NAN), &Type::I64).is_err());
    }

    #[test]
    fn negating_the_minimum_overflows() {
        assert!(unary(UnaryOp::Neg, Value::I32(i32::MIN), &Type::I32).is_err());
        assert_eq!(unary(UnaryOp::Neg, Value::I8(5), &Type::I8).unwrap(), Value::I8(-5));
    }
}
