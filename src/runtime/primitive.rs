use crate::language::ast::{Immediate, Primitive};
use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    frame::ExecContext,
    value::{DisplayValue, Slot},
};
use std::rc::Rc;

/// Applies a built-in operator to already evaluated operands.
pub fn apply(primitive: Primitive, operands: Vec<Slot>, cx: &mut ExecContext<'_>) -> RuntimeResult<Slot> {
    if let Some(expected) = primitive.arity() {
        if operands.len() != expected {
            return Err(RuntimeError::internal(format!(
                "primitive `{}` expects {} operands, got {}",
                primitive.name(),
                expected,
                operands.len()
            )));
        }
    }
    use Primitive::*;
    match primitive {
        Print => {
            let line = operands
                .iter()
                .map(|slot| DisplayValue(slot).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(cx.out, "{line}")
                .map_err(|err| RuntimeError::internal(format!("unable to write output: {err}")))?;
            Ok(Slot::Empty)
        }
        Tuple => {
            for slot in &operands {
                slot.check_initialized()?;
            }
            Ok(Slot::Object(cx.heap.allocate("tuple", operands)))
        }
        _ => {
            let mut operands = operands.into_iter();
            let left = initialized(operands.next())?;
            match operands.next() {
                None => unary(primitive, left),
                Some(right) => {
                    right.check_initialized()?;
                    match primitive {
                        Index => index(left, right),
                        Eq => Ok(Slot::Immediate(Immediate::Bool(equal(&left, &right)?))),
                        Ne => Ok(Slot::Immediate(Immediate::Bool(!equal(&left, &right)?))),
                        _ => binary(primitive, expect_immediate(left)?, expect_immediate(right)?),
                    }
                }
            }
        }
    }
}

fn initialized(slot: Option<Slot>) -> RuntimeResult<Slot> {
    let slot = slot.ok_or_else(|| RuntimeError::internal("missing operand"))?;
    slot.check_initialized()?;
    Ok(slot)
}

fn expect_immediate(slot: Slot) -> RuntimeResult<Immediate> {
    match slot {
        Slot::Immediate(value) => Ok(value),
        other => Err(RuntimeError::TypeMismatch {
            expected: "immediate",
            found: other.kind_name().to_string(),
        }),
    }
}

fn unreachable_operands(primitive: Primitive) -> RuntimeResult<Slot> {
    Err(RuntimeError::internal(format!(
        "primitive `{}` received the wrong number of operands",
        primitive.name()
    )))
}

fn unary(primitive: Primitive, operand: Slot) -> RuntimeResult<Slot> {
    match primitive {
        Primitive::Len => {
            let object = operand.expect_object()?;
            let len = object.borrow().slots.len();
            Ok(Slot::Immediate(Immediate::Int(len as i64)))
        }
        Primitive::Not => Ok(Slot::Immediate(Immediate::Bool(!operand.expect_bool()?))),
        Primitive::Neg => match expect_immediate(operand)? {
            Immediate::Int(value) => Ok(Slot::Immediate(Immediate::Int(value.wrapping_neg()))),
            Immediate::Float(value) => Ok(Slot::Immediate(Immediate::Float(-value))),
            other => Err(RuntimeError::TypeMismatch {
                expected: "number",
                found: other.type_name().to_string(),
            }),
        },
        other => unreachable_operands(other),
    }
}

fn index(target: Slot, position: Slot) -> RuntimeResult<Slot> {
    let object = target.expect_object()?;
    let position = position.expect_int()?;
    let object = object.borrow();
    usize::try_from(position)
        .ok()
        .and_then(|idx| object.slots.get(idx))
        .cloned()
        .ok_or(RuntimeError::IndexOutOfBounds {
            index: position,
            len: object.slots.len(),
        })
}

fn binary(primitive: Primitive, left: Immediate, right: Immediate) -> RuntimeResult<Slot> {
    use Primitive::*;
    match primitive {
        Add | Sub | Mul | Div | Mod => numeric(primitive, left, right),
        Lt => compare(left, right, |ord| ord.is_lt()),
        Le => compare(left, right, |ord| ord.is_le()),
        Gt => compare(left, right, |ord| ord.is_gt()),
        Ge => compare(left, right, |ord| ord.is_ge()),
        And | Or => match (left, right) {
            (Immediate::Bool(a), Immediate::Bool(b)) => {
                let value = if primitive == And { a && b } else { a || b };
                Ok(Slot::Immediate(Immediate::Bool(value)))
            }
            (a, _) => Err(RuntimeError::TypeMismatch {
                expected: "bool",
                found: a.type_name().to_string(),
            }),
        },
        other => unreachable_operands(other),
    }
}

fn numeric(primitive: Primitive, left: Immediate, right: Immediate) -> RuntimeResult<Slot> {
    match (left, right) {
        (Immediate::Int(a), Immediate::Int(b)) => {
            let value = match primitive {
                Primitive::Add => a.wrapping_add(b),
                Primitive::Sub => a.wrapping_sub(b),
                Primitive::Mul => a.wrapping_mul(b),
                Primitive::Div | Primitive::Mod if b == 0 => {
                    return Err(RuntimeError::DivisionByZero)
                }
                Primitive::Div => a.wrapping_div(b),
                Primitive::Mod => a.wrapping_rem(b),
                other => return unreachable_operands(other),
            };
            Ok(Slot::Immediate(Immediate::Int(value)))
        }
        (Immediate::Float(a), Immediate::Float(b)) => {
            let value = match primitive {
                Primitive::Add => a + b,
                Primitive::Sub => a - b,
                Primitive::Mul => a * b,
                Primitive::Div => a / b,
                Primitive::Mod => a % b,
                other => return unreachable_operands(other),
            };
            Ok(Slot::Immediate(Immediate::Float(value)))
        }
        (Immediate::Int(a), Immediate::Float(b)) => {
            numeric(primitive, Immediate::Float(a as f64), Immediate::Float(b))
        }
        (Immediate::Float(a), Immediate::Int(b)) => {
            numeric(primitive, Immediate::Float(a), Immediate::Float(b as f64))
        }
        (Immediate::Str(a), Immediate::Str(b)) if primitive == Primitive::Add => {
            Ok(Slot::Immediate(Immediate::Str(a + &b)))
        }
        (a, b) => Err(RuntimeError::TypeMismatch {
            expected: "number",
            found: mismatched(&a, &b),
        }),
    }
}

fn compare<F>(left: Immediate, right: Immediate, test: F) -> RuntimeResult<Slot>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let ordering = match (&left, &right) {
        (Immediate::Int(a), Immediate::Int(b)) => Some(a.cmp(b)),
        (Immediate::Float(a), Immediate::Float(b)) => a.partial_cmp(b),
        (Immediate::Int(a), Immediate::Float(b)) => (*a as f64).partial_cmp(b),
        (Immediate::Float(a), Immediate::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Immediate::Str(a), Immediate::Str(b)) => Some(a.cmp(b)),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: "comparable values",
                found: mismatched(&left, &right),
            })
        }
    };
    Ok(Slot::Immediate(Immediate::Bool(ordering.map_or(false, test))))
}

fn equal(left: &Slot, right: &Slot) -> RuntimeResult<bool> {
    match (left, right) {
        (Slot::Immediate(Immediate::Int(a)), Slot::Immediate(Immediate::Float(b)))
        | (Slot::Immediate(Immediate::Float(b)), Slot::Immediate(Immediate::Int(a))) => {
            Ok(*a as f64 == *b)
        }
        (Slot::Immediate(a), Slot::Immediate(b)) => {
            if std::mem::discriminant(a) != std::mem::discriminant(b) {
                return Err(RuntimeError::TypeMismatch {
                    expected: a.type_name(),
                    found: b.type_name().to_string(),
                });
            }
            Ok(a == b)
        }
        (Slot::Object(a), Slot::Object(b)) => Ok(Rc::ptr_eq(a, b)),
        (Slot::Symbol(a), Slot::Symbol(b)) => Ok(a == b),
        (Slot::Selector(a), Slot::Selector(b)) => Ok(a == b),
        (a, b) => Err(RuntimeError::TypeMismatch {
            expected: a.kind_name(),
            found: b.kind_name().to_string(),
        }),
    }
}

fn mismatched(left: &Immediate, right: &Immediate) -> String {
    format!("{} and {}", left.type_name(), right.type_name())
}
