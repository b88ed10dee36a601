use std::{cmp::Ordering, fmt, rc::Rc};

use thiserror::Error;

use crate::ast::{BinaryOp, UnaryOp};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

#[derive(Clone)]
pub enum ValueKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
}

/// Failure of a value-level operation; the interpreter attaches the call chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("unsupported operand types for `{op}`: {left} and {right}")]
    BinaryMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("unary `{op}` cannot be applied to {operand}")]
    UnaryMismatch {
        op: &'static str,
        operand: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in `{0}`")]
    Overflow(&'static str),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("cannot index {target} with {index}")]
    NotIndexable {
        target: &'static str,
        index: &'static str,
    },
    #[error("{0} is not iterable")]
    NotIterable(&'static str),
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(values))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(&*self.0, ValueKind::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match &*self.0 {
            ValueKind::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0,
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(values) => !values.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Null => "Null",
            ValueKind::Bool(_) => "Bool",
            ValueKind::Int(_) => "Int",
            ValueKind::Float(_) => "Float",
            ValueKind::String(_) => "String",
            ValueKind::Array(_) => "Array",
        }
    }

    pub fn binary(op: &BinaryOp, left: &Value, right: &Value) -> Result<Value, OperationError> {
        use BinaryOp::*;
        match op {
            Add => left.add(right),
            Sub => left.arithmetic(right, op, i64::checked_sub, |a, b| a - b),
            Mul => left.arithmetic(right, op, i64::checked_mul, |a, b| a * b),
            Div => left.divide(right),
            Mod => left.remainder(right),
            Equal => Ok(Value::bool(left == right)),
            NotEqual => Ok(Value::bool(left != right)),
            Less => left.compare(right, op, Ordering::is_lt),
            LessEqual => left.compare(right, op, Ordering::is_le),
            Greater => left.compare(right, op, Ordering::is_gt),
            GreaterEqual => left.compare(right, op, Ordering::is_ge),
            And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
            Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
        }
    }

    pub fn unary(op: &UnaryOp, operand: &Value) -> Result<Value, OperationError> {
        match op {
            UnaryOp::Negate => match &*operand.0 {
                ValueKind::Int(n) => n
                    .checked_neg()
                    .map(Value::int)
                    .ok_or(OperationError::Overflow("-")),
                ValueKind::Float(n) => Ok(Value::float(-n)),
                _ => Err(OperationError::UnaryMismatch {
                    op: "-",
                    operand: operand.type_name(),
                }),
            },
            UnaryOp::Not => Ok(Value::bool(!operand.is_truthy())),
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value, OperationError> {
        match (&*self.0, &*index.0) {
            (ValueKind::Array(values), ValueKind::Int(idx)) => {
                let slot = checked_index(*idx, values.len())?;
                Ok(values[slot].clone())
            }
            (ValueKind::String(text), ValueKind::Int(idx)) => {
                let len = text.chars().count();
                let slot = checked_index(*idx, len)?;
                Ok(text
                    .chars()
                    .nth(slot)
                    .map(|ch| Value::string(ch.to_string()))
                    .unwrap_or_else(Value::null))
            }
            _ => Err(OperationError::NotIndexable {
                target: self.type_name(),
                index: index.type_name(),
            }),
        }
    }

    /// Copy of this array with element `index` replaced.
    pub fn with_element(&self, index: &Value, element: Value) -> Result<Value, OperationError> {
        match (&*self.0, &*index.0) {
            (ValueKind::Array(values), ValueKind::Int(idx)) => {
                let slot = checked_index(*idx, values.len())?;
                let mut updated = values.clone();
                updated[slot] = element;
                Ok(Value::array(updated))
            }
            _ => Err(OperationError::NotIndexable {
                target: self.type_name(),
                index: index.type_name(),
            }),
        }
    }

    pub fn iterate(&self) -> Result<Vec<Value>, OperationError> {
        match &*self.0 {
            ValueKind::Array(values) => Ok(values.clone()),
            ValueKind::String(text) => {
                Ok(text.chars().map(|c| Value::string(c.to_string())).collect())
            }
            _ => Err(OperationError::NotIterable(self.type_name())),
        }
    }

    fn add(&self, right: &Value) -> Result<Value, OperationError> {
        match (&*self.0, &*right.0) {
            (ValueKind::String(a), _) => Ok(Value::string(format!("{a}{right}"))),
            (_, ValueKind::String(b)) => Ok(Value::string(format!("{self}{b}"))),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let mut joined = a.clone();
                joined.extend(b.iter().cloned());
                Ok(Value::array(joined))
            }
            _ => self.arithmetic(right, &BinaryOp::Add, i64::checked_add, |a, b| a + b),
        }
    }

    fn arithmetic(
        &self,
        right: &Value,
        op: &BinaryOp,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, OperationError> {
        match (&*self.0, &*right.0) {
            (ValueKind::Int(a), ValueKind::Int(b)) => int_op(*a, *b)
                .map(Value::int)
                .ok_or(OperationError::Overflow(op.symbol())),
            _ => match (self.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(Value::float(float_op(a, b))),
                _ => Err(self.mismatch(right, op)),
            },
        }
    }

    fn divide(&self, right: &Value) -> Result<Value, OperationError> {
        match (&*self.0, &*right.0) {
            (ValueKind::Int(_), ValueKind::Int(0)) => Err(OperationError::DivisionByZero),
            (ValueKind::Int(a), ValueKind::Int(b)) if a.checked_rem(*b) == Some(0) => a
                .checked_div(*b)
                .map(Value::int)
                .ok_or(OperationError::Overflow("/")),
            _ => match (self.as_number(), right.as_number()) {
                (Some(_), Some(b)) if b == 0.0 => Err(OperationError::DivisionByZero),
                (Some(a), Some(b)) => Ok(Value::float(a / b)),
                _ => Err(self.mismatch(right, &BinaryOp::Div)),
            },
        }
    }

    fn remainder(&self, right: &Value) -> Result<Value, OperationError> {
        match (&*self.0, &*right.0) {
            (ValueKind::Int(_), ValueKind::Int(0)) => Err(OperationError::DivisionByZero),
            (ValueKind::Int(a), ValueKind::Int(b)) => a
                .checked_rem(*b)
                .map(Value::int)
                .ok_or(OperationError::Overflow("%")),
            _ => match (self.as_number(), right.as_number()) {
                (Some(_), Some(b)) if b == 0.0 => Err(OperationError::DivisionByZero),
                (Some(a), Some(b)) => Ok(Value::float(a % b)),
                _ => Err(self.mismatch(right, &BinaryOp::Mod)),
            },
        }
    }

    fn compare(
        &self,
        right: &Value,
        op: &BinaryOp,
        accept: fn(Ordering) -> bool,
    ) -> Result<Value, OperationError> {
        let ordering = match (&*self.0, &*right.0) {
            (ValueKind::Int(a), ValueKind::Int(b)) => Some(a.cmp(b)),
            (ValueKind::String(a), ValueKind::String(b)) => Some(a.cmp(b)),
            _ => match (self.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(self.mismatch(right, op)),
            },
        };
        // NaN compares false against everything.
        Ok(Value::bool(ordering.is_some_and(accept)))
    }

    fn mismatch(&self, right: &Value, op: &BinaryOp) -> OperationError {
        OperationError::BinaryMismatch {
            op: op.symbol(),
            left: self.type_name(),
            right: right.type_name(),
        }
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, OperationError> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < len)
        .ok_or(OperationError::IndexOutOfBounds { index, len })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(a), ValueKind::Array(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n:?}"),
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::Array(values) => f.debug_list().entries(values.iter()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value:?}")?;
                }
                write!(f, "]")
            }
        }
    }
}
