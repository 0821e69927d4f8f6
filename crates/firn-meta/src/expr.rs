//! Column derivation expressions.
//!
//! A load statement may derive target columns from source fields instead
//! of copying them verbatim (`SET (k = strftime(src_ts))`). The resolved
//! descriptor carries those derivations as a closed expression shape with
//! its own durable encoding: a one-byte tag followed by the variant's
//! fields, recursing for function arguments.

use std::fmt;

use firn_common::error::{PersistError, UnknownTagSnafu};
use firn_common::persist::{Persist, PersistReader, PersistWriter};

const TAG_COLUMN: u8 = 1;
const TAG_LITERAL: u8 = 2;
const TAG_NULL: u8 = 3;
const TAG_FUNCTION: u8 = 4;

/// A derivation expression for one target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnExpr {
    /// A reference to a source column.
    Column(String),
    /// A string literal.
    Literal(String),
    /// The SQL NULL literal.
    Null,
    /// A function call over sub-expressions.
    Function { name: String, args: Vec<ColumnExpr> },
}

impl ColumnExpr {
    /// Convenience constructor for a function call.
    pub fn function(name: impl Into<String>, args: Vec<ColumnExpr>) -> Self {
        ColumnExpr::Function {
            name: name.into(),
            args,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ColumnExpr::Column(_) => TAG_COLUMN,
            ColumnExpr::Literal(_) => TAG_LITERAL,
            ColumnExpr::Null => TAG_NULL,
            ColumnExpr::Function { .. } => TAG_FUNCTION,
        }
    }
}

impl Persist for ColumnExpr {
    fn write_to(&self, out: &mut PersistWriter) {
        out.write_u8(self.tag());
        match self {
            ColumnExpr::Column(name) | ColumnExpr::Literal(name) => out.write_string(name),
            ColumnExpr::Null => {}
            ColumnExpr::Function { name, args } => {
                out.write_string(name);
                out.write_i32(args.len() as i32);
                for arg in args {
                    arg.write_to(out);
                }
            }
        }
    }

    fn read_from(input: &mut PersistReader<'_>) -> Result<Self, PersistError> {
        match input.read_u8()? {
            TAG_COLUMN => Ok(ColumnExpr::Column(input.read_string()?)),
            TAG_LITERAL => Ok(ColumnExpr::Literal(input.read_string()?)),
            TAG_NULL => Ok(ColumnExpr::Null),
            TAG_FUNCTION => {
                let name = input.read_string()?;
                let count = input.read_count()?;
                let mut args = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    args.push(ColumnExpr::read_from(input)?);
                }
                Ok(ColumnExpr::Function { name, args })
            }
            tag => UnknownTagSnafu {
                kind: "column expression",
                tag,
            }
            .fail(),
        }
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnExpr::Column(name) => write!(f, "`{name}`"),
            ColumnExpr::Literal(value) => write!(f, "'{value}'"),
            ColumnExpr::Null => write!(f, "NULL"),
            ColumnExpr::Function { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
