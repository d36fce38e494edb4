//! Purpose: Flatten nested SQL fragments into one statement with positional arguments.
//! Exports: `Expr`, `Arg`, `MARKER`, and the `sql!` macro.
//! Role: The only constructor of fragments; everything handed to an executor comes from here.
//! Invariants: An `Expr` never holds another `Expr`; nesting is resolved at construction.
//! Invariants: Markers in `text` equal `args.len()` whenever callers supply one marker per argument.

use std::fmt;

use serde::Serialize;

use crate::core::value::Value;

/// Placeholder for one positional argument.
pub const MARKER: char = '?';

/// A flattened statement fragment: text plus its positional arguments.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Expr {
    text: String,
    args: Vec<Value>,
}

/// One argument slot passed to [`Expr::build`].
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Bound as-is; its marker stays in the text.
    Literal(Value),
    /// Spliced in place of its marker, arguments inlined at the same position.
    Fragment(Expr),
}

impl Expr {
    /// Splices `args` into the markers of `template`, left to right.
    ///
    /// Fragments replace their marker with their own text and contribute their
    /// arguments at that position; literals keep the marker. A literal with no
    /// marker left to consume still appends one, so the marker count always
    /// matches the argument count. Surplus markers are left unresolved.
    pub fn build(template: &str, args: Vec<Arg>) -> Expr {
        if args.is_empty() {
            return Expr {
                text: template.to_string(),
                args: Vec::new(),
            };
        }

        let mut text_len = template.len();
        let mut args_len = args.len();
        for arg in &args {
            if let Arg::Fragment(sub) = arg {
                text_len += sub.text.len();
                args_len += sub.args.len();
            }
        }

        let mut text = String::with_capacity(text_len);
        let mut values = Vec::with_capacity(args_len);
        let mut rest = template;

        for arg in args {
            let (head, tail) = match rest.find(MARKER) {
                Some(idx) => (&rest[..idx], &rest[idx + MARKER.len_utf8()..]),
                None => (rest, ""),
            };
            text.push_str(head);
            match arg {
                Arg::Fragment(sub) => {
                    text.push_str(&sub.text);
                    values.extend(sub.args);
                }
                Arg::Literal(value) => {
                    text.push(MARKER);
                    values.push(value);
                }
            }
            rest = tail;
        }
        text.push_str(rest);

        Expr { text, args: values }
    }

    /// Builds the body of an `IN (...)` clause: one marker per item, comma
    /// separated.
    ///
    /// No items yields the empty fragment, so `IN (?)` renders as `IN ()`.
    /// That is left to the caller to avoid.
    pub fn in_list<I>(items: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let args: Vec<Arg> = items.into_iter().map(Into::into).collect();
        match args.len() {
            0 => Expr::default(),
            1 => Expr::build("?", args),
            2 => Expr::build("?, ?", args),
            3 => Expr::build("?, ?, ?", args),
            size => {
                let mut template = String::with_capacity(size * 3 - 2);
                template.push(MARKER);
                for _ in 1..size {
                    template.push_str(", ?");
                }
                Expr::build(&template, args)
            }
        }
    }

    pub(crate) fn from_parts(text: String, args: Vec<Value>) -> Expr {
        Expr { text, args }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.args.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.args)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Arg::Fragment(expr)
    }
}

impl From<&Expr> for Arg {
    fn from(expr: &Expr) -> Self {
        Arg::Fragment(expr.clone())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Literal(value)
    }
}

macro_rules! arg_from_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Literal(Value::from(value))
                }
            }
        )*
    };
}

arg_from_literal!(i8, i16, i32, i64, u8, u16, u32, bool, f32, f64, String, &str, Vec<u8>, &[u8]);

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Arg::Literal(value.into())
    }
}

/// Builds an [`Expr`] from a template and any mix of literals and fragments.
///
/// ```
/// use sqlh::{sql, Expr, Value};
///
/// let ids = Expr::in_list([1, 2, 3]);
/// let query = sql!("SELECT * FROM t WHERE id IN (?)", ids);
/// assert_eq!(query.text(), "SELECT * FROM t WHERE id IN (?, ?, ?)");
/// assert_eq!(query.args(), &[Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
/// ```
#[macro_export]
macro_rules! sql {
    ($template:expr $(,)?) => {
        $crate::Expr::build($template, ::std::vec::Vec::new())
    };
    ($template:expr, $($arg:expr),+ $(,)?) => {
        $crate::Expr::build($template, ::std::vec![$($crate::Arg::from($arg)),+])
    };
}
