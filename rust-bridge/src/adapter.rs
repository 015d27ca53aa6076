// Callable adaptation: bind an entry point to a fixed-arity callable.
//
// The arity of a snippet function is only known after compilation, so the
// shape is picked by a runtime match over the parameter count into one of a
// closed set of variants. Each variant stores its typed slots and a thunk that
// runs the bound function.

use crate::catalog::EntryPoint;
use crate::error::AdaptError;
use crate::signature::{MAX_PARAMETERS, SignatureValidator, ValidationFailure};
use chrono::{DateTime, Duration, Utc};
use snippet_compiler::{RuntimeFault, Type, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Generic slots of the widest callable: 16 inputs plus the output.
pub const MAX_SLOTS: usize = MAX_PARAMETERS + 1;

type Thunk = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeFault> + Send + Sync>;

/// A callable taking exactly `N` arguments.
#[derive(Clone)]
pub struct Shape<const N: usize> {
    name: String,
    params: [Type; N],
    ret: Type,
    thunk: Thunk,
}

impl<const N: usize> Shape<N> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Type; N] {
        &self.params
    }

    pub fn ret(&self) -> &Type {
        &self.ret
    }

    pub fn call(&self, args: [Value; N]) -> Result<Value, RuntimeFault> {
        self.call_slice(&args)
    }

    fn call_slice(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
        if args.len() != N {
            return Err(RuntimeFault::new("Parameter count mismatch."));
        }
        for (arg, ty) in args.iter().zip(&self.params) {
            if !arg.conforms_to(ty) {
                return Err(RuntimeFault::new(format!(
                    "Object of type '{}' cannot be converted to type '{}'.",
                    arg.type_of(),
                    ty
                )));
            }
        }
        (self.thunk)(args)
    }
}

macro_rules! callable_shapes {
    ($($variant:ident => $n:literal),* $(,)?) => {
        /// Callable bound to one entry point, one variant per arity.
        #[derive(Clone)]
        pub enum Callable {
            $($variant(Shape<$n>),)*
        }

        impl Callable {
            pub fn arity(&self) -> usize {
                match self {
                    $(Callable::$variant(_) => $n,)*
                }
            }

            pub fn name(&self) -> &str {
                match self {
                    $(Callable::$variant(shape) => shape.name(),)*
                }
            }

            pub fn parameter_types(&self) -> &[Type] {
                match self {
                    $(Callable::$variant(shape) => shape.params(),)*
                }
            }

            pub fn return_type(&self) -> &Type {
                match self {
                    $(Callable::$variant(shape) => shape.ret(),)*
                }
            }

            /// Run with loosely counted arguments; count and types are checked
            /// against the fixed slots first.
            pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeFault> {
                match self {
                    $(Callable::$variant(shape) => shape.call_slice(args),)*
                }
            }

            fn bind(name: String, params: Vec<Type>, ret: Type, thunk: Thunk) -> Option<Callable> {
                let callable = match params.len() {
                    $($n => Callable::$variant(Shape {
                        name,
                        params: params.try_into().ok()?,
                        ret,
                        thunk,
                    }),)*
                    _ => return None,
                };
                Some(callable)
            }
        }
    };
}

callable_shapes! {
    Fn0 => 0,
    Fn1 => 1,
    Fn2 => 2,
    Fn3 => 3,
    Fn4 => 4,
    Fn5 => 5,
    Fn6 => 6,
    Fn7 => 7,
    Fn8 => 8,
    Fn9 => 9,
    Fn10 => 10,
    Fn11 => 11,
    Fn12 => 12,
    Fn13 => 13,
    Fn14 => 14,
    Fn15 => 15,
    Fn16 => 16,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({}: {})", self.name(), shape_text(self.parameter_types(), self.return_type()))
    }
}

fn shape_text(params: &[Type], ret: &Type) -> String {
    let params: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("fn({}) -> {}", params.join(", "), ret)
}

/// Build a callable for `entry`. Every call is independent; adapting the same
/// entry point twice gives two interchangeable callables.
pub fn adapt(entry: &EntryPoint) -> Result<Callable, AdaptError> {
    let name = entry.qualified_name();
    if let Some(failure) = SignatureValidator.validate(entry).failure() {
        return Err(match failure {
            ValidationFailure::TooManyParameters { count } => AdaptError::ArityExceeded {
                entry_point: name,
                count: *count,
                max: MAX_PARAMETERS,
            },
            other => AdaptError::UnsupportedShape {
                entry_point: name,
                reason: other.to_string(),
            },
        });
    }

    // Parameters then the return type, one generic slot each
    let mut slots: Vec<Type> = entry.parameter_types().to_vec();
    slots.push(entry.return_type().clone());
    if slots.len() > MAX_SLOTS {
        return Err(AdaptError::ArityExceeded {
            entry_point: name,
            count: slots.len() - 1,
            max: MAX_PARAMETERS,
        });
    }
    let ret = slots.pop().unwrap_or(Type::Unit);

    let unit = Arc::clone(entry.unit());
    let index = entry.index();
    let target = name.clone();
    let thunk: Thunk = Arc::new(move |args: &[Value]| {
        unit.invoke(index, args)
            .map_err(|fault| RuntimeFault::wrap(format!("Invocation of '{}' failed.", target), fault))
    });

    let count = slots.len();
    debug!(entry_point = %name, arity = count, "adapted entry point");
    Callable::bind(name.clone(), slots, ret, thunk).ok_or(AdaptError::ArityExceeded {
        entry_point: name,
        count,
        max: MAX_PARAMETERS,
    })
}

// ============================================================================
// Strongly typed shapes
// ============================================================================

/// Host types that map one-to-one onto a whitelisted snippet type.
pub trait Primitive: Sized + Into<Value> {
    fn snippet_type() -> Type;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! primitives {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                fn snippet_type() -> Type {
                    Type::$variant
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

primitives! {
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
    DateTime<Utc> => DateTime,
    Duration => Duration,
    Uuid => Uuid,
}

/// A function-pointer type naming an expected callable shape,
/// e.g. `fn(i32, i32) -> i32`.
pub trait Signature {
    type Args;
    type Output: Primitive;

    fn parameter_types() -> Vec<Type>;
    fn into_values(args: Self::Args) -> Vec<Value>;
}

macro_rules! signature {
    ($($arg:ident $val:ident),*) => {
        impl<R: Primitive, $($arg: Primitive),*> Signature for fn($($arg),*) -> R {
            type Args = ($($arg,)*);
            type Output = R;

            fn parameter_types() -> Vec<Type> {
                vec![$($arg::snippet_type()),*]
            }

            fn into_values(args: Self::Args) -> Vec<Value> {
                let ($($val,)*) = args;
                vec![$($val.into()),*]
            }
        }
    };
}

signature!();
signature!(A a);
signature!(A a, B b);
signature!(A a, B b, C c);
signature!(A a, B b, C c, D d);
signature!(A a, B b, C c, D d, E e);
signature!(A a, B b, C c, D d, E e, F f);
signature!(A a, B b, C c, D d, E e, F f, G g);
signature!(A a, B b, C c, D d, E e, F f, G g, H h);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l, M m);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l, M m, N n);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l, M m, N n, O o);
signature!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l, M m, N n, O o, P p);

/// A callable whose shape was checked against `S` at adaptation time.
pub struct Typed<S: Signature> {
    callable: Callable,
    shape: PhantomData<fn() -> S>,
}

impl<S: Signature> Clone for Typed<S> {
    fn clone(&self) -> Self {
        Self {
            callable: self.callable.clone(),
            shape: PhantomData,
        }
    }
}

impl<S: Signature> fmt::Debug for Typed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Typed").field(&self.callable).finish()
    }
}

impl<S: Signature> Typed<S> {
    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn call(&self, args: S::Args) -> Result<S::Output, RuntimeFault> {
        let value = self.callable.call(&S::into_values(args))?;
        let actual = value.type_of();
        <S::Output as Primitive>::from_value(value).ok_or_else(|| {
            RuntimeFault::new(format!(
                "Object of type '{}' cannot be converted to type '{}'.",
                actual,
                <S::Output as Primitive>::snippet_type()
            ))
        })
    }
}

/// Adapt `entry` and require it to have exactly the shape `S`.
pub fn adapt_typed<S: Signature>(entry: &EntryPoint) -> Result<Typed<S>, AdaptError> {
    let callable = adapt(entry)?;
    let params = S::parameter_types();
    let ret = <S::Output as Primitive>::snippet_type();

    if callable.parameter_types() != params.as_slice() || *callable.return_type() != ret {
        return Err(AdaptError::CastMismatch {
            entry_point: entry.qualified_name(),
            requested: shape_text(&params, &ret),
            actual: shape_text(callable.parameter_types(), callable.return_type()),
        });
    }

    Ok(Typed {
        callable,
        shape: PhantomData,
    })
}
