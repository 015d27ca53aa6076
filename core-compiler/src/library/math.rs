// Std.Math: floating point helpers.

use super::{LibraryModule, f64_arg};
use crate::types::Type;
use crate::value::Value;

pub(super) fn math_module() -> LibraryModule {
    let unary: [(&str, fn(f64) -> f64); 7] = [
        ("sqrt", f64::sqrt),
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", f64::round),
        ("sin", f64::sin),
        ("cos", f64::cos),
    ];
    let binary: [(&str, fn(f64, f64) -> f64); 3] =
        [("pow", f64::powf), ("min", f64::min), ("max", f64::max)];

    let mut builder = LibraryModule::builder("math", "Std.Math");
    for (name, op) in unary {
        builder = builder.function(name, &[Type::F64], Type::F64, move |args| {
            Ok(Value::F64(op(f64_arg(args, 0)?)))
        });
    }
    for (name, op) in binary {
        builder = builder.function(name, &[Type::F64, Type::F64], Type::F64, move |args| {
            Ok(Value::F64(op(f64_arg(args, 0)?, f64_arg(args, 1)?)))
        });
    }
    builder
        .function("pi", &[], Type::F64, |_| Ok(Value::F64(std::f64::consts::PI)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_and_sqrt() {
        let math = math_module();
        let pow = math.function("pow").unwrap();
        assert_eq!(pow.call(&[Value::F64(2.0), Value::F64(10.0)]).unwrap(), Value::F64(1024.0));
        let sqrt = math.function("sqrt").unwrap();
        assert_eq!(sqrt.call(&[Value::F64(9.0)]).unwrap(), Value::F64(3.0));
        assert_eq!(sqrt.params, vec![Type::F64]);
    }
}
