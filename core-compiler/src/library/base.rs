// Base modules referenced by every compilation: Std and Std.Text.

use super::{LibraryModule, arg, i32_result, i64_arg, str_arg};
use crate::fault::RuntimeFault;
use crate::types::Type;
use crate::value::Value;

const BAD_FORMAT: &str = "Input string was not in a correct format.";

pub(super) fn std_module() -> LibraryModule {
    LibraryModule::builder("std", "Std")
        .function("to_string", &[Type::Any], Type::Str, |args| {
            Ok(Value::Str(arg(args, 0)?.to_string()))
        })
        .function("len", &[Type::Any], Type::I32, |args| match arg(args, 0)? {
            Value::Str(s) => i32_result(s.chars().count()),
            Value::List(items) => i32_result(items.len()),
            other => Err(RuntimeFault::new(format!(
                "Value of type '{}' has no length.",
                other.type_of()
            ))),
        })
        .function("parse_i32", &[Type::Str], Type::I32, |args| {
            let text = str_arg(args, 0)?.trim();
            text.parse::<i32>().map(Value::I32).map_err(|_| RuntimeFault::new(BAD_FORMAT))
        })
        .function("parse_i64", &[Type::Str], Type::I64, |args| {
            let text = str_arg(args, 0)?.trim();
            text.parse::<i64>().map(Value::I64).map_err(|_| RuntimeFault::new(BAD_FORMAT))
        })
        .function("parse_f64", &[Type::Str], Type::F64, |args| {
            let text = str_arg(args, 0)?.trim();
            text.parse::<f64>().map(Value::F64).map_err(|_| RuntimeFault::new(BAD_FORMAT))
        })
        .function("print", &[Type::Any], Type::Unit, |args| {
            println!("{}", arg(args, 0)?);
            Ok(Value::Unit)
        })
        .build()
}

pub(super) fn text_module() -> LibraryModule {
    LibraryModule::builder("text", "Std.Text")
        .function("upper", &[Type::Str], Type::Str, |args| {
            Ok(Value::Str(str_arg(args, 0)?.to_uppercase()))
        })
        .function("lower", &[Type::Str], Type::Str, |args| {
            Ok(Value::Str(str_arg(args, 0)?.to_lowercase()))
        })
        .function("trim", &[Type::Str], Type::Str, |args| {
            Ok(Value::Str(str_arg(args, 0)?.trim().to_string()))
        })
        .function("contains", &[Type::Str, Type::Str], Type::Bool, |args| {
            Ok(Value::Bool(str_arg(args, 0)?.contains(str_arg(args, 1)?)))
        })
        .function("starts_with", &[Type::Str, Type::Str], Type::Bool, |args| {
            Ok(Value::Bool(str_arg(args, 0)?.starts_with(str_arg(args, 1)?)))
        })
        .function("ends_with", &[Type::Str, Type::Str], Type::Bool, |args| {
            Ok(Value::Bool(str_arg(args, 0)?.ends_with(str_arg(args, 1)?)))
        })
        .function("replace", &[Type::Str, Type::Str, Type::Str], Type::Str, |args| {
            let from = str_arg(args, 1)?;
            if from.is_empty() {
                return Err(RuntimeFault::new("String cannot be of zero length."));
            }
            Ok(Value::Str(str_arg(args, 0)?.replace(from, str_arg(args, 2)?)))
        })
        .function("substring", &[Type::Str, Type::I32, Type::I32], Type::Str, |args| {
            let chars: Vec<char> = str_arg(args, 0)?.chars().collect();
            let start = i64_arg(args, 1)?;
            let len = i64_arg(args, 2)?;
            if start < 0 || len < 0 || (start + len) as usize > chars.len() {
                return Err(RuntimeFault::new(
                    "Index and length must refer to a location within the string.",
                ));
            }
            let (start, len) = (start as usize, len as usize);
            Ok(Value::Str(chars[start..start + len].iter().collect()))
        })
        .function("repeat", &[Type::Str, Type::I32], Type::Str, |args| {
            let count = usize::try_from(i64_arg(args, 1)?)
                .map_err(|_| RuntimeFault::new("Count cannot be negative."))?;
            Ok(Value::Str(str_arg(args, 0)?.repeat(count)))
        })
        .function("reverse", &[Type::Str], Type::Str, |args| {
            Ok(Value::Str(str_arg(args, 0)?.chars().rev().collect()))
        })
        .function("split", &[Type::Str, Type::Str], Type::List(Box::new(Type::Str)), |args| {
            let text = str_arg(args, 0)?;
            let sep = str_arg(args, 1)?;
            let parts = if sep.is_empty() {
                vec![Value::from(text)]
            } else {
                text.split(sep).map(Value::from).collect()
            };
            Ok(Value::List(parts))
        })
        .function("join", &[Type::List(Box::new(Type::Str)), Type::Str], Type::Str, |args| {
            let items = arg(args, 0)?
                .as_list()
                .ok_or_else(|| RuntimeFault::new("Expected a list of strings."))?;
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            Ok(Value::Str(parts.join(str_arg(args, 1)?)))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: &LibraryModule, name: &str, args: &[Value]) -> Result<Value, RuntimeFault> {
        module.function(name).unwrap().call(args)
    }

    #[test]
    fn parse_reports_format_errors() {
        let std = std_module();
        assert_eq!(call(&std, "parse_i32", &["42".into()]).unwrap(), Value::I32(42));
        let fault = call(&std, "parse_i32", &["forty".into()]).unwrap_err();
        assert_eq!(fault.message(), BAD_FORMAT);
    }

    #[test]
    fn substring_counts_characters() {
        let text = text_module();
        let out = call(&text, "substring", &["héllo".into(), Value::I32(1), Value::I32(3)]).unwrap();
        assert_eq!(out, Value::from("éll"));
        assert!(call(&text, "substring", &["abc".into(), Value::I32(2), Value::I32(5)]).is_err());
    }

    #[test]
    fn split_then_join() {
        let text = text_module();
        let parts = call(&text, "split", &["a,b,c".into(), ",".into()]).unwrap();
        assert_eq!(parts.as_list().map(|p| p.len()), Some(3));
        let joined = call(&text, "join", &[parts, "-".into()]).unwrap();
        assert_eq!(joined, Value::from("a-b-c"));
    }
}
