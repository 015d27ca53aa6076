// Data-handling modules: Std.Text.Regex, Std.Uuid, Std.Json, Std.Io.

use super::{LibraryModule, arg, i32_result, mismatch, str_arg};
use crate::fault::RuntimeFault;
use crate::types::Type;
use crate::value::Value;
use regex::Regex;
use serde_json::Value as Json;
use std::fs;
use std::io::Write;
use uuid::Uuid;

fn compile_pattern(pattern: &str) -> Result<Regex, RuntimeFault> {
    Regex::new(pattern)
        .map_err(|e| RuntimeFault::new(format!("Invalid pattern '{}': {}", pattern, e)))
}

pub(super) fn regex_module() -> LibraryModule {
    LibraryModule::builder("regex", "Std.Text.Regex")
        .function("is_match", &[Type::Str, Type::Str], Type::Bool, |args| {
            let re = compile_pattern(str_arg(args, 1)?)?;
            Ok(Value::Bool(re.is_match(str_arg(args, 0)?)))
        })
        .function("find", &[Type::Str, Type::Str], Type::Str, |args| {
            let re = compile_pattern(str_arg(args, 1)?)?;
            let found = re.find(str_arg(args, 0)?).map(|m| m.as_str()).unwrap_or("");
            Ok(Value::from(found))
        })
        .function("replace", &[Type::Str, Type::Str, Type::Str], Type::Str, |args| {
            let re = compile_pattern(str_arg(args, 1)?)?;
            let replaced = re.replace_all(str_arg(args, 0)?, str_arg(args, 2)?);
            Ok(Value::Str(replaced.into_owned()))
        })
        .function("count", &[Type::Str, Type::Str], Type::I32, |args| {
            let re = compile_pattern(str_arg(args, 1)?)?;
            i32_result(re.find_iter(str_arg(args, 0)?).count())
        })
        .build()
}

fn uuid_arg(args: &[Value], index: usize) -> Result<Uuid, RuntimeFault> {
    match arg(args, index)? {
        Value::Uuid(u) => Ok(*u),
        other => Err(mismatch(other, "uuid")),
    }
}

pub(super) fn uuid_module() -> LibraryModule {
    LibraryModule::builder("uuid", "Std.Uuid")
        .function("new", &[], Type::Uuid, |_| Ok(Value::Uuid(Uuid::new_v4())))
        .function("nil", &[], Type::Uuid, |_| Ok(Value::Uuid(Uuid::nil())))
        .function("parse", &[Type::Str], Type::Uuid, |args| {
            Uuid::parse_str(str_arg(args, 0)?)
                .map(Value::Uuid)
                .map_err(|e| RuntimeFault::new(format!("Unrecognized Guid format: {}.", e)))
        })
        .function("version", &[Type::Uuid], Type::I32, |args| {
            i32_result(uuid_arg(args, 0)?.get_version_num())
        })
        .build()
}

// `key` is either a top-level property name or a JSON pointer (`/a/0/b`).
fn json_property(args: &[Value]) -> Result<Json, RuntimeFault> {
    let document: Json = serde_json::from_str(str_arg(args, 0)?)
        .map_err(|e| RuntimeFault::new(format!("Invalid JSON document: {}", e)))?;
    let key = str_arg(args, 1)?;
    let found = if key.starts_with('/') {
        document.pointer(key)
    } else {
        document.get(key)
    };
    found
        .cloned()
        .ok_or_else(|| RuntimeFault::new(format!("Property '{}' was not found.", key)))
}

fn wrong_kind(args: &[Value], kind: &str) -> RuntimeFault {
    let key = str_arg(args, 1).unwrap_or_default();
    RuntimeFault::new(format!("Property '{}' is not {}.", key, kind))
}

pub(super) fn json_module() -> LibraryModule {
    LibraryModule::builder("json", "Std.Json")
        .function("is_valid", &[Type::Str], Type::Bool, |args| {
            Ok(Value::Bool(serde_json::from_str::<Json>(str_arg(args, 0)?).is_ok()))
        })
        .function("get_string", &[Type::Str, Type::Str], Type::Str, |args| {
            match json_property(args)? {
                Json::String(s) => Ok(Value::Str(s)),
                _ => Err(wrong_kind(args, "a string")),
            }
        })
        .function("get_i64", &[Type::Str, Type::Str], Type::I64, |args| {
            json_property(args)?
                .as_i64()
                .map(Value::I64)
                .ok_or_else(|| wrong_kind(args, "an integer"))
        })
        .function("get_f64", &[Type::Str, Type::Str], Type::F64, |args| {
            json_property(args)?
                .as_f64()
                .map(Value::F64)
                .ok_or_else(|| wrong_kind(args, "a number"))
        })
        .function("get_bool", &[Type::Str, Type::Str], Type::Bool, |args| {
            json_property(args)?
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| wrong_kind(args, "a boolean"))
        })
        .function("quote", &[Type::Str], Type::Str, |args| {
            serde_json::to_string(str_arg(args, 0)?)
                .map(Value::Str)
                .map_err(|e| RuntimeFault::new(e.to_string()))
        })
        .build()
}

fn io_fault(action: &str, path: &str, err: std::io::Error) -> RuntimeFault {
    RuntimeFault::new(format!("Could not {} file '{}': {}", action, path, err))
}

pub(super) fn io_module() -> LibraryModule {
    LibraryModule::builder("io", "Std.Io")
        .function("read_text", &[Type::Str], Type::Str, |args| {
            let path = str_arg(args, 0)?;
            fs::read_to_string(path)
                .map(Value::Str)
                .map_err(|e| io_fault("read", path, e))
        })
        .function("write_text", &[Type::Str, Type::Str], Type::Unit, |args| {
            let path = str_arg(args, 0)?;
            fs::write(path, str_arg(args, 1)?)
                .map(|_| Value::Unit)
                .map_err(|e| io_fault("write", path, e))
        })
        .function("append_text", &[Type::Str, Type::Str], Type::Unit, |args| {
            let path = str_arg(args, 0)?;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| io_fault("open", path, e))?;
            file.write_all(str_arg(args, 1)?.as_bytes())
                .map(|_| Value::Unit)
                .map_err(|e| io_fault("append to", path, e))
        })
        .function("exists", &[Type::Str], Type::Bool, |args| {
            Ok(Value::Bool(std::path::Path::new(str_arg(args, 0)?).exists()))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_counts_and_rejects_bad_patterns() {
        let regex = regex_module();
        let count = regex.function("count").unwrap();
        assert_eq!(count.call(&["a1b22c333".into(), r"\d+".into()]).unwrap(), Value::I32(3));
        let fault = count.call(&["abc".into(), "(".into()]).unwrap_err();
        assert!(fault.message().starts_with("Invalid pattern '('"));
    }

    #[test]
    fn json_reads_properties_and_pointers() {
        let json = json_module();
        let doc: Value = r#"{"name":"snippet","tags":[{"id":7}]}"#.into();
        let name = json.function("get_string").unwrap().call(&[doc.clone(), "name".into()]);
        assert_eq!(name.unwrap(), Value::from("snippet"));
        let id = json.function("get_i64").unwrap().call(&[doc.clone(), "/tags/0/id".into()]);
        assert_eq!(id.unwrap(), Value::I64(7));
        let missing = json.function("get_bool").unwrap().call(&[doc, "flag".into()]);
        assert_eq!(missing.unwrap_err().message(), "Property 'flag' was not found.");
    }

    #[test]
    fn uuid_parse_and_version() {
        let uuid = uuid_module();
        let parsed = uuid
            .function("parse")
            .unwrap()
            .call(&["67e55044-10b1-426f-9247-bb680e5fe0c8".into()])
            .unwrap();
        assert_eq!(uuid.function("version").unwrap().call(&[parsed]).unwrap(), Value::I32(4));
        assert!(uuid.function("parse").unwrap().call(&["nope".into()]).is_err());
    }

    #[test]
    fn io_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt").to_string_lossy().to_string();
        let io = io_module();
        io.function("write_text").unwrap().call(&[path.as_str().into(), "one".into()]).unwrap();
        io.function("append_text").unwrap().call(&[path.as_str().into(), "two".into()]).unwrap();
        let text = io.function("read_text").unwrap().call(&[path.as_str().into()]).unwrap();
        assert_eq!(text, Value::from("onetwo"));
    }
}
