// Std.Time: instants and durations backed by chrono.

use super::{LibraryModule, arg, i64_arg, mismatch, str_arg};
use crate::fault::RuntimeFault;
use crate::types::Type;
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};

fn datetime_arg(args: &[Value], index: usize) -> Result<DateTime<Utc>, RuntimeFault> {
    match arg(args, index)? {
        Value::DateTime(t) => Ok(*t),
        other => Err(mismatch(other, "datetime")),
    }
}

fn duration_arg(args: &[Value], index: usize) -> Result<Duration, RuntimeFault> {
    match arg(args, index)? {
        Value::Duration(d) => Ok(*d),
        other => Err(mismatch(other, "duration")),
    }
}

pub(super) fn time_module() -> LibraryModule {
    let constructors: [(&str, fn(i64) -> Option<Duration>); 5] = [
        ("millis", Duration::try_milliseconds),
        ("seconds", Duration::try_seconds),
        ("minutes", Duration::try_minutes),
        ("hours", Duration::try_hours),
        ("days", Duration::try_days),
    ];

    let mut builder = LibraryModule::builder("time", "Std.Time")
        .function("now", &[], Type::DateTime, |_| Ok(Value::DateTime(Utc::now())))
        .function("from_unix", &[Type::I64], Type::DateTime, |args| {
            DateTime::from_timestamp(i64_arg(args, 0)?, 0)
                .map(Value::DateTime)
                .ok_or_else(RuntimeFault::overflow)
        })
        .function("to_unix", &[Type::DateTime], Type::I64, |args| {
            Ok(Value::I64(datetime_arg(args, 0)?.timestamp()))
        })
        .function("parse", &[Type::Str], Type::DateTime, |args| {
            let text = str_arg(args, 0)?;
            DateTime::parse_from_rfc3339(text)
                .map(|t| Value::DateTime(t.with_timezone(&Utc)))
                .map_err(|e| {
                    RuntimeFault::new(format!(
                        "String '{}' was not recognized as a valid DateTime: {}.",
                        text, e
                    ))
                })
        })
        .function("format", &[Type::DateTime, Type::Str], Type::Str, |args| {
            let instant = datetime_arg(args, 0)?;
            let pattern = str_arg(args, 1)?;
            let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Err(RuntimeFault::new(format!(
                    "Input string '{}' is not a valid format specifier.",
                    pattern
                )));
            }
            Ok(Value::Str(instant.format_with_items(items.into_iter()).to_string()))
        })
        .function("total_seconds", &[Type::Duration], Type::I64, |args| {
            Ok(Value::I64(duration_arg(args, 0)?.num_seconds()))
        })
        .function("total_millis", &[Type::Duration], Type::I64, |args| {
            Ok(Value::I64(duration_arg(args, 0)?.num_milliseconds()))
        })
        .function("elapsed_since", &[Type::DateTime], Type::Duration, |args| {
            Ok(Value::Duration(Utc::now() - datetime_arg(args, 0)?))
        });

    for (name, make) in constructors {
        builder = builder.function(name, &[Type::I64], Type::Duration, move |args| {
            make(i64_arg(args, 0)?)
                .map(Value::Duration)
                .ok_or_else(RuntimeFault::overflow)
        });
    }

    builder.build()
}
