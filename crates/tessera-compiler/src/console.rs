//! `console` for behavior scripts, forwarded to tracing.

use std::fmt::Write;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

#[derive(Debug, Clone, Copy)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Install `console` into the global object.
pub fn install_console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    for (name, level) in [
        ("log", Level::Info),
        ("info", Level::Info),
        ("warn", Level::Warn),
        ("error", Level::Error),
        ("debug", Level::Debug),
    ] {
        let function = Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| {
            emit(level, &ctx, &args.0);
        })?;
        console.set(name, function)?;
    }

    ctx.globals().set("console", console)?;
    Ok(())
}

fn emit<'js>(level: Level, ctx: &Ctx<'js>, values: &[Value<'js>]) {
    let mut output = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        format_value(&mut output, ctx, value);
    }

    match level {
        Level::Debug => tracing::debug!("[script] {}", output),
        Level::Info => tracing::info!("[script] {}", output),
        Level::Warn => tracing::warn!("[script] {}", output),
        Level::Error => tracing::error!("[script] {}", output),
    }
}

fn format_value<'js>(out: &mut String, ctx: &Ctx<'js>, value: &Value<'js>) {
    if value.is_undefined() {
        out.push_str("undefined");
    } else if value.is_null() {
        out.push_str("null");
    } else if let Some(b) = value.as_bool() {
        write!(out, "{b}").ok();
    } else if let Some(n) = value.as_int() {
        write!(out, "{n}").ok();
    } else if let Some(n) = value.as_float() {
        write!(out, "{n}").ok();
    } else if let Some(s) = value.as_string() {
        if let Ok(s) = s.to_string() {
            out.push_str(&s);
        }
    } else if value.is_function() {
        out.push_str("[Function]");
    } else {
        match ctx.json_stringify(value.clone()) {
            Ok(Some(json)) => match json.to_string() {
                Ok(json) => out.push_str(&json),
                Err(_) => out.push_str("[Object]"),
            },
            _ => out.push_str("[Object]"),
        }
    }
}
