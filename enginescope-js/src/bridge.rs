//! Bidirectional conversion between serde_json::Value and rquickjs Value
//!
//! Script inputs and outputs cross the engine boundary as JSON.

use crate::error::JsError;
use rquickjs::{Ctx, Value};

/// Convert a serde_json::Value into a rquickjs Value by round-tripping through JSON.parse()
pub fn json_to_js<'js>(
    ctx: &Ctx<'js>,
    value: &serde_json::Value,
) -> std::result::Result<Value<'js>, JsError> {
    let json_str =
        serde_json::to_string(value).map_err(|e| JsError::type_conversion(e.to_string()))?;

    ctx.json_parse(json_str)
        .map_err(|e| JsError::type_conversion(format!("JSON.parse failed: {}", e)))
}

/// Convert a rquickjs Value back to serde_json::Value by round-tripping through JSON.stringify()
///
/// - undefined and functions are converted to null
/// - All other types go through JSON.stringify -> serde_json::from_str
pub fn js_to_json<'js>(
    ctx: &Ctx<'js>,
    value: Value<'js>,
) -> std::result::Result<serde_json::Value, JsError> {
    if value.is_undefined() || value.is_null() || value.is_function() {
        return Ok(serde_json::Value::Null);
    }

    match ctx.json_stringify(value) {
        Ok(Some(js_string)) => {
            let s: String = js_string
                .to_string()
                .map_err(|e| JsError::type_conversion(format!("String conversion failed: {}", e)))?;
            serde_json::from_str(&s)
                .map_err(|e| JsError::type_conversion(format!("JSON parse failed: {}", e)))
        }
        // JSON.stringify returns undefined for symbols
        Ok(None) => Ok(serde_json::Value::Null),
        Err(e) => Err(JsError::type_conversion(format!(
            "JSON.stringify failed: {}",
            e
        ))),
    }
}
