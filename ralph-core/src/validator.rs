//! Structural schema validation, decoupled from the catalog itself (spec
//! §9 "schemas decoupled from the validator implementation").

use ralph_kernel::schema_catalog::{SchemaCatalog, SchemaType};
use serde_json::Value;

use crate::error::{EngineError, Result};

pub fn validate(catalog: &SchemaCatalog, schema_key: &str, payload: &Value) -> Result<()> {
    let schema = catalog
        .get(schema_key)
        .ok_or_else(|| EngineError::UnknownSchema {
            schema_key: schema_key.to_string(),
        })?;
    validate_value(schema, payload).map_err(|detail| EngineError::SchemaValidation {
        schema_key: schema_key.to_string(),
        detail,
    })
}

fn validate_value(schema: &SchemaType, value: &Value) -> std::result::Result<(), String> {
    match schema {
        SchemaType::String => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("expected string, got {value}"))
            }
        }
        SchemaType::Number => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("expected number, got {value}"))
            }
        }
        SchemaType::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("expected bool, got {value}"))
            }
        }
        SchemaType::Enum(variants) => match value.as_str() {
            Some(s) if variants.contains(&s) => Ok(()),
            Some(s) => Err(format!("`{s}` is not one of {variants:?}")),
            None => Err(format!("expected an enum string, got {value}")),
        },
        SchemaType::Nullable(inner) => {
            if value.is_null() {
                Ok(())
            } else {
                validate_value(inner, value)
            }
        }
        SchemaType::List(inner) => match value.as_array() {
            Some(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| validate_value(inner, item).map_err(|e| format!("[{i}]: {e}"))),
            None => Err(format!("expected a list, got {value}")),
        },
        SchemaType::Record(fields) => match value.as_object() {
            Some(obj) => {
                for (name, field_schema) in fields {
                    let field_value = obj.get(*name).ok_or_else(|| {
                        format!("missing required field `{name}` (use nullable, not optional)")
                    })?;
                    validate_value(field_schema, field_value)
                        .map_err(|e| format!("field `{name}`: {e}"))?;
                }
                Ok(())
            }
            None => Err(format!("expected a record, got {value}")),
        },
        SchemaType::Union(variants) => {
            if variants.iter().any(|v| validate_value(v, value).is_ok()) {
                Ok(())
            } else {
                Err(format!("value matched none of {} union variants", variants.len()))
            }
        }
    }
}
