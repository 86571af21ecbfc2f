//! Field accessors shared by the node and expression loaders.
//!
//! Every accessor treats an absent key as [`PlanError::MissingField`] and a
//! present key of the wrong shape as [`PlanError::InvalidField`]. Explicit
//! JSON `null` counts as absent for required fields.

use serde_json::{Map, Value as Json};

use crate::error::{PlanError, Result};

/// JSON object type used for every serialized node and expression.
pub type JsonObject = Map<String, Json>;

pub(crate) fn required<'a>(
    obj: &'a JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<&'a Json> {
    match obj.get(field) {
        None | Some(Json::Null) => Err(PlanError::missing(context, field)),
        Some(value) => Ok(value),
    }
}

pub(crate) fn optional<'a>(obj: &'a JsonObject, field: &'static str) -> Option<&'a Json> {
    obj.get(field).filter(|value| !value.is_null())
}

pub(crate) fn required_str<'a>(
    obj: &'a JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<&'a str> {
    required(obj, context, field)?
        .as_str()
        .ok_or_else(|| PlanError::invalid(context, field, "a string"))
}

pub(crate) fn required_u64(
    obj: &JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<u64> {
    required(obj, context, field)?
        .as_u64()
        .ok_or_else(|| PlanError::invalid(context, field, "a non-negative integer"))
}

pub(crate) fn required_bool(
    obj: &JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<bool> {
    required(obj, context, field)?
        .as_bool()
        .ok_or_else(|| PlanError::invalid(context, field, "a boolean"))
}

pub(crate) fn required_array<'a>(
    obj: &'a JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<&'a Vec<Json>> {
    required(obj, context, field)?
        .as_array()
        .ok_or_else(|| PlanError::invalid(context, field, "an array"))
}

pub(crate) fn required_object<'a>(
    obj: &'a JsonObject,
    context: &'static str,
    field: &'static str,
) -> Result<&'a JsonObject> {
    required(obj, context, field)?
        .as_object()
        .ok_or_else(|| PlanError::invalid(context, field, "an object"))
}

/// Narrows an array element to an object.
pub(crate) fn element_object<'a>(
    value: &'a Json,
    context: &'static str,
    field: &'static str,
) -> Result<&'a JsonObject> {
    value
        .as_object()
        .ok_or_else(|| PlanError::invalid(context, field, "an array of objects"))
}
