use std::collections::HashMap;

use serde_json::{Map, Value as Json};
use zbus::zvariant::{Array, Dict, ObjectPath, Signature, Structure, StructureBuilder, Value};

use crate::errors::GatewayError;

// -----------------------------------------------------------------------------
// ----- JSON -> bus -----------------------------------------------------------

/// Guesses a bus type for each JSON value: booleans stay booleans, integers
/// become `i` (or `x`/`t` when out of range), other numbers `d`, strings `s`,
/// homogeneous lists typed arrays, mixed lists `av`, and objects `a{sv}`.
pub fn json_to_value(json: &Json) -> Result<Value<'static>, GatewayError> {
    let value = match json {
        Json::Null => {
            return Err(GatewayError::argument(
                "null has no bus representation",
            ));
        }
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                match i32::try_from(i) {
                    Ok(small) => Value::I32(small),
                    Err(_) => Value::I64(i),
                }
            } else if let Some(u) = n.as_u64() {
                Value::U64(u)
            } else {
                Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        Json::String(s) => Value::from(s.clone()),
        Json::Array(items) => array_to_value(items)?,
        Json::Object(map) => object_to_value(map)?,
    };

    Ok(value)
}

/// Call arguments as a message body. `None` when there are no arguments.
pub fn args_to_structure(args: &[Json]) -> Result<Option<Structure<'static>>, GatewayError> {
    if args.is_empty() {
        return Ok(None);
    }

    let mut builder = StructureBuilder::new();
    for arg in args {
        builder = builder.append_field(json_to_value(arg)?);
    }

    Ok(Some(builder.build()))
}

/// Call arguments converted against the method's declared input types, one
/// complete bus type per argument.
pub fn args_for_signature(
    args: &[Json],
    in_types: &[String],
) -> Result<Option<Structure<'static>>, GatewayError> {
    if args.len() != in_types.len() {
        return Err(GatewayError::argument(format!(
            "method expects {} argument(s) ({}), got {}",
            in_types.len(),
            in_types.concat(),
            args.len()
        )));
    }

    if args.is_empty() {
        return Ok(None);
    }

    let mut builder = StructureBuilder::new();
    for (arg, ty) in args.iter().zip(in_types) {
        builder = builder.append_field(json_to_typed(arg, ty)?);
    }

    Ok(Some(builder.build()))
}

/// Converts one JSON value to the single complete bus type `ty`. Variants
/// wrap a guessed value, see [`json_to_value`].
pub fn json_to_typed(json: &Json, ty: &str) -> Result<Value<'static>, GatewayError> {
    let mismatch = || GatewayError::argument(format!("{json} is not a valid `{ty}` value"));

    let value = match ty {
        "y" => Value::U8(integer(json).ok_or_else(mismatch)?),
        "b" => Value::Bool(json.as_bool().ok_or_else(mismatch)?),
        "n" => Value::I16(integer(json).ok_or_else(mismatch)?),
        "q" => Value::U16(integer(json).ok_or_else(mismatch)?),
        "i" => Value::I32(integer(json).ok_or_else(mismatch)?),
        "u" => Value::U32(integer(json).ok_or_else(mismatch)?),
        "x" => Value::I64(integer(json).ok_or_else(mismatch)?),
        "t" => Value::U64(integer(json).ok_or_else(mismatch)?),
        "d" => Value::F64(json.as_f64().ok_or_else(mismatch)?),
        "s" => Value::from(json.as_str().ok_or_else(mismatch)?.to_string()),
        "o" => {
            let text = json.as_str().ok_or_else(mismatch)?;
            Value::ObjectPath(ObjectPath::try_from(text.to_string()).map_err(|_| mismatch())?)
        }
        "g" => {
            let text = json.as_str().ok_or_else(mismatch)?;
            Value::Signature(Signature::try_from(text.to_string()).map_err(|_| mismatch())?)
        }
        "v" => Value::Value(Box::new(json_to_value(json)?)),
        _ if ty.starts_with("a{") && ty.ends_with('}') => {
            let (key_ty, value_ty) = split_type(&ty[2..ty.len() - 1])?;
            let map = json.as_object().ok_or_else(mismatch)?;
            typed_dict(map, key_ty, value_ty)?
        }
        _ if ty.starts_with('a') => {
            let element_ty = &ty[1..];
            match json {
                // Byte arrays may be sent as text.
                Json::String(text) if element_ty == "y" => Value::from(text.as_bytes().to_vec()),
                Json::Array(items) => typed_array(items, element_ty)?,
                _ => return Err(mismatch()),
            }
        }
        _ if ty.starts_with('(') && ty.ends_with(')') => {
            let items = json.as_array().ok_or_else(mismatch)?;
            let field_types = split_types(&ty[1..ty.len() - 1])?;
            if items.len() != field_types.len() {
                return Err(mismatch());
            }

            let mut builder = StructureBuilder::new();
            for (item, field_ty) in items.iter().zip(&field_types) {
                builder = builder.append_field(json_to_typed(item, field_ty)?);
            }
            Value::Structure(builder.build())
        }
        _ => {
            return Err(GatewayError::argument(format!(
                "bus type `{ty}` cannot be sent from JSON"
            )));
        }
    };

    Ok(value)
}

/// Splits a signature into its complete types, e.g. `sa{sv}(ii)` into
/// `s`, `a{sv}` and `(ii)`.
pub fn split_types(signature: &str) -> Result<Vec<String>, GatewayError> {
    let mut types = Vec::new();
    let mut rest = signature;
    while !rest.is_empty() {
        let len = complete_type_len(rest.as_bytes())
            .ok_or_else(|| GatewayError::argument(format!("malformed signature `{signature}`")))?;
        let (ty, tail) = rest.split_at(len);
        types.push(ty.to_string());
        rest = tail;
    }

    Ok(types)
}

// -----------------------------------------------------------------------------
// ----- bus -> JSON -----------------------------------------------------------

pub fn value_to_json(value: &Value<'_>) -> Json {
    match value {
        Value::U8(v) => Json::from(*v),
        Value::Bool(v) => Json::from(*v),
        Value::I16(v) => Json::from(*v),
        Value::U16(v) => Json::from(*v),
        Value::I32(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I64(v) => Json::from(*v),
        Value::U64(v) => Json::from(*v),
        Value::F64(v) => Json::from(*v),
        Value::Str(s) => Json::String(s.as_str().to_string()),
        Value::Signature(s) => Json::String(s.as_str().to_string()),
        Value::ObjectPath(p) => Json::String(p.as_str().to_string()),
        Value::Value(inner) => value_to_json(inner),
        Value::Array(array) => Json::Array(array.iter().map(value_to_json).collect()),
        Value::Dict(dict) => {
            let mut map = Map::new();
            for (key, value) in dict.iter() {
                let key = match value_to_json(key) {
                    Json::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, value_to_json(value));
            }
            Json::Object(map)
        }
        Value::Structure(structure) => {
            Json::Array(structure.fields().iter().map(value_to_json).collect())
        }
        // File descriptors mean nothing to a remote client.
        #[allow(unreachable_patterns)]
        _ => Json::Null,
    }
}

/// Positional body values of a method reply or signal.
pub fn message_to_json(message: &zbus::Message) -> Result<Vec<Json>, GatewayError> {
    let body = message.body();

    let has_values = body.signature().is_some_and(|sig| !sig.is_empty());
    if !has_values {
        return Ok(Vec::new());
    }

    let structure: Structure<'_> = body
        .deserialize()
        .map_err(|e| GatewayError::bus(format!("cannot decode message body: {e}")))?;

    Ok(structure.fields().iter().map(value_to_json).collect())
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn array_to_value(items: &[Json]) -> Result<Value<'static>, GatewayError> {
    if !items.is_empty() {
        if items.iter().all(Json::is_string) {
            let strings: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            return Ok(Value::from(strings));
        }

        if items.iter().all(Json::is_boolean) {
            let flags: Vec<bool> = items.iter().filter_map(Json::as_bool).collect();
            return Ok(Value::from(flags));
        }

        let small_ints: Vec<i32> = items
            .iter()
            .filter_map(|item| item.as_i64().and_then(|i| i32::try_from(i).ok()))
            .collect();
        if small_ints.len() == items.len() {
            return Ok(Value::from(small_ints));
        }

        if items.iter().all(Json::is_number) {
            let floats: Vec<f64> = items.iter().filter_map(Json::as_f64).collect();
            return Ok(Value::from(floats));
        }
    }

    let variants = items
        .iter()
        .map(json_to_value)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::from(variants))
}

fn typed_array(items: &[Json], element_ty: &str) -> Result<Value<'static>, GatewayError> {
    let mut array = Array::new(owned_signature(element_ty)?);
    for item in items {
        array
            .append(json_to_typed(item, element_ty)?)
            .map_err(|e| GatewayError::argument(format!("cannot build `a{element_ty}`: {e}")))?;
    }

    Ok(Value::Array(array))
}

fn typed_dict(
    map: &Map<String, Json>,
    key_ty: &str,
    value_ty: &str,
) -> Result<Value<'static>, GatewayError> {
    let mut dict = Dict::new(owned_signature(key_ty)?, owned_signature(value_ty)?);
    for (key, value) in map {
        // JSON keys are always text; numeric keys are parsed back.
        let key = match key_ty {
            "s" | "o" | "g" => Json::String(key.clone()),
            _ => serde_json::from_str(key).unwrap_or_else(|_| Json::String(key.clone())),
        };

        dict.append(json_to_typed(&key, key_ty)?, json_to_typed(value, value_ty)?)
            .map_err(|e| {
                GatewayError::argument(format!("cannot build `a{{{key_ty}{value_ty}}}`: {e}"))
            })?;
    }

    Ok(Value::Dict(dict))
}

fn owned_signature(ty: &str) -> Result<Signature<'static>, GatewayError> {
    Signature::try_from(ty.to_string())
        .map_err(|e| GatewayError::argument(format!("malformed signature `{ty}`: {e}")))
}

/// Splits a dict entry body such as `sv` into key and value types.
fn split_type(entry: &str) -> Result<(&str, &str), GatewayError> {
    let key_len = complete_type_len(entry.as_bytes())
        .ok_or_else(|| GatewayError::argument(format!("malformed dict entry `{entry}`")))?;
    let (key, value) = entry.split_at(key_len);
    if value.is_empty() || complete_type_len(value.as_bytes()) != Some(value.len()) {
        return Err(GatewayError::argument(format!("malformed dict entry `{entry}`")));
    }

    Ok((key, value))
}

/// Length in bytes of the first complete type in `sig`.
fn complete_type_len(sig: &[u8]) -> Option<usize> {
    match sig.first()? {
        b'a' => complete_type_len(&sig[1..]).map(|len| len + 1),
        open @ (b'(' | b'{') => {
            let close = if *open == b'(' { b')' } else { b'}' };
            let mut at = 1;
            while *sig.get(at)? != close {
                at += complete_type_len(&sig[at..])?;
            }
            Some(at + 1)
        }
        b')' | b'}' => None,
        _ => Some(1),
    }
}

fn integer<T>(json: &Json) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    json.as_i64()
        .and_then(|i| <T as TryFrom<i64>>::try_from(i).ok())
        .or_else(|| json.as_u64().and_then(|u| <T as TryFrom<u64>>::try_from(u).ok()))
}

fn object_to_value(map: &Map<String, Json>) -> Result<Value<'static>, GatewayError> {
    let mut dict: HashMap<String, Value<'static>> = HashMap::with_capacity(map.len());
    for (key, value) in map {
        dict.insert(key.clone(), json_to_value(value)?);
    }

    Ok(Value::from(dict))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_map_to_natural_bus_types() {
        assert_eq!(json_to_value(&json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(json_to_value(&json!(7)).unwrap(), Value::I32(7));
        assert_eq!(
            json_to_value(&json!(5_000_000_000i64)).unwrap(),
            Value::I64(5_000_000_000)
        );
        assert_eq!(json_to_value(&json!(1.5)).unwrap(), Value::F64(1.5));
        assert_eq!(
            json_to_value(&json!("modem")).unwrap(),
            Value::from("modem".to_string())
        );
    }

    #[test]
    fn null_is_an_argument_error() {
        assert!(matches!(
            json_to_value(&json!(null)),
            Err(GatewayError::Argument(_))
        ));
        assert!(matches!(
            args_to_structure(&[json!(1), json!(null)]),
            Err(GatewayError::Argument(_))
        ));
    }

    #[test]
    fn values_come_back_as_json() {
        assert_eq!(value_to_json(&Value::I32(3)), json!(3));
        assert_eq!(value_to_json(&Value::from("a".to_string())), json!("a"));
        assert_eq!(value_to_json(&Value::Bool(true)), json!(true));

        let list = json_to_value(&json!(["x", "y"])).unwrap();
        assert_eq!(value_to_json(&list), json!(["x", "y"]));

        let mixed = json_to_value(&json!([1, "a", true])).unwrap();
        assert_eq!(value_to_json(&mixed), json!([1, "a", true]));
    }

    #[test]
    fn objects_round_trip_through_dicts() {
        let original = json!({"Powered": true, "Name": "hci0"});
        let value = json_to_value(&original).unwrap();
        assert_eq!(value_to_json(&value), original);
    }

    #[test]
    fn signatures_split_into_complete_types() {
        assert_eq!(
            split_types("sa{sv}(ii)u").unwrap(),
            vec!["s", "a{sv}", "(ii)", "u"]
        );
        assert!(split_types("").unwrap().is_empty());
        assert!(split_types("a{sv").is_err());
        assert!(split_types("(i").is_err());
    }

    #[test]
    fn declared_types_override_the_guess() {
        // RequestName(su): the flags must go out as `u`, not `i`.
        let body = args_for_signature(
            &[json!("org.busgate.Name"), json!(0)],
            &["s".to_string(), "u".to_string()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(body.fields()[1], Value::U32(0));

        assert_eq!(json_to_typed(&json!(7), "y").unwrap(), Value::U8(7));
        assert_eq!(json_to_typed(&json!(7), "t").unwrap(), Value::U64(7));
        assert_eq!(json_to_typed(&json!(7), "d").unwrap(), Value::F64(7.0));
        assert!(matches!(
            json_to_typed(&json!("/org/ofono/modem0"), "o").unwrap(),
            Value::ObjectPath(_)
        ));
        assert_eq!(
            json_to_typed(&json!(true), "v").unwrap(),
            Value::Value(Box::new(Value::Bool(true)))
        );
    }

    #[test]
    fn empty_lists_keep_their_declared_element_type() {
        let actions = json_to_typed(&json!([]), "as").unwrap();
        let Value::Array(array) = actions else {
            panic!("expected an array, got {actions:?}");
        };
        assert_eq!(array.element_signature().as_str(), "s");
        assert!(array.inner().is_empty());
    }

    #[test]
    fn typed_dicts_wrap_their_values() {
        let hints = json_to_typed(&json!({"urgency": 1, "category": "im"}), "a{sv}").unwrap();
        assert_eq!(value_to_json(&hints), json!({"urgency": 1, "category": "im"}));

        let Value::Dict(dict) = hints else {
            panic!("expected a dict");
        };
        assert_eq!(dict.full_signature().as_str(), "a{sv}");

        let counters = json_to_typed(&json!({"1": 10}), "a{uu}").unwrap();
        assert_eq!(value_to_json(&counters), json!({"1": 10}));
    }

    #[test]
    fn structs_follow_their_field_types() {
        let point = json_to_typed(&json!([1, "a"]), "(us)").unwrap();
        let Value::Structure(point) = point else {
            panic!("expected a structure");
        };
        assert_eq!(point.fields()[0], Value::U32(1));

        assert!(matches!(
            json_to_typed(&json!([1]), "(us)"),
            Err(GatewayError::Argument(_))
        ));
    }

    #[test]
    fn mismatched_values_are_argument_errors() {
        for (json, ty) in [
            (json!(-1), "u"),
            (json!(300), "y"),
            (json!("1"), "i"),
            (json!(1), "s"),
            (json!("not a path"), "o"),
            (json!({"a": 1}), "as"),
            (json!(0), "h"),
        ] {
            assert!(
                matches!(json_to_typed(&json, ty), Err(GatewayError::Argument(_))),
                "{json} as {ty} should be rejected"
            );
        }

        assert!(matches!(
            args_for_signature(&[json!(1)], &["u".to_string(), "u".to_string()]),
            Err(GatewayError::Argument(_))
        ));
    }

    #[test]
    fn no_args_means_no_body() {
        assert!(args_to_structure(&[]).unwrap().is_none());

        let body = args_to_structure(&[json!(1), json!("a")]).unwrap().unwrap();
        assert_eq!(body.fields().len(), 2);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
