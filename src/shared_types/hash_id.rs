use crate::errors::GatewayError;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const KEY_SEPARATOR: char = '#';

// -----------------------------------------------------------------------------
// ----- Composite Key ---------------------------------------------------------

/// Joins an ordered list of identifiers into the string used as identity for
/// every cache in the gateway (and as the pub/sub topic of a signal).
///
/// Order matters: `["a", "b"]` and `["b", "a"]` yield different keys. An
/// empty list is a caller bug and reported as [`GatewayError::Key`].
pub fn hash_id<S: AsRef<str>>(parts: &[S]) -> Result<String, GatewayError> {
    let Some((first, rest)) = parts.split_first() else {
        return Err(GatewayError::Key);
    };

    let capacity = parts.iter().map(|p| p.as_ref().len() + 1).sum();
    let mut key = String::with_capacity(capacity);
    key.push_str(first.as_ref());

    for part in rest {
        key.push(KEY_SEPARATOR);
        key.push_str(part.as_ref());
    }

    Ok(key)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_in_order() {
        let key = hash_id(&["org.ofono", "/", "org.ofono.Manager", "ModemAdded"]).unwrap();
        assert_eq!(key, "org.ofono#/#org.ofono.Manager#ModemAdded");
    }

    #[test]
    fn single_part_is_unchanged() {
        assert_eq!(hash_id(&["org.neard"]).unwrap(), "org.neard");
    }

    #[test]
    fn order_sensitive() {
        let ab = hash_id(&["a", "b"]).unwrap();
        let ba = hash_id(&["b", "a"]).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn deterministic_across_owned_and_borrowed() {
        let owned = vec!["x".to_string(), "y".to_string()];
        assert_eq!(hash_id(&owned).unwrap(), hash_id(&["x", "y"]).unwrap());
    }

    #[test]
    fn empty_sequence_is_an_error() {
        let empty: [&str; 0] = [];
        assert_eq!(hash_id(&empty), Err(GatewayError::Key));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
