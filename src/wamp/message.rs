use serde_json::{Value, json};

use crate::errors::GatewayError;

use super::message_type::MessageType;

// -----------------------------------------------------------------------------
// ----- WampMessage -----------------------------------------------------------

/// One WAMP v1 frame. Frames travel as JSON arrays in WebSocket text messages.
#[derive(Debug, Clone, PartialEq)]
pub enum WampMessage {
    Welcome {
        session_id: String,
        protocol_version: u64,
        server_ident: String,
    },
    Prefix {
        prefix: String,
        uri: String,
    },
    Call {
        call_id: String,
        proc_uri: String,
        args: Vec<Value>,
    },
    CallResult {
        call_id: String,
        result: Value,
    },
    CallError {
        call_id: String,
        error_uri: String,
        description: String,
        details: Option<Value>,
    },
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        topic: String,
        event: Value,
        exclude_me: bool,
        exclude: Vec<String>,
        eligible: Option<Vec<String>>,
    },
    Event {
        topic: String,
        event: Value,
    },
}

// -----------------------------------------------------------------------------
// ----- WampMessage: Static ---------------------------------------------------

impl WampMessage {
    pub fn decode(text: &str) -> Result<Self, GatewayError> {
        let frame: Value = serde_json::from_str(text)
            .map_err(|e| GatewayError::Protocol(format!("invalid JSON frame: {e}")))?;

        let Value::Array(items) = frame else {
            return Err(GatewayError::Protocol("frame is not a JSON array".into()));
        };

        let code = items
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::Protocol("missing message type".into()))?;

        let message_type = MessageType::from_code(code)
            .ok_or_else(|| GatewayError::Protocol(format!("unknown message type {code}")))?;

        let mut fields = items.into_iter().skip(1);

        let message = match message_type {
            MessageType::Welcome => WampMessage::Welcome {
                session_id: take_string(&mut fields, "sessionId")?,
                protocol_version: fields.next().and_then(|v| v.as_u64()).unwrap_or(1),
                server_ident: take_string(&mut fields, "serverIdent")?,
            },

            MessageType::Prefix => WampMessage::Prefix {
                prefix: take_string(&mut fields, "prefix")?,
                uri: take_string(&mut fields, "uri")?,
            },

            MessageType::Call => WampMessage::Call {
                call_id: take_string(&mut fields, "callId")?,
                proc_uri: take_string(&mut fields, "procUri")?,
                args: fields.collect(),
            },

            MessageType::CallResult => WampMessage::CallResult {
                call_id: take_string(&mut fields, "callId")?,
                result: fields.next().unwrap_or(Value::Null),
            },

            MessageType::CallError => WampMessage::CallError {
                call_id: take_string(&mut fields, "callId")?,
                error_uri: take_string(&mut fields, "errorUri")?,
                description: take_string(&mut fields, "errorDesc")?,
                details: fields.next(),
            },

            MessageType::Subscribe => WampMessage::Subscribe {
                topic: take_string(&mut fields, "topicUri")?,
            },

            MessageType::Unsubscribe => WampMessage::Unsubscribe {
                topic: take_string(&mut fields, "topicUri")?,
            },

            MessageType::Publish => decode_publish(&mut fields)?,

            MessageType::Event => WampMessage::Event {
                topic: take_string(&mut fields, "topicUri")?,
                event: fields.next().unwrap_or(Value::Null),
            },
        };

        Ok(message)
    }
}

// -----------------------------------------------------------------------------
// ----- WampMessage: Public ---------------------------------------------------

impl WampMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            WampMessage::Welcome { .. } => MessageType::Welcome,
            WampMessage::Prefix { .. } => MessageType::Prefix,
            WampMessage::Call { .. } => MessageType::Call,
            WampMessage::CallResult { .. } => MessageType::CallResult,
            WampMessage::CallError { .. } => MessageType::CallError,
            WampMessage::Subscribe { .. } => MessageType::Subscribe,
            WampMessage::Unsubscribe { .. } => MessageType::Unsubscribe,
            WampMessage::Publish { .. } => MessageType::Publish,
            WampMessage::Event { .. } => MessageType::Event,
        }
    }

    pub fn to_value(&self) -> Value {
        let code = self.message_type().code();

        match self {
            WampMessage::Welcome {
                session_id,
                protocol_version,
                server_ident,
            } => json!([code, session_id, protocol_version, server_ident]),

            WampMessage::Prefix { prefix, uri } => json!([code, prefix, uri]),

            WampMessage::Call {
                call_id,
                proc_uri,
                args,
            } => {
                let mut frame = vec![json!(code), json!(call_id), json!(proc_uri)];
                frame.extend(args.iter().cloned());
                Value::Array(frame)
            }

            WampMessage::CallResult { call_id, result } => json!([code, call_id, result]),

            WampMessage::CallError {
                call_id,
                error_uri,
                description,
                details,
            } => match details {
                Some(details) => json!([code, call_id, error_uri, description, details]),
                None => json!([code, call_id, error_uri, description]),
            },

            WampMessage::Subscribe { topic } | WampMessage::Unsubscribe { topic } => {
                json!([code, topic])
            }

            WampMessage::Publish {
                topic,
                event,
                exclude_me,
                exclude,
                eligible,
            } => match eligible {
                Some(eligible) => json!([code, topic, event, exclude, eligible]),
                None if !exclude.is_empty() => json!([code, topic, event, exclude]),
                None => json!([code, topic, event, exclude_me]),
            },

            WampMessage::Event { topic, event } => json!([code, topic, event]),
        }
    }

    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn take_string(
    fields: &mut impl Iterator<Item = Value>,
    name: &str,
) -> Result<String, GatewayError> {
    match fields.next() {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(GatewayError::Protocol(format!(
            "field '{name}' must be a string, got {other}"
        ))),
        None => Err(GatewayError::Protocol(format!("missing field '{name}'"))),
    }
}

fn take_string_list(value: Value, name: &str) -> Result<Vec<String>, GatewayError> {
    let Value::Array(items) = value else {
        return Err(GatewayError::Protocol(format!("field '{name}' must be a list")));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(GatewayError::Protocol(format!(
                "field '{name}' must only hold session ids, got {other}"
            ))),
        })
        .collect()
}

fn decode_publish(fields: &mut impl Iterator<Item = Value>) -> Result<WampMessage, GatewayError> {
    let topic = take_string(fields, "topicUri")?;
    let event = fields.next().unwrap_or(Value::Null);

    let mut exclude_me = true;
    let mut exclude = Vec::new();
    let mut eligible = None;

    match fields.next() {
        None => {}
        Some(Value::Bool(flag)) => exclude_me = flag,
        Some(list) => {
            exclude_me = false;
            exclude = take_string_list(list, "exclude")?;
            if let Some(list) = fields.next() {
                eligible = Some(take_string_list(list, "eligible")?);
            }
        }
    }

    Ok(WampMessage::Publish {
        topic,
        event,
        exclude_me,
        exclude,
        eligible,
    })
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_call_with_list_argument() {
        let text = r#"[2, "7f3a", "dbusSend", ["session", "org.ofono", "/", "org.ofono.Manager", "GetModems"]]"#;
        let msg = WampMessage::decode(text).unwrap();

        match msg {
            WampMessage::Call {
                call_id,
                proc_uri,
                args,
            } => {
                assert_eq!(call_id, "7f3a");
                assert_eq!(proc_uri, "dbusSend");
                assert_eq!(args.len(), 1);
                assert_eq!(args[0][4], "GetModems");
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn decodes_call_without_arguments() {
        let msg = WampMessage::decode(r#"[2, "1", "ping"]"#).unwrap();
        assert!(matches!(msg, WampMessage::Call { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn decodes_prefix_and_subscribe() {
        let msg = WampMessage::decode(r#"[1, "wamp", "http://api.wamp.ws/"]"#).unwrap();
        assert_eq!(
            msg,
            WampMessage::Prefix {
                prefix: "wamp".into(),
                uri: "http://api.wamp.ws/".into(),
            }
        );

        let msg = WampMessage::decode(r#"[5, "org.ofono#/#org.ofono.Manager#ModemAdded"]"#).unwrap();
        assert_eq!(
            msg,
            WampMessage::Subscribe {
                topic: "org.ofono#/#org.ofono.Manager#ModemAdded".into(),
            }
        );
    }

    #[test]
    fn publish_forms() {
        let msg = WampMessage::decode(r#"[7, "t", {"a": 1}]"#).unwrap();
        assert!(matches!(msg, WampMessage::Publish { exclude_me: true, .. }));

        let msg = WampMessage::decode(r#"[7, "t", 1, false]"#).unwrap();
        assert!(matches!(msg, WampMessage::Publish { exclude_me: false, .. }));

        let msg = WampMessage::decode(r#"[7, "t", 1, ["s1"], ["s2", "s3"]]"#).unwrap();
        match msg {
            WampMessage::Publish {
                exclude, eligible, ..
            } => {
                assert_eq!(exclude, vec!["s1".to_string()]);
                assert_eq!(eligible, Some(vec!["s2".to_string(), "s3".to_string()]));
            }
            other => panic!("expected Publish, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            WampMessage::decode("not json"),
            Err(GatewayError::Protocol(_))
        ));
        assert!(matches!(
            WampMessage::decode(r#"{"type": 2}"#),
            Err(GatewayError::Protocol(_))
        ));
        assert!(matches!(
            WampMessage::decode(r#"[42, "x"]"#),
            Err(GatewayError::Protocol(_))
        ));
        assert!(matches!(
            WampMessage::decode(r#"[2, 17, "dbusSend"]"#),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn encodes_server_frames() {
        let welcome = WampMessage::Welcome {
            session_id: "abc".into(),
            protocol_version: 1,
            server_ident: "busgate/0.1.0".into(),
        };
        assert_eq!(welcome.encode(), r#"[0,"abc",1,"busgate/0.1.0"]"#);

        let result = WampMessage::CallResult {
            call_id: "c1".into(),
            result: Value::String("[1, \"a\", true]".into()),
        };
        assert_eq!(result.encode(), r#"[3,"c1","[1, \"a\", true]"]"#);

        let event = WampMessage::Event {
            topic: "t".into(),
            event: Value::String("[]".into()),
        };
        assert_eq!(event.encode(), r#"[8,"t","[]"]"#);
    }

    #[test]
    fn encoded_frames_decode_back() {
        let error = WampMessage::CallError {
            call_id: "c9".into(),
            error_uri: "http://api.wamp.ws/error#generic".into(),
            description: "boom".into(),
            details: None,
        };
        assert_eq!(WampMessage::decode(&error.encode()).unwrap(), error);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
