// -----------------------------------------------------------------------------
// ----- MessageType -----------------------------------------------------------

/// WAMP v1 message type ids, the first element of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Welcome,
    Prefix,
    Call,
    CallResult,
    CallError,
    Subscribe,
    Unsubscribe,
    Publish,
    Event,
}

impl MessageType {
    pub fn from_code(code: u64) -> Option<Self> {
        let message_type = match code {
            0 => MessageType::Welcome,
            1 => MessageType::Prefix,
            2 => MessageType::Call,
            3 => MessageType::CallResult,
            4 => MessageType::CallError,
            5 => MessageType::Subscribe,
            6 => MessageType::Unsubscribe,
            7 => MessageType::Publish,
            8 => MessageType::Event,
            _ => return None,
        };

        Some(message_type)
    }

    pub fn code(self) -> u64 {
        match self {
            MessageType::Welcome => 0,
            MessageType::Prefix => 1,
            MessageType::Call => 2,
            MessageType::CallResult => 3,
            MessageType::CallError => 4,
            MessageType::Subscribe => 5,
            MessageType::Unsubscribe => 6,
            MessageType::Publish => 7,
            MessageType::Event => 8,
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
