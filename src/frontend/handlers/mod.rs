pub(crate) mod authenticating;
pub(crate) mod ready;

pub(crate) use authenticating::{handle_auth, handle_authreq};
pub(crate) use ready::{
    handle_publish, handle_register, handle_send, handle_subscribe, handle_unsubscribe,
};
