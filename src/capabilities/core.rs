//! Core capabilities, registered in every session

use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::registry::{Capability, CapabilityGroup, CapabilityModule, CapabilitySpec, ParamKind};

pub const MODULE_NAME: &str = "CORE";

pub fn module() -> CapabilityModule {
    CapabilityModule::new(MODULE_NAME).with_group(message_group())
}

fn message_group() -> CapabilityGroup {
    let write_message = CapabilitySpec::new("write_message", "Send or log a message")
        .required("message", ParamKind::Any)
        .example(json!({
            "name": "Write Message",
            "function": "message.write_message",
            "arguments": {"message": "Hello from the plan"},
            "output_var": "message_result"
        }));

    CapabilityGroup::new("message").with(Capability::new(write_message, |mut args| {
        let message = args.remove("message").unwrap_or(JsonValue::Null);
        match &message {
            JsonValue::String(text) => info!(message = %text, "Message sent"),
            other => info!(message = %other, "Message sent"),
        }
        Ok(json!({"status": "success", "message": message}))
    }))
}
