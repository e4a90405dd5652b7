use std::sync::Arc;

use lyre_core::{Bytes, WsCommand, WsMessageType};
use tokio::sync::mpsc;

use crate::context::InstanceServices;

/// The instance's endpoint on the websocket server.
///
/// Every call returns `false` when no server is running or the message type
/// is not `1` (text) or `2` (binary).
#[derive(Clone)]
pub struct Ws {
    instance: Arc<str>,
    commander: Option<mpsc::UnboundedSender<WsCommand>>,
}

impl Ws {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            instance: Arc::clone(&services.instance_id),
            commander: services.ws.clone(),
        }
    }

    fn send(&self, command: WsCommand) -> bool {
        self.commander
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    pub fn write(&self, connection_id: &str, message_type: u8, data: impl Into<Bytes>) -> bool {
        let Ok(message_type) = WsMessageType::try_from(message_type) else {
            return false;
        };
        self.send(WsCommand::Write {
            connection_id: connection_id.to_string(),
            message_type,
            data: data.into(),
        })
    }

    /// Sends to every connection of this instance.
    pub fn broadcast(&self, message_type: u8, data: impl Into<Bytes>) -> bool {
        let Ok(message_type) = WsMessageType::try_from(message_type) else {
            return false;
        };
        self.send(WsCommand::Broadcast {
            instance: self.instance.to_string(),
            message_type,
            data: data.into(),
        })
    }

    pub fn close(&self, connection_id: &str) -> bool {
        self.send(WsCommand::Close {
            connection_id: connection_id.to_string(),
        })
    }
}
