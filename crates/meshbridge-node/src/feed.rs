//! JSON-lines mesh event feed
//!
//! Stands in for the mesh stack on a host: every non-empty line is one
//! `NetworkEvent`, e.g.
//!
//! ```text
//! {"kind":"publish","source":5,"opcode":33284,"payload":{"type":"on_off","present":1}}
//! ```
//!
//! Lines starting with `#` are comments. Lines that do not parse are logged
//! and skipped.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use meshbridge::{MeshEventHandler, NetworkEvent};

/// Read events until end of input, returning how many were delivered
pub async fn run<R>(reader: R, handler: Arc<dyn MeshEventHandler>) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut delivered = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<NetworkEvent>(line) {
            Ok(event) => {
                debug!("Mesh event: {:?}", event);
                handler.on_network_event(event);
                delivered += 1;
            }
            Err(e) => warn!("Skipping unparseable event line: {}", e),
        }
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbridge::{MeshMessage, Opcode};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<NetworkEvent>>,
    }

    impl MeshEventHandler for RecordingHandler {
        fn on_network_event(&self, event: NetworkEvent) {
            self.events.lock().push(event);
        }
    }

    #[tokio::test]
    async fn test_feed_delivers_parsed_events() {
        let input = b"# gateway feed\n\
            {\"kind\":\"publish\",\"source\":5,\"opcode\":33284,\"payload\":{\"type\":\"on_off\",\"present\":1}}\n\
            \n\
            not json\n\
            {\"kind\":\"error\",\"source\":5,\"opcode\":33282,\"code\":-110}\n";

        let handler = Arc::new(RecordingHandler::default());
        let delivered = run(&input[..], handler.clone()).await.unwrap();

        assert_eq!(delivered, 2);
        let events = handler.events.lock();
        assert_eq!(
            events[0],
            NetworkEvent::Publish(MeshMessage::onoff_status(5, 1))
        );
        assert_eq!(
            events[1],
            NetworkEvent::Error {
                source: 5,
                opcode: Opcode::GEN_ONOFF_SET,
                code: -110,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_feed() {
        let handler = Arc::new(RecordingHandler::default());
        assert_eq!(run(&b""[..], handler).await.unwrap(), 0);
    }
}
