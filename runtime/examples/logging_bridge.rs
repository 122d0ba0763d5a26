//! Minimal bridge: logs every received event body.
//!
//! ```bash
//! cargo run -p flume-bridge-runtime --example logging_bridge
//! ```

use flume_bridge_runtime::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flume_bridge_runtime::run(LoggingPublisher::named("logging-channel-adapter").full_message(true))
        .await
}
