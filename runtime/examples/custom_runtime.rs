//! Power-user example: binary protocol on a custom port, bodies handed to
//! an async consumer task.
//!
//! ```bash
//! cargo run -p flume-bridge-runtime --example custom_runtime
//! ```

use flume_bridge_runtime::prelude::*;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<Bytes>(1024);

    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            println!("{}", String::from_utf8_lossy(&payload));
        }
    });

    RuntimeBuilder::new()
        .bind("0.0.0.0")
        .port(4545)
        .protocol(Protocol::Binary)
        .run(tx)
        .await
}
