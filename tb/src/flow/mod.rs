//! Task assignment flow
//!
//! Turns a debounced batch into stored tasks: extract, ask for a project,
//! commit. Talks to the chat transport only through [`Presenter`] and to
//! storage only through [`TaskGateway`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod assignment;
mod error;
pub mod gateway;
pub mod presenter;

pub use assignment::{AssignmentFlow, FlowOutcome, InboundText};
pub use error::FlowError;
pub use gateway::TaskGateway;
pub use presenter::Presenter;

use crate::session::BatchReady;

/// Consume batch-ready events, running each on its own task
///
/// Ends when every sender is gone, i.e. after the session actor stopped.
pub fn spawn_dispatcher(flow: Arc<AssignmentFlow>, mut ready: mpsc::UnboundedReceiver<BatchReady>) -> JoinHandle<()> {
    debug!("spawn_dispatcher: called");
    tokio::spawn(async move {
        while let Some(event) = ready.recv().await {
            debug!(conversation = event.conversation, "spawn_dispatcher: batch ready");
            let flow = flow.clone();
            tokio::spawn(async move {
                if let Err(e) = flow.on_batch_ready(event).await {
                    warn!(conversation = event.conversation, error = %e, "Batch processing failed");
                }
            });
        }
        info!("Batch dispatcher stopped");
    })
}
