// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::MAX_MESSAGES;
use crate::backend::Backend;
use crate::error::DrainError;
use crate::model::AckId;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{Sender, channel};
use tokio_util::sync::CancellationToken;

/// Pulls and acknowledges every message currently queued on `subscription`.
///
/// The work runs as a two stage pipeline. A background task pulls batches
/// without waiting for new messages and hands their ack ids to this task,
/// which acknowledges them. The puller decides when to stop: on an empty
/// batch, on a pull error, or when `cancel` fires between two pulls. Ack ids
/// already handed off are always acknowledged, even after cancellation.
///
/// An acknowledgement failure is returned immediately. A pull failure is
/// returned once every batch pulled before it has been acknowledged.
#[tracing::instrument(level = "debug", skip(backend, cancel))]
pub(crate) async fn drain(
    backend: Arc<dyn Backend>,
    subscription: String,
    cancel: CancellationToken,
) -> std::result::Result<(), DrainError> {
    // Stops the puller if we return before it does.
    let shutdown = cancel.child_token();
    let _shutdown_guard = shutdown.clone().drop_guard();

    let (ack_tx, mut ack_rx) = channel(1);
    let puller = tokio::spawn(pull_loop(
        backend.clone(),
        subscription.clone(),
        ack_tx,
        shutdown,
    ));

    // Acknowledgements must survive a cancelled `cancel`.
    let ack_cancel = CancellationToken::new();
    let mut acked = 0_usize;
    while let Some(ack_ids) = ack_rx.recv().await {
        let count = ack_ids.len();
        let result = backend
            .acknowledge(subscription.clone(), ack_ids.clone(), ack_cancel.clone())
            .await;
        if let Err(source) = result {
            return Err(DrainError::Ack {
                ack_ids: ack_ids.into_iter().map(AckId::into_string).collect(),
                source,
            });
        }
        acked += count;
        tracing::debug!("acknowledged {count} messages");
    }

    match puller.await {
        Ok(Ok(())) => {
            tracing::info!("drained {acked} messages from {subscription}");
            Ok(())
        }
        Ok(Err(e)) => Err(DrainError::Pull(e)),
        Err(e) => Err(DrainError::Pull(Error::io(e.to_string()))),
    }
}

async fn pull_loop(
    backend: Arc<dyn Backend>,
    subscription: String,
    ack_tx: Sender<Vec<AckId>>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let batch = backend
            .pull(subscription.clone(), MAX_MESSAGES, true, shutdown.clone())
            .await?;
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!("pulled {} messages", batch.len());
        let ack_ids = batch.into_iter().map(|m| m.ack_id).collect();
        if ack_tx.send(ack_ids).await.is_err() {
            // The acknowledger gave up after an error.
            return Ok(());
        }
        if shutdown.is_cancelled() {
            return Ok(());
        }
    }
}
