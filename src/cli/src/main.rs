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

//! Publish, drain, subscribe and list using a Pub/Sub service.

mod args;
mod commands;

use anyhow::Result;
use args::Args;
use clap::Parser;
use gcpps::client::Client;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = concat!(
    "A small utility for the Pub/Sub emulator.",
    " It publishes messages, drains subscriptions, prints messages as they",
    " arrive, and lists topics and subscriptions.",
    " Topics and subscriptions are created as needed."
);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = enable_tracing(&args) {
        eprintln!("cannot initialize logging: {e}");
    }
    tracing::info!("Configuration: {args:?}");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    args.validate()?;
    let client = Client::builder()
        .with_endpoint(&args.endpoint)
        .with_project(args.command.project())
        .with_request_timeout(args.request_timeout)
        .build()?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, stopping");
            interrupt.cancel();
        }
    });

    let mut stdout = std::io::stdout().lock();
    commands::run(args.command, &client, &mut stdout, cancel).await
}

fn enable_tracing(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
