mod arg_parser;
mod client_cli;

use anyhow::Context;
use arg_parser::{ArgParser, SubCommand};
use bytes::Bytes;
use clap::Parser;
use client_cli::{ClientCli, Submission};
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ArgParser::parse();
    let client = ClientCli::connect(&args.server);

    match args.sub_command {
        SubCommand::Submit {
            wf,
            data_type,
            token,
            owner,
            name,
            input,
        } => {
            let input = match input {
                Some(path) => tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            client
                .submit(Submission {
                    wf: &wf,
                    data_type: &data_type,
                    token: &token,
                    owner,
                    name: name.as_deref(),
                    input: Bytes::from(input),
                })
                .await?;
        }
        SubCommand::List => client.list().await?,
        SubCommand::Status { job_id } => client.query_status(job_id).await?,
        SubCommand::Pause { job_id } => client.control(job_id, "pause").await?,
        SubCommand::Resume { job_id } => client.control(job_id, "resume").await?,
        SubCommand::Cancel { job_id } => client.control(job_id, "cancel").await?,
        SubCommand::Log { job_id } => client.stream_log(job_id).await?,
    }

    Ok(())
}
