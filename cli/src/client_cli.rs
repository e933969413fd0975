use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use serde_json::Value;
use std::io::Write;

type JobId = u64;

pub struct Submission<'a> {
    pub wf: &'a str,
    pub data_type: &'a str,
    pub token: &'a str,
    pub owner: Option<i64>,
    pub name: Option<&'a str>,
    pub input: Bytes,
}

pub struct ClientCli {
    inner: Client,
    base: String,
}

impl ClientCli {
    pub fn connect(server_addr: &str) -> Self {
        Self {
            inner: Client::new(),
            base: server_addr.trim_end_matches('/').to_owned(),
        }
    }

    pub async fn submit(&self, submission: Submission<'_>) -> Result<()> {
        let mut query = vec![
            ("wf", submission.wf.to_owned()),
            ("data_type", submission.data_type.to_owned()),
        ];
        if let Some(owner) = submission.owner {
            query.push(("owner", owner.to_string()));
        }
        if let Some(name) = submission.name {
            query.push(("name", name.to_owned()));
        }
        let response = self
            .inner
            .post(format!("{}/run", self.base))
            .header(header::AUTHORIZATION, submission.token)
            .query(&query)
            .body(submission.input)
            .send()
            .await?;
        let status = json_body(response).await?;
        println!("Submitted job id: {}", status["id"]);
        print_json(&status)
    }

    pub async fn list(&self) -> Result<()> {
        let response = self.inner.get(format!("{}/jobs", self.base)).send().await?;
        print_json(&json_body(response).await?)
    }

    pub async fn query_status(&self, job_id: JobId) -> Result<()> {
        let response = self
            .inner
            .get(format!("{}/jobs/{job_id}", self.base))
            .send()
            .await?;
        print_json(&json_body(response).await?)
    }

    /// `action` is one of `pause`, `resume`, `cancel`.
    pub async fn control(&self, job_id: JobId, action: &str) -> Result<()> {
        let response = self
            .inner
            .post(format!("{}/jobs/{job_id}", self.base))
            .query(&[("action", action)])
            .send()
            .await?;
        let status = json_body(response).await?;
        println!("Job {job_id}: {}", status["state"]);
        Ok(())
    }

    /// Copy the log to stdout as it grows.
    pub async fn stream_log(&self, job_id: JobId) -> Result<()> {
        let response = self
            .inner
            .get(format!("{}/jobs/{job_id}/log", self.base))
            .send()
            .await?;
        let response = check(response).await?;
        let mut stream = response.bytes_stream();
        let mut stdout = std::io::stdout();
        while let Some(chunk) = stream.next().await {
            stdout.write_all(&chunk?)?;
            stdout.flush()?;
        }
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let code = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    match body["message"].as_str() {
        Some(message) => bail!("server returned {code}: {message}"),
        None => bail!("server returned {code}"),
    }
}

async fn json_body(response: Response) -> Result<Value> {
    check(response)
        .await?
        .json()
        .await
        .context("server sent a malformed status")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
