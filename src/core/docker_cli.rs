/*
 * Runtime client backed by the docker CLI.
 * `list` runs `docker image ls` with one JSON object per line and converts each row
 * into an `ItemDescriptor`; `inspect` runs `docker image inspect` and keeps each
 * returned object verbatim.
 */
use super::models::{InspectDocument, ItemDescriptor, ListOptions, NONE_PLACEHOLDER};
use super::runtime_client::{ClientError, Result, RuntimeClientOperations};
use serde::Deserialize;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::UtcOffset;
use time::macros::format_description;
use tokio::process::Command;

const DEFAULT_BINARY: &str = "docker";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageRow {
    #[serde(rename = "ID")]
    id: String,
    repository: String,
    tag: String,
    #[serde(default)]
    digest: String,
    created_at: String,
    size: String,
}

#[derive(Debug, Clone)]
pub struct DockerCliClient {
    binary: String,
}

impl Default for DockerCliClient {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl DockerCliClient {
    pub fn new(binary: impl Into<String>) -> Self {
        DockerCliClient {
            binary: binary.into(),
        }
    }

    fn list_args(options: &ListOptions) -> Vec<String> {
        let mut args: Vec<String> = ["image", "ls", "--no-trunc", "--digests", "--format", "{{json .}}"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if options.include_filtered == Some(false) {
            args.push("--filter".to_string());
            args.push("dangling=false".to_string());
        }
        args
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let command_line = format!("{} {}", self.binary, args.join(" "));
        log::debug!("DockerCliClient: Running '{command_line}'.");
        let output = Command::new(&self.binary).args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::warn!("DockerCliClient: '{command_line}' failed: {stderr}");
            return Err(ClientError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr,
            });
        }
        String::from_utf8(output.stdout)
            .map_err(|e| ClientError::Parse(format!("Output of '{command_line}' is not UTF-8: {e}")))
    }
}

impl RuntimeClientOperations for DockerCliClient {
    async fn list(&self, options: &ListOptions) -> Result<Vec<ItemDescriptor>> {
        let stdout = self.run(&Self::list_args(options)).await?;
        let items = parse_list_output(&stdout)?;
        log::debug!("DockerCliClient: Listed {} images.", items.len());
        Ok(items)
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<InspectDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["image".to_string(), "inspect".to_string()];
        args.extend(ids.iter().cloned());

        let stdout = match self.run(&args).await {
            Ok(stdout) => stdout,
            Err(ClientError::CommandFailed { stderr, .. }) if stderr.contains("No such") => {
                return Err(ClientError::NotFound(ids.join(", ")));
            }
            Err(e) => return Err(e),
        };
        parse_inspect_output(ids, &stdout)
    }
}

pub fn parse_list_output(stdout: &str) -> Result<Vec<ItemDescriptor>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_list_line)
        .collect()
}

fn parse_list_line(line: &str) -> Result<ItemDescriptor> {
    let row: ImageRow = serde_json::from_str(line)?;
    let mut item = ItemDescriptor::new(row.id, parse_created_at(&row.created_at)?)
        .with_size(parse_size(&row.size)?);
    if row.repository != NONE_PLACEHOLDER {
        item = item.with_repository(row.repository);
    }
    if row.tag != NONE_PLACEHOLDER {
        item = item.with_tag(row.tag);
    }
    if !row.digest.is_empty() && row.digest != NONE_PLACEHOLDER {
        item = item.with_digest(row.digest);
    }
    Ok(item)
}

// `docker image inspect` prints a JSON array in the order the ids were given.
fn parse_inspect_output(ids: &[String], stdout: &str) -> Result<Vec<InspectDocument>> {
    let documents: Vec<serde_json::Value> = serde_json::from_str(stdout)?;
    if documents.len() != ids.len() {
        return Err(ClientError::Parse(format!(
            "Expected {} inspect documents, got {}",
            ids.len(),
            documents.len()
        )));
    }
    ids.iter()
        .zip(documents)
        .map(|(id, document)| -> Result<InspectDocument> {
            Ok(InspectDocument {
                id: id.clone(),
                raw: serde_json::to_string(&document)?,
            })
        })
        .collect()
}

/*
 * Parses the CLI's `CreatedAt` column, e.g. `2023-05-02 17:02:28 +0200 CEST`.
 * The trailing zone abbreviation is ignored; the numeric offset is authoritative.
 */
pub fn parse_created_at(text: &str) -> Result<OffsetDateTime> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [date, clock, offset, ..] = parts.as_slice() else {
        return Err(ClientError::Parse(format!("Unrecognized creation time '{text}'")));
    };
    let invalid = |e: &dyn std::fmt::Display| ClientError::Parse(format!("Invalid creation time '{text}': {e}"));

    let local = PrimitiveDateTime::parse(
        &format!("{date} {clock}"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .map_err(|e| invalid(&e))?;
    let offset = UtcOffset::parse(
        offset,
        format_description!("[offset_hour sign:mandatory][offset_minute]"),
    )
    .map_err(|e| invalid(&e))?;
    Ok(local.assume_offset(offset))
}

/// Parses human-readable sizes such as `142MB`, `1.2GB` or `0B` (decimal units).
pub fn parse_size(text: &str) -> Result<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| ClientError::Parse(format!("Invalid size '{text}'")))?;
    let multiplier: f64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return Err(ClientError::Parse(format!("Unknown size unit in '{text}'"))),
    };
    Ok((number * multiplier).round() as u64)
}
