//! Drift and TTL schedules

use super::{insert_str, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Layout of `scheduleOnce` in schedule responses
const SCHEDULE_ONCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    schedule_once: Option<String>,
    #[serde(default)]
    schedule_cron: Option<String>,
    #[serde(default)]
    definition: ScheduleDefinition,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleDefinition {
    #[serde(default)]
    request: ScheduleRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest {
    #[serde(default)]
    operation_context: ScheduleOperationContext,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleOperationContext {
    #[serde(default)]
    options: ScheduleOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleOptions {
    #[serde(default)]
    remediate_if_drift_detected: bool,
    #[serde(default)]
    delete_after_destroy: bool,
}

/// `drift` or `ttl`, the schedule family in URLs and IDs
fn schedule_family(key: &str) -> Result<&'static str> {
    match key {
        "drift-schedule" => Ok("drift"),
        "ttl-schedule" => Ok("ttl"),
        _ => Err(anyhow::anyhow!("{} is not a schedule", key)),
    }
}

/// Parse `org/project/stack/{family}/scheduleId`
fn split_schedule_id<'a>(id: &'a str, family: &str) -> Result<(&'a str, &'a str, &'a str, &'a str)> {
    let format = format!("organization/project/stack/{}/scheduleId", family);
    let parts = split_id(id, 5, &format)?;
    if parts[3] != family {
        return Err(anyhow::anyhow!("'{}' is invalid, must be in the format {}", id, format));
    }
    Ok((parts[0], parts[1], parts[2], parts[4]))
}

fn schedule_body(decl: &Declaration) -> Value {
    match decl.kind() {
        "drift-schedule" => json!({
            "scheduleCron": decl.input_str("scheduleCron").unwrap_or_default(),
            "autoRemediate": decl.input_bool("autoRemediate").unwrap_or(false),
        }),
        _ => json!({
            "timestamp": decl.input_str("timestamp").unwrap_or_default(),
            "deleteAfterDestroy": decl.input_bool("deleteAfterDestroy").unwrap_or(false),
        }),
    }
}

/// Normalize `scheduleOnce` to RFC 3339
fn schedule_timestamp(raw: &str) -> Option<String> {
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, SCHEDULE_ONCE_FORMAT) {
        return Some(parsed.and_utc().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc).to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn same_instant(a: &str, b: &str) -> bool {
    match (chrono::DateTime::parse_from_rfc3339(a), chrono::DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub(super) async fn create_schedule(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let family = schedule_family(decl.kind())?;
    let org = required_str(&decl, "organization")?;
    let project = required_str(&decl, "project")?;
    let stack = required_str(&decl, "stack")?;

    let url = client.stack_url(&org, &project, &stack, &["deployments", family, "schedules"])?;
    let response = client
        .post(url, Some(&schedule_body(&decl)))
        .await
        .with_context(|| format!("Failed to create {} schedule", family))?;
    let schedule: ScheduleResponse = parse_response(response, "schedule")?;

    let mut outputs = Map::new();
    outputs.insert("scheduleId".to_string(), Value::String(schedule.id.clone()));
    let id = format!("{}/{}/{}/{}/{}", org, project, stack, family, schedule.id);
    Ok(decl.materialize(id, outputs))
}

pub(super) async fn read_schedule(
    client: &ServiceClient,
    key: &str,
    id: &str,
    prior: Option<&Declaration>,
) -> Result<Option<Declaration>> {
    let family = schedule_family(key)?;
    let (org, project, stack, schedule_id) = split_schedule_id(id, family)?;

    let url = client.stack_url(org, project, stack, &["deployments", "schedules", schedule_id])?;
    let Some(response) = client.get_optional(url).await? else {
        return Ok(None);
    };
    let schedule: ScheduleResponse = parse_response(response, "schedule")?;
    let options = &schedule.definition.request.operation_context.options;

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "project", project);
    insert_str(&mut inputs, "stack", stack);

    if family == "drift" {
        insert_str(&mut inputs, "scheduleCron", schedule.schedule_cron.as_deref().unwrap_or_default());
        inputs.insert("autoRemediate".to_string(), json!(options.remediate_if_drift_detected));
    } else {
        let remote = schedule
            .schedule_once
            .as_deref()
            .and_then(schedule_timestamp)
            .ok_or_else(|| anyhow::anyhow!("schedule {} has no valid timestamp", schedule_id))?;
        let declared = prior
            .and_then(|p| p.input_str("timestamp"))
            .filter(|t| same_instant(t, &remote));
        insert_str(&mut inputs, "timestamp", declared.unwrap_or(remote.as_str()));
        inputs.insert("deleteAfterDestroy".to_string(), json!(options.delete_after_destroy));
    }

    let mut outputs = Map::new();
    outputs.insert("scheduleId".to_string(), Value::String(schedule_id.to_string()));
    Ok(Some(Declaration::from_remote(key, inputs)?.materialize(id, outputs)))
}

pub(super) async fn update_schedule(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let family = schedule_family(new.kind())?;
    let (org, project, stack, schedule_id) = split_schedule_id(id, family)?;

    let url = client.stack_url(org, project, stack, &["deployments", family, "schedules", schedule_id])?;
    client
        .post(url, Some(&schedule_body(&new)))
        .await
        .with_context(|| format!("Failed to update {} schedule {}", family, schedule_id))?;

    Ok(new.materialize(id, old.exposed_outputs()))
}

pub(super) async fn delete_schedule(client: &ServiceClient, key: &str, id: &str) -> Result<()> {
    let family = schedule_family(key)?;
    let (org, project, stack, schedule_id) = split_schedule_id(id, family)?;
    let url = client.stack_url(org, project, stack, &["deployments", "schedules", schedule_id])?;
    client.delete(url).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_id_checks_family() {
        assert_eq!(
            split_schedule_id("acme/web/prod/drift/s-1", "drift").unwrap(),
            ("acme", "web", "prod", "s-1")
        );
        assert!(split_schedule_id("acme/web/prod/ttl/s-1", "drift").is_err());
    }

    #[test]
    fn test_schedule_timestamp_normalized() {
        assert_eq!(
            schedule_timestamp("2030-01-02 03:04:05").as_deref(),
            Some("2030-01-02T03:04:05Z")
        );
        assert_eq!(
            schedule_timestamp("2030-01-02T04:04:05+01:00").as_deref(),
            Some("2030-01-02T03:04:05Z")
        );
        assert!(same_instant("2030-01-02T03:04:05Z", "2030-01-02T04:04:05+01:00"));
    }
}
