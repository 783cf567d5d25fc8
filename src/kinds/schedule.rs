//! Deployment schedules attached to a stack

use crate::resource::Output;
use chrono::{DateTime, SecondsFormat, Utc};

resource_kind!(
    /// Runs drift detection on a cron schedule
    DriftSchedule,
    DriftScheduleBuilder,
    "drift-schedule"
);

impl DriftSchedule {
    pub fn builder(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        schedule_cron: impl Into<String>,
    ) -> DriftScheduleBuilder {
        DriftScheduleBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("project", project.into())
        .set("stack", stack.into())
        .set("scheduleCron", schedule_cron.into())
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or_default()
    }

    pub fn stack(&self) -> &str {
        self.0.input_str("stack").unwrap_or_default()
    }

    pub fn schedule_cron(&self) -> &str {
        self.0.input_str("scheduleCron").unwrap_or_default()
    }

    pub fn auto_remediate(&self) -> bool {
        self.0.input_bool("autoRemediate").unwrap_or(false)
    }

    pub fn schedule_id(&self) -> Output<Option<&str>> {
        self.0.output_str("scheduleId")
    }
}

impl DriftScheduleBuilder {
    /// Remediate any drift found by a scheduled run
    pub fn auto_remediate(self, enabled: bool) -> Self {
        self.set("autoRemediate", enabled)
    }
}

resource_kind!(
    /// Destroys a stack once at a fixed time
    TtlSchedule,
    TtlScheduleBuilder,
    "ttl-schedule"
);

impl TtlSchedule {
    pub fn builder(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        at: DateTime<Utc>,
    ) -> TtlScheduleBuilder {
        TtlScheduleBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("project", project.into())
        .set("stack", stack.into())
        .set("timestamp", at.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or_default()
    }

    pub fn stack(&self) -> &str {
        self.0.input_str("stack").unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0
            .input_str("timestamp")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn delete_after_destroy(&self) -> bool {
        self.0.input_bool("deleteAfterDestroy").unwrap_or(false)
    }

    pub fn schedule_id(&self) -> Output<Option<&str>> {
        self.0.output_str("scheduleId")
    }
}

impl TtlScheduleBuilder {
    /// Delete the stack, with its history and settings, after destroying it
    pub fn delete_after_destroy(self, enabled: bool) -> Self {
        self.set("deleteAfterDestroy", enabled)
    }
}
