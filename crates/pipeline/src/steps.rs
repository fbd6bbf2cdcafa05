use serde::Serialize;

/// Outcome of one named flow step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered record of the steps a flow ran.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(&mut self, name: &str) {
        tracing::debug!(step = name, "Step succeeded");
        self.records.push(StepRecord {
            name: name.to_string(),
            success: true,
            error: None,
        });
    }

    pub fn failed(&mut self, name: &str, error: impl ToString) {
        let error = error.to_string();
        tracing::warn!(step = name, error = %error, "Step failed");
        self.records.push(StepRecord {
            name: name.to_string(),
            success: false,
            error: Some(error),
        });
    }

    /// Record the result of `result` under `name` and pass it through.
    pub fn track<T, E: std::fmt::Display>(
        &mut self,
        name: &str,
        result: Result<T, E>,
    ) -> Result<T, E> {
        match &result {
            Ok(_) => self.succeeded(name),
            Err(e) => self.failed(name, e),
        }
        result
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_records_both_outcomes_in_order() {
        let mut log = StepLog::new();
        let ok: Result<u32, String> = log.track("upload_image", Ok(1));
        let err: Result<u32, String> = log.track("generate_prompt", Err("boom".into()));

        assert_eq!(ok, Ok(1));
        assert!(err.is_err());
        let records = log.into_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert_eq!(records[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn successful_step_omits_error_field() {
        let mut log = StepLog::new();
        log.succeeded("load_workflow");
        let json = serde_json::to_value(log.records()).unwrap();
        assert_eq!(json, serde_json::json!([{"name": "load_workflow", "success": true}]));
    }
}
