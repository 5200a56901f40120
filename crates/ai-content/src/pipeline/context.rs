use std::collections::HashMap;
use std::path::Path;

use super::result::StageReport;
use super::stage::Stage;

/// Reports of the stages settled so far in one run.
#[derive(Debug, Default)]
pub struct PipelineContext {
    reports: Vec<StageReport>,
    index: HashMap<String, usize>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: StageReport) {
        self.index.insert(report.name.clone(), self.reports.len());
        self.reports.push(report);
    }

    pub fn get(&self, stage: &str) -> Option<&StageReport> {
        self.index.get(stage).map(|i| &self.reports[*i])
    }

    /// Local artifact of a settled, successful stage.
    pub fn output_path(&self, stage: &str) -> Option<&Path> {
        self.get(stage).and_then(StageReport::output_path)
    }

    /// Why `stage` cannot run, or `None` when every dependency succeeded.
    pub fn blocked_by(&self, stage: &Stage) -> Option<String> {
        stage.depends_on.iter().find_map(|dependency| match self.get(dependency) {
            Some(report) if report.succeeded() => None,
            Some(report) if report.is_skipped() => {
                Some(format!("dependency '{}' was skipped", dependency))
            }
            Some(_) => Some(format!("dependency '{}' failed", dependency)),
            None => Some(format!("dependency '{}' did not run", dependency)),
        })
    }

    pub fn into_reports(self) -> Vec<StageReport> {
        self.reports
    }
}
