use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::designation::{CodecError, Designation, OrbitClass};
use crate::pipeline::engine::{
    derive_status, Assessment, AssessmentState, FailureKind, Stage, StatusBand, StatusCode,
};

/// One processed input line, valid or not.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub input: String,
    pub designation: Option<Designation>,
    pub status: StatusCode,
    pub state: AssessmentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

impl BatchEntry {
    pub fn from_assessment(input: impl Into<String>, assessment: Assessment, attempts: u32) -> Self {
        Self {
            input: input.into(),
            designation: Some(assessment.designation),
            status: assessment.status,
            state: assessment.state,
            error: assessment.error,
            attempts,
        }
    }

    /// Input the codec rejected; reported as 000 without touching the catalog.
    pub fn invalid(input: impl Into<String>, err: &CodecError) -> Self {
        let input = input.into();
        let mut state = AssessmentState::invalid(OrbitClass::of(&input), err.to_string());
        let status = derive_status(&state);
        state.status = Some(status);
        Self {
            input,
            designation: None,
            status,
            state,
            error: Some(err.to_string()),
            attempts: 0,
        }
    }

    /// Assessment that never returned, e.g. a worker panic.
    pub fn aborted(
        input: impl Into<String>,
        designation: Option<Designation>,
        message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        let input = input.into();
        let message = message.into();
        let class = designation
            .as_ref()
            .map(Designation::orbit_class)
            .unwrap_or_else(|| OrbitClass::of(&input));
        let mut state = AssessmentState::new(class);
        state.record_failure(FailureKind::Configuration, message.clone());
        state.enter(Stage::Done);
        let status = derive_status(&state);
        state.status = Some(status);
        Self {
            input,
            designation,
            status,
            state,
            error: Some(message),
            attempts,
        }
    }

    pub fn label(&self) -> &str {
        self.designation
            .as_ref()
            .map(Designation::unpacked)
            .unwrap_or(self.input.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeCount {
    pub code: StatusCode,
    pub description: &'static str,
    pub count: usize,
    pub designations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BandSummary {
    pub band: StatusBand,
    pub band_label: &'static str,
    pub count: usize,
    pub codes: Vec<CodeCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureCount {
    pub failure: FailureKind,
    pub failure_label: &'static str,
    pub count: usize,
}

/// Aggregated view of a batch, grouped by band then code.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub total: usize,
    pub saved: usize,
    pub upsert_issues: usize,
    pub bands: Vec<BandSummary>,
    pub failures: Vec<FailureCount>,
}

/// Outcome of one batch run, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub entries: Vec<BatchEntry>,
}

#[derive(Serialize)]
struct BatchExport<'a> {
    summary: BatchSummary,
    entries: &'a [BatchEntry],
}

#[derive(Serialize)]
struct CsvRow<'a> {
    input: &'a str,
    packed_designation: Option<&'a str>,
    unpacked_designation: Option<&'a str>,
    status: String,
    band: &'static str,
    description: &'static str,
    failure: Option<&'static str>,
    attempts: u32,
    persisted: bool,
    diagnostics: String,
}

impl BatchReport {
    pub fn new(run_id: impl Into<String>, entries: Vec<BatchEntry>) -> Self {
        Self {
            run_id: run_id.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_band(&self) -> BTreeMap<StatusBand, Vec<&BatchEntry>> {
        let mut bands: BTreeMap<StatusBand, Vec<&BatchEntry>> = BTreeMap::new();
        for entry in &self.entries {
            bands.entry(entry.status.band()).or_default().push(entry);
        }
        bands
    }

    pub fn counts(&self) -> BTreeMap<StatusCode, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn designations_by_code(&self) -> BTreeMap<StatusCode, Vec<String>> {
        let mut codes: BTreeMap<StatusCode, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            codes
                .entry(entry.status)
                .or_default()
                .push(entry.label().to_string());
        }
        codes
    }

    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut failures = BTreeMap::new();
        for kind in self.entries.iter().filter_map(|entry| entry.state.failure) {
            *failures.entry(kind).or_insert(0) += 1;
        }
        failures
    }

    pub fn saved(&self) -> usize {
        self.entries.iter().filter(|entry| entry.state.persisted).count()
    }

    pub fn upsert_issues(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state.persistence_failed)
            .count()
    }

    pub fn summary(&self) -> BatchSummary {
        let designations = self.designations_by_code();
        let bands = StatusBand::ordered()
            .into_iter()
            .filter_map(|band| {
                let codes: Vec<CodeCount> = StatusCode::ALL
                    .into_iter()
                    .filter(|code| code.band() == band)
                    .filter_map(|code| {
                        designations.get(&code).map(|names| CodeCount {
                            code,
                            description: code.description(),
                            count: names.len(),
                            designations: names.clone(),
                        })
                    })
                    .collect();
                if codes.is_empty() {
                    return None;
                }
                Some(BandSummary {
                    band,
                    band_label: band.label(),
                    count: codes.iter().map(|code| code.count).sum(),
                    codes,
                })
            })
            .collect();

        let failure_counts = self.failure_counts();
        let failures = FailureKind::ordered()
            .into_iter()
            .filter_map(|failure| {
                failure_counts.get(&failure).map(|count| FailureCount {
                    failure,
                    failure_label: failure.label(),
                    count: *count,
                })
            })
            .collect();

        BatchSummary {
            run_id: self.run_id.clone(),
            total: self.entries.len(),
            saved: self.saved(),
            upsert_issues: self.upsert_issues(),
            bands,
            failures,
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} object(s) saved to the orbit tables; {} object(s) with upsert issues",
            self.saved(),
            self.upsert_issues()
        )
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        let export = BatchExport {
            summary: self.summary(),
            entries: &self.entries,
        };
        serde_json::to_writer_pretty(writer, &export)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for entry in &self.entries {
            csv_writer.serialize(CsvRow {
                input: &entry.input,
                packed_designation: entry.designation.as_ref().map(Designation::packed),
                unpacked_designation: entry.designation.as_ref().map(Designation::unpacked),
                status: entry.status.to_string(),
                band: entry.status.band().label(),
                description: entry.status.description(),
                failure: entry.state.failure.map(|kind| kind.label()),
                attempts: entry.attempts,
                persisted: entry.state.persisted,
                diagnostics: entry.state.diagnostics.join("; "),
            })?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
