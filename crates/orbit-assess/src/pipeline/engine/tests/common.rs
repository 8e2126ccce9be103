use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::designation::{Designation, MpcDesignationCodec, OrbitClass};
use crate::pipeline::catalog::{
    CatalogBackend, CatalogError, CatalogStore, InMemoryBackend, OrbitTable,
};
use crate::pipeline::engine::{AssessmentEngine, RunSignal};
use crate::pipeline::fitter::{FitterGateway, GatewayError, RawResult};
use crate::pipeline::interpret::{ObservationPolicy, OriginTag};
use crate::pipeline::quality::{summarize, QualityRules};
use crate::pipeline::record::{ElementSet, EpochTag, OrbitRecord};

pub(super) fn designation(unpacked: &str) -> Designation {
    Designation::parse(unpacked, &MpcDesignationCodec).expect("valid designation")
}

pub(super) fn complete_elements() -> Value {
    let block = json!({"element0": 1.25, "element1": 0.5, "cov00": 0.001});
    json!({"EQU": block, "KEP": block, "CAR": block, "COM": block, "COT": block})
}

pub(super) fn elements_without_car_covariance() -> Value {
    let mut elements = complete_elements();
    elements["CAR"] = json!({"element0": 1.25});
    elements
}

pub(super) fn fit_entry(elements: Value, observations: u64) -> Value {
    json!({
        "INPUT_GENERATION_SUCCESS": true,
        "NUMBER_OF_OBSERVATIONS": observations,
        "ARC_LENGTH_DAYS": 40.0,
        "eq0dict": elements,
        "eq1dict": elements,
        "rwodict": {"observations": observations}
    })
}

/// Stores a record whose summary is derived from `elements`.
pub(super) fn seed_record<B: CatalogBackend>(
    store: &CatalogStore<B>,
    designation: &Designation,
    elements: Value,
) {
    let elements: ElementSet = elements
        .as_object()
        .cloned()
        .expect("element fixture is an object");
    let mut per_epoch = BTreeMap::new();
    per_epoch.insert(EpochTag::MidEpoch, elements.clone());
    per_epoch.insert(EpochTag::StdEpoch, elements);
    let record = OrbitRecord {
        packed_designation: designation.packed().to_string(),
        unpacked_designation: designation.unpacked().to_string(),
        quality_summary: summarize(&per_epoch),
        per_epoch_elements: per_epoch,
        observation_residuals: json!({}),
        extra_parameters: None,
    };
    store
        .upsert_into(&record, OrbitTable::for_class(designation.orbit_class()))
        .expect("seed record");
}

/// Gateway double returning canned payloads and recording every call.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    extension: Option<Value>,
    iod: Option<(bool, Value)>,
    comet: Option<(bool, Value)>,
    unavailable: bool,
    cancel_on_call: Option<RunSignal>,
    calls: Mutex<Vec<OriginTag>>,
}

impl ScriptedGateway {
    pub(super) fn with_extension(mut self, payload: Value) -> Self {
        self.extension = Some(payload);
        self
    }

    pub(super) fn with_iod(mut self, completed: bool, payload: Value) -> Self {
        self.iod = Some((completed, payload));
        self
    }

    pub(super) fn with_comet(mut self, completed: bool, payload: Value) -> Self {
        self.comet = Some((completed, payload));
        self
    }

    pub(super) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub(super) fn cancelling(mut self, signal: RunSignal) -> Self {
        self.cancel_on_call = Some(signal);
        self
    }

    pub(super) fn calls(&self) -> Vec<OriginTag> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn enter(&self, fitter: OriginTag) -> Result<(), GatewayError> {
        self.calls.lock().expect("call log poisoned").push(fitter);
        if let Some(signal) = &self.cancel_on_call {
            signal.cancel();
        }
        if self.unavailable {
            return Err(GatewayError::Unavailable {
                fitter,
                reason: "scripted outage".to_string(),
            });
        }
        Ok(())
    }
}

impl FitterGateway for ScriptedGateway {
    fn run_extension_fit(&self, _designation: &Designation) -> Result<RawResult, GatewayError> {
        self.enter(OriginTag::ExtensionWrapper)?;
        self.extension
            .clone()
            .map(RawResult::new)
            .ok_or(GatewayError::NotConfigured {
                fitter: OriginTag::ExtensionWrapper,
            })
    }

    fn run_iod(
        &self,
        _designation: &Designation,
        _class: OrbitClass,
    ) -> Result<(bool, RawResult), GatewayError> {
        self.enter(OriginTag::IodWrapper)?;
        self.iod
            .clone()
            .map(|(completed, payload)| (completed, RawResult::with_completion(completed, payload)))
            .ok_or(GatewayError::NotConfigured {
                fitter: OriginTag::IodWrapper,
            })
    }

    fn run_comet_fit(&self, _designation: &Designation) -> Result<(bool, RawResult), GatewayError> {
        self.enter(OriginTag::CometWrapper)?;
        self.comet
            .clone()
            .map(|(completed, payload)| (completed, RawResult::with_completion(completed, payload)))
            .ok_or(GatewayError::NotConfigured {
                fitter: OriginTag::CometWrapper,
            })
    }
}

/// In-memory backend that counts calls and can refuse writes.
#[derive(Default)]
pub(super) struct CountingBackend {
    inner: InMemoryBackend,
    pub(super) reads: AtomicUsize,
    pub(super) writes: AtomicUsize,
    pub(super) fail_writes: bool,
}

impl CountingBackend {
    pub(super) fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(super) fn archived(&self, table: OrbitTable) -> Vec<crate::pipeline::record::Row> {
        self.inner.archived(table)
    }

    pub(super) fn total_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

impl CatalogBackend for CountingBackend {
    fn fetch_row(
        &self,
        table: OrbitTable,
        key: &str,
    ) -> Result<Option<crate::pipeline::record::Row>, CatalogError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_row(table, key)
    }

    fn store_row(
        &self,
        table: OrbitTable,
        key: &str,
        row: crate::pipeline::record::Row,
    ) -> Result<(), CatalogError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(CatalogError::Unavailable("scripted write failure".to_string()));
        }
        self.inner.store_row(table, key, row)
    }

    fn append_archive(
        &self,
        table: OrbitTable,
        row: crate::pipeline::record::Row,
    ) -> Result<(), CatalogError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.append_archive(table, row)
    }

    fn keys(&self, table: OrbitTable) -> Result<Vec<String>, CatalogError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.keys(table)
    }
}

pub(super) fn engine(
    backend: CountingBackend,
    gateway: ScriptedGateway,
) -> (
    AssessmentEngine<CountingBackend, ScriptedGateway>,
    Arc<CatalogStore<CountingBackend>>,
    Arc<ScriptedGateway>,
) {
    let store = Arc::new(CatalogStore::new(backend));
    let gateway = Arc::new(gateway);
    let engine = AssessmentEngine::new(
        store.clone(),
        gateway.clone(),
        QualityRules::default(),
        ObservationPolicy::default(),
    );
    (engine, store, gateway)
}
