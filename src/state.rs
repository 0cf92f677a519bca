//! Application state: the in-memory station store, rubric, prompts, and the
//! optional OpenAI client.
//!
//! This module owns:
//!   - the station store (by id)
//!   - the fixed marking rubric (immutable after startup)
//!   - the prompts struct (from TOML or defaults)
//!   - the optional local case bank
//!   - optional OpenAI client
//!
//! Station policy: generate a fresh case via OpenAI when available; otherwise
//! serve from the TOML bank, then built-in seeds, then a hard fallback.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{load_exam_config_from_env, CaseCfg, Prompts};
use crate::domain::{CaseFile, CaseSource, PatientInfo, Station, StationTimer, Turn};
use crate::eval::EvaluationReport;
use crate::openai::OpenAI;
use crate::rubric::Rubric;
use crate::seeds::{hard_fallback_case, random_chief_complaint, seed_cases};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub stations: Arc<RwLock<HashMap<String, Station>>>,
    /// Case pool served when OpenAI is unavailable: TOML bank first, seeds after.
    pub case_pool: Arc<Vec<(CaseSource, CaseFile)>>,
    pub rubric: Arc<Rubric>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
}

fn case_from_cfg(cc: &CaseCfg) -> CaseFile {
    CaseFile {
        patient_info: PatientInfo {
            name: cc.patient_name.clone().unwrap_or_default(),
            age: cc.patient_age.clone().unwrap_or_default(),
            gender: cc.patient_gender.clone().unwrap_or_default(),
            occupation: String::new(),
        },
        chief_complaint: cc.chief_complaint.clone(),
        physical_findings: cc.physical_findings.clone(),
        answer_key: cc.answer_key.clone(),
        ..CaseFile::default()
    }
}

impl AppState {
    /// Build state from env: load config, build the case pool, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_exam_config_from_env();
        let prompts = cfg_opt
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();

        let mut case_pool: Vec<(CaseSource, CaseFile)> = Vec::new();
        if let Some(cfg) = &cfg_opt {
            for cc in &cfg.cases {
                if cc.answer_key.main_diagnosis.trim().is_empty() {
                    error!(target: "station", chief = %cc.chief_complaint, "Skipping bank case: missing main_diagnosis.");
                    continue;
                }
                case_pool.push((CaseSource::LocalBank, case_from_cfg(cc)));
            }
        }
        let bank = case_pool.len();
        for case in seed_cases() {
            case_pool.push((CaseSource::Seed, case));
        }
        info!(target: "station", local_bank = bank, seed = case_pool.len() - bank, "Startup case inventory");

        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "osce_backend", base_url = %oa.base_url, patient_model = %oa.patient_model, examiner_model = %oa.examiner_model, "OpenAI enabled.");
        } else {
            info!(target: "osce_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local case pool.");
        }

        Self {
            stations: Arc::new(RwLock::new(HashMap::new())),
            case_pool: Arc::new(case_pool),
            rubric: Arc::new(Rubric::standard()),
            openai,
            prompts,
        }
    }

    /// Start a station: pick or generate a case, arm the timer, store it.
    /// Returns the station and where its case came from.
    #[instrument(level = "info", skip(self), fields(%language, duration_secs))]
    pub async fn start_station(
        &self,
        language: &str,
        chief_complaint: Option<String>,
        duration_secs: u64,
    ) -> (Station, &'static str) {
        let chief = chief_complaint.unwrap_or_else(random_chief_complaint);

        if let Some(oa) = &self.openai {
            match oa.generate_case(&self.prompts, language, &chief).await {
                Ok(case) => {
                    let station = self.insert_station(language, CaseSource::Generated, case, duration_secs).await;
                    info!(target: "station", id = %station.id, %chief, source = "openai_generated", "Generated fresh station");
                    return (station, "openai_generated");
                }
                Err(e) => {
                    error!(target: "station", %chief, error = %e, "OpenAI case generation failed; using local pool");
                }
            }
        }

        // Prefer a pool case matching the requested complaint, else any pool case.
        let picked = self
            .case_pool
            .iter()
            .find(|(_, c)| c.chief_complaint.eq_ignore_ascii_case(&chief))
            .or_else(|| self.case_pool.first())
            .cloned();

        if let Some((source, case)) = picked {
            let station = self.insert_station(language, source, case, duration_secs).await;
            warn!(target: "station", id = %station.id, ?source, "Serving local pool case");
            return (station, "local_pool");
        }

        let case = hard_fallback_case();
        let station = self.insert_station(language, CaseSource::Seed, case, duration_secs).await;
        warn!(target: "station", id = %station.id, source = "hard_fallback", "Inserted hard fallback station");
        (station, "hard_fallback")
    }

    async fn insert_station(
        &self,
        language: &str,
        source: CaseSource,
        case: CaseFile,
        duration_secs: u64,
    ) -> Station {
        let station = Station {
            id: Uuid::new_v4().to_string(),
            language: language.to_string(),
            source,
            case,
            transcript: Vec::new(),
            timer: StationTimer::start(duration_secs),
            diagnosis: None,
            report: None,
        };
        self.stations
            .write()
            .await
            .insert(station.id.clone(), station.clone());
        station
    }

    /// Read-only access to a station by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_station(&self, id: &str) -> Option<Station> {
        self.stations.read().await.get(id).cloned()
    }

    /// Append a conversation turn to a station's transcript.
    #[instrument(level = "debug", skip(self, turn), fields(%id))]
    pub async fn push_turn(&self, id: &str, turn: Turn) -> bool {
        let mut stations = self.stations.write().await;
        match stations.get_mut(id) {
            Some(st) => {
                st.transcript.push(turn);
                true
            }
            None => false,
        }
    }

    /// Attach the submitted diagnosis and evaluation report to their station.
    /// The report persists for the remainder of the session (display + mark
    /// sheet).
    #[instrument(level = "debug", skip(self, report), fields(%id))]
    pub async fn attach_report(&self, id: &str, diagnosis: String, report: EvaluationReport) -> bool {
        let mut stations = self.stations.write().await;
        match stations.get_mut(id) {
            Some(st) => {
                st.diagnosis = Some(diagnosis);
                st.report = Some(report);
                true
            }
            None => false,
        }
    }
}
