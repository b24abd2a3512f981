use serde::Serialize;
use tracing::{info, warn};

use crate::config::{AppConfig, PublicAppConfig};
use crate::content::ContentGenerator;
use crate::errors::AppResult;
use crate::places::PlacesService;
use crate::sanitize_error_copy;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceCheck {
    pub service: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl ServiceCheck {
    fn passed(service: &'static str, detail: String) -> Self {
        Self {
            service,
            ok: true,
            detail,
        }
    }

    fn failed(service: &'static str, detail: String) -> Self {
        Self {
            service,
            ok: false,
            detail: sanitize_error_copy(&detail),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyCheckReport {
    pub places: ServiceCheck,
    pub generation: ServiceCheck,
    pub config: PublicAppConfig,
}

impl KeyCheckReport {
    pub fn all_ok(&self) -> bool {
        self.places.ok && self.generation.ok
    }

    pub fn checks(&self) -> [&ServiceCheck; 2] {
        [&self.places, &self.generation]
    }
}

/// Builds live clients from `config` and probes both services. A missing key
/// is reported as a failed check rather than an error.
pub async fn check_keys(config: &AppConfig) -> AppResult<KeyCheckReport> {
    let places = match &config.google_maps_api_key {
        Some(key) => {
            let service = PlacesService::new(config, key.clone())?;
            probe_places(&service).await
        }
        None => ServiceCheck::failed(PLACES_SERVICE, "GOOGLE_MAPS_API_KEY is not set".into()),
    };
    let generation = match &config.gemini_api_key {
        Some(key) => {
            let generator = ContentGenerator::new(config, key.clone())?;
            probe_generation(&generator).await
        }
        None => ServiceCheck::failed(GENERATION_SERVICE, "GEMINI_API_KEY is not set".into()),
    };
    Ok(report(config, places, generation))
}

pub async fn check_services(
    config: &AppConfig,
    places: &PlacesService,
    generator: &ContentGenerator,
) -> KeyCheckReport {
    let places = probe_places(places).await;
    let generation = probe_generation(generator).await;
    report(config, places, generation)
}

const PLACES_SERVICE: &str = "google_places";
const GENERATION_SERVICE: &str = "gemini";

fn report(config: &AppConfig, places: ServiceCheck, generation: ServiceCheck) -> KeyCheckReport {
    let report = KeyCheckReport {
        places,
        generation,
        config: config.public_profile(),
    };
    if report.all_ok() {
        info!("api key check passed");
    } else {
        for check in report.checks().iter().filter(|check| !check.ok) {
            warn!(service = check.service, detail = %check.detail, "api key check failed");
        }
    }
    report
}

async fn probe_places(service: &PlacesService) -> ServiceCheck {
    match service.probe().await {
        Ok(candidates) => ServiceCheck::passed(
            PLACES_SERVICE,
            format!("probe search returned {candidates} candidate(s)"),
        ),
        Err(err) => ServiceCheck::failed(PLACES_SERVICE, err.to_string()),
    }
}

async fn probe_generation(generator: &ContentGenerator) -> ServiceCheck {
    match generator.probe().await {
        Ok(reply) if !reply.text.trim().is_empty() => {
            ServiceCheck::passed(GENERATION_SERVICE, format!("model {} responded", reply.model))
        }
        Ok(reply) => ServiceCheck::failed(
            GENERATION_SERVICE,
            format!("model {} returned an empty reply", reply.model),
        ),
        Err(err) => ServiceCheck::failed(GENERATION_SERVICE, err.to_string()),
    }
}
