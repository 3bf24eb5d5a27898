use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Domain, ExamMode};

/// Typed exam request configuration, validated once at the system boundary
/// before any of it reaches the selector or the stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamBlueprint {
    pub mode: ExamMode,
    #[serde(default = "default_total_questions")]
    pub total_questions: u32,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Eligible domains in caller order. The order is meaningful: the first
    /// domain absorbs any rounding shortfall of the percentage quotas.
    #[serde(default)]
    pub domains: Vec<Domain>,
    /// Optional integer percentages per domain; they need not sum to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentages: Option<BTreeMap<Domain, u8>>,
    #[serde(default = "default_time_limit_minutes")]
    pub time_limit_minutes: u32,
}

fn default_total_questions() -> u32 {
    50
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_time_limit_minutes() -> u32 {
    100
}

impl ExamBlueprint {
    /// Blueprint used when a stored configuration payload cannot be decoded:
    /// the standard 50-question draw over every domain.
    pub fn fallback(mode: ExamMode, total_questions: u32) -> Self {
        Self {
            mode,
            total_questions,
            locale: default_locale(),
            domains: Domain::ALL.to_vec(),
            percentages: None,
            time_limit_minutes: default_time_limit_minutes(),
        }
    }

    /// Domains to draw from; an empty list means every domain is eligible.
    pub fn effective_domains(&self) -> Vec<Domain> {
        if self.domains.is_empty() {
            Domain::ALL.to_vec()
        } else {
            self.domains.clone()
        }
    }

    pub fn validate(&self) -> Result<(), BlueprintError> {
        if self.total_questions == 0 {
            return Err(BlueprintError::ZeroQuestions);
        }

        let domains = self.effective_domains();
        for (index, domain) in domains.iter().enumerate() {
            if domains[..index].contains(domain) {
                return Err(BlueprintError::DuplicateDomain(*domain));
            }
        }

        if let Some(percentages) = &self.percentages {
            for (domain, share) in percentages {
                if !domains.contains(domain) {
                    return Err(BlueprintError::PercentageForIneligibleDomain(*domain));
                }
                if *share > 100 {
                    return Err(BlueprintError::PercentageOutOfRange {
                        domain: *domain,
                        share: *share,
                    });
                }
            }
        }

        if self.locale.trim().is_empty() {
            return Err(BlueprintError::EmptyLocale);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlueprintError {
    #[error("total questions must be positive")]
    ZeroQuestions,
    #[error("domain {0:?} listed more than once")]
    DuplicateDomain(Domain),
    #[error("percentage given for domain {0:?} which is not eligible")]
    PercentageForIneligibleDomain(Domain),
    #[error("percentage {share} for domain {domain:?} exceeds 100")]
    PercentageOutOfRange { domain: Domain, share: u8 },
    #[error("locale must not be empty")]
    EmptyLocale,
}
