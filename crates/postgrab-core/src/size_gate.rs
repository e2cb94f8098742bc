use std::fmt;

use crate::{config::Config, utils::human_bytes};

/// Privilege tier of the acting session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Standard,
    Elevated,
}

impl Tier {
    pub fn from_elevated(elevated: bool) -> Self {
        if elevated {
            Tier::Elevated
        } else {
            Tier::Standard
        }
    }
}

/// Why an item was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeRejection {
    pub size: u64,
    pub limit: u64,
    pub tier: Tier,
}

impl SizeRejection {
    pub fn excess(&self) -> u64 {
        self.size.saturating_sub(self.limit)
    }
}

impl fmt::Display for SizeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file is {}, limit is {} (exceeds by {})",
            human_bytes(self.size),
            human_bytes(self.limit),
            human_bytes(self.excess())
        )
    }
}

/// Per-item size limit. Admits `size <= limit(tier)`.
#[derive(Clone, Copy, Debug)]
pub struct SizeGate {
    standard_limit: u64,
    elevated_limit: u64,
}

impl SizeGate {
    pub fn new(standard_limit: u64, elevated_limit: u64) -> Self {
        Self {
            standard_limit,
            elevated_limit: elevated_limit.max(standard_limit),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.standard_size_limit, cfg.elevated_size_limit)
    }

    pub fn limit(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Standard => self.standard_limit,
            Tier::Elevated => self.elevated_limit,
        }
    }

    pub fn check(&self, size: u64, tier: Tier) -> Result<(), SizeRejection> {
        let limit = self.limit(tier);
        if size <= limit {
            return Ok(());
        }
        Err(SizeRejection { size, limit, tier })
    }

    pub fn admits(&self, size: u64, tier: Tier) -> bool {
        self.check(size, tier).is_ok()
    }
}
