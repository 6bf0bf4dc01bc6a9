//! Resource kinds and condition attributes
//!
//! Both enumerations are closed: every consumer selects behavior with an
//! exhaustive `match`, never a string lookup.

use serde::{Deserialize, Serialize};

use crate::error::AmpereError;

/// Category of tracked entity that subscriptions can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Site,
    Reading,
    TariffGeneratedRate,
    DynamicOperatingEnvelope,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Site,
        ResourceKind::Reading,
        ResourceKind::TariffGeneratedRate,
        ResourceKind::DynamicOperatingEnvelope,
    ];

    /// Stable storage code (the `subscription.resource_type` column)
    pub fn code(self) -> i32 {
        match self {
            ResourceKind::Site => 1,
            ResourceKind::Reading => 2,
            ResourceKind::TariffGeneratedRate => 3,
            ResourceKind::DynamicOperatingEnvelope => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ResourceKind::Site),
            2 => Some(ResourceKind::Reading),
            3 => Some(ResourceKind::TariffGeneratedRate),
            4 => Some(ResourceKind::DynamicOperatingEnvelope),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Site => "site",
            ResourceKind::Reading => "reading",
            ResourceKind::TariffGeneratedRate => "tariff_generated_rate",
            ResourceKind::DynamicOperatingEnvelope => "dynamic_operating_envelope",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = AmpereError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AmpereError::IllegalArgument(format!("unknown resource kind: {}", s)))
    }
}

/// Entity attribute a subscription condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionAttribute {
    ReadingValue,
    ImportLimitWatts,
    ExportLimitWatts,
    ImportActivePrice,
    ExportActivePrice,
}

impl ConditionAttribute {
    /// Stable storage code (the `subscription_condition.attribute` column)
    pub fn code(self) -> i32 {
        match self {
            ConditionAttribute::ReadingValue => 0,
            ConditionAttribute::ImportLimitWatts => 1,
            ConditionAttribute::ExportLimitWatts => 2,
            ConditionAttribute::ImportActivePrice => 3,
            ConditionAttribute::ExportActivePrice => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ConditionAttribute::ReadingValue),
            1 => Some(ConditionAttribute::ImportLimitWatts),
            2 => Some(ConditionAttribute::ExportLimitWatts),
            3 => Some(ConditionAttribute::ImportActivePrice),
            4 => Some(ConditionAttribute::ExportActivePrice),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_codes_are_stable() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ResourceKind::Site.code(), 1);
        assert_eq!(ResourceKind::DynamicOperatingEnvelope.code(), 4);
        assert_eq!(ResourceKind::from_code(99), None);
    }

    #[test]
    fn test_resource_kind_from_str() {
        assert_eq!("site".parse::<ResourceKind>().unwrap(), ResourceKind::Site);
        assert_eq!(
            "tariff_generated_rate".parse::<ResourceKind>().unwrap(),
            ResourceKind::TariffGeneratedRate
        );
        assert!(matches!(
            "der_control".parse::<ResourceKind>(),
            Err(AmpereError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_resource_kind_serde_matches_display() {
        let json = serde_json::to_string(&ResourceKind::DynamicOperatingEnvelope).unwrap();
        assert_eq!(json, "\"dynamic_operating_envelope\"");
    }

    #[test]
    fn test_condition_attribute_codes() {
        assert_eq!(ConditionAttribute::from_code(0), Some(ConditionAttribute::ReadingValue));
        assert_eq!(ConditionAttribute::from_code(4), Some(ConditionAttribute::ExportActivePrice));
        assert_eq!(ConditionAttribute::from_code(5), None);
    }
}
