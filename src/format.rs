// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Pure rendering of a cached record under a formatting mode.

use crate::types::{NameMode, NameRecord};

/// Render a record under the given mode.
///
/// Pure and total: no network or cache access, safe to call from any
/// thread, identical output for identical inputs.
pub fn format_name(record: &NameRecord, mode: NameMode) -> String {
    match mode {
        NameMode::LegacyOnly => record.legacy_name(),
        NameMode::DisplayNameOnly => record.display_name.clone(),
        NameMode::SmartDisplay => {
            if record.is_default_display_name {
                record.display_name.clone()
            } else {
                format!("{} ({})", record.display_name, record.user_name)
            }
        }
        NameMode::DisplayPlusUserName => {
            format!("{} ({})", record.display_name, record.user_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentId;
    use chrono::Utc;

    fn resolved_record() -> NameRecord {
        NameRecord {
            id: AgentId::random(),
            legacy_first: "Jane".to_string(),
            legacy_last: "Doe".to_string(),
            display_name: "Jane".to_string(),
            user_name: "jane.doe".to_string(),
            is_default_display_name: false,
            updated: Utc::now(),
            next_update: Some(Utc::now()),
        }
    }

    #[test]
    fn legacy_only_uses_legacy_pair() {
        assert_eq!(format_name(&resolved_record(), NameMode::LegacyOnly), "Jane Doe");
    }

    #[test]
    fn display_name_only() {
        assert_eq!(format_name(&resolved_record(), NameMode::DisplayNameOnly), "Jane");
    }

    #[test]
    fn smart_display_appends_user_name_for_custom_names() {
        assert_eq!(
            format_name(&resolved_record(), NameMode::SmartDisplay),
            "Jane (jane.doe)"
        );
    }

    #[test]
    fn smart_display_keeps_default_names_bare() {
        let mut record = resolved_record();
        record.display_name = "Jane Doe".to_string();
        record.is_default_display_name = true;
        assert_eq!(format_name(&record, NameMode::SmartDisplay), "Jane Doe");
    }

    #[test]
    fn display_plus_user_name_always_appends() {
        let mut record = resolved_record();
        record.is_default_display_name = true;
        assert_eq!(
            format_name(&record, NameMode::DisplayPlusUserName),
            "Jane (jane.doe)"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let record = resolved_record();
        for mode in [
            NameMode::LegacyOnly,
            NameMode::DisplayNameOnly,
            NameMode::DisplayPlusUserName,
            NameMode::SmartDisplay,
        ] {
            assert_eq!(format_name(&record, mode), format_name(&record, mode));
        }
    }
}
