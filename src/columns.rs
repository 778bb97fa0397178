//! Declarative identification of raw station-file columns.
//!
//! INMET header names vary across station generations ("DATA (YYYY-MM-DD)"
//! vs "Data", "HORA (UTC)" vs "Hora UTC"), so columns are matched by
//! case-insensitive substrings rather than exact names. The table is ordered;
//! the first matching pattern wins and unmatched columns are dropped.

use crate::data_models::ClimateVariable;

/// Role a raw column plays once identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Date,
    Hour,
    Variable(ClimateVariable),
}

/// A single identification rule: every fragment in `all_of` must appear in
/// the upper-cased header, and none of the fragments in `none_of` may.
pub struct ColumnPattern {
    pub all_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub role: ColumnRole,
}

pub const COLUMN_PATTERNS: &[ColumnPattern] = &[
    ColumnPattern {
        all_of: &["DATA"],
        none_of: &["UTC", "FUNDACAO"],
        role: ColumnRole::Date,
    },
    ColumnPattern {
        all_of: &["HORA", "UTC"],
        none_of: &[],
        role: ColumnRole::Hour,
    },
    ColumnPattern {
        all_of: &["PRECIPITA"],
        none_of: &[],
        role: ColumnRole::Variable(ClimateVariable::Precipitation),
    },
    ColumnPattern {
        all_of: &["TEMPERATURA DO AR - BULBO SECO"],
        none_of: &[],
        role: ColumnRole::Variable(ClimateVariable::Temperature),
    },
    ColumnPattern {
        all_of: &["UMIDADE RELATIVA"],
        none_of: &[],
        role: ColumnRole::Variable(ClimateVariable::Humidity),
    },
    ColumnPattern {
        all_of: &["PRESSAO ATMOSFERICA AO NIVEL DA ESTACAO"],
        none_of: &[],
        role: ColumnRole::Variable(ClimateVariable::Pressure),
    },
];

/// Identify the role of a raw column header, if any.
pub fn identify(header: &str) -> Option<ColumnRole> {
    let upper = header.trim().to_uppercase();
    COLUMN_PATTERNS
        .iter()
        .find(|p| {
            p.all_of.iter().all(|frag| upper.contains(frag))
                && p.none_of.iter().all(|frag| !upper.contains(frag))
        })
        .map(|p| p.role)
}
