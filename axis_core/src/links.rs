//! Stage-to-axis link extraction from declared PLC symbols.
//!
//! A symbol carrying an `axis-link` pragma names the NC axis its stage drives.
//! Scalars map directly. Arrays expand per element from the declared lower
//! bound: a plain link gets `[i]` appended, a link containing brackets must
//! use the `$INDEX$` placeholder, and anything else is reported and skipped.

use std::fmt::Write as _;

use axis_config::SymbolEntry;

pub const AXIS_LINK_PRAGMA: &str = "axis-link";
pub const INDEX_PLACEHOLDER: &str = "$INDEX$";
/// Largest array a single symbol may expand to.
pub const MAX_ARRAY_ELEMENTS: u32 = 65_536;

/// Symbol class, keyed by declared base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    MotionStage,
    MotionStageBlock,
    Other(String),
}

impl SymbolKind {
    pub fn from_base_type(base_type: &str) -> Self {
        match base_type {
            "ST_MotionStage" | "DUT_MotionStage" => SymbolKind::MotionStage,
            "FB_MotionStage" => SymbolKind::MotionStageBlock,
            other => SymbolKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLink {
    pub stage: String,
    pub axis: String,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkExtraction {
    pub links: Vec<AxisLink>,
    /// Symbols whose link could not be expanded, with the reason.
    pub skipped: Vec<String>,
}

fn axis_link(symbol: &SymbolEntry) -> Option<&str> {
    symbol
        .pragmas
        .iter()
        .find(|(k, _)| k.starts_with(AXIS_LINK_PRAGMA))
        .map(|(_, v)| v.as_str())
}

pub fn extract_links(symbols: &[SymbolEntry]) -> LinkExtraction {
    let mut out = LinkExtraction::default();
    for symbol in symbols {
        let Some(link) = axis_link(symbol) else {
            continue;
        };
        let kind = SymbolKind::from_base_type(&symbol.base_type);
        let Some(array) = symbol.array else {
            out.links.push(AxisLink {
                stage: symbol.name.clone(),
                axis: link.to_string(),
                kind,
            });
            continue;
        };

        if array.elements > MAX_ARRAY_ELEMENTS {
            skip(
                &mut out,
                symbol,
                format!(
                    "Array var '{}' declares {} elements, more than {MAX_ARRAY_ELEMENTS}",
                    symbol.name, array.elements
                ),
            );
            continue;
        }
        let last_offset = i64::from(array.elements.saturating_sub(1));
        if array.lbound.checked_add(last_offset).is_none() {
            skip(
                &mut out,
                symbol,
                format!(
                    "Array var '{}' index range {} + {} overflows",
                    symbol.name, array.lbound, array.elements
                ),
            );
            continue;
        }
        let indices = (0..i64::from(array.elements)).map(|n| array.lbound + n);
        if !link.contains('[') {
            for i in indices {
                out.links.push(AxisLink {
                    stage: format!("{}[{i}]", symbol.name),
                    axis: format!("{link}[{i}]"),
                    kind: kind.clone(),
                });
            }
        } else if link.contains(INDEX_PLACEHOLDER) {
            for i in indices {
                out.links.push(AxisLink {
                    stage: format!("{}[{i}]", symbol.name),
                    axis: link.replace(INDEX_PLACEHOLDER, &i.to_string()),
                    kind: kind.clone(),
                });
            }
        } else {
            skip(
                &mut out,
                symbol,
                format!(
                    "Array var '{}' has axis-link '{link}' not handled as array mapping",
                    symbol.name
                ),
            );
        }
    }
    out
}

fn skip(out: &mut LinkExtraction, symbol: &SymbolEntry, reason: String) {
    tracing::warn!(symbol = %symbol.name, %reason, "axis-link skipped");
    out.skipped.push(reason);
}

/// Two-column table of `stage --> axis`.
pub fn format_table(links: &[AxisLink]) -> String {
    let width = links
        .iter()
        .map(|l| l.stage.len())
        .max()
        .unwrap_or(0)
        .max(22);
    let mut s = String::new();
    let _ = writeln!(s, "{:width$} -->   Axis Reference", "Stage Variable");
    let _ = writeln!(s, "{:width$}       --------------", "-------------------");
    for l in links {
        let _ = writeln!(s, "{:width$} --> {}", l.stage, l.axis);
    }
    s
}
