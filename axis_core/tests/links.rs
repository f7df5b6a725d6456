use std::collections::BTreeMap;

use axis_config::{ArrayInfo, SymbolEntry, parse_symbols};
use axis_core::links::{MAX_ARRAY_ELEMENTS, SymbolKind, extract_links, format_table};

fn symbol(name: &str, base: &str, link: Option<&str>, array: Option<(i64, u32)>) -> SymbolEntry {
    let mut pragmas = BTreeMap::new();
    if let Some(l) = link {
        pragmas.insert("axis-link".to_string(), l.to_string());
    }
    SymbolEntry {
        name: name.to_string(),
        base_type: base.to_string(),
        pragmas,
        array: array.map(|(lbound, elements)| ArrayInfo { lbound, elements }),
    }
}

#[test]
fn scalar_and_array_links_expand() {
    let symbols = vec![
        symbol("Main.M1", "ST_MotionStage", Some("Axes.Axis_1"), None),
        symbol("Main.Stages", "ST_MotionStage", Some("Axes.Axis"), Some((1, 3))),
        symbol(
            "Main.Blocks",
            "FB_MotionStage",
            Some("GVL.Axes[$INDEX$].NcAxis"),
            Some((0, 2)),
        ),
        symbol("Main.Unlinked", "ST_MotionStage", None, None),
    ];
    let out = extract_links(&symbols);
    assert!(out.skipped.is_empty());
    let pairs: Vec<(&str, &str)> = out
        .links
        .iter()
        .map(|l| (l.stage.as_str(), l.axis.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("Main.M1", "Axes.Axis_1"),
            ("Main.Stages[1]", "Axes.Axis[1]"),
            ("Main.Stages[2]", "Axes.Axis[2]"),
            ("Main.Stages[3]", "Axes.Axis[3]"),
            ("Main.Blocks[0]", "GVL.Axes[0].NcAxis"),
            ("Main.Blocks[1]", "GVL.Axes[1].NcAxis"),
        ]
    );
    assert_eq!(out.links[4].kind, SymbolKind::MotionStageBlock);
}

#[test]
fn bracketed_link_without_placeholder_is_skipped() {
    let symbols = vec![symbol(
        "Main.Bad",
        "ST_MotionStage",
        Some("GVL.Axes[1]"),
        Some((1, 2)),
    )];
    let out = extract_links(&symbols);
    assert!(out.links.is_empty());
    assert_eq!(out.skipped.len(), 1);
    assert!(out.skipped[0].contains("Main.Bad"));
}

#[test]
fn out_of_range_arrays_are_skipped_not_expanded() {
    let text = r#"[
        { "name": "Main.Edge", "base_type": "ST_MotionStage",
          "pragmas": { "axis-link": "GVL.Axis" },
          "array": { "lbound": 9223372036854775807, "elements": 2 } },
        { "name": "Main.Last", "base_type": "ST_MotionStage",
          "pragmas": { "axis-link": "GVL.Axis" },
          "array": { "lbound": 9223372036854775807, "elements": 1 } }
    ]"#;
    let mut symbols = parse_symbols(text).unwrap();
    symbols.push(symbol(
        "Main.Huge",
        "ST_MotionStage",
        Some("GVL.Axes[$INDEX$]"),
        Some((0, MAX_ARRAY_ELEMENTS + 1)),
    ));
    let out = extract_links(&symbols);

    assert_eq!(out.skipped.len(), 2);
    assert!(out.skipped[0].contains("Main.Edge") && out.skipped[0].contains("overflows"));
    assert!(out.skipped[1].contains("Main.Huge"));
    assert_eq!(out.links.len(), 1);
    assert_eq!(out.links[0].axis, format!("GVL.Axis[{}]", i64::MAX));
}

#[test]
fn links_from_symbol_file_and_table() {
    let text = r#"[
        { "name": "Main.M1", "base_type": "DUT_MotionStage",
          "pragmas": { "axis-link": "GVL.Axis1" } },
        { "name": "Main.Other", "base_type": "INT" }
    ]"#;
    let symbols = parse_symbols(text).unwrap();
    let out = extract_links(&symbols);
    assert_eq!(out.links.len(), 1);
    assert_eq!(out.links[0].kind, SymbolKind::MotionStage);

    let table = format_table(&out.links);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Stage Variable"));
    assert!(lines[2].ends_with("--> GVL.Axis1"));
}
