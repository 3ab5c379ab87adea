//! Scan-and-patch fixers over PBIR report parts.
//!
//! Every fixer walks the session's part paths in order, optionally limited to
//! one page, evaluates its checks and (outside scan mode) rewrites the parts
//! that fail. Counters follow one rule: `found` counts selected parts,
//! `needing_fix` the ones failing a check, `fixed` the ones rewritten.

use crate::domain::constants::{
    DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH, HD_PAGE_HEIGHT, HD_PAGE_WIDTH, PAGE_SUFFIX,
    VISUAL_SUFFIX,
};
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::{FindingStatus, FixReport};
use crate::services::report_session::ReportSession;
use crate::services::visual::{
    literal_property, projected_fields, query_state, set_literal_property, visual_type,
};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct PropertyCheck {
    pub object: &'static str,
    pub property: &'static str,
    pub desired: &'static str,
    pub label: &'static str,
}

const fn check(
    object: &'static str,
    property: &'static str,
    desired: &'static str,
    label: &'static str,
) -> PropertyCheck {
    PropertyCheck {
        object,
        property,
        desired,
        label,
    }
}

pub const COLUMN_CHART_TYPES: [&str; 2] = ["columnChart", "clusteredColumnChart"];
pub const BAR_CHART_TYPES: [&str; 2] = ["barChart", "clusteredBarChart"];

pub const COLUMN_CHART_CHECKS: [PropertyCheck; 5] = [
    check("categoryAxis", "showAxisTitle", "false", "X axis title"),
    check("valueAxis", "showAxisTitle", "false", "Y axis title"),
    check("valueAxis", "show", "false", "Y axis values"),
    check("labels", "show", "true", "Data labels"),
    check("categoryAxis", "gridlineShow", "false", "Vertical gridlines"),
];

// Bar charts swap the axes: the value axis runs horizontally.
pub const BAR_CHART_CHECKS: [PropertyCheck; 5] = [
    check("valueAxis", "showAxisTitle", "false", "X axis title"),
    check("categoryAxis", "showAxisTitle", "false", "Y axis title"),
    check("valueAxis", "show", "false", "X axis values"),
    check("labels", "show", "true", "Data labels"),
    check("valueAxis", "gridlineShow", "false", "Vertical gridlines"),
];

/// Common knobs for every report fixer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportScope<'a> {
    pub page: Option<&'a str>,
    pub scan_only: bool,
}

fn candidate_paths(
    session: &ReportSession,
    suffix: &str,
    page: Option<&str>,
) -> FixResult<Vec<String>> {
    let page_id = match page {
        Some(name) => Some(session.resolve_page_name(name)?),
        None => None,
    };
    Ok(session
        .list_paths()
        .into_iter()
        .filter(|p| p.ends_with(suffix))
        .filter(|p| {
            page_id
                .as_ref()
                .map(|id| p.contains(&format!("/{id}/")))
                .unwrap_or(true)
        })
        .collect())
}

pub fn fix_pie_charts(
    session: &mut ReportSession,
    scope: ReportScope,
    target_visual_type: &str,
) -> FixResult<FixReport> {
    let target = target_visual_type.trim();
    if target.is_empty() || target == "pieChart" {
        return Err(FixError::InvalidInput(format!(
            "target visual type '{target_visual_type}' cannot replace a pie chart"
        )));
    }
    let report_name = session.report_name().to_string();
    let mut report = FixReport::new("pie-charts", &report_name, scope.scan_only);

    for path in candidate_paths(session, VISUAL_SUFFIX, scope.page)? {
        let mut visual = session.get(&path)?;
        if visual_type(&visual) != Some("pieChart") {
            continue;
        }
        report.found += 1;
        report.needing_fix += 1;
        if scope.scan_only {
            report.push(
                &path,
                FindingStatus::NeedsFix,
                format!("pie chart would be replaced with {target}"),
            );
            continue;
        }
        visual["visual"]["visualType"] = json!(target);
        session.update(&path, visual)?;
        report.fixed += 1;
        report.push(
            &path,
            FindingStatus::Fixed,
            format!("replaced pie chart with {target}"),
        );
    }

    report.summary = if report.found == 0 {
        format!("No pie charts found in the '{report_name}' report.")
    } else if scope.scan_only {
        format!(
            "{} pie chart(s) found that would be replaced with {target}.",
            report.found
        )
    } else {
        format!("Replaced {} pie chart(s) with {target}.", report.fixed)
    };
    Ok(report)
}

pub fn fix_column_charts(session: &mut ReportSession, scope: ReportScope) -> FixResult<FixReport> {
    fix_chart_formatting(
        session,
        scope,
        "column-charts",
        "column chart",
        &COLUMN_CHART_TYPES,
        &COLUMN_CHART_CHECKS,
    )
}

pub fn fix_bar_charts(session: &mut ReportSession, scope: ReportScope) -> FixResult<FixReport> {
    fix_chart_formatting(
        session,
        scope,
        "bar-charts",
        "bar chart",
        &BAR_CHART_TYPES,
        &BAR_CHART_CHECKS,
    )
}

fn fix_chart_formatting(
    session: &mut ReportSession,
    scope: ReportScope,
    fixer: &str,
    noun: &str,
    types: &[&str],
    checks: &[PropertyCheck],
) -> FixResult<FixReport> {
    let report_name = session.report_name().to_string();
    let mut report = FixReport::new(fixer, &report_name, scope.scan_only);

    for path in candidate_paths(session, VISUAL_SUFFIX, scope.page)? {
        let mut visual = session.get(&path)?;
        if !visual_type(&visual).map(|t| types.contains(&t)).unwrap_or(false) {
            continue;
        }
        report.found += 1;

        let issues: Vec<&str> = checks
            .iter()
            .filter(|c| literal_property(&visual, c.object, c.property) != Some(c.desired))
            .map(|c| c.label)
            .collect();
        if issues.is_empty() {
            report.push(&path, FindingStatus::Ok, "all settings correct");
            continue;
        }
        report.needing_fix += 1;
        if scope.scan_only {
            report.push(
                &path,
                FindingStatus::NeedsFix,
                format!("needs fixing: {}", issues.join(", ")),
            );
            continue;
        }

        for c in checks {
            set_literal_property(&mut visual, c.object, c.property, c.desired)
                .map_err(|reason| FixError::malformed(&path, reason))?;
        }
        session.update(&path, visual)?;
        report.fixed += 1;
        report.push(
            &path,
            FindingStatus::Fixed,
            format!("fixed {noun}: {}", issues.join(", ")),
        );
    }

    report.summary = if report.found == 0 {
        format!("No {noun}s found in the '{report_name}' report.")
    } else if scope.scan_only {
        if report.needing_fix == 0 {
            format!(
                "Scanned {} {noun}(s): all have correct settings.",
                report.found
            )
        } else {
            format!(
                "Scanned {} {noun}(s): {} need fixing.",
                report.found, report.needing_fix
            )
        }
    } else if report.fixed == 0 {
        format!(
            "Found {} {noun}(s) in the '{report_name}' report: all already have correct settings.",
            report.found
        )
    } else {
        format!(
            "Successfully fixed {} of {} {noun}(s).",
            report.fixed, report.found
        )
    };
    Ok(report)
}

fn page_dimension(page: &Value, key: &str) -> Option<f64> {
    page.get(key).and_then(Value::as_f64)
}

pub fn fix_page_size(session: &mut ReportSession, scope: ReportScope) -> FixResult<FixReport> {
    let report_name = session.report_name().to_string();
    let mut report = FixReport::new("page-size", &report_name, scope.scan_only);

    for path in candidate_paths(session, PAGE_SUFFIX, scope.page)? {
        let mut page = session.get(&path)?;
        report.found += 1;
        let display = page
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(&path)
            .to_string();
        let height = page_dimension(&page, "height");
        let width = page_dimension(&page, "width");

        if height != Some(DEFAULT_PAGE_HEIGHT) || width != Some(DEFAULT_PAGE_WIDTH) {
            let size = match (width, height) {
                (Some(w), Some(h)) => format!("{w}x{h}"),
                _ => "unset".to_string(),
            };
            report.push(
                &path,
                FindingStatus::Ok,
                format!("'{display}' has custom size {size}, no action needed"),
            );
            continue;
        }
        report.needing_fix += 1;
        if scope.scan_only {
            report.push(
                &path,
                FindingStatus::NeedsFix,
                format!("'{display}' uses the default 1280x720 size (would be changed to {HD_PAGE_WIDTH}x{HD_PAGE_HEIGHT})"),
            );
            continue;
        }

        let obj = page
            .as_object_mut()
            .ok_or_else(|| FixError::malformed(&path, "page part is not an object"))?;
        obj.insert("height".to_string(), json!(HD_PAGE_HEIGHT));
        obj.insert("width".to_string(), json!(HD_PAGE_WIDTH));
        session.update(&path, page)?;
        report.fixed += 1;
        report.push(
            &path,
            FindingStatus::Fixed,
            format!("'{display}' changed from 1280x720 to {HD_PAGE_WIDTH}x{HD_PAGE_HEIGHT}"),
        );
    }

    report.summary = if report.found == 0 {
        format!("No pages found in the '{report_name}' report.")
    } else if scope.scan_only {
        if report.needing_fix == 0 {
            format!(
                "Scanned {} page(s): none use the default 1280x720 size.",
                report.found
            )
        } else {
            format!(
                "Scanned {} page(s): {} would be changed to {HD_PAGE_WIDTH}x{HD_PAGE_HEIGHT}.",
                report.found, report.needing_fix
            )
        }
    } else if report.fixed == 0 {
        format!(
            "Found {} page(s) in the '{report_name}' report: none use the default size.",
            report.found
        )
    } else {
        format!(
            "Successfully changed {} of {} page(s) to {HD_PAGE_WIDTH}x{HD_PAGE_HEIGHT}.",
            report.fixed, report.found
        )
    };
    Ok(report)
}

pub fn fix_hide_visual_filters(
    session: &mut ReportSession,
    scope: ReportScope,
) -> FixResult<FixReport> {
    let report_name = session.report_name().to_string();
    let mut report = FixReport::new("hide-filters", &report_name, scope.scan_only);

    for path in candidate_paths(session, VISUAL_SUFFIX, scope.page)? {
        let mut visual = session.get(&path)?;
        if query_state(&visual).is_none() {
            continue;
        }
        report.found += 1;

        let filter_count = visual
            .pointer("/filterConfig/filters")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        if filter_count > 0 {
            let visible = visual
                .pointer("/filterConfig/filters")
                .and_then(Value::as_array)
                .map(|filters| {
                    filters
                        .iter()
                        .filter(|f| {
                            !f.get("isHiddenInViewMode")
                                .and_then(Value::as_bool)
                                .unwrap_or(false)
                        })
                        .count()
                })
                .unwrap_or(0);
            if visible == 0 {
                report.push(&path, FindingStatus::Ok, "all filters already hidden");
                continue;
            }
            report.needing_fix += 1;
            if scope.scan_only {
                report.push(
                    &path,
                    FindingStatus::NeedsFix,
                    format!("{visible} of {filter_count} filter(s) visible"),
                );
                continue;
            }
            if let Some(filters) = visual
                .pointer_mut("/filterConfig/filters")
                .and_then(Value::as_array_mut)
            {
                for f in filters.iter_mut() {
                    let obj = f
                        .as_object_mut()
                        .ok_or_else(|| FixError::malformed(&path, "filter is not an object"))?;
                    obj.insert("isHiddenInViewMode".to_string(), json!(true));
                }
            }
        } else {
            let fields = projected_fields(&visual);
            if fields.is_empty() {
                report.push(&path, FindingStatus::Skipped, "no projected fields");
                continue;
            }
            report.needing_fix += 1;
            if scope.scan_only {
                report.push(
                    &path,
                    FindingStatus::NeedsFix,
                    format!(
                        "no filterConfig; {} field(s) would be added as hidden filters",
                        fields.len()
                    ),
                );
                continue;
            }
            let filters: Vec<Value> = fields
                .into_iter()
                .map(|(field, kind)| {
                    json!({
                        "name": "",
                        "field": field,
                        "type": kind,
                        "isHiddenInViewMode": true
                    })
                })
                .collect();
            let obj = visual
                .as_object_mut()
                .ok_or_else(|| FixError::malformed(&path, "visual part is not an object"))?;
            obj.insert("filterConfig".to_string(), json!({ "filters": filters }));
        }

        session.update(&path, visual)?;
        report.fixed += 1;
        report.push(&path, FindingStatus::Fixed, "filters hidden");
    }

    report.summary = if report.found == 0 {
        format!("No visuals with query fields found in the '{report_name}' report.")
    } else if scope.scan_only {
        if report.needing_fix == 0 {
            format!(
                "Scanned {} visual(s): all filters already hidden.",
                report.found
            )
        } else {
            format!(
                "Scanned {} visual(s): {} need filter hiding.",
                report.found, report.needing_fix
            )
        }
    } else if report.fixed == 0 {
        format!(
            "Found {} visual(s): all filters already hidden.",
            report.found
        )
    } else {
        format!(
            "Successfully hidden filters on {} of {} visual(s).",
            report.fixed, report.found
        )
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::definition::memory::MemoryStore;
    use crate::services::definition::DefinitionPart;

    const PIE: &str = "definition/pages/p1/visuals/pie/visual.json";
    const COL: &str = "definition/pages/p1/visuals/col/visual.json";
    const BAR: &str = "definition/pages/p2/visuals/bar/visual.json";
    const TEXT: &str = "definition/pages/p2/visuals/text/visual.json";

    fn fixture() -> MemoryStore {
        MemoryStore::new(
            "Sales",
            &[
                (
                    "definition/pages/p1/page.json",
                    json!({"name": "p1", "displayName": "Overview", "height": 720, "width": 1280}),
                ),
                (
                    PIE,
                    json!({"name": "pie", "visual": {"visualType": "pieChart", "query": {"queryState": {
                        "Category": {"projections": [{"field": {"Column": {"Property": "Region"}}}]},
                        "Y": {"projections": [{"field": {"Measure": {"Property": "Sales"}}}]}
                    }}}}),
                ),
                (
                    COL,
                    json!({"name": "col", "visual": {"visualType": "clusteredColumnChart"},
                        "filterConfig": {"filters": [{"name": "f1"}, {"name": "f2", "isHiddenInViewMode": true}]}}),
                ),
                (
                    "definition/pages/p2/page.json",
                    json!({"name": "p2", "displayName": "Details", "height": 1080.0, "width": 1920.0}),
                ),
                (
                    BAR,
                    json!({"name": "bar", "visual": {"visualType": "barChart"}}),
                ),
                (
                    TEXT,
                    json!({"name": "text", "visual": {"visualType": "textbox"}}),
                ),
            ],
        )
    }

    fn session(store: &MemoryStore, scan_only: bool) -> ReportSession {
        ReportSession::open(Box::new(store.clone()), scan_only).unwrap()
    }

    fn scope(scan_only: bool) -> ReportScope<'static> {
        ReportScope {
            page: None,
            scan_only,
        }
    }

    const EMPTY: &str = "definition/pages/p2/visuals/empty/visual.json";

    fn with_fieldless_visual(store: MemoryStore) -> MemoryStore {
        store.parts.borrow_mut().push(DefinitionPart {
            path: EMPTY.to_string(),
            bytes: serde_json::to_vec_pretty(&json!({"name": "empty", "visual": {
                "visualType": "tableEx",
                "query": {"queryState": {"Values": {"projections": []}}}
            }}))
            .unwrap(),
        });
        store
    }

    fn flagged(report: &FixReport) -> Vec<String> {
        let mut parts: Vec<String> = report
            .findings
            .iter()
            .filter(|f| f.status == FindingStatus::NeedsFix)
            .map(|f| f.part.clone())
            .collect();
        parts.sort();
        parts
    }

    fn assert_scan_matches_fix(
        fixer: impl Fn(&mut ReportSession, ReportScope<'static>) -> FixResult<FixReport>,
    ) {
        let store = with_fieldless_visual(fixture());
        let mut scan = session(&store, true);
        let scanned = fixer(&mut scan, scope(true)).unwrap();

        let mut fix = session(&store, false);
        let fixed = fixer(&mut fix, scope(false)).unwrap();
        let mut changed: Vec<String> = fix.commit().unwrap().into_iter().map(|p| p.path).collect();
        changed.sort();

        assert!(!changed.is_empty(), "{}", scanned.fixer);
        assert_eq!(flagged(&scanned), changed, "{}", scanned.fixer);
        assert_eq!(scanned.needing_fix, fixed.fixed, "{}", scanned.fixer);
        assert_eq!(scanned.found, fixed.found, "{}", scanned.fixer);
    }

    #[test]
    fn every_report_fixer_scans_what_it_fixes() {
        assert_scan_matches_fix(|s, sc| fix_pie_charts(s, sc, "barChart"));
        assert_scan_matches_fix(fix_column_charts);
        assert_scan_matches_fix(fix_bar_charts);
        assert_scan_matches_fix(fix_page_size);
        assert_scan_matches_fix(fix_hide_visual_filters);
    }

    #[test]
    fn hide_filters_skips_visuals_without_projected_fields() {
        let store = with_fieldless_visual(fixture());
        let mut s = session(&store, false);
        let r = fix_hide_visual_filters(&mut s, scope(false)).unwrap();
        assert_eq!((r.found, r.needing_fix, r.fixed), (2, 1, 1));
        let skipped = r.findings.iter().find(|f| f.part == EMPTY).unwrap();
        assert_eq!(skipped.status, FindingStatus::Skipped);
        assert_eq!(skipped.detail, "no projected fields");

        let changed: Vec<String> = s.commit().unwrap().into_iter().map(|p| p.path).collect();
        assert_eq!(changed, vec![PIE.to_string()]);
        assert!(store.json(EMPTY).get("filterConfig").is_none());
    }

    #[test]
    fn pie_scan_reports_without_changing() {
        let store = fixture();
        let mut s = session(&store, true);
        let r = fix_pie_charts(&mut s, scope(true), "barChart").unwrap();
        assert_eq!((r.found, r.needing_fix, r.fixed), (1, 1, 0));
        assert_eq!(s.commit().unwrap().len(), 0);
        assert_eq!(store.json(PIE)["visual"]["visualType"], "pieChart");
    }

    #[test]
    fn pie_fix_replaces_visual_type_and_is_idempotent() {
        let store = fixture();
        let mut s = session(&store, false);
        let r = fix_pie_charts(&mut s, scope(false), "barChart").unwrap();
        assert_eq!((r.found, r.fixed), (1, 1));
        assert_eq!(r.summary, "Replaced 1 pie chart(s) with barChart.");
        s.commit().unwrap();
        assert_eq!(store.json(PIE)["visual"]["visualType"], "barChart");

        let mut again = session(&store, false);
        let r = fix_pie_charts(&mut again, scope(false), "barChart").unwrap();
        assert_eq!((r.found, r.needing_fix, r.fixed), (0, 0, 0));
        assert_eq!(r.summary, "No pie charts found in the 'Sales' report.");
    }

    #[test]
    fn pie_target_must_differ_from_pie() {
        let store = fixture();
        let mut s = session(&store, false);
        let err = fix_pie_charts(&mut s, scope(false), "pieChart").unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn page_filter_limits_parts() {
        let store = fixture();
        let mut s = session(&store, true);
        let r = fix_pie_charts(
            &mut s,
            ReportScope {
                page: Some("Details"),
                scan_only: true,
            },
            "barChart",
        )
        .unwrap();
        assert_eq!(r.found, 0);

        let err = fix_pie_charts(
            &mut s,
            ReportScope {
                page: Some("Nope"),
                scan_only: true,
            },
            "barChart",
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn column_chart_scan_and_fix_touch_the_same_parts() {
        let store = fixture();
        let mut scan = session(&store, true);
        let scanned = fix_column_charts(&mut scan, scope(true)).unwrap();
        assert_eq!(scanned.found, 1);
        assert!(scanned.findings[0].detail.contains("X axis title"));
        let flagged: Vec<String> = scanned
            .findings
            .iter()
            .filter(|f| f.status == FindingStatus::NeedsFix)
            .map(|f| f.part.clone())
            .collect();

        let mut fix = session(&store, false);
        let fixed = fix_column_charts(&mut fix, scope(false)).unwrap();
        let changed: Vec<String> = fix.commit().unwrap().into_iter().map(|p| p.path).collect();
        assert_eq!(flagged, changed);
        assert_eq!(fixed.fixed, 1);

        let v = store.json(COL);
        for c in COLUMN_CHART_CHECKS {
            assert_eq!(literal_property(&v, c.object, c.property), Some(c.desired));
        }

        let mut again = session(&store, true);
        let r = fix_column_charts(&mut again, scope(true)).unwrap();
        assert_eq!(r.needing_fix, 0);
        assert_eq!(r.summary, "Scanned 1 column chart(s): all have correct settings.");
    }

    #[test]
    fn bar_chart_checks_use_value_axis_for_x() {
        let store = fixture();
        let mut s = session(&store, false);
        let r = fix_bar_charts(&mut s, scope(false)).unwrap();
        assert_eq!((r.found, r.fixed), (1, 1));
        s.commit().unwrap();
        let v = store.json(BAR);
        assert_eq!(literal_property(&v, "valueAxis", "gridlineShow"), Some("false"));
        assert_eq!(literal_property(&v, "categoryAxis", "gridlineShow"), None);
    }

    #[test]
    fn page_size_only_changes_default_pages() {
        let store = fixture();
        let mut s = session(&store, false);
        let r = fix_page_size(&mut s, scope(false)).unwrap();
        assert_eq!((r.found, r.needing_fix, r.fixed), (2, 1, 1));
        s.commit().unwrap();
        let p1 = store.json("definition/pages/p1/page.json");
        assert_eq!((p1["width"].as_u64(), p1["height"].as_u64()), (Some(1920), Some(1080)));
        let p2 = store.json("definition/pages/p2/page.json");
        assert_eq!(p2["width"].as_f64(), Some(1920.0));
    }

    #[test]
    fn hide_filters_hides_existing_and_builds_missing() {
        let store = fixture();
        let mut s = session(&store, false);
        let r = fix_hide_visual_filters(&mut s, scope(false)).unwrap();
        // pie has a query; the column chart has filters but no query and is skipped.
        assert_eq!((r.found, r.fixed), (1, 1));
        s.commit().unwrap();
        let filters = store.json(PIE)["filterConfig"]["filters"].clone();
        assert_eq!(filters[0]["type"], "Categorical");
        assert_eq!(filters[1]["type"], "Advanced");
        assert_eq!(filters[1]["isHiddenInViewMode"], true);
    }

    #[test]
    fn hide_filters_counts_visible_filters() {
        let store = MemoryStore::new(
            "R",
            &[(
                "definition/pages/a/visuals/v/visual.json",
                json!({"visual": {"visualType": "tableEx", "query": {"queryState": {"Values": {"projections": []}}}},
                    "filterConfig": {"filters": [{"name": "f1"}, {"name": "f2", "isHiddenInViewMode": true}]}}),
            )],
        );
        let mut s = session(&store, true);
        let r = fix_hide_visual_filters(&mut s, scope(true)).unwrap();
        assert_eq!(r.needing_fix, 1);
        assert_eq!(r.findings[0].detail, "1 of 2 filter(s) visible");

        let mut s = session(&store, false);
        fix_hide_visual_filters(&mut s, scope(false)).unwrap();
        s.commit().unwrap();
        let mut s = session(&store, true);
        let r = fix_hide_visual_filters(&mut s, scope(true)).unwrap();
        assert_eq!(r.needing_fix, 0);
    }
}
