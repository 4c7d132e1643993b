use crate::backend::{BackendId, CompactSchema};
use crate::error::{BackendError, SearchError};
use crate::models::{BackendFailure, CompactResult, SearchOutcome};
use crate::router::DocumentRef;
use crate::text::{normalize_whitespace, truncate_chars};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::{debug, warn};

pub const SUMMARY_MAX_CHARS: usize = 300;

/// Merges per-backend outcomes in the order the backends were targeted.
///
/// Failed backends land in `backend_errors`; the call itself fails only when
/// every targeted backend failed.
pub fn merge(
    outcomes: Vec<(BackendId, Result<Vec<Value>, BackendError>)>,
) -> Result<SearchOutcome, SearchError> {
    let targeted = outcomes.len();
    let mut merged = SearchOutcome::default();

    for (backend, outcome) in outcomes {
        match outcome {
            Ok(items) => {
                let before = merged.results.len();
                merged
                    .results
                    .extend(items.iter().filter_map(|item| compact(backend, item)));
                debug!(
                    backend = %backend,
                    raw = items.len(),
                    kept = merged.results.len() - before,
                    "backend results compacted"
                );
            }
            Err(error) => {
                warn!(backend = %backend, error = %error, "backend search failed");
                merged.backend_errors.insert(
                    backend,
                    BackendFailure {
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    },
                );
            }
        }
    }

    if targeted > 0 && merged.backend_errors.len() == targeted {
        return Err(SearchError::AllBackendsFailed(merged.backend_errors));
    }

    Ok(merged)
}

pub fn compact(backend: BackendId, item: &Value) -> Option<CompactResult> {
    let schema = backend.capabilities().schema;
    let Some(key) = scalar(item, schema.key) else {
        warn!(backend = %backend, "dropping result without a document key");
        return None;
    };

    Some(CompactResult {
        id: DocumentRef::new(backend, key).encode(),
        title: join_parts(item, schema.title),
        court_or_unit: first_scalar(item, schema.unit).unwrap_or_default(),
        date: first_scalar(item, schema.date)
            .as_deref()
            .and_then(parse_decision_date),
        summary: summarize(item, &schema),
        backend,
    })
}

pub fn truncate_summary(text: &str) -> String {
    truncate_chars(&normalize_whitespace(text), SUMMARY_MAX_CHARS)
}

/// Accepts the date shapes the portals emit: `DD.MM.YYYY`, `DD/MM/YYYY`,
/// `YYYY-MM-DD` and RFC 3339 timestamps.
pub fn parse_decision_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    for pattern in ["%d.%m.%Y", "%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, pattern) {
            return Some(date);
        }
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn summarize(item: &Value, schema: &CompactSchema) -> String {
    truncate_summary(&join_parts(item, schema.summary))
}

fn join_parts(item: &Value, parts: &[(&str, &str)]) -> String {
    parts
        .iter()
        .filter_map(|(prefix, pointer)| scalar(item, pointer).map(|value| format!("{prefix}{value}")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_scalar(item: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| scalar(item, pointer))
}

fn scalar(item: &Value, pointer: &str) -> Option<String> {
    let value = match item.pointer(pointer)? {
        Value::String(text) => normalize_whitespace(text),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::route;
    use serde_json::json;

    fn yargitay_items(count: usize) -> Vec<Value> {
        (0..count)
            .map(|index| {
                json!({
                    "id": 1000 + index,
                    "daire": "3. Hukuk Dairesi",
                    "esasNo": format!("2023/{index}"),
                    "kararNo": "2024/77",
                    "kararTarihi": "05.03.2024"
                })
            })
            .collect()
    }

    #[test]
    fn partial_failure_keeps_successful_results() {
        let outcomes = vec![
            (BackendId::Yargitay, Ok(yargitay_items(5))),
            (
                BackendId::Danistay,
                Err(BackendError::Timeout {
                    backend: BackendId::Danistay,
                    elapsed_ms: 8000,
                }),
            ),
        ];

        let merged = merge(outcomes).expect("one backend succeeded");
        assert_eq!(merged.results.len(), 5);
        assert_eq!(merged.backend_errors.len(), 1);
        assert_eq!(merged.backend_errors[&BackendId::Danistay].kind, "timeout");
    }

    #[test]
    fn all_failures_fail_the_call() {
        let outcomes = vec![(
            BackendId::Yargitay,
            Err(BackendError::Status {
                backend: BackendId::Yargitay,
                status: 502,
            }),
        )];

        assert!(matches!(
            merge(outcomes),
            Err(SearchError::AllBackendsFailed(_))
        ));
    }

    #[test]
    fn merge_preserves_target_order() {
        let outcomes = vec![
            (
                BackendId::Kvkk,
                Ok(vec![json!({"key": "/Icerik/1", "title": "Karar özeti"})]),
            ),
            (BackendId::Yargitay, Ok(yargitay_items(2))),
        ];

        let merged = merge(outcomes).expect("merge should succeed");
        let backends: Vec<_> = merged.results.iter().map(|result| result.backend).collect();
        assert_eq!(
            backends,
            vec![BackendId::Kvkk, BackendId::Yargitay, BackendId::Yargitay]
        );
        assert_eq!(merged.results[1].title, "E. 2023/0, K. 2024/77");
    }

    #[test]
    fn compact_ids_route_back_to_their_backend() {
        let result = compact(BackendId::Yargitay, &yargitay_items(1)[0]).expect("item has a key");
        let route = route(&result.id).expect("id should route");
        assert_eq!(route.backend(), BackendId::Yargitay);
        assert_eq!(route.document.key, "1000");
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(result.court_or_unit, "3. Hukuk Dairesi");
    }

    #[test]
    fn every_backend_compacts_to_a_routable_id() {
        let cases = [
            (BackendId::Yargitay, json!({"id": "61290800", "daire": "3. Hukuk Dairesi"}), "61290800"),
            (BackendId::Danistay, json!({"id": "DNST-77", "daireKurul": "3. Daire"}), "DNST-77"),
            (BackendId::Emsal, json!({"id": 4512, "daire": "İstanbul BAM"}), "4512"),
            (BackendId::Bedesten, json!({"documentId": "1123456700", "birimAdi": "9. Hukuk Dairesi"}), "1123456700"),
            (BackendId::AnayasaNorm, json!({"path": "/ND/2019/77", "title": "E.2018/1, K.2019/77"}), "/ND/2019/77"),
            (BackendId::AnayasaBireysel, json!({"path": "/BB/2021/20295", "title": "A.B. Başvurusu"}), "/BB/2021/20295"),
            (BackendId::Rekabet, json!({"kararId": "3d5a0c1e-aa01", "title": "Devralma"}), "3d5a0c1e-aa01"),
            (
                BackendId::Kvkk,
                json!({"key": "https://www.kvkk.gov.tr/Icerik/7801/2023-1145", "title": "Karar Özeti"}),
                "https://www.kvkk.gov.tr/Icerik/7801/2023-1145",
            ),
            (BackendId::Bddk, json!({"key": "1290", "title": "Kurul Kararı"}), "1290"),
        ];
        assert_eq!(cases.len(), BackendId::ALL.len());

        for (backend, item, key) in cases {
            let result = compact(backend, &item)
                .unwrap_or_else(|| panic!("{backend} item should compact"));
            assert_eq!(result.backend, backend);

            let route = route(&result.id).unwrap_or_else(|error| panic!("{backend} id should route: {error}"));
            assert_eq!(route.backend(), backend, "{}", result.id);
            assert_eq!(route.document.key, key, "{}", result.id);
        }
    }

    #[test]
    fn items_without_keys_are_dropped() {
        assert!(compact(BackendId::Yargitay, &json!({"daire": "1. Ceza Dairesi"})).is_none());
    }

    #[test]
    fn summaries_are_truncated_consistently() {
        let long = "İçtihat ".repeat(100);
        let item = json!({"key": "/Icerik/9", "title": "t", "snippet": long});
        let result = compact(BackendId::Kvkk, &item).expect("item has a key");

        assert_eq!(result.summary.chars().count(), SUMMARY_MAX_CHARS + 1);
        assert!(result.summary.ends_with(crate::text::TRUNCATION_MARKER));
    }

    #[test]
    fn missing_dates_stay_empty() {
        let item = json!({"key": "/Icerik/9", "title": "t", "date": "bilinmiyor"});
        let result = compact(BackendId::Kvkk, &item).expect("item has a key");
        assert!(result.date.is_none());
    }

    #[test]
    fn date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2021, 11, 2);
        assert_eq!(parse_decision_date("02.11.2021"), expected);
        assert_eq!(parse_decision_date("2/11/2021"), expected);
        assert_eq!(parse_decision_date("2021-11-02"), expected);
        assert_eq!(parse_decision_date("2021-11-02T00:00:00.000+03:00"), expected);
        assert_eq!(parse_decision_date("2021-11-02T00:00:00"), expected);
    }
}
