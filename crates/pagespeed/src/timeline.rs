//! Timeline import
//!
//! Parses the instrumentation records a browser emits while loading a
//! page into an owned forest of `InstrumentationData`. Record payloads
//! stay as JSON maps; rules that care about a record type read the keys
//! they need.

use crate::error::{PagespeedError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    EventDispatch,
    Layout,
    RecalculateStyles,
    Paint,
    ParseHtml,
    TimerInstall,
    TimerRemove,
    TimerFire,
    XhrReadyStateChange,
    XhrLoad,
    EvaluateScript,
    MarkTimeline,
    ResourceSendRequest,
    ResourceReceiveResponse,
    ResourceReceivedData,
    ResourceFinish,
    FunctionCall,
    GcEvent,
    MarkDomContent,
    MarkLoad,
    ScheduleResourceRequest,
    TimeStamp,
    RegisterAnimationFrameCallback,
    CancelAnimationFrameCallback,
    FireAnimationFrameEvent,
}

impl RecordType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "EventDispatch" => Self::EventDispatch,
            "Layout" => Self::Layout,
            "RecalculateStyles" => Self::RecalculateStyles,
            "Paint" => Self::Paint,
            "ParseHTML" => Self::ParseHtml,
            "TimerInstall" => Self::TimerInstall,
            "TimerRemove" => Self::TimerRemove,
            "TimerFire" => Self::TimerFire,
            "XHRReadyStateChange" => Self::XhrReadyStateChange,
            "XHRLoad" => Self::XhrLoad,
            "EvaluateScript" => Self::EvaluateScript,
            "MarkTimeline" => Self::MarkTimeline,
            "ResourceSendRequest" => Self::ResourceSendRequest,
            "ResourceReceiveResponse" => Self::ResourceReceiveResponse,
            "ResourceReceivedData" => Self::ResourceReceivedData,
            "ResourceFinish" => Self::ResourceFinish,
            "FunctionCall" => Self::FunctionCall,
            "GCEvent" => Self::GcEvent,
            "MarkDOMContent" => Self::MarkDomContent,
            "MarkLoad" => Self::MarkLoad,
            "ScheduleResourceRequest" => Self::ScheduleResourceRequest,
            "TimeStamp" => Self::TimeStamp,
            "RegisterAnimationFrameCallback" => Self::RegisterAnimationFrameCallback,
            "CancelAnimationFrameCallback" => Self::CancelAnimationFrameCallback,
            "FireAnimationFrameEvent" => Self::FireAnimationFrameEvent,
            _ => return None,
        })
    }

    /// Types that carry no `data` payload
    fn has_payload(self) -> bool {
        !matches!(
            self,
            Self::Layout | Self::MarkDomContent | Self::MarkLoad | Self::RecalculateStyles
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub line_number: i32,
    #[serde(default)]
    pub column_number: i32,
}

/// One timeline record with its nested records
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentationData {
    pub record_type: RecordType,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub used_heap_size: Option<i64>,
    pub total_heap_size: Option<i64>,
    pub data: Map<String, Value>,
    pub stack_trace: Vec<StackFrame>,
    pub children: Vec<InstrumentationData>,
}

impl InstrumentationData {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            start_time: None,
            end_time: None,
            used_heap_size: None,
            total_heap_size: None,
            data: Map::new(),
            stack_trace: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Pre-order walk over this record and its descendants. `visit` also
    /// gets the enclosing records, outermost first.
    pub fn walk<F>(&self, visit: &mut F)
    where
        F: FnMut(&InstrumentationData, &[&InstrumentationData]),
    {
        fn descend<'a, F>(record: &'a InstrumentationData, ancestors: &mut Vec<&'a InstrumentationData>, visit: &mut F)
        where
            F: FnMut(&InstrumentationData, &[&InstrumentationData]),
        {
            visit(record, ancestors);
            ancestors.push(record);
            for child in &record.children {
                descend(child, ancestors, visit);
            }
            ancestors.pop();
        }
        descend(self, &mut Vec::new(), visit);
    }
}

/// Parse a timeline from its JSON text. Empty input is an empty timeline.
pub fn parse_timeline_str(text: &str) -> Result<Vec<InstrumentationData>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| PagespeedError::Timeline(e.to_string()))?;
    parse_timeline(&value)
}

/// Parse a timeline array
///
/// Malformed records are reported as a `Timeline` error after the whole
/// array has been examined, so every problem ends up in the log.
/// Unknown record types are skipped: the format grows over time.
pub fn parse_timeline(value: &Value) -> Result<Vec<InstrumentationData>> {
    let records = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(records) => records,
        _ => {
            return Err(PagespeedError::Timeline(
                "timeline must be a JSON array".to_string(),
            ))
        }
    };

    let mut parser = TimelineParser::default();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if let Some(parsed) = parser.parse_record(record) {
            out.push(parsed);
        }
    }

    if let Some(first) = parser.errors.first() {
        return Err(PagespeedError::Timeline(format!(
            "{} ({} problem(s))",
            first,
            parser.errors.len()
        )));
    }
    tracing::debug!("Parsed {} top-level timeline records", out.len());
    Ok(out)
}

#[derive(Default)]
struct TimelineParser {
    errors: Vec<String>,
}

impl TimelineParser {
    fn error(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.errors.push(message);
    }

    fn parse_record(&mut self, json: &Value) -> Option<InstrumentationData> {
        let Some(obj) = json.as_object() else {
            self.error("timeline record must be a dictionary".to_string());
            return None;
        };

        let Some(type_name) = obj.get("type").and_then(Value::as_str) else {
            self.error("timeline record is missing 'type'".to_string());
            return None;
        };
        let Some(record_type) = RecordType::from_name(type_name) else {
            tracing::warn!("Skipping unknown timeline record type {}", type_name);
            return None;
        };

        let mut record = InstrumentationData::new(record_type);
        if record_type.has_payload() {
            match obj.get("data") {
                Some(Value::Object(data)) => record.data = data.clone(),
                _ => self.error(format!("{} record is missing its data dictionary", type_name)),
            }
        }

        record.start_time = obj.get("startTime").and_then(Value::as_f64);
        record.end_time = obj.get("endTime").and_then(Value::as_f64);
        record.used_heap_size = obj.get("usedHeapSize").and_then(Value::as_i64);
        record.total_heap_size = obj.get("totalHeapSize").and_then(Value::as_i64);

        if let Some(stack) = obj.get("stackTrace").and_then(Value::as_array) {
            for frame in stack.iter().filter(|f| f.is_object()) {
                match serde_json::from_value::<StackFrame>(frame.clone()) {
                    Ok(frame) => record.stack_trace.push(frame),
                    Err(e) => self.error(format!("bad 'stackTrace' entry: {}", e)),
                }
            }
            if stack.iter().any(|f| !f.is_object()) {
                self.error("'stackTrace' entry must be a dictionary".to_string());
            }
        }

        if let Some(children) = obj.get("children").and_then(Value::as_array) {
            for child in children {
                if let Some(parsed) = self.parse_record(child) {
                    record.children.push(parsed);
                }
            }
        }

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_records() {
        let timeline = json!([
            {
                "type": "ParseHTML",
                "startTime": 10.0,
                "endTime": 20.5,
                "data": {"length": 100, "startLine": 0, "endLine": 10},
                "children": [
                    {"type": "Layout", "startTime": 11.0},
                    {"type": "EvaluateScript", "data": {"url": "http://a.com/x.js", "lineNumber": 1},
                     "stackTrace": [{"url": "http://a.com/", "functionName": "f",
                                     "lineNumber": 3, "columnNumber": 7}]}
                ]
            },
            {"type": "MarkLoad", "startTime": 30.0}
        ]);
        let records = parse_timeline(&timeline).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, RecordType::ParseHtml);
        assert_eq!(records[0].end_time, Some(20.5));
        assert_eq!(records[0].children.len(), 2);
        let eval = &records[0].children[1];
        assert_eq!(eval.data_str("url"), Some("http://a.com/x.js"));
        assert_eq!(eval.stack_trace[0].function_name, "f");
        assert_eq!(eval.stack_trace[0].column_number, 7);

        let mut visited = Vec::new();
        records[0].walk(&mut |r, ancestors| visited.push((r.record_type, ancestors.len())));
        assert_eq!(
            visited,
            vec![
                (RecordType::ParseHtml, 0),
                (RecordType::Layout, 1),
                (RecordType::EvaluateScript, 1)
            ]
        );
    }

    #[test]
    fn test_empty_and_null() {
        assert!(parse_timeline_str("").unwrap().is_empty());
        assert!(parse_timeline(&Value::Null).unwrap().is_empty());
        assert!(parse_timeline(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_timeline(&json!({"type": "Layout"})),
            Err(PagespeedError::Timeline(_))
        ));
        assert!(parse_timeline(&json!([1])).is_err());
        assert!(parse_timeline(&json!([{"startTime": 1}])).is_err());
        // payload required for this type
        assert!(parse_timeline(&json!([{"type": "Paint"}])).is_err());
        assert!(parse_timeline_str("[").is_err());
    }

    #[test]
    fn test_unknown_type_skipped() {
        let records = parse_timeline(&json!([{"type": "SomethingNew"}, {"type": "Layout"}])).unwrap();
        assert_eq!(records.len(), 1);
    }
}
