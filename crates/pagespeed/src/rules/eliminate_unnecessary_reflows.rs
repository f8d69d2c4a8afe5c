use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, FindingDetails, ReflowStackTrace};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use crate::timeline::{InstrumentationData, RecordType, StackFrame};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const MIN_FUNCTION_NAME_WIDTH: usize = 10;
const MAX_FUNCTION_NAME_WIDTH: usize = 75;

/// Layouts forced synchronously by script, grouped by the script that was
/// running when they happened
#[derive(Debug, Default)]
pub struct EliminateUnnecessaryReflows;

impl EliminateUnnecessaryReflows {
    pub fn new() -> Self {
        Self
    }
}

/// One script-triggered layout: its call stack and how long the outermost
/// enclosing layout took
struct Reflow {
    frames: Vec<StackFrame>,
    duration_millis: f64,
}

/// URL of the outermost script running around a record
fn root_script_url<'a>(ancestors: &[&'a InstrumentationData]) -> Option<&'a str> {
    ancestors.iter().find_map(|record| match record.record_type {
        RecordType::FunctionCall => record.data_str("scriptName"),
        RecordType::EvaluateScript => record.data_str("url"),
        _ => None,
    })
}

/// Script URL -> reflows it caused
fn discover_reflows(timeline: &[InstrumentationData]) -> BTreeMap<String, Vec<Reflow>> {
    let mut by_script: BTreeMap<String, Vec<Reflow>> = BTreeMap::new();
    for top in timeline {
        top.walk(&mut |record, ancestors| {
            if record.record_type != RecordType::Layout || record.stack_trace.is_empty() {
                return;
            }
            let Some(url) = root_script_url(ancestors) else { return };
            // nested layouts are part of the outermost one
            let root_layout = ancestors
                .iter()
                .rev()
                .take_while(|a| a.record_type == RecordType::Layout)
                .last()
                .copied()
                .unwrap_or(record);
            let duration_millis = match (root_layout.start_time, root_layout.end_time) {
                (Some(start), Some(end)) => end - start,
                _ => 0.0,
            };
            by_script.entry(url.to_string()).or_default().push(Reflow {
                frames: record.stack_trace.clone(),
                duration_millis,
            });
        });
    }
    by_script
}

/// Identical call stacks merged, stacks shorter than a millisecond dropped.
/// Returns the number of reflows kept.
fn unique_stack_traces(reflows: Vec<Reflow>) -> (i32, Vec<ReflowStackTrace>) {
    let mut traces: Vec<ReflowStackTrace> = Vec::new();
    let mut count = 0;
    for reflow in reflows {
        if reflow.duration_millis < 1.0 {
            continue;
        }
        count += 1;
        match traces.iter_mut().find(|t| t.frames == reflow.frames) {
            Some(trace) => {
                trace.count += 1;
                trace.duration_millis += reflow.duration_millis;
            }
            None => traces.push(ReflowStackTrace {
                frames: reflow.frames,
                count: 1,
                duration_millis: reflow.duration_millis,
            }),
        }
    }
    (count, traces)
}

/// One line per frame, function names right-aligned
fn presentable_stack_trace(trace: &ReflowStackTrace) -> String {
    let width = trace
        .frames
        .iter()
        .map(|f| f.function_name.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(MIN_FUNCTION_NAME_WIDTH, MAX_FUNCTION_NAME_WIDTH);
    trace
        .frames
        .iter()
        .map(|f| {
            format!(
                "{:>width$} @ {:.75}:{}:{}",
                f.function_name,
                f.url,
                f.line_number,
                f.column_number,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stack_traces(finding: &Finding) -> &[ReflowStackTrace] {
    match &finding.details {
        Some(FindingDetails::Reflows { stack_traces }) => stack_traces,
        _ => &[],
    }
}

fn total_duration(finding: &Finding) -> f64 {
    stack_traces(finding).iter().map(|t| t.duration_millis).sum()
}

impl Rule for EliminateUnnecessaryReflows {
    fn name(&self) -> &str {
        "EliminateUnnecessaryReflows"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Eliminate unnecessary reflows")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        let pagespeed_input = input.pagespeed_input();
        for (url, reflows) in discover_reflows(pagespeed_input.timeline()) {
            let Some(resource) = pagespeed_input.resource_with_url(&url) else {
                tracing::info!("Unable to find resource with url {}", url);
                continue;
            };
            let (count, stack_traces) = unique_stack_traces(reflows);
            if count == 0 {
                continue;
            }
            let finding = provider.new_result();
            finding.resource_urls.push(resource.request_url().to_string());
            finding.savings.page_reflows_saved = count;
            finding.details = Some(FindingDetails::Reflows { stack_traces });
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }
        let mut block = formatter.add_url_block(
            &UserFacingString::new(
                "JavaScript that executed in the following resources caused unnecessary reflows. \
                 To reduce page render time, modify the JavaScript so it does not cause a reflow:",
            ),
            &[],
        );
        for result in results {
            let Some(url) = result.first_url().filter(|_| result.resource_urls.len() == 1) else {
                tracing::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    result.resource_urls.len()
                );
                continue;
            };
            let mut url_formatter = block.add_url_result(
                &UserFacingString::new("%(URL)s (%(NUM_REFLOWS)s reflows)"),
                &[
                    Argument::url("URL", url),
                    Argument::integer("NUM_REFLOWS", i64::from(result.savings.page_reflows_saved)),
                ],
            );

            let mut traces: Vec<&ReflowStackTrace> = stack_traces(result).iter().collect();
            traces.sort_by(|a, b| b.duration_millis.partial_cmp(&a.duration_millis).unwrap_or(Ordering::Equal));
            for trace in traces {
                let stack = presentable_stack_trace(trace);
                let duration = trace.duration_millis as i64;
                if trace.count == 1 {
                    url_formatter.add_detail(
                        &UserFacingString::new(
                            "The following JavaScript call stack caused a reflow that took \
                             %(DURATION)s milliseconds: %(STACK)s",
                        ),
                        &[
                            Argument::integer("DURATION", duration),
                            Argument::verbatim_string("STACK", &stack),
                        ],
                    );
                } else {
                    url_formatter.add_detail(
                        &UserFacingString::new(
                            "The following JavaScript call stack (executed %(COUNT)s times) caused \
                             reflows that took %(DURATION)s milliseconds: %(STACK)s",
                        ),
                        &[
                            Argument::integer("COUNT", i64::from(trace.count)),
                            Argument::integer("DURATION", duration),
                            Argument::verbatim_string("STACK", &stack),
                        ],
                    );
                }
            }
        }
    }

    /// Longest total reflow time first
    fn sort_results_in_presentation_order(&self, results: &mut [&Finding]) {
        results.sort_by(|a, b| {
            total_duration(b)
                .partial_cmp(&total_duration(a))
                .unwrap_or(Ordering::Equal)
        });
    }

    fn is_experimental(&self) -> bool {
        true
    }
}
