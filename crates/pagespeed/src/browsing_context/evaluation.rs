//! One DOM-level use of a resource and what had to run before it

use crate::contract_violation;
use crate::error::Result;
use crate::resource_collection::ResourceId;
use serde::{Deserialize, Serialize};

use super::fetch::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationType {
    #[default]
    Unknown,
    Script,
    Css,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    #[default]
    Unknown,
    /// The predecessor blocks this evaluation
    Blocking,
    /// Runs as soon as possible, after earlier ordered evaluations
    AsapOrdered,
    /// Runs as soon as possible, in any order
    AsapUnordered,
}

/// Names an evaluation that must causally precede this one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvaluationConstraint {
    pub constraint_type: ConstraintType,
    /// Action URI of the predecessor evaluation
    pub predecessor_uri: Option<String>,
}

impl ResourceEvaluationConstraint {
    pub fn new(constraint_type: ConstraintType, predecessor_uri: &str) -> Self {
        Self {
            constraint_type,
            predecessor_uri: Some(predecessor_uri.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceEvaluation {
    uri: String,
    resource: ResourceId,
    fetch_uri: Option<String>,
    start: Timestamp,
    finish: Timestamp,
    is_matching_media_type: bool,
    is_async: bool,
    is_defer: bool,
    block_lines: Option<(i32, i32)>,
    evaluation_type: EvaluationType,
    constraints: Vec<ResourceEvaluationConstraint>,
    finalized: bool,
}

impl ResourceEvaluation {
    pub(crate) fn new(uri: String, resource: ResourceId) -> Self {
        Self {
            uri,
            resource,
            fetch_uri: None,
            start: Timestamp::default(),
            finish: Timestamp::default(),
            is_matching_media_type: true,
            is_async: false,
            is_defer: false,
            block_lines: None,
            evaluation_type: EvaluationType::Unknown,
            constraints: Vec::new(),
            finalized: false,
        }
    }

    fn check_mutable(&self) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!(
                "Attempting to modify finalized ResourceEvaluation {}",
                self.uri
            ));
        }
        Ok(())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Action URI of the fetch that delivered the evaluated content
    pub fn fetch_uri(&self) -> Option<&str> {
        self.fetch_uri.as_deref()
    }

    pub fn set_fetch_uri(&mut self, fetch_uri: &str) -> Result<()> {
        self.check_mutable()?;
        self.fetch_uri = Some(fetch_uri.to_string());
        Ok(())
    }

    pub fn set_timing(&mut self, start_tick: i64, start_msec: i64, finish_tick: i64, finish_msec: i64) -> Result<()> {
        self.check_mutable()?;
        self.start = Timestamp::new(start_tick, start_msec);
        self.finish = Timestamp::new(finish_tick, finish_msec);
        Ok(())
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn finish(&self) -> Timestamp {
        self.finish
    }

    pub fn set_is_matching_media_type(&mut self, matching: bool) -> Result<()> {
        self.check_mutable()?;
        self.is_matching_media_type = matching;
        Ok(())
    }

    pub fn is_matching_media_type(&self) -> bool {
        self.is_matching_media_type
    }

    pub fn set_is_async(&mut self, is_async: bool) -> Result<()> {
        self.check_mutable()?;
        self.is_async = is_async;
        Ok(())
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn set_is_defer(&mut self, is_defer: bool) -> Result<()> {
        self.check_mutable()?;
        self.is_defer = is_defer;
        Ok(())
    }

    pub fn is_defer(&self) -> bool {
        self.is_defer
    }

    /// Lines of the inline block evaluated, for inline scripts and styles
    pub fn set_evaluation_lines(&mut self, start_line: i32, end_line: i32) -> Result<()> {
        self.check_mutable()?;
        self.block_lines = Some((start_line, end_line));
        Ok(())
    }

    pub fn evaluation_lines(&self) -> Option<(i32, i32)> {
        self.block_lines
    }

    pub fn set_evaluation_type(&mut self, evaluation_type: EvaluationType) -> Result<()> {
        self.check_mutable()?;
        self.evaluation_type = evaluation_type;
        Ok(())
    }

    pub fn evaluation_type(&self) -> EvaluationType {
        self.evaluation_type
    }

    pub fn add_constraint(&mut self, constraint: ResourceEvaluationConstraint) -> Result<()> {
        self.check_mutable()?;
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn constraints(&self) -> &[ResourceEvaluationConstraint] {
        &self.constraints
    }

    pub(crate) fn mark_finalized(&mut self) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!(
                "Attempting to finalize ResourceEvaluation twice {}",
                self.uri
            ));
        }
        self.finalized = true;
        Ok(())
    }
}
