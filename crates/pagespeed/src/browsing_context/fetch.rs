//! One concrete download and how it was triggered

use crate::contract_violation;
use crate::error::{PagespeedError, Result};
use crate::resource_collection::ResourceId;
use serde::{Deserialize, Serialize};

/// A point in time, as both a monotonic tick and wall-clock milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub tick: i64,
    pub msec: i64,
}

impl Timestamp {
    pub fn new(tick: i64, msec: i64) -> Self {
        Self { tick, msec }
    }
}

/// How the browser found out it needed the resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryType {
    #[default]
    Unknown,
    Parser,
    DocumentWrite,
    /// Inserted into the DOM by script
    Dom,
    Xhr,
}

/// A frame of the script stack that caused a fetch or delay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub url: String,
    pub line: i32,
}

impl CodeLocation {
    pub fn new(url: &str, line: i32) -> Self {
        Self {
            url: url.to_string(),
            line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayKind {
    #[default]
    Unknown,
    /// `setTimeout`-style delay
    Timeout { msec: i64 },
    /// Waited for a DOM event such as `onload`
    Event { name: String },
}

/// Something that held a fetch back before it started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFetchDelay {
    pub kind: DelayKind,
    pub locations: Vec<CodeLocation>,
}

impl ResourceFetchDelay {
    pub fn timeout(msec: i64) -> Self {
        Self {
            kind: DelayKind::Timeout { msec },
            locations: Vec::new(),
        }
    }

    pub fn event(name: &str) -> Self {
        Self {
            kind: DelayKind::Event {
                name: name.to_string(),
            },
            locations: Vec::new(),
        }
    }

    pub fn with_locations(mut self, locations: Vec<CodeLocation>) -> Self {
        self.locations = locations;
        self
    }
}

/// Timing of one download and the evaluation that asked for it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFetchDownload {
    /// Action URI of the requesting evaluation
    pub requestor_uri: Option<String>,
    pub start: Timestamp,
    pub finish: Timestamp,
}

impl ResourceFetchDownload {
    pub fn set_load_timing(&mut self, start_tick: i64, start_msec: i64, finish_tick: i64, finish_msec: i64) {
        self.start = Timestamp::new(start_tick, start_msec);
        self.finish = Timestamp::new(finish_tick, finish_msec);
    }

    /// Take requestor and start from `other`. The finish is taken too
    /// unless `keep_finish_time`, in which case `other` must not start
    /// after this download finished.
    pub fn copy_from(&mut self, other: &ResourceFetchDownload, keep_finish_time: bool) -> Result<()> {
        if keep_finish_time && self.finish.tick < other.start.tick {
            return Err(PagespeedError::Timing(format!(
                "redirect chain starts at tick {} after its target finished at tick {}",
                other.start.tick, self.finish.tick
            )));
        }
        self.requestor_uri = other.requestor_uri.clone();
        self.start = other.start;
        if !keep_finish_time {
            self.finish = other.finish;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ResourceFetch {
    uri: String,
    resource: ResourceId,
    discovery_type: DiscoveryType,
    locations: Vec<CodeLocation>,
    delays: Vec<ResourceFetchDelay>,
    download: ResourceFetchDownload,
    redirect_download: Option<ResourceFetchDownload>,
    finalized: bool,
}

impl ResourceFetch {
    pub(crate) fn new(uri: String, resource: ResourceId) -> Self {
        Self {
            uri,
            resource,
            discovery_type: DiscoveryType::Unknown,
            locations: Vec::new(),
            delays: Vec::new(),
            download: ResourceFetchDownload::default(),
            redirect_download: None,
            finalized: false,
        }
    }

    fn check_mutable(&self) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!(
                "Attempting to modify finalized ResourceFetch {}",
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

    pub fn discovery_type(&self) -> DiscoveryType {
        self.discovery_type
    }

    pub fn set_discovery_type(&mut self, discovery_type: DiscoveryType) -> Result<()> {
        self.check_mutable()?;
        self.discovery_type = discovery_type;
        Ok(())
    }

    /// Replace the code location stack
    pub fn set_code_locations(&mut self, locations: Vec<CodeLocation>) -> Result<()> {
        self.check_mutable()?;
        self.locations = locations;
        Ok(())
    }

    pub fn code_locations(&self) -> &[CodeLocation] {
        &self.locations
    }

    pub fn add_fetch_delay(&mut self, delay: ResourceFetchDelay) -> Result<()> {
        self.check_mutable()?;
        self.delays.push(delay);
        Ok(())
    }

    pub fn fetch_delays(&self) -> &[ResourceFetchDelay] {
        &self.delays
    }

    /// The logical download; for the tail of a redirect chain this spans
    /// the whole chain once finalized
    pub fn download(&self) -> &ResourceFetchDownload {
        &self.download
    }

    pub fn download_mut(&mut self) -> Result<&mut ResourceFetchDownload> {
        self.check_mutable()?;
        Ok(&mut self.download)
    }

    /// This hop's own download, set when finalize spliced a redirect chain
    pub fn redirect_download(&self) -> Option<&ResourceFetchDownload> {
        self.redirect_download.as_ref()
    }

    pub fn requestor_uri(&self) -> Option<&str> {
        self.download.requestor_uri.as_deref()
    }

    pub fn start_tick(&self) -> i64 {
        self.download.start.tick
    }

    pub fn finish_tick(&self) -> i64 {
        self.download.finish.tick
    }

    /// Make this fetch stand for the whole redirect chain headed by `head`
    ///
    /// The current download is kept as `redirect_download`; the logical
    /// download takes the head's requestor and start and keeps its own
    /// finish.
    pub(crate) fn splice_redirect_head(&mut self, head: &ResourceFetch) -> Result<()> {
        self.check_mutable()?;
        let own = self.download.clone();
        self.download.copy_from(&head.download, true)?;
        self.redirect_download = Some(own);
        self.discovery_type = head.discovery_type;
        self.locations = head.locations.clone();
        self.delays.extend(head.delays.iter().cloned());
        Ok(())
    }

    pub(crate) fn mark_finalized(&mut self) -> Result<()> {
        if self.finalized {
            return Err(contract_violation!(
                "Attempting to finalize ResourceFetch twice {}",
                self.uri
            ));
        }
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_keeps_finish() {
        let mut head = ResourceFetchDownload::default();
        head.requestor_uri = Some("eval://http/a.com/#1".to_string());
        head.set_load_timing(10, 100, 20, 200);

        let mut tail = ResourceFetchDownload::default();
        tail.set_load_timing(21, 200, 31, 300);
        tail.copy_from(&head, true).unwrap();
        assert_eq!(tail.start, Timestamp::new(10, 100));
        assert_eq!(tail.finish, Timestamp::new(31, 300));
        assert_eq!(tail.requestor_uri, head.requestor_uri);

        let mut copy = ResourceFetchDownload::default();
        copy.copy_from(&head, false).unwrap();
        assert_eq!(copy, head);
    }

    #[test]
    fn test_copy_from_rejects_head_after_finish() {
        let mut head = ResourceFetchDownload::default();
        head.set_load_timing(50, 500, 60, 600);
        let mut tail = ResourceFetchDownload::default();
        tail.set_load_timing(21, 200, 31, 300);
        assert!(matches!(tail.copy_from(&head, true), Err(PagespeedError::Timing(_))));
    }

    #[test]
    fn test_delays() {
        let mut fetch = ResourceFetch::new("fetch://http/a.com/#1".to_string(), ResourceId(0));
        fetch
            .add_fetch_delay(
                ResourceFetchDelay::timeout(1000)
                    .with_locations(vec![CodeLocation::new("http://a.com/", 20)]),
            )
            .unwrap();
        fetch.add_fetch_delay(ResourceFetchDelay::event("onload")).unwrap();
        assert_eq!(fetch.fetch_delays().len(), 2);
        assert_eq!(fetch.fetch_delays()[0].kind, DelayKind::Timeout { msec: 1000 });
        assert_eq!(fetch.fetch_delays()[0].locations[0].line, 20);
        assert_eq!(
            fetch.fetch_delays()[1].kind,
            DelayKind::Event { name: "onload".to_string() }
        );
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "modify finalized ResourceFetch"))]
    fn test_mutate_after_finalize() {
        let mut fetch = ResourceFetch::new("fetch://http/a.com/#1".to_string(), ResourceId(0));
        fetch.mark_finalized().unwrap();
        assert!(fetch.set_discovery_type(DiscoveryType::Parser).is_err());
        assert_eq!(fetch.discovery_type(), DiscoveryType::Unknown);
    }
}
