//! The logical streams of the catalog event log.

use crate::events::{ForceSyncEvent, ResourceEvent, ResourceTagEvent, ThreadEvent};
use crate::Stream;

pub const RESOURCES: Stream<ResourceEvent> = Stream::new("resources");

pub const RESOURCE_TAGS: Stream<ResourceTagEvent> = Stream::new("resourcetags");

pub const THREADS: Stream<ThreadEvent> = Stream::new("threads");

pub const FORCE_SYNC: Stream<ForceSyncEvent> = Stream::new("forcesync");

/// Names of every stream, for tooling that inspects the log as a whole.
pub fn all_names() -> [&'static str; 4] {
    [
        RESOURCES.name(),
        RESOURCE_TAGS.name(),
        THREADS.name(),
        FORCE_SYNC.name(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn stream_names_are_unique() {
        let names: HashSet<_> = all_names().into_iter().collect();
        assert_eq!(names.len(), 4);
    }
}
