use serde::{Deserialize, Serialize};

use crate::{DiagramError, Resource};

/// Upper bounds applied to a single diagram parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramLimits {
    pub max_source_bytes: usize,
    pub max_nodes: usize,
    pub max_edges: usize,
    pub max_events: usize,
}

impl Default for DiagramLimits {
    fn default() -> Self {
        Self {
            max_source_bytes: 256 * 1024,
            max_nodes: 2_000,
            max_edges: 4_000,
            max_events: 8_000,
        }
    }
}

impl DiagramLimits {
    #[must_use]
    pub const fn limit(&self, resource: Resource) -> usize {
        match resource {
            Resource::SourceBytes => self.max_source_bytes,
            Resource::Nodes => self.max_nodes,
            Resource::Edges => self.max_edges,
            Resource::Events => self.max_events,
        }
    }
}

/// Resource budget threaded through a parse.
///
/// Parsers charge every entity they create; the first charge past a limit
/// aborts the parse with [`DiagramError::ResourceLimit`].
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    limits: DiagramLimits,
    nodes: usize,
    edges: usize,
    events: usize,
}

impl ParseContext {
    #[must_use]
    pub fn new(limits: DiagramLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn limits(&self) -> &DiagramLimits {
        &self.limits
    }

    pub fn check_source(&self, source: &str) -> Result<(), DiagramError> {
        if source.len() > self.limits.max_source_bytes {
            return Err(DiagramError::SourceTooLarge {
                len: source.len(),
                limit: self.limits.max_source_bytes,
            });
        }
        Ok(())
    }

    pub fn charge(&mut self, resource: Resource) -> Result<(), DiagramError> {
        let limit = self.limits.limit(resource);
        let counter = match resource {
            Resource::SourceBytes => return Ok(()),
            Resource::Nodes => &mut self.nodes,
            Resource::Edges => &mut self.edges,
            Resource::Events => &mut self.events,
        };
        if *counter >= limit {
            return Err(DiagramError::ResourceLimit { resource, limit });
        }
        *counter += 1;
        Ok(())
    }

    #[must_use]
    pub const fn used(&self, resource: Resource) -> usize {
        match resource {
            Resource::SourceBytes => 0,
            Resource::Nodes => self.nodes,
            Resource::Edges => self.edges,
            Resource::Events => self.events,
        }
    }

    /// Clear the counters so the context can serve another parse.
    pub fn reset(&mut self) {
        self.nodes = 0;
        self.edges = 0;
        self.events = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagramLimits, ParseContext};
    use crate::{DiagramError, Resource};

    #[test]
    fn charge_fails_past_limit() {
        let mut ctx = ParseContext::new(DiagramLimits {
            max_nodes: 2,
            ..DiagramLimits::default()
        });
        assert!(ctx.charge(Resource::Nodes).is_ok());
        assert!(ctx.charge(Resource::Nodes).is_ok());
        assert_eq!(
            ctx.charge(Resource::Nodes),
            Err(DiagramError::ResourceLimit {
                resource: Resource::Nodes,
                limit: 2
            })
        );
        assert_eq!(ctx.used(Resource::Nodes), 2);
        ctx.reset();
        assert_eq!(ctx.used(Resource::Nodes), 0);
    }

    #[test]
    fn oversized_source_is_rejected() {
        let ctx = ParseContext::new(DiagramLimits {
            max_source_bytes: 4,
            ..DiagramLimits::default()
        });
        assert!(ctx.check_source("pie").is_ok());
        assert!(matches!(
            ctx.check_source("graph TD"),
            Err(DiagramError::SourceTooLarge { len: 8, limit: 4 })
        ));
    }
}
