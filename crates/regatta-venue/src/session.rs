//! Per-session venue selection.
//!
//! One `VenueSession` is created when the app starts and passed to whatever
//! needs the current venue. Signing out clears it; nothing is global.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Venue, VenueMatch};

#[derive(Debug, Clone)]
struct Selection {
    venue: Arc<Venue>,
    /// Runners-up from the lookup that produced `venue`
    alternatives: Vec<Venue>,
}

#[derive(Debug, Default)]
pub struct VenueSession {
    selection: RwLock<Option<Selection>>,
}

impl VenueSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `venue` the current venue, dropping any stored alternatives
    pub fn select(&self, venue: Venue) -> Arc<Venue> {
        self.replace(venue, Vec::new())
    }

    /// Take the best venue of a lookup and remember its alternatives
    pub fn select_match(&self, found: VenueMatch) -> Arc<Venue> {
        let VenueMatch {
            venue,
            alternatives,
            ..
        } = found;
        self.replace(venue, alternatives)
    }

    fn replace(&self, venue: Venue, alternatives: Vec<Venue>) -> Arc<Venue> {
        let venue = Arc::new(venue);
        tracing::info!("Selected venue {}", venue.name);
        *self.selection.write() = Some(Selection {
            venue: venue.clone(),
            alternatives,
        });
        venue
    }

    pub fn current(&self) -> Option<Arc<Venue>> {
        self.selection.read().as_ref().map(|s| s.venue.clone())
    }

    pub fn alternatives(&self) -> Vec<Venue> {
        self.selection
            .read()
            .as_ref()
            .map(|s| s.alternatives.clone())
            .unwrap_or_default()
    }

    /// Current venue together with the alternatives from the same lookup
    pub fn snapshot(&self) -> Option<(Arc<Venue>, Vec<Venue>)> {
        self.selection
            .read()
            .as_ref()
            .map(|s| (s.venue.clone(), s.alternatives.clone()))
    }

    /// Forget the selection (sign-out)
    pub fn clear(&self) {
        if self.selection.write().take().is_some() {
            tracing::info!("Cleared current venue");
        }
    }
}
